/// Rolling-window chart history and aggregate reverse-parsing
///
/// The aggregator deliberately parses the snapshot's *formatted* metric
/// strings back into numbers instead of carrying raw values alongside the
/// display strings. That round trip is a compatibility contract with the
/// system this tool mirrors; the ±1 MiB truncation loss is accepted.
/// A row that fails to parse (or holds the sentinel) contributes zero to
/// that metric and never aborts aggregation of the rest.

use std::collections::VecDeque;

use crate::core::poller::Snapshot;
use crate::utils::constants::CHART_SLOTS;

/// Per-tick aggregate totals across all rows of one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateTotals {
    pub cpu: f64,
    pub memory_mb: f64,
    pub network_kb: f64,
}

pub fn parse_cpu(s: &str) -> Option<f64> {
    s.trim().strip_suffix('%')?.trim().parse().ok()
}

/// Left operand of "128MB / 512MB" — the used side feeds the chart.
pub fn parse_memory_used(s: &str) -> Option<f64> {
    s.split('/')
        .next()?
        .trim()
        .strip_suffix("MB")?
        .trim()
        .parse()
        .ok()
}

/// Sum of both sides of "5kB / 3kB".
pub fn parse_network_total(s: &str) -> Option<f64> {
    let mut parts = s.split('/');
    let rx: f64 = parts.next()?.trim().strip_suffix("kB")?.trim().parse().ok()?;
    let tx: f64 = parts.next()?.trim().strip_suffix("kB")?.trim().parse().ok()?;
    Some(rx + tx)
}

pub fn aggregate_totals(snapshot: &Snapshot) -> AggregateTotals {
    let mut totals = AggregateTotals::default();
    for row in &snapshot.rows {
        totals.cpu += parse_cpu(&row.cpu).unwrap_or(0.0);
        totals.memory_mb += parse_memory_used(&row.memory).unwrap_or(0.0);
        totals.network_kb += parse_network_total(&row.network).unwrap_or(0.0);
    }
    totals
}

/// Three fixed-capacity ring buffers, one per charted aggregate. Pre-filled
/// with zeros so each buffer is always exactly at capacity; every append
/// evicts the oldest slot (a sliding window over the last CHART_SLOTS
/// render ticks).
#[derive(Debug, Clone)]
pub struct History {
    cpu: VecDeque<f64>,
    memory: VecDeque<f64>,
    network: VecDeque<f64>,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            cpu: VecDeque::from(vec![0.0; CHART_SLOTS]),
            memory: VecDeque::from(vec![0.0; CHART_SLOTS]),
            network: VecDeque::from(vec![0.0; CHART_SLOTS]),
        }
    }

    pub fn record(&mut self, totals: AggregateTotals) {
        Self::push(&mut self.cpu, totals.cpu);
        Self::push(&mut self.memory, totals.memory_mb);
        Self::push(&mut self.network, totals.network_kb);
    }

    fn push(buffer: &mut VecDeque<f64>, value: f64) {
        if buffer.len() == CHART_SLOTS {
            buffer.pop_front();
        }
        buffer.push_back(value);
    }

    /// Most recently recorded totals (zeros until the first record).
    pub fn latest(&self) -> AggregateTotals {
        AggregateTotals {
            cpu: self.cpu.back().copied().unwrap_or(0.0),
            memory_mb: self.memory.back().copied().unwrap_or(0.0),
            network_kb: self.network.back().copied().unwrap_or(0.0),
        }
    }

    pub fn cpu_series(&self) -> Vec<u64> {
        Self::series(&self.cpu)
    }

    pub fn memory_series(&self) -> Vec<u64> {
        Self::series(&self.memory)
    }

    pub fn network_series(&self) -> Vec<u64> {
        Self::series(&self.network)
    }

    fn series(buffer: &VecDeque<f64>) -> Vec<u64> {
        buffer.iter().map(|v| v.max(0.0).round() as u64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::poller::ContainerRow;
    use crate::utils::constants::SENTINEL;
    use crate::utils::ContainerState;
    use chrono::Local;

    fn row(name: &str, cpu: &str, memory: &str, network: &str) -> ContainerRow {
        ContainerRow {
            name: name.to_string(),
            image: "img".to_string(),
            status: "Up".to_string(),
            state: ContainerState::Running,
            cpu: cpu.to_string(),
            memory: memory.to_string(),
            network: network.to_string(),
            uptime: "5s".to_string(),
        }
    }

    fn snapshot(rows: Vec<ContainerRow>) -> Snapshot {
        Snapshot {
            rows,
            taken_at: Local::now(),
            error: None,
        }
    }

    #[test]
    fn parses_formatted_metrics_back_to_numbers() {
        assert_eq!(parse_cpu("12.3%"), Some(12.3));
        assert_eq!(parse_cpu("100.0%"), Some(100.0));
        assert_eq!(parse_memory_used("128MB / 512MB"), Some(128.0));
        assert_eq!(parse_network_total("5kB / 3kB"), Some(8.0));
    }

    #[test]
    fn sentinel_and_garbage_fail_to_parse() {
        assert_eq!(parse_cpu(SENTINEL), None);
        assert_eq!(parse_memory_used(SENTINEL), None);
        assert_eq!(parse_network_total(SENTINEL), None);
        assert_eq!(parse_cpu("12.3"), None);
        assert_eq!(parse_memory_used("128GB / 512GB"), None);
    }

    #[test]
    fn aggregation_sums_rows_and_zeroes_failures() {
        let snap = snapshot(vec![
            row("web", "50.0%", "128MB / 512MB", "5kB / 3kB"),
            row("db", "25.5%", "64MB / 256MB", "1kB / 1kB"),
            row("stopped", SENTINEL, SENTINEL, SENTINEL),
        ]);

        let totals = aggregate_totals(&snap);
        assert_eq!(totals.cpu, 75.5);
        assert_eq!(totals.memory_mb, 192.0);
        assert_eq!(totals.network_kb, 10.0);
    }

    #[test]
    fn memory_round_trip_through_display_format() {
        let formatted =
            crate::core::metrics::format_memory(128 * 1024 * 1024, 512 * 1024 * 1024);
        assert_eq!(parse_memory_used(&formatted), Some(128.0));
    }

    #[test]
    fn single_container_cpu_aggregate_matches_display() {
        let snap = snapshot(vec![row("web", "100.0%", "1MB / 2MB", "0kB / 0kB")]);
        assert_eq!(aggregate_totals(&snap).cpu, 100.0);
    }

    #[test]
    fn history_starts_full_of_zeros() {
        let history = History::new();
        assert_eq!(history.cpu_series().len(), CHART_SLOTS);
        assert!(history.cpu_series().iter().all(|&v| v == 0));
        assert_eq!(history.latest(), AggregateTotals::default());
    }

    #[test]
    fn history_evicts_oldest_and_keeps_length() {
        let mut history = History::new();
        for i in 1..=65u64 {
            history.record(AggregateTotals {
                cpu: i as f64,
                memory_mb: i as f64,
                network_kb: i as f64,
            });
        }

        let series = history.cpu_series();
        assert_eq!(series.len(), CHART_SLOTS);
        // appends #6..=#65 survive in chronological order
        assert_eq!(series.first(), Some(&6));
        assert_eq!(series.last(), Some(&65));
        let expected: Vec<u64> = (6..=65).collect();
        assert_eq!(series, expected);
    }
}
