/// Metric derivation from raw engine counters
///
/// A `RawSample` holds the two consecutive counter readings the engine
/// returns for one container (the previous reading rides along in the same
/// stats response). Everything here is a pure function over that sample so
/// the derivation contract is testable without an engine.

use std::time::Duration;

const MIB: u64 = 1024 * 1024;
const KIB: u64 = 1024;

/// Raw counters extracted from one two-point stats response.
///
/// Optional fields mirror what the engine may omit: cgroup v1/v2 quirks can
/// drop `system_cpu_usage` or memory numbers, and containers without network
/// namespaces report no interfaces at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSample {
    pub cpu_total: u64,
    pub precpu_total: u64,
    pub system_cpu: Option<u64>,
    pub presystem_cpu: Option<u64>,
    pub online_cpus: Option<u64>,
    pub memory_usage: Option<u64>,
    pub memory_limit: Option<u64>,
    /// (rx_bytes, tx_bytes) per interface
    pub interfaces: Vec<(u64, u64)>,
}

/// CPU percentage from usage/system deltas scaled by online CPU count.
///
/// Contract: a non-positive delta on either counter yields exactly 0.0 —
/// never negative, never NaN, never a division by zero.
pub fn cpu_percent(cpu_t1: u64, cpu_t0: u64, system_t1: u64, system_t0: u64, online_cpus: u64) -> f64 {
    let cpu_delta = cpu_t1.saturating_sub(cpu_t0);
    let system_delta = system_t1.saturating_sub(system_t0);

    if cpu_delta > 0 && system_delta > 0 {
        (cpu_delta as f64 / system_delta as f64) * online_cpus as f64 * 100.0
    } else {
        0.0
    }
}

pub fn format_cpu(percent: f64) -> String {
    format!("{:.1}%", percent)
}

/// Usage and limit truncated to whole MiB for display.
pub fn format_memory(usage_bytes: u64, limit_bytes: u64) -> String {
    format!("{}MB / {}MB", usage_bytes / MIB, limit_bytes / MIB)
}

/// Rx and tx summed across all interfaces, shown in whole KiB.
pub fn format_network(interfaces: &[(u64, u64)]) -> String {
    let rx: u64 = interfaces.iter().map(|(rx, _)| rx).sum();
    let tx: u64 = interfaces.iter().map(|(_, tx)| tx).sum();
    format!("{}kB / {}kB", rx / KIB, tx / KIB)
}

/// Duration rendered with descending units, leading zero-valued units
/// omitted, inner zeros kept: "1d 0h 0m 1s", "3m 10s", "45s".
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Derive the (cpu, memory, network) display triple for one sample.
///
/// Returns `None` when a required field is missing, in which case the whole
/// triple falls back to the sentinel — a row is never half-populated. An
/// absent network section is not a failure; it just reads as zero traffic.
pub fn derive_stats(sample: &RawSample) -> Option<(String, String, String)> {
    let system = sample.system_cpu?;
    let presystem = sample.presystem_cpu?;
    let usage = sample.memory_usage?;
    let limit = sample.memory_limit?;

    let percent = cpu_percent(
        sample.cpu_total,
        sample.precpu_total,
        system,
        presystem,
        sample.online_cpus.unwrap_or(1),
    );

    Some((
        format_cpu(percent),
        format_memory(usage, limit),
        format_network(&sample.interfaces),
    ))
}
