/// Background poll loop producing atomically published snapshots
///
/// One cycle samples every container the engine knows about and assembles
/// the rows into an immutable `Snapshot`, which is swapped into a watch
/// channel. The renderer only ever borrows the latest published value, so
/// it can never observe a half-built cycle. The poller runs for the life
/// of the process; failures degrade a cycle, they never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::sync::{mpsc, watch};

use crate::core::docker::{ContainerBrief, ContainerEngine};
use crate::core::metrics;
use crate::utils::constants::SENTINEL;
use crate::utils::ContainerState;

/// One displayed container. The metric fields are the formatted display
/// strings; the sentinel marks anything unavailable.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRow {
    pub name: String,
    pub image: String,
    pub status: String,
    pub state: ContainerState,
    pub cpu: String,
    pub memory: String,
    pub network: String,
    pub uptime: String,
}

impl ContainerRow {
    fn unavailable(brief: &ContainerBrief) -> Self {
        Self {
            name: brief.name.clone(),
            image: brief.image.clone(),
            status: brief.status.clone(),
            state: brief.state,
            cpu: SENTINEL.to_string(),
            memory: SENTINEL.to_string(),
            network: SENTINEL.to_string(),
            uptime: SENTINEL.to_string(),
        }
    }
}

/// The full table produced by one poll cycle. Immutable once published;
/// row count always equals the engine's container count at sampling time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub rows: Vec<ContainerRow>,
    pub taken_at: DateTime<Local>,
    pub error: Option<String>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            taken_at: Local::now(),
            error: None,
        }
    }

    pub fn running_count(&self) -> usize {
        self.rows.iter().filter(|r| r.state.is_running()).count()
    }
}

pub type SnapshotReceiver = watch::Receiver<Arc<Snapshot>>;

/// Handle for requesting an out-of-band poll cycle (manual refresh, or a
/// lifecycle command that just completed).
#[derive(Clone)]
pub struct PollerHandle {
    kick_tx: mpsc::UnboundedSender<()>,
}

impl PollerHandle {
    pub fn kick(&self) {
        let _ = self.kick_tx.send(());
    }
}

pub struct Poller<E> {
    engine: E,
    interval: Duration,
    query_timeout: Duration,
    publish_tx: watch::Sender<Arc<Snapshot>>,
    kick_rx: mpsc::UnboundedReceiver<()>,
}

impl<E: ContainerEngine> Poller<E> {
    pub fn new(
        engine: E,
        interval: Duration,
        query_timeout: Duration,
    ) -> (Self, SnapshotReceiver, PollerHandle) {
        let (publish_tx, publish_rx) = watch::channel(Arc::new(Snapshot::empty()));
        let (kick_tx, kick_rx) = mpsc::unbounded_channel();

        (
            Self {
                engine,
                interval,
                query_timeout,
                publish_tx,
                kick_rx,
            },
            publish_rx,
            PollerHandle { kick_tx },
        )
    }

    /// Run until every snapshot receiver is gone (process shutdown).
    pub async fn run(mut self) {
        loop {
            let snapshot = self.cycle().await;
            if self.publish_tx.send(Arc::new(snapshot)).is_err() {
                tracing::debug!("all snapshot receivers dropped, stopping poller");
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                kick = self.kick_rx.recv() => {
                    if kick.is_none() {
                        // kick handles all dropped; fall back to the fixed cadence
                        tokio::time::sleep(self.interval).await;
                    }
                }
            }
            // coalesce queued kicks into the cycle we are about to run
            while self.kick_rx.try_recv().is_ok() {}
        }
    }

    async fn cycle(&mut self) -> Snapshot {
        match self.engine.list_containers().await {
            Ok(briefs) => {
                let mut rows = Vec::with_capacity(briefs.len());
                for brief in &briefs {
                    rows.push(self.sample_row(brief).await);
                }
                Snapshot {
                    rows,
                    taken_at: Local::now(),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "container listing failed, keeping previous rows");
                let previous = self.publish_tx.borrow().clone();
                Snapshot {
                    rows: previous.rows.clone(),
                    taken_at: previous.taken_at,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Build one row. Stopped containers get the sentinel without touching
    /// the engine; a failure or timeout for one container never affects the
    /// others in the same cycle.
    async fn sample_row(&self, brief: &ContainerBrief) -> ContainerRow {
        if !brief.state.is_running() {
            return ContainerRow::unavailable(brief);
        }

        let stats = match tokio::time::timeout(
            self.query_timeout,
            self.engine.sample_counters(&brief.name),
        )
        .await
        {
            Ok(Ok(sample)) => metrics::derive_stats(&sample),
            Ok(Err(e)) => {
                tracing::debug!(container = %brief.name, error = %e, "stats query failed");
                None
            }
            Err(_) => {
                tracing::debug!(container = %brief.name, "stats query timed out");
                None
            }
        };

        let uptime = match tokio::time::timeout(
            self.query_timeout,
            self.engine.started_at(&brief.name),
        )
        .await
        {
            Ok(Ok(started)) => (Utc::now() - started).to_std().ok().map(metrics::format_uptime),
            Ok(Err(e)) => {
                tracing::debug!(container = %brief.name, error = %e, "start timestamp query failed");
                None
            }
            Err(_) => {
                tracing::debug!(container = %brief.name, "start timestamp query timed out");
                None
            }
        };

        let (cpu, memory, network) = stats.unwrap_or_else(|| {
            (
                SENTINEL.to_string(),
                SENTINEL.to_string(),
                SENTINEL.to_string(),
            )
        });

        ContainerRow {
            name: brief.name.clone(),
            image: brief.image.clone(),
            status: brief.status.clone(),
            state: brief.state,
            cpu,
            memory,
            network,
            uptime: uptime.unwrap_or_else(|| SENTINEL.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::docker::EngineError;
    use crate::core::metrics::RawSample;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubEngine {
        containers: Vec<ContainerBrief>,
        samples: HashMap<String, RawSample>,
        started: HashMap<String, DateTime<Utc>>,
        fail_list: Arc<AtomicBool>,
        hang_queries: bool,
    }

    impl StubEngine {
        fn new(containers: Vec<ContainerBrief>) -> Self {
            Self {
                containers,
                samples: HashMap::new(),
                started: HashMap::new(),
                fail_list: Arc::new(AtomicBool::new(false)),
                hang_queries: false,
            }
        }
    }

    impl ContainerEngine for StubEngine {
        async fn list_containers(&self) -> Result<Vec<ContainerBrief>, EngineError> {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(EngineError::Unreachable("connection refused".to_string()));
            }
            Ok(self.containers.clone())
        }

        async fn sample_counters(&self, name: &str) -> Result<RawSample, EngineError> {
            if self.hang_queries {
                std::future::pending::<()>().await;
            }
            self.samples
                .get(name)
                .cloned()
                .ok_or_else(|| EngineError::Query {
                    name: name.to_string(),
                    reason: "no such container".to_string(),
                })
        }

        async fn started_at(&self, name: &str) -> Result<DateTime<Utc>, EngineError> {
            if self.hang_queries {
                std::future::pending::<()>().await;
            }
            self.started
                .get(name)
                .copied()
                .ok_or_else(|| EngineError::Malformed {
                    name: name.to_string(),
                    field: "State.StartedAt",
                })
        }
    }

    fn brief(name: &str, state: ContainerState) -> ContainerBrief {
        ContainerBrief {
            id: format!("{name}-id"),
            name: name.to_string(),
            image: "img:latest".to_string(),
            status: match state {
                ContainerState::Running => "Up 2 hours".to_string(),
                _ => "Exited (0) 3 hours ago".to_string(),
            },
            state,
            compose_service: None,
        }
    }

    fn running_sample() -> RawSample {
        RawSample {
            cpu_total: 150,
            precpu_total: 100,
            system_cpu: Some(1100),
            presystem_cpu: Some(1000),
            online_cpus: Some(2),
            memory_usage: Some(128 * 1024 * 1024),
            memory_limit: Some(512 * 1024 * 1024),
            interfaces: vec![(5 * 1024, 3 * 1024)],
        }
    }

    #[tokio::test]
    async fn cycle_row_count_matches_listing() {
        let mut engine = StubEngine::new(vec![
            brief("web", ContainerState::Running),
            brief("db", ContainerState::Exited),
            brief("cache", ContainerState::Paused),
        ]);
        engine.samples.insert("web".to_string(), running_sample());
        engine
            .started
            .insert("web".to_string(), Utc::now() - chrono::Duration::seconds(45));

        let (mut poller, _rx, _handle) =
            Poller::new(engine, Duration::from_secs(30), Duration::from_secs(5));

        let snapshot = poller.cycle().await;
        assert_eq!(snapshot.rows.len(), 3);
        assert!(snapshot.error.is_none());

        let web = &snapshot.rows[0];
        assert_eq!(web.cpu, "100.0%");
        assert_eq!(web.memory, "128MB / 512MB");
        assert_eq!(web.network, "5kB / 3kB");
        assert_eq!(web.uptime, "45s");
    }

    #[tokio::test]
    async fn non_running_rows_are_sentinel_without_queries() {
        // no samples registered at all: a query would fail loudly
        let engine = StubEngine::new(vec![brief("db", ContainerState::Exited)]);
        let (mut poller, _rx, _handle) =
            Poller::new(engine, Duration::from_secs(30), Duration::from_secs(5));

        let snapshot = poller.cycle().await;
        let db = &snapshot.rows[0];
        assert_eq!(db.cpu, SENTINEL);
        assert_eq!(db.memory, SENTINEL);
        assert_eq!(db.network, SENTINEL);
        assert_eq!(db.uptime, SENTINEL);
    }

    #[tokio::test]
    async fn per_container_failure_is_isolated() {
        let mut engine = StubEngine::new(vec![
            brief("good", ContainerState::Running),
            brief("bad", ContainerState::Running),
        ]);
        engine.samples.insert("good".to_string(), running_sample());
        engine
            .started
            .insert("good".to_string(), Utc::now() - chrono::Duration::seconds(10));
        // "bad" has no sample and no start timestamp registered

        let (mut poller, _rx, _handle) =
            Poller::new(engine, Duration::from_secs(30), Duration::from_secs(5));

        let snapshot = poller.cycle().await;
        assert_eq!(snapshot.rows[0].cpu, "100.0%");
        assert_eq!(snapshot.rows[1].cpu, SENTINEL);
        assert_eq!(snapshot.rows[1].uptime, SENTINEL);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn listing_failure_degrades_to_stale_rows() {
        let mut engine = StubEngine::new(vec![brief("web", ContainerState::Running)]);
        engine.samples.insert("web".to_string(), running_sample());
        engine
            .started
            .insert("web".to_string(), Utc::now() - chrono::Duration::seconds(10));
        let fail_flag = engine.fail_list.clone();

        let (mut poller, _rx, _handle) =
            Poller::new(engine, Duration::from_secs(30), Duration::from_secs(5));

        let first = poller.cycle().await;
        assert_eq!(first.rows.len(), 1);
        poller.publish_tx.send(Arc::new(first.clone())).unwrap();

        fail_flag.store(true, Ordering::SeqCst);
        let degraded = poller.cycle().await;
        assert_eq!(degraded.rows, first.rows);
        assert!(degraded.error.as_deref().unwrap().contains("unreachable"));
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_container_times_out_to_sentinel() {
        let mut engine = StubEngine::new(vec![brief("stuck", ContainerState::Running)]);
        engine.hang_queries = true;

        let (mut poller, _rx, _handle) =
            Poller::new(engine, Duration::from_secs(30), Duration::from_millis(50));

        let snapshot = poller.cycle().await;
        assert_eq!(snapshot.rows.len(), 1);
        assert_eq!(snapshot.rows[0].cpu, SENTINEL);
        assert_eq!(snapshot.rows[0].uptime, SENTINEL);
    }

    #[tokio::test]
    async fn published_snapshot_is_replaced_wholesale() {
        let mut engine = StubEngine::new(vec![brief("web", ContainerState::Running)]);
        engine.samples.insert("web".to_string(), running_sample());
        engine
            .started
            .insert("web".to_string(), Utc::now() - chrono::Duration::seconds(10));

        let (mut poller, rx, _handle) =
            Poller::new(engine, Duration::from_secs(30), Duration::from_secs(5));

        assert!(rx.borrow().rows.is_empty());

        let snapshot = poller.cycle().await;
        poller.publish_tx.send(Arc::new(snapshot)).unwrap();

        let published = rx.borrow().clone();
        assert_eq!(published.rows.len(), 1);
    }
}
