/// Shared constants: cadences, capacities, and display sentinels
///
/// The poller cadence is deliberately coarse (stats queries hit the engine
/// once per container per cycle) while the render tick stays fine so the
/// table and charts feel live.

/// Placeholder shown for any metric that is unavailable (container not
/// running, query failed, field missing).
pub const SENTINEL: &str = "-";

/// Number of slots in each chart history ring buffer.
pub const CHART_SLOTS: usize = 60;

/// Seconds between poll cycles (engine-side sampling).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Milliseconds between render ticks (UI-side snapshot reads).
pub const DEFAULT_RENDER_TICK_MS: u64 = 1000;

/// Milliseconds the event loop waits for terminal input per iteration.
pub const EVENT_POLL_MS: u64 = 100;

/// Seconds before an individual per-container engine query is abandoned.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 10;

/// Default number of log lines fetched for the logs view.
pub const DEFAULT_LOG_TAIL: usize = 50;

/// Compose label carrying the service name a container was created from.
pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";
