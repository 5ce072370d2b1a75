pub mod dashboard;

// The whole panel is a single dashboard screen: header, container table,
// optional chart strip, status bar, plus logs and help overlays rendered
// on top with ratatui built-in widgets.

pub use dashboard::{Dashboard, ViewState};
