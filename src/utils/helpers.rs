/// Helper utilities shared between the TUI and the CLI

/// Format bytes to human-readable size
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Truncate string with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len.saturating_sub(3)])
    }
}

/// Container lifecycle state as reported by the engine's list endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Exited,
    Paused,
    Created,
    Restarting,
    Dead,
    Unknown,
}

impl From<&str> for ContainerState {
    fn from(state: &str) -> Self {
        match state.to_lowercase().as_str() {
            "running" => ContainerState::Running,
            "exited" | "stopped" => ContainerState::Exited,
            "paused" => ContainerState::Paused,
            "created" => ContainerState::Created,
            "restarting" => ContainerState::Restarting,
            "dead" | "removing" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }
}

impl ContainerState {
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Running => "Running",
            ContainerState::Exited => "Exited",
            ContainerState::Paused => "Paused",
            ContainerState::Created => "Created",
            ContainerState::Restarting => "Restarting",
            ContainerState::Dead => "Dead",
            ContainerState::Unknown => "Unknown",
        }
    }
}
