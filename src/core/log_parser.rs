/// Log line classification for the logs view
///
/// Container log output arrives as raw text in whatever format the
/// process inside chose. The logs view only needs enough structure to
/// colorize lines: strip ANSI escapes, pull a leading ISO timestamp when
/// one is present, and detect the log level.

use regex::Regex;
use std::sync::OnceLock;

use ratatui::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Unknown,
}

impl LogLevel {
    fn from_token(s: &str) -> Self {
        match s {
            "ERROR" => LogLevel::Error,
            "WARN" | "WARNING" => LogLevel::Warn,
            "INFO" => LogLevel::Info,
            "DEBUG" => LogLevel::Debug,
            "TRACE" => LogLevel::Trace,
            _ => LogLevel::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN ",
            LogLevel::Info => "INFO ",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
            LogLevel::Unknown => "     ",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            LogLevel::Error => Color::Red,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Info => Color::Cyan,
            LogLevel::Debug => Color::Gray,
            LogLevel::Trace => Color::DarkGray,
            LogLevel::Unknown => Color::White,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

/// Strip ANSI escape codes from a string
fn strip_ansi_codes(s: &str) -> String {
    static ANSI_RE: OnceLock<Regex> = OnceLock::new();
    let re = ANSI_RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
    re.replace_all(s, "").to_string()
}

/// Parse one raw log line into timestamp/level/message.
/// Handles "2025-10-21T10:37:06.342076Z  INFO message" shaped prefixes;
/// anything else keeps its full text and gets a level guessed from content.
pub fn parse_log_line(line: &str) -> LogLine {
    static ISO_RE: OnceLock<Regex> = OnceLock::new();
    let iso_re = ISO_RE.get_or_init(|| {
        Regex::new(
            r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z?)\s+(ERROR|WARN|WARNING|INFO|DEBUG|TRACE)\s+(.*)$",
        )
        .unwrap()
    });

    let cleaned = strip_ansi_codes(line.trim_end());

    if let Some(caps) = iso_re.captures(&cleaned) {
        let timestamp = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let level = LogLevel::from_token(caps.get(2).map(|m| m.as_str()).unwrap_or(""));
        let message = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default();

        return LogLine {
            timestamp,
            level,
            message,
        };
    }

    let level = ["ERROR", "WARN", "INFO", "DEBUG", "TRACE"]
        .iter()
        .find(|token| cleaned.contains(*token))
        .map(|token| LogLevel::from_token(token))
        .unwrap_or(LogLevel::Unknown);

    LogLine {
        timestamp: String::new(),
        level,
        message: cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_prefixed_lines() {
        let line = parse_log_line("2025-10-21T10:37:06.342076Z  INFO chain committed");
        assert_eq!(line.timestamp, "2025-10-21T10:37:06.342076Z");
        assert_eq!(line.level, LogLevel::Info);
        assert_eq!(line.message, "chain committed");
    }

    #[test]
    fn strips_ansi_codes_before_matching() {
        let line = parse_log_line("\x1b[31m2025-10-21T10:37:06Z ERROR boom\x1b[0m");
        assert_eq!(line.level, LogLevel::Error);
        assert_eq!(line.message, "boom");
    }

    #[test]
    fn guesses_level_from_content() {
        let line = parse_log_line("[worker] WARN queue backlog growing");
        assert_eq!(line.level, LogLevel::Warn);
        assert_eq!(line.message, "[worker] WARN queue backlog growing");
        assert!(line.timestamp.is_empty());
    }

    #[test]
    fn plain_lines_are_unknown_level() {
        let line = parse_log_line("listening on 0.0.0.0:8080");
        assert_eq!(line.level, LogLevel::Unknown);
        assert_eq!(line.message, "listening on 0.0.0.0:8080");
    }
}
