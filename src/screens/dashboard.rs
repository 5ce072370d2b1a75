/// Main dashboard screen

use std::sync::Arc;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Sparkline, Table},
    Frame,
};

use crate::app::{LogsView, SystemResources};
use crate::core::history::{parse_cpu, parse_memory_used, History};
use crate::core::poller::Snapshot;
use crate::utils::format_bytes;
use crate::utils::ContainerState;

/// Everything the render pass needs from the app beyond the cached data.
pub struct ViewState<'a> {
    pub selected: Option<&'a str>,
    pub status_message: Option<&'a str>,
    pub chart_enabled: bool,
    pub history: &'a History,
    pub logs_view: Option<&'a LogsView>,
    pub show_help: bool,
}

pub struct Dashboard {
    snapshot: Arc<Snapshot>,
    system: SystemResources,
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            snapshot: Arc::new(Snapshot::empty()),
            system: SystemResources::default(),
        }
    }

    pub fn update_snapshot(&mut self, snapshot: Arc<Snapshot>) {
        self.snapshot = snapshot;
    }

    pub fn update_system(&mut self, system: SystemResources) {
        self.system = system;
    }

    pub fn render(&self, frame: &mut Frame, view: &ViewState) {
        let mut constraints = vec![Constraint::Length(3), Constraint::Min(5)];
        if view.chart_enabled {
            constraints.push(Constraint::Length(8));
        }
        constraints.push(Constraint::Length(3));

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(frame.size());

        self.render_header(frame, chunks[0]);
        self.render_table(frame, chunks[1], view.selected);
        if view.chart_enabled {
            self.render_charts(frame, chunks[2], view.history);
        }
        self.render_status_bar(frame, *chunks.last().expect("layout has chunks"), view);

        if let Some(logs) = view.logs_view {
            self.render_logs_overlay(frame, logs);
        }
        if view.show_help {
            self.render_help_overlay(frame);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let total = self.snapshot.rows.len();
        let running = self.snapshot.running_count();

        let containers_style = if running == total && total > 0 {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        };

        let header = Paragraph::new(Line::from(vec![
            Span::styled("Containers: ", Style::default().fg(Color::White)),
            Span::styled(format!("{}/{} running", running, total), containers_style),
            Span::raw("  |  "),
            Span::styled(
                format!("Host CPU {:.1}%", self.system.cpu_percent),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw("  |  "),
            Span::styled(
                format!(
                    "Mem {} / {}",
                    format_bytes(self.system.memory_used),
                    format_bytes(self.system.memory_total)
                ),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw("  |  "),
            Span::styled(
                format!("Sampled {}", self.snapshot.taken_at.format("%H:%M:%S")),
                Style::default().fg(Color::DarkGray),
            ),
        ]))
        .block(Block::default().borders(Borders::ALL).title("dockwatch"));

        frame.render_widget(header, area);
    }

    fn render_table(&self, frame: &mut Frame, area: Rect, selected: Option<&str>) {
        let header = Row::new(vec![
            "Name", "State", "Status", "CPU %", "Mem Usage", "Net I/O", "Uptime",
        ])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .bottom_margin(1);

        let rows: Vec<Row> = self
            .snapshot
            .rows
            .iter()
            .map(|container| {
                let is_selected = selected == Some(container.name.as_str());

                let state_color = match container.state {
                    ContainerState::Running => Color::Green,
                    ContainerState::Paused | ContainerState::Restarting => Color::Yellow,
                    ContainerState::Exited | ContainerState::Dead => Color::Red,
                    _ => Color::Gray,
                };

                // CPU with color coding
                let cpu_color = match parse_cpu(&container.cpu) {
                    Some(p) if p > 80.0 => Color::Red,
                    Some(p) if p > 60.0 => Color::Yellow,
                    Some(_) => Color::White,
                    None => Color::Gray,
                };

                // Memory colored by used/limit ratio when both sides parse
                let mem_percent = parse_memory_used(&container.memory).and_then(|used| {
                    let limit: f64 = container
                        .memory
                        .split('/')
                        .nth(1)?
                        .trim()
                        .strip_suffix("MB")?
                        .parse()
                        .ok()?;
                    (limit > 0.0).then(|| used / limit * 100.0)
                });
                let mem_color = match mem_percent {
                    Some(p) if p > 80.0 => Color::Red,
                    Some(p) if p > 60.0 => Color::Yellow,
                    Some(_) => Color::White,
                    None => Color::Gray,
                };

                let row = Row::new(vec![
                    Cell::from(container.name.clone()),
                    Cell::from(Span::styled(
                        container.state.as_str(),
                        Style::default().fg(state_color),
                    )),
                    Cell::from(container.status.clone()),
                    Cell::from(Span::styled(
                        container.cpu.clone(),
                        Style::default().fg(cpu_color),
                    )),
                    Cell::from(Span::styled(
                        container.memory.clone(),
                        Style::default().fg(mem_color),
                    )),
                    Cell::from(container.network.clone()),
                    Cell::from(container.uptime.clone()),
                ]);

                if is_selected {
                    row.style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
                } else {
                    row
                }
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(24), // Name
                Constraint::Length(11), // State
                Constraint::Length(22), // Status
                Constraint::Length(8),  // CPU %
                Constraint::Length(17), // Mem Usage
                Constraint::Length(16), // Net I/O
                Constraint::Min(10),    // Uptime
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Containers"));

        frame.render_widget(table, area);
    }

    fn render_charts(&self, frame: &mut Frame, area: Rect, history: &History) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(34),
                Constraint::Percentage(33),
                Constraint::Percentage(33),
            ])
            .split(area);

        let latest = history.latest();

        let cpu_data = history.cpu_series();
        let cpu_sparkline = Sparkline::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" CPU total: {:.1}% ", latest.cpu)),
            )
            .data(&cpu_data)
            .style(Style::default().fg(Color::Red));
        frame.render_widget(cpu_sparkline, chunks[0]);

        let mem_data = history.memory_series();
        let mem_sparkline = Sparkline::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" Mem total: {:.0} MB ", latest.memory_mb)),
            )
            .data(&mem_data)
            .style(Style::default().fg(Color::Green));
        frame.render_widget(mem_sparkline, chunks[1]);

        let net_data = history.network_series();
        let net_sparkline = Sparkline::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" Net total: {:.0} kB ", latest.network_kb)),
            )
            .data(&net_data)
            .style(Style::default().fg(Color::Blue));
        frame.render_widget(net_sparkline, chunks[2]);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect, view: &ViewState) {
        let line = if let Some(message) = view.status_message {
            Line::from(Span::styled(
                message.to_string(),
                Style::default().fg(Color::Yellow),
            ))
        } else if let Some(error) = &self.snapshot.error {
            Line::from(Span::styled(
                format!("Engine error: {}", error),
                Style::default().fg(Color::Red),
            ))
        } else {
            Line::from(Span::styled(
                "q quit | ? help | ↑↓ select | s start | x stop | R restart | b rebuild | l logs | d remove | c charts | r refresh",
                Style::default().fg(Color::DarkGray),
            ))
        };

        let status = Paragraph::new(line)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Left);

        frame.render_widget(status, area);
    }

    fn render_logs_overlay(&self, frame: &mut Frame, logs: &LogsView) {
        let area = centered_rect(84, 80, frame.size());
        frame.render_widget(Clear, area);

        let lines: Vec<Line> = logs
            .lines
            .iter()
            .map(|line| {
                let mut spans = Vec::new();
                if !line.timestamp.is_empty() {
                    spans.push(Span::styled(
                        format!("{} ", line.timestamp),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                spans.push(Span::styled(
                    line.level.label(),
                    Style::default().fg(line.level.color()),
                ));
                spans.push(Span::raw(" "));
                spans.push(Span::raw(line.message.clone()));
                Line::from(spans)
            })
            .collect();

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" Logs: {} (Esc closes) ", logs.name)),
            )
            .scroll((logs.scroll as u16, 0));

        frame.render_widget(paragraph, area);
    }

    fn render_help_overlay(&self, frame: &mut Frame) {
        let area = centered_rect(50, 60, frame.size());
        frame.render_widget(Clear, area);

        let lines = vec![
            Line::from(""),
            Line::from("  [↑/k] [↓/j]    Move selection"),
            Line::from("  [s]            Start selected container"),
            Line::from("  [x]            Stop selected container"),
            Line::from("  [R]            Restart selected container"),
            Line::from("  [b]            Rebuild via compose (build + up)"),
            Line::from("  [l]            Show recent logs"),
            Line::from("  [d]            Remove (press twice to confirm)"),
            Line::from("  [c]            Toggle resource charts"),
            Line::from("  [r]            Refresh now"),
            Line::from("  [Esc]          Clear message / cancel"),
            Line::from("  [q]            Quit"),
            Line::from(""),
            Line::from(Span::styled(
                "  Selection follows the container by name across refreshes.",
                Style::default().fg(Color::DarkGray),
            )),
        ];

        let help = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(" Help (any key closes) "));

        frame.render_widget(help, area);
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

/// Centered sub-rectangle sized as a percentage of the parent area.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
