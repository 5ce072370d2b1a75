/// Main TUI application
///
/// The UI task owns the render loop and never talks to the engine
/// directly: snapshots arrive through the poller's watch channel, and
/// lifecycle commands run in spawned tasks that report back over an
/// event channel and kick the poller when they finish.

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::System;
use tokio::sync::mpsc;

use crate::core::docker::DockerManager;
use crate::core::history::{aggregate_totals, History};
use crate::core::log_parser::{parse_log_line, LogLine};
use crate::core::poller::{PollerHandle, Snapshot, SnapshotReceiver};
use crate::screens::{Dashboard, ViewState};
use crate::utils::constants::EVENT_POLL_MS;
use crate::utils::AppConfig;

/// Host-level resources shown in the dashboard header.
#[derive(Debug, Clone, Default)]
pub struct SystemResources {
    pub cpu_percent: f32,
    pub memory_used: u64,
    pub memory_total: u64,
}

/// State of the logs overlay.
pub struct LogsView {
    pub name: String,
    pub lines: Vec<LogLine>,
    pub scroll: usize,
}

/// Results flowing back from spawned command tasks.
enum UiEvent {
    Status(String),
    Error(String),
    Logs { name: String, lines: Vec<LogLine> },
}

#[derive(Clone, Copy)]
enum ContainerCommand {
    Start,
    Stop,
    Restart,
    Remove,
    Rebuild,
    Logs,
}

pub struct App {
    dashboard: Dashboard,
    docker: DockerManager,
    config: AppConfig,
    snapshot_rx: SnapshotReceiver,
    poller: PollerHandle,
    events_tx: mpsc::UnboundedSender<UiEvent>,
    events_rx: mpsc::UnboundedReceiver<UiEvent>,
    snapshot: Arc<Snapshot>,
    history: History,
    chart_enabled: bool,
    selected: Option<String>,
    pending_remove: Option<String>,
    status_message: Option<String>,
    logs_view: Option<LogsView>,
    show_help: bool,
    should_quit: bool,
    last_tick: Instant,
    tick_interval: Duration,
    sys: System,
}

impl App {
    pub fn new(
        docker: DockerManager,
        config: AppConfig,
        snapshot_rx: SnapshotReceiver,
        poller: PollerHandle,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let tick_interval = config.render_tick();

        Self {
            dashboard: Dashboard::new(),
            docker,
            config,
            snapshot_rx,
            poller,
            events_tx,
            events_rx,
            snapshot: Arc::new(Snapshot::empty()),
            history: History::new(),
            chart_enabled: false,
            selected: None,
            pending_remove: None,
            status_message: None,
            logs_view: None,
            show_help: false,
            should_quit: false,
            last_tick: Instant::now(),
            tick_interval,
            sys: System::new(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.on_tick();

        let result = self.run_loop(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn run_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> Result<()> {
        loop {
            // Drain results from spawned command tasks (non-blocking)
            while let Ok(event) = self.events_rx.try_recv() {
                self.apply_event(event);
            }

            if self.last_tick.elapsed() >= self.tick_interval {
                self.on_tick();
            }

            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(EVENT_POLL_MS))? {
                if let Event::Key(key_event) = event::read()? {
                    if key_event.kind == KeyEventKind::Press {
                        self.handle_key(key_event);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// One render tick: read the latest published snapshot, reconcile the
    /// selection, feed the chart history, refresh host metrics.
    fn on_tick(&mut self) {
        self.last_tick = Instant::now();

        let snapshot = self.snapshot_rx.borrow().clone();
        self.apply_snapshot(snapshot);
        self.refresh_system();
    }

    fn apply_snapshot(&mut self, snapshot: Arc<Snapshot>) {
        self.selected = reconcile_selection(self.selected.take(), &snapshot);
        if let Some(pending) = &self.pending_remove {
            if Some(pending.as_str()) != self.selected.as_deref() {
                self.pending_remove = None;
            }
        }

        if self.chart_enabled {
            self.history.record(aggregate_totals(&snapshot));
        }

        self.dashboard.update_snapshot(snapshot.clone());
        self.snapshot = snapshot;
    }

    fn refresh_system(&mut self) {
        self.sys.refresh_cpu();
        self.sys.refresh_memory();

        self.dashboard.update_system(SystemResources {
            cpu_percent: self.sys.global_cpu_info().cpu_usage(),
            memory_used: self.sys.used_memory(),
            memory_total: self.sys.total_memory(),
        });
    }

    fn render(&self, frame: &mut ratatui::Frame) {
        let view = ViewState {
            selected: self.selected.as_deref(),
            status_message: self.status_message.as_deref(),
            chart_enabled: self.chart_enabled,
            history: &self.history,
            logs_view: self.logs_view.as_ref(),
            show_help: self.show_help,
        };
        self.dashboard.render(frame, &view);
    }

    fn apply_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Status(message) => self.set_status(message),
            UiEvent::Error(message) => self.set_status(format!("✗ {}", message)),
            UiEvent::Logs { name, lines } => {
                self.logs_view = Some(LogsView {
                    name,
                    lines,
                    scroll: 0,
                });
                self.clear_status();
            }
        }
    }

    fn handle_key(&mut self, key_event: KeyEvent) {
        let key = key_event.code;

        if key == KeyCode::Char('c') && key_event.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        if self.show_help {
            self.show_help = false;
            return;
        }

        if self.logs_view.is_some() {
            self.handle_logs_key(key);
            return;
        }

        match key {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Up | KeyCode::Char('k') => self.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Char('r') => {
                self.poller.kick();
                self.set_status("Refreshing...".to_string());
            }
            KeyCode::Char('c') => {
                self.chart_enabled = !self.chart_enabled;
            }
            KeyCode::Char('s') => self.dispatch_command(ContainerCommand::Start),
            KeyCode::Char('x') => self.dispatch_command(ContainerCommand::Stop),
            KeyCode::Char('R') => self.dispatch_command(ContainerCommand::Restart),
            KeyCode::Char('b') => self.dispatch_command(ContainerCommand::Rebuild),
            KeyCode::Char('l') => self.dispatch_command(ContainerCommand::Logs),
            KeyCode::Char('d') | KeyCode::Delete => self.handle_remove_key(),
            KeyCode::Esc => {
                self.pending_remove = None;
                self.clear_status();
            }
            _ => {}
        }
    }

    fn handle_logs_key(&mut self, key: KeyCode) {
        if matches!(key, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('l')) {
            self.logs_view = None;
            return;
        }

        let Some(view) = self.logs_view.as_mut() else {
            return;
        };
        let max_scroll = view.lines.len().saturating_sub(1);

        match key {
            KeyCode::Up | KeyCode::Char('k') => view.scroll = view.scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => view.scroll = (view.scroll + 1).min(max_scroll),
            KeyCode::PageUp => view.scroll = view.scroll.saturating_sub(10),
            KeyCode::PageDown => view.scroll = (view.scroll + 10).min(max_scroll),
            KeyCode::Home => view.scroll = 0,
            KeyCode::End => view.scroll = max_scroll,
            _ => {}
        }
    }

    /// Removal wants deliberate input: the first press arms it, a second
    /// press on the same container executes.
    fn handle_remove_key(&mut self) {
        let Some(name) = self.selected.clone() else {
            self.set_status("Select a container first".to_string());
            return;
        };

        if self.pending_remove.as_deref() == Some(name.as_str()) {
            self.pending_remove = None;
            self.dispatch_command(ContainerCommand::Remove);
        } else {
            self.pending_remove = Some(name.clone());
            self.set_status(format!(
                "Press d again to remove {} — this cannot be undone (Esc cancels)",
                name
            ));
        }
    }

    fn select_next(&mut self) {
        let rows = &self.snapshot.rows;
        if rows.is_empty() {
            self.selected = None;
            return;
        }

        let next = match self.selected_index() {
            Some(i) if i + 1 < rows.len() => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.selected = Some(rows[next].name.clone());
    }

    fn select_previous(&mut self) {
        let rows = &self.snapshot.rows;
        if rows.is_empty() {
            self.selected = None;
            return;
        }

        let previous = match self.selected_index() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.selected = Some(rows[previous].name.clone());
    }

    fn selected_index(&self) -> Option<usize> {
        let name = self.selected.as_deref()?;
        self.snapshot.rows.iter().position(|r| r.name == name)
    }

    /// Run a lifecycle command off the UI task. Completion lands as a
    /// UiEvent and (on success) kicks the poller so the table catches up
    /// without waiting for the next scheduled cycle.
    fn dispatch_command(&mut self, command: ContainerCommand) {
        let Some(name) = self.selected.clone() else {
            self.set_status("Select a container first".to_string());
            return;
        };

        let verb = match command {
            ContainerCommand::Start => "Starting",
            ContainerCommand::Stop => "Stopping",
            ContainerCommand::Restart => "Restarting",
            ContainerCommand::Remove => "Removing",
            ContainerCommand::Rebuild => "Rebuilding",
            ContainerCommand::Logs => "Loading logs for",
        };
        self.set_status(format!("{} {}...", verb, name));

        let docker = self.docker.clone();
        let events = self.events_tx.clone();
        let poller = self.poller.clone();
        let log_tail = self.config.log_tail;

        tokio::spawn(async move {
            let outcome = match command {
                ContainerCommand::Start => docker
                    .start_container(&name)
                    .await
                    .map(|_| format!("✓ Started {}", name)),
                ContainerCommand::Stop => docker
                    .stop_container(&name)
                    .await
                    .map(|_| format!("✓ Stopped {}", name)),
                ContainerCommand::Restart => docker
                    .restart_container(&name)
                    .await
                    .map(|_| format!("✓ Restarted {}", name)),
                ContainerCommand::Remove => docker
                    .remove_container(&name)
                    .await
                    .map(|_| format!("✓ Removed {}", name)),
                ContainerCommand::Rebuild => {
                    let service = docker.resolve_compose_service(&name).await;
                    docker
                        .rebuild_service(&service)
                        .await
                        .map(|_| format!("✓ Rebuilt {}", service))
                }
                ContainerCommand::Logs => match docker.tail_logs(&name, log_tail).await {
                    Ok(raw) => {
                        let lines = raw.iter().map(|l| parse_log_line(l)).collect();
                        let _ = events.send(UiEvent::Logs { name, lines });
                        return;
                    }
                    Err(e) => Err(e),
                },
            };

            match outcome {
                Ok(message) => {
                    let _ = events.send(UiEvent::Status(message));
                    poller.kick();
                }
                Err(e) => {
                    let _ = events.send(UiEvent::Error(e.to_string()));
                }
            }
        });
    }

    fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }

    fn clear_status(&mut self) {
        self.status_message = None;
    }
}

/// Selection is keyed by container identity, never by row position: keep
/// it when the name is still present (wherever it moved to), clear it when
/// the container disappeared.
fn reconcile_selection(selected: Option<String>, snapshot: &Snapshot) -> Option<String> {
    selected.filter(|name| snapshot.rows.iter().any(|r| &r.name == name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::poller::ContainerRow;
    use crate::utils::constants::SENTINEL;
    use crate::utils::ContainerState;
    use chrono::Local;

    fn row(name: &str) -> ContainerRow {
        ContainerRow {
            name: name.to_string(),
            image: "img".to_string(),
            status: "Up".to_string(),
            state: ContainerState::Running,
            cpu: SENTINEL.to_string(),
            memory: SENTINEL.to_string(),
            network: SENTINEL.to_string(),
            uptime: SENTINEL.to_string(),
        }
    }

    fn snapshot(names: &[&str]) -> Snapshot {
        Snapshot {
            rows: names.iter().map(|n| row(n)).collect(),
            taken_at: Local::now(),
            error: None,
        }
    }

    #[test]
    fn selection_survives_reordering() {
        let selected = Some("web".to_string());
        let snap = snapshot(&["db", "cache", "web"]);
        assert_eq!(reconcile_selection(selected, &snap), Some("web".to_string()));
    }

    #[test]
    fn selection_cleared_when_container_disappears() {
        let selected = Some("web".to_string());
        let snap = snapshot(&["db", "cache"]);
        assert_eq!(reconcile_selection(selected, &snap), None);
    }

    #[test]
    fn no_selection_stays_none() {
        let snap = snapshot(&["db"]);
        assert_eq!(reconcile_selection(None, &snap), None);
    }
}
