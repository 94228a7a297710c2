//! Terminal shell using ratatui
//!
//! Two toggles and the event log. Key presses queue controller commands to a
//! background worker, so drawing never waits for the radio.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tracing::{debug, info};

use bleloop_core::{BleAdapter, BleEvent, BleSessionController, Shell};

use crate::config::UiConfig;
use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Shell State
// ----------------------------------------------------------------------------

/// Everything the shell draws, independent of the terminal
pub struct TuiApp<A: BleAdapter> {
    shell: Shell<A>,
    platform: String,
    list_state: ListState,
    max_log_lines: usize,
    show_help: bool,
    should_quit: bool,
}

impl<A: BleAdapter> TuiApp<A> {
    pub fn new(controller: Arc<BleSessionController<A>>, config: &UiConfig) -> Self {
        let platform = controller.platform().to_string();
        Self {
            shell: Shell::new(controller),
            platform,
            list_state: ListState::default(),
            max_log_lines: config.max_log_lines,
            show_help: false,
            should_quit: false,
        }
    }

    pub fn shell(&self) -> &Shell<A> {
        &self.shell
    }

    /// Pull new events and keep the newest one selected
    pub fn refresh(&mut self) -> usize {
        let received = self.shell.refresh();
        if received > 0 {
            let shown = self.shell.log().len().min(self.max_log_lines);
            self.list_state.select(Some(shown.saturating_sub(1)));
        }
        received
    }

    /// Handle keyboard input
    pub fn handle_key(&mut self, key: KeyEvent) {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => self.should_quit = true,
            (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => {
                if self.show_help {
                    self.show_help = false;
                } else {
                    self.should_quit = true;
                }
            }
            (KeyCode::Char('h'), _) | (KeyCode::F(1), _) | (KeyCode::Char('?'), _) => {
                self.show_help = !self.show_help;
            }
            (KeyCode::Char('s'), _) => {
                debug!("Scan toggle pressed");
                self.shell.toggle_scan();
            }
            (KeyCode::Char('a'), _) => {
                debug!("Advertise toggle pressed");
                self.shell.toggle_advertising();
            }
            _ => {}
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    /// Stop the session and detach from the event channel
    pub async fn close(&mut self) {
        self.shell.close().await;
    }

    // ---- Rendering ----

    pub fn render(&mut self, frame: &mut Frame) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Title
                Constraint::Length(3), // Toggles
                Constraint::Min(0),    // Log
                Constraint::Length(1), // Key hints
            ])
            .split(frame.area());

        self.render_title(frame, layout[0]);
        self.render_toggles(frame, layout[1]);
        self.render_log(frame, layout[2]);
        self.render_hints(frame, layout[3]);

        if self.show_help {
            self.render_help_overlay(frame);
        }
    }

    fn render_title(&self, frame: &mut Frame, area: Rect) {
        let title = Line::from(vec![
            Span::styled("bleloop", Style::default().fg(Color::Cyan).bold()),
            Span::raw(format!(" - running on {}", self.platform)),
        ]);
        frame.render_widget(Paragraph::new(title), area);
    }

    fn render_toggles(&self, frame: &mut Frame, area: Rect) {
        let halves = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let toggles = self.shell.toggles();
        frame.render_widget(
            toggle_button("Scan", 's', toggles.scanning, "Stop Scan", "Start Scan"),
            halves[0],
        );
        frame.render_widget(
            toggle_button(
                "Advertise",
                'a',
                toggles.advertising,
                "Stop Advertising",
                "Start Advertising",
            ),
            halves[1],
        );
    }

    fn render_log(&mut self, frame: &mut Frame, area: Rect) {
        let entries = self.shell.log().entries();
        let skip = entries.len().saturating_sub(self.max_log_lines);
        let items: Vec<ListItem> = entries[skip..]
            .iter()
            .map(|entry| ListItem::new(Line::from(Span::styled(
                entry.event.to_string(),
                event_style(&entry.event),
            ))))
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Log ({})", entries.len()))
                    .title_style(Style::default().fg(Color::Magenta)),
            )
            .highlight_style(Style::default().add_modifier(Modifier::BOLD));

        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn render_hints(&self, frame: &mut Frame, area: Rect) {
        let hints = Paragraph::new("s: scan  a: advertise  h: help  q: quit")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(hints, area);
    }

    fn render_help_overlay(&self, frame: &mut Frame) {
        let area = centered_rect(60, 50, frame.area());

        let help_text = "bleloop Help\n\n\
            s: Start or stop scanning for the demo service\n\
            a: Start or stop advertising the demo service\n\
            h / F1: Toggle this help\n\
            q / Esc / Ctrl+C: Quit (stops scanning and advertising)\n\n\
            Buttons show the last requested state; the log shows what the radio reported.";

        let help = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Help")
                    .title_style(Style::default().fg(Color::Cyan).bold()),
            )
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));

        frame.render_widget(Clear, area);
        frame.render_widget(help, area);
    }
}

fn toggle_button<'a>(
    title: &'a str,
    key: char,
    on: bool,
    on_label: &'a str,
    off_label: &'a str,
) -> Paragraph<'a> {
    let (label, color) = if on {
        (on_label, Color::Green)
    } else {
        (off_label, Color::Gray)
    };
    Paragraph::new(format!("[{}] {}", key, label))
        .alignment(Alignment::Center)
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL).title(title))
}

fn event_style(event: &BleEvent) -> Style {
    match event {
        BleEvent::Failed { .. } => Style::default().fg(Color::Red),
        BleEvent::DeviceDiscovered(_) => Style::default().fg(Color::White),
        _ => Style::default().fg(Color::Cyan),
    }
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

// ----------------------------------------------------------------------------
// Terminal Manager
// ----------------------------------------------------------------------------

/// Owns the terminal while the shell runs
pub struct TuiManager<A: BleAdapter> {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    app: TuiApp<A>,
    tick_rate: Duration,
}

impl<A: BleAdapter> TuiManager<A> {
    pub fn new(controller: Arc<BleSessionController<A>>, config: &UiConfig) -> Result<Self> {
        enable_raw_mode().map_err(|e| CliError::UI(format!("Failed to enable raw mode: {}", e)))?;
        let mut stdout = std::io::stdout();
        stdout
            .execute(EnterAlternateScreen)
            .map_err(|e| CliError::UI(format!("Failed to enter alternate screen: {}", e)))?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)
            .map_err(|e| CliError::UI(format!("Failed to create terminal: {}", e)))?;

        Ok(Self {
            terminal,
            app: TuiApp::new(controller, config),
            tick_rate: config.tick_rate(),
        })
    }

    /// Run until the user quits, then shut the session down
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting TUI main loop");
        let mut last_tick = Instant::now();

        while !self.app.should_quit() {
            let timeout = self.tick_rate.saturating_sub(last_tick.elapsed());
            // Polling blocks, so give queued commands a chance to run first
            tokio::task::yield_now().await;
            if event::poll(timeout).map_err(|e| CliError::UI(format!("Event poll failed: {}", e)))? {
                if let Event::Key(key) = event::read()
                    .map_err(|e| CliError::UI(format!("Failed to read event: {}", e)))?
                {
                    if key.kind == KeyEventKind::Press {
                        self.app.handle_key(key);
                    }
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.app.refresh();
                draw(&mut self.terminal, &mut self.app)?;
                last_tick = Instant::now();
            }
        }

        info!("Leaving TUI, shutting down session");
        self.app.close().await;
        Ok(())
    }
}

fn draw<B: Backend, A: BleAdapter>(terminal: &mut Terminal<B>, app: &mut TuiApp<A>) -> Result<()> {
    terminal
        .draw(|f| app.render(f))
        .map_err(|e| CliError::UI(format!("Failed to draw terminal: {}", e)))?;
    Ok(())
}

impl<A: BleAdapter> Drop for TuiManager<A> {
    fn drop(&mut self) {
        // Restore terminal
        let _ = disable_raw_mode();
        let _ = self.terminal.backend_mut().execute(LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bleloop_core::mock::{MockAdapter, MockRadio};
    use bleloop_core::{ControllerConfig, EventKind};
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app(radio: &MockRadio) -> TuiApp<MockAdapter> {
        let controller = Arc::new(BleSessionController::new(
            Some(MockAdapter::new(radio, "shell")),
            ControllerConfig::default(),
        ));
        TuiApp::new(controller, &UiConfig::default())
    }

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[tokio::test]
    async fn test_toggle_keys_drive_controller() {
        let radio = MockRadio::new();
        let mut app = app(&radio);

        app.handle_key(key(KeyCode::Char('a')));
        assert!(app.shell().toggles().advertising);
        app.handle_key(key(KeyCode::Char('s')));
        assert!(app.shell().toggles().scanning);

        while !app.shell().controller().state().scanning
            || radio.active_advertisement_count() == 0
        {
            tokio::task::yield_now().await;
        }

        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit());
        app.close().await;

        assert_eq!(radio.active_scan_count(), 0);
        assert_eq!(radio.active_advertisement_count(), 0);
        assert_eq!(app.shell().log().count(EventKind::AdvertisingStarted), 1);
        assert_eq!(app.shell().log().count(EventKind::ScanStopped), 1);
    }

    #[test]
    fn test_help_and_quit_keys() {
        let radio = MockRadio::new();
        let mut app = app(&radio);

        app.handle_key(key(KeyCode::Char('h')));
        assert!(app.show_help());
        app.handle_key(key(KeyCode::Esc));
        assert!(!app.show_help());
        assert!(!app.should_quit());

        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit());
    }

    #[tokio::test]
    async fn test_render_shows_platform_toggles_and_log() {
        let radio = MockRadio::new();
        let mut app = app(&radio);
        app.handle_key(key(KeyCode::Char('a')));
        let mut received = 0;
        while received < 2 {
            tokio::task::yield_now().await;
            received += app.refresh();
        }
        assert_eq!(radio.active_advertisement_count(), 1);

        let mut terminal = Terminal::new(TestBackend::new(90, 16)).unwrap();
        draw(&mut terminal, &mut app).unwrap();
        let text = screen(&terminal);

        assert!(text.contains("running on simulated"));
        assert!(text.contains("[a] Stop Advertising"));
        assert!(text.contains("[s] Start Scan"));
        assert!(text.contains("BLE: Advertising started successfully."));
        assert!(text.contains("Log (2)"));

        app.handle_key(key(KeyCode::F(1)));
        draw(&mut terminal, &mut app).unwrap();
        assert!(screen(&terminal).contains("bleloop Help"));
    }
}
