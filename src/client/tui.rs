use anyhow::Result;
use crossterm::{
    event::{self, Event, EventStream, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame, Terminal,
};
use std::io;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

use crate::client::http::{ApiError, StudySyncClient};
use crate::core::{AuthUser, IdentityClient, SessionController, StartForm, StudySession};
use crate::utils::format::{format_elapsed, format_timestamp, short_id};
use crate::utils::tui_writer::{LogEntry, LogLevel};

const MAX_LOG_ENTRIES: usize = 50;

/// Completion of a remote call performed by a spawned task. The event loop
/// applies these to the controller; nothing else mutates lifecycle state.
enum ActionOutcome {
    SessionsLoaded(Result<Vec<StudySession>, ApiError>),
    StartFinished(Result<String, ApiError>),
    EndFinished(Result<(), ApiError>),
    SummaryFinished(Result<Option<String>, ApiError>),
    SignInFinished(Result<AuthUser, anyhow::Error>),
    SignOutFinished(Result<(), anyhow::Error>),
}

/// Which text field keystrokes land in. Cycled with Tab / Shift+Tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputField {
    Name,
    Subject,
    Focus,
    SessionId,
}

impl InputField {
    fn next(self) -> Self {
        match self {
            InputField::Name => InputField::Subject,
            InputField::Subject => InputField::Focus,
            InputField::Focus => InputField::SessionId,
            InputField::SessionId => InputField::Name,
        }
    }

    fn prev(self) -> Self {
        match self {
            InputField::Name => InputField::SessionId,
            InputField::Subject => InputField::Name,
            InputField::Focus => InputField::Subject,
            InputField::SessionId => InputField::Focus,
        }
    }
}

/// Single-screen study dashboard: stat tiles, start/end forms, running
/// timer, AI insight panel, sessions table, captured-log strip.
///
/// Remote calls run in spawned tasks and report back over a channel, so the
/// UI stays responsive while a request is outstanding; the controller's
/// pending marker is what debounces repeated triggers. In-flight requests
/// are never cancelled: a slow start or end still applies its result when it
/// resolves, even if the user cancelled locally in the meantime.
pub struct DashboardTui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    controller: SessionController,
    client: StudySyncClient,
    identity: IdentityClient,
    focus: InputField,
    name_input: String,
    subject_input: String,
    focus_input: String,
    session_id_input: String,
    hint: Option<String>,
    system_logs: Vec<LogEntry>,
}

impl DashboardTui {
    pub fn new(client: StudySyncClient, identity: IdentityClient) -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(DashboardTui {
            terminal,
            controller: SessionController::new(),
            client,
            identity,
            focus: InputField::Name,
            name_input: String::new(),
            subject_input: String::new(),
            focus_input: "3".to_string(),
            session_id_input: String::new(),
            hint: None,
            system_logs: Vec::new(),
        })
    }

    pub async fn run(
        &mut self,
        mut log_rx: mpsc::UnboundedReceiver<LogEntry>,
    ) -> Result<()> {
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let mut event_stream = EventStream::new();
        // Drives the elapsed counter; the controller ignores ticks unless a
        // session is running, so a tick already scheduled when the session
        // stops contributes nothing.
        let mut second = interval(Duration::from_secs(1));

        self.spawn_load(&outcome_tx);

        loop {
            self.draw()?;

            tokio::select! {
                maybe_event = event_stream.next() => {
                    match maybe_event {
                        Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                            if self.handle_key(key, &outcome_tx) {
                                break;
                            }
                        }
                        Some(Ok(_)) => {
                            // Resize and the rest just trigger the redraw at
                            // the top of the loop.
                        }
                        Some(Err(e)) => {
                            tracing::warn!("Event stream error: {:?}", e);
                        }
                        None => {
                            tracing::info!("Event stream terminated");
                            break;
                        }
                    }
                }

                Some(outcome) = outcome_rx.recv() => {
                    self.apply_outcome(outcome, &outcome_tx);
                }

                Some(entry) = log_rx.recv() => {
                    self.system_logs.push(entry);
                    if self.system_logs.len() > MAX_LOG_ENTRIES {
                        let excess = self.system_logs.len() - MAX_LOG_ENTRIES;
                        self.system_logs.drain(0..excess);
                    }
                }

                _ = second.tick() => {
                    self.controller.tick();
                }
            }
        }

        self.cleanup();
        Ok(())
    }

    /// Returns true when the user asked to quit.
    fn handle_key(&mut self, key: KeyEvent, tx: &mpsc::UnboundedSender<ActionOutcome>) -> bool {
        let ctrl = key.modifiers.contains(event::KeyModifiers::CONTROL);

        if ctrl {
            match key.code {
                KeyCode::Char('c') => return true,
                KeyCode::Char('s') => self.trigger_start(tx),
                KeyCode::Char('e') => self.trigger_end(tx),
                KeyCode::Char('x') => self.trigger_cancel(),
                KeyCode::Char('r') => {
                    self.hint = None;
                    self.spawn_load(tx);
                }
                KeyCode::Char('a') => self.trigger_summary(tx),
                KeyCode::Char('g') => self.trigger_auth(tx),
                _ => {}
            }
            return false;
        }

        match key.code {
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::BackTab => self.focus = self.focus.prev(),
            KeyCode::Enter => match self.focus {
                InputField::SessionId => self.trigger_end(tx),
                _ => self.trigger_start(tx),
            },
            KeyCode::Backspace => {
                self.focused_input_mut().pop();
            }
            KeyCode::Char(c) => match self.focus {
                InputField::Focus => {
                    // Single-digit rating, 1-5.
                    if c.is_ascii_digit() {
                        self.focus_input = c.to_string();
                    }
                }
                _ => self.focused_input_mut().push(c),
            },
            _ => {}
        }
        false
    }

    fn focused_input_mut(&mut self) -> &mut String {
        match self.focus {
            InputField::Name => &mut self.name_input,
            InputField::Subject => &mut self.subject_input,
            InputField::Focus => &mut self.focus_input,
            InputField::SessionId => &mut self.session_id_input,
        }
    }

    fn trigger_start(&mut self, tx: &mpsc::UnboundedSender<ActionOutcome>) {
        let form = StartForm {
            name: self.name_input.clone(),
            subject: self.subject_input.clone(),
            focus_level: self.focus_input.trim().parse().ok(),
        };
        match self.controller.begin_start(&form) {
            Ok(payload) => {
                self.hint = None;
                let client = self.client.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(ActionOutcome::StartFinished(
                        client.start_session(&payload).await,
                    ));
                });
            }
            Err(e) => self.hint = Some(e.to_string()),
        }
    }

    fn trigger_end(&mut self, tx: &mpsc::UnboundedSender<ActionOutcome>) {
        let session_id = self.session_id_input.clone();
        match self.controller.begin_end(&session_id) {
            Ok(payload) => {
                self.hint = None;
                let client = self.client.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(ActionOutcome::EndFinished(
                        client.end_session(&payload).await,
                    ));
                });
            }
            Err(e) => self.hint = Some(e.to_string()),
        }
    }

    fn trigger_cancel(&mut self) {
        match self.controller.cancel() {
            Ok(()) => {
                self.hint = None;
                tracing::info!("Local tracking cancelled; any server-side record stays open");
            }
            Err(e) => self.hint = Some(e.to_string()),
        }
    }

    fn trigger_summary(&mut self, tx: &mpsc::UnboundedSender<ActionOutcome>) {
        match self.controller.begin_summary() {
            Ok(sessions) => {
                self.hint = None;
                let client = self.client.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(ActionOutcome::SummaryFinished(
                        client.ai_summary(&sessions).await,
                    ));
                });
            }
            Err(e) => self.hint = Some(e.to_string()),
        }
    }

    fn trigger_auth(&mut self, tx: &mpsc::UnboundedSender<ActionOutcome>) {
        let identity = self.identity.clone();
        let tx = tx.clone();
        if self.controller.user().is_some() {
            tokio::spawn(async move {
                let _ = tx.send(ActionOutcome::SignOutFinished(identity.sign_out().await));
            });
        } else {
            tokio::spawn(async move {
                let _ = tx.send(ActionOutcome::SignInFinished(identity.sign_in().await));
            });
        }
    }

    fn spawn_load(&self, tx: &mpsc::UnboundedSender<ActionOutcome>) {
        let client = self.client.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(ActionOutcome::SessionsLoaded(client.fetch_sessions().await));
        });
    }

    fn apply_outcome(
        &mut self,
        outcome: ActionOutcome,
        tx: &mpsc::UnboundedSender<ActionOutcome>,
    ) {
        match outcome {
            ActionOutcome::SessionsLoaded(Ok(sessions)) => {
                self.controller.sessions_loaded(sessions);
            }
            ActionOutcome::SessionsLoaded(Err(e)) => {
                tracing::error!("Fetch-all failed: {}", e);
                self.controller
                    .load_failed("Couldn't fetch sessions. Try again.");
            }
            ActionOutcome::StartFinished(Ok(id)) => {
                self.session_id_input = id.clone();
                self.controller.start_succeeded(id);
                self.spawn_load(tx);
            }
            ActionOutcome::StartFinished(Err(e)) => {
                tracing::error!("Start failed: {}", e);
                self.controller
                    .start_failed("Could not start session. Try again.");
            }
            ActionOutcome::EndFinished(Ok(())) => {
                self.controller.end_succeeded();
                self.spawn_load(tx);
            }
            ActionOutcome::EndFinished(Err(e)) => {
                tracing::error!("End failed: {}", e);
                self.controller
                    .end_failed("Could not end session. Try again.");
            }
            ActionOutcome::SummaryFinished(Ok(summary)) => {
                self.controller.summary_succeeded(summary);
            }
            ActionOutcome::SummaryFinished(Err(e)) => {
                tracing::error!("AI summary failed: {}", e);
                self.controller.summary_failed(e.into());
            }
            ActionOutcome::SignInFinished(Ok(user)) => {
                self.controller.signed_in(user);
            }
            ActionOutcome::SignInFinished(Err(e)) => {
                tracing::error!("Sign-in failed: {}", e);
                self.controller.auth_failed("Login failed");
            }
            ActionOutcome::SignOutFinished(Ok(())) => {
                self.controller.signed_out();
            }
            ActionOutcome::SignOutFinished(Err(e)) => {
                tracing::error!("Sign-out failed: {}", e);
                self.controller.auth_failed("Logout failed");
            }
        }
    }

    fn draw(&mut self) -> Result<()> {
        // Split borrows for the closure.
        let controller = &self.controller;
        let logs = &self.system_logs;
        let focus = self.focus;
        let inputs = FormInputs {
            name: &self.name_input,
            subject: &self.subject_input,
            focus: &self.focus_input,
            session_id: &self.session_id_input,
        };
        let hint = self.hint.as_deref();

        self.terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(1),  // header
                    Constraint::Length(3),  // stat tiles
                    Constraint::Length(7),  // forms + active session
                    Constraint::Length(4),  // AI insight
                    Constraint::Min(5),     // sessions table
                    Constraint::Length(4),  // logs
                    Constraint::Length(1),  // status
                    Constraint::Length(1),  // key hints
                ])
                .split(f.area());

            draw_header(f, chunks[0], controller);
            draw_stat_tiles(f, chunks[1], controller);
            draw_forms(f, chunks[2], controller, focus, &inputs);
            draw_ai_insight(f, chunks[3], controller);
            draw_sessions_table(f, chunks[4], controller.sessions());
            draw_logs(f, chunks[5], logs);
            draw_status(f, chunks[6], controller, hint);
            draw_key_hints(f, chunks[7]);
        })?;
        Ok(())
    }

    fn cleanup(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

impl Drop for DashboardTui {
    fn drop(&mut self) {
        self.cleanup();
    }
}

struct FormInputs<'a> {
    name: &'a str,
    subject: &'a str,
    focus: &'a str,
    session_id: &'a str,
}

fn draw_header(f: &mut Frame, area: Rect, controller: &SessionController) {
    let user_span = match controller.user() {
        Some(user) => Span::styled(
            format!("👤 {}", user.display_name),
            Style::default().fg(Color::Cyan),
        ),
        None => Span::styled("Ctrl+G to sign in", Style::default().fg(Color::DarkGray)),
    };

    let header = Line::from(vec![
        Span::styled(
            "📚 StudySync Dashboard",
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        user_span,
    ]);
    f.render_widget(Paragraph::new(header), area);
}

fn draw_stat_tiles(f: &mut Frame, area: Rect, controller: &SessionController) {
    let tiles = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    let stats = controller.stats();
    draw_tile(f, tiles[0], "🧾 Total sessions", stats.total_sessions.to_string());
    draw_tile(f, tiles[1], "⏳ Total minutes", stats.total_minutes.to_string());
    draw_tile(f, tiles[2], "🎯 Average focus", format!("{:.1}", stats.avg_focus));
}

fn draw_tile(f: &mut Frame, area: Rect, title: &str, value: String) {
    let tile = Paragraph::new(Line::from(Span::styled(
        value,
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(tile, area);
}

fn draw_forms(
    f: &mut Frame,
    area: Rect,
    controller: &SessionController,
    focus: InputField,
    inputs: &FormInputs,
) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let start_block = Block::default()
        .title("📝 Start session (Ctrl+S)")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));
    let start_lines = vec![
        field_line("Name    ", inputs.name, focus == InputField::Name),
        field_line("Subject ", inputs.subject, focus == InputField::Subject),
        field_line("Focus 1-5 ", inputs.focus, focus == InputField::Focus),
    ];
    f.render_widget(Paragraph::new(start_lines).block(start_block), columns[0]);

    let end_block = Block::default()
        .title("⏱ End session (Ctrl+E)")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let timer_line = if controller.is_running() {
        Line::from(vec![
            Span::styled(
                "● RUNNING ",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format_elapsed(controller.elapsed_seconds()),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("  Ctrl+X cancels", Style::default().fg(Color::DarkGray)),
        ])
    } else {
        Line::from(Span::styled(
            "no session running",
            Style::default().fg(Color::DarkGray),
        ))
    };
    let active_line = match controller.active_session() {
        Some(id) => Line::from(vec![
            Span::styled("Active  ", Style::default().fg(Color::Yellow)),
            Span::raw(id.to_string()),
        ]),
        None => Line::from(Span::raw("")),
    };
    let end_lines = vec![
        field_line("Session ", inputs.session_id, focus == InputField::SessionId),
        timer_line,
        active_line,
    ];
    f.render_widget(Paragraph::new(end_lines).block(end_block), columns[1]);
}

fn field_line<'a>(label: &'a str, value: &'a str, focused: bool) -> Line<'a> {
    let label_style = if focused {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Yellow)
    };
    let mut spans = vec![Span::styled(label, label_style), Span::raw(value)];
    if focused {
        spans.push(Span::styled("▏", Style::default().fg(Color::Cyan)));
    }
    Line::from(spans)
}

fn draw_ai_insight(f: &mut Frame, area: Rect, controller: &SessionController) {
    let block = Block::default()
        .title("🤖 AI Insight (Ctrl+A)")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));
    let text = match controller.ai_summary() {
        Some(summary) => Line::from(Span::raw(summary.to_string())),
        None => Line::from(Span::styled(
            "No insight yet - request one once sessions are loaded",
            Style::default().fg(Color::DarkGray),
        )),
    };
    f.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn draw_sessions_table(f: &mut Frame, area: Rect, sessions: &[StudySession]) {
    let block = Block::default()
        .title("📒 All sessions")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    if sessions.is_empty() {
        let empty = Paragraph::new("Start your first study session to see insights here.")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec![
        "ID", "Name", "Subject", "Focus", "Start", "End", "Min",
    ])
    .style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = sessions
        .iter()
        .map(|s| {
            Row::new(vec![
                Cell::from(short_id(&s.id, 12)),
                Cell::from(s.name.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(s.subject.clone()),
                Cell::from(
                    s.focus_level
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::from(format_timestamp(s.start_time.as_ref())),
                Cell::from(format_timestamp(s.end_time.as_ref())),
                Cell::from(
                    s.duration_minutes
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(13),
            Constraint::Length(12),
            Constraint::Min(10),
            Constraint::Length(5),
            Constraint::Length(13),
            Constraint::Length(13),
            Constraint::Length(5),
        ],
    )
    .header(header)
    .block(block);

    f.render_widget(table, area);
}

fn draw_logs(f: &mut Frame, area: Rect, logs: &[LogEntry]) {
    let block = Block::default()
        .title("📋 Logs")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = logs
        .iter()
        .rev()
        .take(visible.max(1))
        .rev()
        .map(|log| {
            let level_color = match log.level {
                LogLevel::Error => Color::Red,
                LogLevel::Warn => Color::Yellow,
                LogLevel::Info => Color::Cyan,
                LogLevel::Debug | LogLevel::Trace => Color::DarkGray,
            };
            Line::from(vec![
                Span::styled(
                    format!("[{}] ", log.timestamp.format("%H:%M:%S")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<5} ", log.level.as_str()),
                    Style::default().fg(level_color),
                ),
                Span::raw(log.message.clone()),
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status(f: &mut Frame, area: Rect, controller: &SessionController, hint: Option<&str>) {
    let line = if let Some(label) = controller.pending().label() {
        Line::from(Span::styled(
            format!("⏳ {}", label),
            Style::default().fg(Color::Yellow),
        ))
    } else if let Some(error) = controller.error() {
        Line::from(Span::styled(
            format!("❗ {}", error),
            Style::default().fg(Color::Red),
        ))
    } else if let Some(hint) = hint {
        Line::from(Span::styled(
            format!("• {}", hint),
            Style::default().fg(Color::DarkGray),
        ))
    } else if let Some(notice) = controller.notice() {
        Line::from(Span::styled(
            notice.to_string(),
            Style::default().fg(Color::Green),
        ))
    } else {
        Line::from(Span::raw(""))
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_key_hints(f: &mut Frame, area: Rect) {
    let hints = Line::from(Span::styled(
        "Tab fields · Ctrl+S start · Ctrl+E end · Ctrl+X cancel · Ctrl+R reload · Ctrl+A insight · Ctrl+G sign in/out · Ctrl+C quit",
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(Paragraph::new(hints), area);
}
