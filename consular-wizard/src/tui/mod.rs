//! Headless terminal (TUI) host for the citizen application wizards.
//!
//! Layout:
//! - Centered window titled with the application name
//! - Left panel: step list and progress gauge
//! - Main panel: the current step's fields
//! - Bottom button row: [ Back ] [ Next | Submit ] [ Cancel ]
//! - Modal confirmations (Cancel) and messages (validation / submission failures)
//!
//! Note: Logging is file-only in TUI mode (stdout logging is disabled) to avoid corrupting the terminal UI.

use crate::applications::{Application, FieldKind, FieldSpec};
use crate::wizard::{
    CitizenProfile, FieldValue, FileRef, SubmissionResult, SubmissionSink, WizardState,
};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use log::{info, warn};
use ratatui::backend::{CrosstermBackend, TestBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap};
use ratatui::Terminal;
use std::collections::HashMap;
use std::io::{self, Stdout};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonFocus {
    Back,
    Next,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Field(usize),
    Button(ButtonFocus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Modal {
    ConfirmCancel { yes_focused: bool },
    Message { title: String, body: String },
}

/// Single-line editable buffer. `cursor` counts chars, not bytes.
#[derive(Debug, Clone, Default)]
struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            cursor: value.chars().count(),
            value,
        }
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    fn len(&self) -> usize {
        self.value.chars().count()
    }

    /// Returns true when the value changed.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(c) => {
                let at = self.byte_index(self.cursor);
                self.value.insert(at, c);
                self.cursor += 1;
                true
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    let at = self.byte_index(self.cursor - 1);
                    self.value.remove(at);
                    self.cursor -= 1;
                    return true;
                }
                false
            }
            KeyCode::Delete => {
                if self.cursor < self.len() {
                    let at = self.byte_index(self.cursor);
                    self.value.remove(at);
                    return true;
                }
                false
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                false
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.len());
                false
            }
            KeyCode::Home => {
                self.cursor = 0;
                false
            }
            KeyCode::End => {
                self.cursor = self.len();
                false
            }
            _ => false,
        }
    }
}

struct TuiState<A: Application> {
    wizard: WizardState<A>,
    focus: Focus,
    inputs: HashMap<&'static str, TextInput>,
    modal: Option<Modal>,
    result: Option<SubmissionResult>,
    quit: bool,
}

impl<A: Application> TuiState<A> {
    fn new(wizard: WizardState<A>) -> Self {
        let mut state = Self {
            wizard,
            focus: Focus::Button(ButtonFocus::Next),
            inputs: HashMap::new(),
            modal: None,
            result: None,
            quit: false,
        };
        enter_step(&mut state);
        state
    }

    fn fields(&self) -> &'static [FieldSpec] {
        A::fields(self.wizard.current_step_id())
    }
}

/// Rebuild edit buffers for the current step and put focus on its first field.
fn enter_step<A: Application>(state: &mut TuiState<A>) {
    state.inputs.clear();
    for spec in state.fields() {
        let initial = match (spec.kind, state.wizard.form_data().field(spec.key)) {
            (FieldKind::File, Some(FieldValue::File(f))) => f.path.display().to_string(),
            (FieldKind::Text | FieldKind::Date | FieldKind::Time, Some(FieldValue::Text(s))) => s,
            _ => String::new(),
        };
        if matches!(
            spec.kind,
            FieldKind::Text | FieldKind::Date | FieldKind::Time | FieldKind::File
        ) {
            state.inputs.insert(spec.key, TextInput::new(initial));
        }
    }
    state.focus = if state.fields().is_empty() {
        Focus::Button(ButtonFocus::Next)
    } else {
        Focus::Field(0)
    };
}

fn focus_order_len<A: Application>(state: &TuiState<A>) -> usize {
    state.fields().len() + 3
}

fn focus_to_index<A: Application>(state: &TuiState<A>) -> usize {
    let n = state.fields().len();
    match state.focus {
        Focus::Field(i) => i,
        Focus::Button(ButtonFocus::Back) => n,
        Focus::Button(ButtonFocus::Next) => n + 1,
        Focus::Button(ButtonFocus::Cancel) => n + 2,
    }
}

fn index_to_focus<A: Application>(state: &TuiState<A>, idx: usize) -> Focus {
    let n = state.fields().len();
    if idx < n {
        Focus::Field(idx)
    } else {
        match idx - n {
            0 => Focus::Button(ButtonFocus::Back),
            1 => Focus::Button(ButtonFocus::Next),
            _ => Focus::Button(ButtonFocus::Cancel),
        }
    }
}

fn move_focus<A: Application>(state: &mut TuiState<A>, forward: bool) {
    let len = focus_order_len(state);
    let cur = focus_to_index(state);
    let next = if forward {
        (cur + 1) % len
    } else {
        (cur + len - 1) % len
    };
    state.focus = index_to_focus(state, next);
}

/// Returns false when the form rejected the value.
fn commit<A: Application>(state: &mut TuiState<A>, key: &str, value: FieldValue) -> bool {
    match state.wizard.update_field(key, value) {
        Ok(next) => {
            state.wizard = next;
            true
        }
        Err(e) => {
            state.modal = Some(Modal::Message {
                title: "Invalid value".to_string(),
                body: e.to_string(),
            });
            false
        }
    }
}

fn cycle_choice(
    options: &[(&'static str, &'static str)],
    current: Option<&str>,
    forward: bool,
) -> &'static str {
    let len = options.len();
    let pos = current.and_then(|c| options.iter().position(|(id, _)| *id == c));
    let next = match (pos, forward) {
        (None, true) => 0,
        (None, false) => len - 1,
        (Some(p), true) => (p + 1) % len,
        (Some(p), false) => (p + len - 1) % len,
    };
    options[next].0
}

fn attach_file<A: Application>(state: &mut TuiState<A>, key: &'static str) {
    let path = state
        .inputs
        .get(key)
        .map(|i| i.value.trim().to_string())
        .unwrap_or_default();
    if path.is_empty() {
        return;
    }
    match FileRef::from_path(&path) {
        Ok(file) => {
            info!(
                "[PHASE: tui] [STEP: attach] field={} file={} bytes={}",
                key, file.file_name, file.size_bytes
            );
            commit(state, key, FieldValue::File(file));
        }
        Err(e) => {
            state.modal = Some(Modal::Message {
                title: "Attachment not added".to_string(),
                body: format!("{:#}", e),
            });
        }
    }
}

fn handle_field_key<A: Application>(state: &mut TuiState<A>, idx: usize, code: KeyCode) -> bool {
    let Some(spec) = state.fields().get(idx).copied() else {
        return false;
    };

    match spec.kind {
        FieldKind::Text | FieldKind::Date | FieldKind::Time => {
            let Some(input) = state.inputs.get_mut(spec.key) else {
                return false;
            };
            if !input.handle_key(code) {
                return matches!(
                    code,
                    KeyCode::Left | KeyCode::Right | KeyCode::Home | KeyCode::End
                );
            }
            let value = input.value.clone();
            if !commit(state, spec.key, FieldValue::Text(value)) {
                // Show what the form actually holds.
                let stored = state
                    .wizard
                    .form_data()
                    .field(spec.key)
                    .and_then(|v| v.as_text().map(str::to_string))
                    .unwrap_or_default();
                state.inputs.insert(spec.key, TextInput::new(stored));
            }
            true
        }
        FieldKind::Flag => {
            if code != KeyCode::Char(' ') {
                return false;
            }
            let current = state
                .wizard
                .form_data()
                .field(spec.key)
                .and_then(|v| v.as_flag())
                .unwrap_or(false);
            commit(state, spec.key, FieldValue::Flag(!current));
            true
        }
        FieldKind::Choice(options) => {
            let forward = match code {
                KeyCode::Right | KeyCode::Char(' ') => true,
                KeyCode::Left => false,
                _ => return false,
            };
            let current = state.wizard.form_data().field(spec.key);
            let id = cycle_choice(options, current.as_ref().and_then(|v| v.as_text()), forward);
            commit(state, spec.key, FieldValue::text(id));
            true
        }
        FieldKind::File => match code {
            KeyCode::Enter => {
                attach_file(state, spec.key);
                true
            }
            KeyCode::Delete => {
                if let Some(input) = state.inputs.get_mut(spec.key) {
                    *input = TextInput::default();
                }
                commit(state, spec.key, FieldValue::Null);
                true
            }
            other => state
                .inputs
                .get_mut(spec.key)
                .map(|input| {
                    input.handle_key(other);
                    true
                })
                .unwrap_or(false),
        },
    }
}

fn go_back<A: Application>(state: &mut TuiState<A>) {
    if let Ok(prev) = state.wizard.retreat() {
        state.wizard = prev;
        enter_step(state);
    }
}

fn go_next<A: Application>(
    state: &mut TuiState<A>,
    runtime: &tokio::runtime::Runtime,
    sink: &dyn SubmissionSink,
) {
    if state.wizard.is_last_step() {
        if !state.wizard.can_advance() {
            return;
        }
        match runtime.block_on(state.wizard.submit(sink)) {
            Ok((done, result)) => {
                state.wizard = done;
                state.result = Some(result);
                state.focus = Focus::Button(ButtonFocus::Next);
            }
            Err(e) => {
                warn!("[PHASE: tui] [STEP: submit] submission failed: {}", e);
                state.modal = Some(Modal::Message {
                    title: "Submission failed".to_string(),
                    body: format!(
                        "{}\n\nYour answers have been kept. Select Submit to try again.",
                        e
                    ),
                });
            }
        }
        return;
    }

    if let Ok(next) = state.wizard.advance() {
        state.wizard = next;
        enter_step(state);
    }
}

fn handle_key<A: Application>(
    state: &mut TuiState<A>,
    code: KeyCode,
    runtime: &tokio::runtime::Runtime,
    sink: &dyn SubmissionSink,
) {
    if let Some(modal) = state.modal.clone() {
        match modal {
            Modal::ConfirmCancel { yes_focused } => match code {
                KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                    state.modal = Some(Modal::ConfirmCancel {
                        yes_focused: !yes_focused,
                    })
                }
                KeyCode::Enter if yes_focused => {
                    info!("[PHASE: tui] [STEP: cancel] wizard abandoned by user");
                    state.quit = true;
                }
                KeyCode::Enter | KeyCode::Esc => state.modal = None,
                _ => {}
            },
            Modal::Message { .. } => {
                if matches!(code, KeyCode::Enter | KeyCode::Esc) {
                    state.modal = None;
                }
            }
        }
        return;
    }

    if state.result.is_some() {
        if matches!(code, KeyCode::Enter | KeyCode::Esc) {
            state.quit = true;
        }
        return;
    }

    match code {
        KeyCode::Esc => {
            state.modal = Some(Modal::ConfirmCancel { yes_focused: false });
            return;
        }
        KeyCode::Tab | KeyCode::Down => {
            move_focus(state, true);
            return;
        }
        KeyCode::BackTab | KeyCode::Up => {
            move_focus(state, false);
            return;
        }
        _ => {}
    }

    match state.focus {
        Focus::Field(idx) => {
            if !handle_field_key(state, idx, code) && code == KeyCode::Enter {
                move_focus(state, true);
            }
        }
        Focus::Button(b) => match code {
            KeyCode::Left => {
                state.focus = Focus::Button(match b {
                    ButtonFocus::Back => ButtonFocus::Cancel,
                    ButtonFocus::Next => ButtonFocus::Back,
                    ButtonFocus::Cancel => ButtonFocus::Next,
                })
            }
            KeyCode::Right => {
                state.focus = Focus::Button(match b {
                    ButtonFocus::Back => ButtonFocus::Next,
                    ButtonFocus::Next => ButtonFocus::Cancel,
                    ButtonFocus::Cancel => ButtonFocus::Back,
                })
            }
            KeyCode::Enter => match b {
                ButtonFocus::Back => go_back(state),
                ButtonFocus::Next => go_next(state, runtime, sink),
                ButtonFocus::Cancel => {
                    state.modal = Some(Modal::ConfirmCancel { yes_focused: false })
                }
            },
            _ => {}
        },
    }
}

/// Run the interactive wizard for application `A` until the user finishes or cancels.
pub fn run<A: Application>(
    profile: Option<CitizenProfile>,
    sink: Box<dyn SubmissionSink>,
) -> Result<Option<SubmissionResult>> {
    info!(
        "[PHASE: tui] [STEP: start] Starting TUI wizard application={} sink={}",
        A::KIND,
        sink.name()
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let wizard = A::start(profile.as_ref())?;
    let mut state = TuiState::new(wizard);

    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, &mut state, &runtime, sink.as_ref());
    restore_terminal(&mut terminal)?;
    result?;

    Ok(state.result)
}

fn run_loop<A: Application>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state: &mut TuiState<A>,
    runtime: &tokio::runtime::Runtime,
    sink: &dyn SubmissionSink,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);

    while !state.quit {
        terminal.draw(|f| draw(f.size(), f, state))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(state, key.code, runtime, sink);
                }
            }
        }
    }

    Ok(())
}

/// Render a single frame of application `A` to an in-memory backend and return the screen
/// text. `step` selects the page (sample data is advanced up to it); `None` renders the
/// first step.
pub fn smoke<A: Application>(step: Option<&str>) -> Result<String> {
    info!(
        "[PHASE: tui] [STEP: smoke] Rendering single-frame TUI smoke application={} step={}",
        A::KIND,
        step.unwrap_or("<first>")
    );

    let mut wizard = A::engine()?.initialize(A::sample());
    if let Some(target) = step {
        if !A::steps().iter().any(|s| s.id() == target) {
            anyhow::bail!("Application '{}' has no step '{}'", A::KIND, target);
        }
        while wizard.current_step_id() != target {
            wizard = wizard.advance()?;
        }
    }
    let state = TuiState::new(wizard);

    // In-memory backend: no raw mode or alternate screen, safe for CI.
    let backend = TestBackend::new(100, 30);
    let mut terminal = Terminal::new(backend)?;
    terminal.draw(|f| draw(f.size(), f, &state))?;

    Ok(buffer_text(&terminal))
}

fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    let width = buffer.area.width as usize;
    let mut out = String::new();
    for (i, cell) in buffer.content().iter().enumerate() {
        out.push_str(cell.symbol());
        if (i + 1) % width == 0 {
            out.push('\n');
        }
    }
    out
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    // Raw mode must not outlive a failed setup.
    undo_on_error(
        || {
            let mut stdout = io::stdout();
            stdout.execute(EnterAlternateScreen)?;
            Ok(Terminal::new(CrosstermBackend::new(stdout))?)
        },
        abandon_raw_mode,
    )
}

/// Run `step`; if it fails, run `undo` before handing back the error.
fn undo_on_error<T>(step: impl FnOnce() -> Result<T>, undo: impl FnOnce()) -> Result<T> {
    step().map_err(|e| {
        undo();
        e
    })
}

fn abandon_raw_mode() {
    if let Err(e) = disable_raw_mode() {
        warn!("[PHASE: tui] [STEP: setup] Failed to leave raw mode: {}", e);
    }
    // Harmless when the alternate screen was never entered.
    let _ = io::stdout().execute(LeaveAlternateScreen);
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

// -----------------------------------------------------------------------------
// Drawing
// -----------------------------------------------------------------------------

fn draw<A: Application>(area: Rect, f: &mut ratatui::Frame<'_>, state: &TuiState<A>) {
    let window_area = centered_window(area, 100, 30);

    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Consular Services - {}", A::KIND.title()));
    f.render_widget(outer_block, window_area);

    let inner = window_area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    });
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(inner);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(0)].as_ref())
        .split(rows[0]);

    draw_step_panel(f, cols[0], state);

    if let Some(result) = &state.result {
        draw_complete_page(f, cols[1], result);
    } else {
        draw_step_page(f, cols[1], state);
        draw_buttons(f, rows[1], state);
    }

    match &state.modal {
        Some(Modal::ConfirmCancel { yes_focused }) => {
            draw_cancel_modal(f, window_area, *yes_focused)
        }
        Some(Modal::Message { title, body }) => draw_message_modal(f, window_area, title, body),
        None => {}
    }
}

fn centered_window(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width.saturating_sub(2)).max(60).min(area.width);
    let h = height.min(area.height.saturating_sub(2)).max(20).min(area.height);
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    Rect {
        x,
        y,
        width: w,
        height: h,
    }
}

fn draw_step_panel<A: Application>(f: &mut ratatui::Frame<'_>, area: Rect, state: &TuiState<A>) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(area);

    let current = state.wizard.current_step_index();
    let complete = state.wizard.is_complete();
    let mut lines = Vec::new();
    for (i, step) in state.wizard.steps().iter().enumerate() {
        let (marker, style) = if complete || i < current {
            ("[x]", Style::default().fg(Color::Green))
        } else if i == current {
            (" > ", Style::default().add_modifier(Modifier::BOLD))
        } else {
            ("[ ]", Style::default().fg(Color::DarkGray))
        };
        lines.push(Line::from(Span::styled(
            format!("{} {}", marker, step.title()),
            style,
        )));
    }
    let steps = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Steps"))
        .wrap(Wrap { trim: false });
    f.render_widget(steps, parts[0]);

    let percent = if complete {
        100
    } else {
        state.wizard.progress_percent()
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(u16::from(percent));
    f.render_widget(gauge, parts[1]);
}

fn field_line<A: Application>(state: &TuiState<A>, idx: usize, spec: &FieldSpec) -> Line<'static> {
    let focused = state.focus == Focus::Field(idx);
    let value = state.wizard.form_data().field(spec.key);
    let buffer = state
        .inputs
        .get(spec.key)
        .map(|i| i.value.clone())
        .unwrap_or_default();

    let rendered = match spec.kind {
        FieldKind::Text | FieldKind::Date | FieldKind::Time => format!("[{}]", buffer),
        FieldKind::Flag => {
            let checked = value.and_then(|v| v.as_flag()).unwrap_or(false);
            format!("[{}]", if checked { "x" } else { " " })
        }
        FieldKind::Choice(options) => {
            let id = value.as_ref().and_then(|v| v.as_text()).unwrap_or("");
            let label = options
                .iter()
                .find(|(o, _)| *o == id)
                .map(|(_, l)| *l)
                .unwrap_or("(select)");
            format!("< {} >", label)
        }
        FieldKind::File => match value.as_ref().and_then(|v| v.as_file()) {
            Some(file) => format!("[{}] attached: {} ({} bytes)", buffer, file.file_name, file.size_bytes),
            None => format!("[{}] not attached", buffer),
        },
    };

    let style = if focused {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };
    Line::from(vec![
        Span::raw(format!("{:<34}", spec.label)),
        Span::styled(rendered, style),
    ])
}

fn field_hint(kind: Option<FieldKind>) -> &'static str {
    match kind {
        Some(FieldKind::Flag) => "Space toggles the checkbox.",
        Some(FieldKind::Choice(_)) => "Left/Right change the selection.",
        Some(FieldKind::File) => "Type a file path, Enter attaches, Delete removes.",
        Some(FieldKind::Date) => "Format: YYYY-MM-DD",
        Some(FieldKind::Time) => "Format: HH:MM (24h)",
        _ => "Tab/Shift+Tab move between fields. Esc cancels.",
    }
}

fn draw_step_page<A: Application>(f: &mut ratatui::Frame<'_>, area: Rect, state: &TuiState<A>) {
    let fields = state.fields();
    let mut lines = vec![Line::from(""), Line::from("")];
    for (i, spec) in fields.iter().enumerate() {
        lines.push(field_line(state, i, spec));
        lines.push(Line::from(""));
    }

    let focused_kind = match state.focus {
        Focus::Field(i) => fields.get(i).map(|s| s.kind),
        Focus::Button(_) => None,
    };
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        field_hint(focused_kind),
        Style::default().fg(Color::DarkGray),
    )));
    if !state.wizard.can_advance() {
        lines.push(Line::from(Span::styled(
            "Complete the required fields to continue.",
            Style::default().fg(Color::Yellow),
        )));
    }

    let title = format!(
        "Step {} of {}: {}",
        state.wizard.current_step_index() + 1,
        state.wizard.step_count(),
        state.wizard.current_step().title()
    );
    let p = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

fn draw_complete_page(f: &mut ratatui::Frame<'_>, area: Rect, result: &SubmissionResult) {
    let lines = vec![
        Line::from(""),
        Line::from("Your application has been submitted."),
        Line::from(""),
        Line::from(format!("Reference number: {}", result.reference_id)),
        Line::from(format!(
            "Submitted at:     {}",
            result.submitted_at.format("%Y-%m-%d %H:%M:%S UTC")
        )),
        Line::from(""),
        Line::from("Keep the reference number for tracking. Press Enter to exit."),
    ];
    let p = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Completed"))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

fn draw_buttons<A: Application>(f: &mut ratatui::Frame<'_>, area: Rect, state: &TuiState<A>) {
    let next_label = if state.wizard.is_last_step() {
        "Submit"
    } else {
        "Next"
    };

    let back = button_text(
        "Back",
        state.focus == Focus::Button(ButtonFocus::Back),
        !state.wizard.is_first_step(),
    );
    let next = button_text(
        next_label,
        state.focus == Focus::Button(ButtonFocus::Next),
        state.wizard.can_advance(),
    );
    let cancel = button_text(
        "Cancel",
        state.focus == Focus::Button(ButtonFocus::Cancel),
        true,
    );

    let line = Line::from(vec![back, Span::raw(" "), next, Span::raw(" "), cancel]);
    let p = Paragraph::new(Text::from(line)).alignment(Alignment::Right);
    f.render_widget(p, area);
}

fn button_text(label: &str, focused: bool, enabled: bool) -> Span<'static> {
    let mut style = Style::default();
    if !enabled {
        style = style.fg(Color::DarkGray);
    }
    if focused && enabled {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Span::styled(format!("[ {} ]", label), style)
}

fn modal_area(window_area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(window_area.width.saturating_sub(4)).max(30);
    let h = height.min(window_area.height.saturating_sub(4)).max(5);
    Rect {
        x: window_area.x + (window_area.width.saturating_sub(w)) / 2,
        y: window_area.y + (window_area.height.saturating_sub(h)) / 2,
        width: w,
        height: h,
    }
}

fn draw_modal_buttons(f: &mut ratatui::Frame<'_>, area: Rect, spans: Vec<Span<'static>>) {
    let buttons_area = Rect {
        x: area.x + 1,
        y: area.y + area.height - 2,
        width: area.width - 2,
        height: 1,
    };
    let p = Paragraph::new(Text::from(Line::from(spans))).alignment(Alignment::Right);
    f.render_widget(p, buttons_area);
}

fn draw_cancel_modal(f: &mut ratatui::Frame<'_>, window_area: Rect, yes_focused: bool) {
    let area = modal_area(window_area, 56, 7);
    f.render_widget(Clear, area);

    let body = Paragraph::new(Text::from(vec![Line::from(
        "If you cancel now, everything entered in this application is discarded.",
    )]))
    .block(Block::default().borders(Borders::ALL).title("Cancel Application?"))
    .wrap(Wrap { trim: false });
    f.render_widget(body, area);

    draw_modal_buttons(
        f,
        area,
        vec![
            button_text("Yes, cancel", yes_focused, true),
            Span::raw(" "),
            button_text("No", !yes_focused, true),
        ],
    );
}

fn draw_message_modal(f: &mut ratatui::Frame<'_>, window_area: Rect, title: &str, body: &str) {
    let area = modal_area(window_area, 70, 10);
    f.render_widget(Clear, area);

    let p = Paragraph::new(Text::from(body.to_string()))
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);

    draw_modal_buttons(f, area, vec![button_text("OK", true, true)]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::{AppointmentForm, AttestationForm, EtcForm, NolForm};
    use crate::wizard::{LoggingSink, SinkError, SubmissionAck, SubmissionEnvelope};
    use async_trait::async_trait;

    struct DownSink;

    #[async_trait]
    impl SubmissionSink for DownSink {
        fn name(&self) -> &str {
            "down"
        }

        async fn deliver(
            &self,
            _envelope: &SubmissionEnvelope,
        ) -> Result<SubmissionAck, SinkError> {
            Err(SinkError::Unavailable("maintenance window".to_string()))
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn press(state: &mut TuiState<AppointmentForm>, codes: &[KeyCode], sink: &dyn SubmissionSink) {
        let rt = runtime();
        for code in codes {
            handle_key(state, *code, &rt, sink);
        }
    }

    #[test]
    fn text_input_edits_multibyte_text_by_char() {
        let mut input = TextInput::new("عائشہ");
        assert!(input.handle_key(KeyCode::Backspace));
        assert_eq!(input.value, "عائش");
        input.handle_key(KeyCode::Home);
        assert!(input.handle_key(KeyCode::Char('x')));
        assert_eq!(input.value, "xعائش");
        assert!(input.handle_key(KeyCode::Delete));
        assert_eq!(input.value, "xائش");
        assert!(!input.handle_key(KeyCode::End));
        assert!(!input.handle_key(KeyCode::Delete));
    }

    #[test]
    fn failed_terminal_setup_is_undone() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let undo_count = AtomicU32::new(0);
        let err = undo_on_error(
            || -> Result<()> { anyhow::bail!("alternate screen unavailable") },
            || {
                undo_count.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "alternate screen unavailable");
        assert_eq!(undo_count.load(Ordering::SeqCst), 1);

        let value = undo_on_error(
            || Ok(7),
            || {
                undo_count.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(undo_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejected_count_keeps_buffer_in_step_with_form() {
        let wizard = AttestationForm::engine()
            .unwrap()
            .initialize(AttestationForm::sample())
            .advance()
            .unwrap();
        let mut state = TuiState::new(wizard);
        assert_eq!(state.wizard.current_step_id(), "document");
        // document_type, issuing_authority, copies
        state.focus = Focus::Field(2);
        assert_eq!(state.inputs["copies"].value, "2");

        let rt = runtime();
        handle_key(&mut state, KeyCode::Char('x'), &rt, &LoggingSink);
        assert!(matches!(state.modal, Some(Modal::Message { .. })));
        assert_eq!(state.inputs["copies"].value, "2");
        assert_eq!(state.wizard.form_data().copies, Some(2));

        handle_key(&mut state, KeyCode::Enter, &rt, &LoggingSink);
        handle_key(&mut state, KeyCode::Char('0'), &rt, &LoggingSink);
        assert_eq!(state.wizard.form_data().copies, Some(20));
        assert!(!state.wizard.can_advance());
    }

    #[test]
    fn cycle_choice_wraps_both_ways() {
        let options: &[(&str, &str)] = &[("a", "A"), ("b", "B"), ("c", "C")];
        assert_eq!(cycle_choice(options, None, true), "a");
        assert_eq!(cycle_choice(options, None, false), "c");
        assert_eq!(cycle_choice(options, Some("c"), true), "a");
        assert_eq!(cycle_choice(options, Some("a"), false), "c");
    }

    #[test]
    fn next_button_is_gated_by_step_validity() {
        let mut state = TuiState::new(AppointmentForm::start(None).unwrap());
        assert_eq!(state.focus, Focus::Field(0));

        // Tab past the single field and Back to reach Next, then try to advance.
        press(
            &mut state,
            &[KeyCode::Tab, KeyCode::Tab, KeyCode::Enter],
            &LoggingSink,
        );
        assert_eq!(state.focus, Focus::Button(ButtonFocus::Next));
        assert_eq!(state.wizard.current_step_id(), "service");

        // Choose a service, then advance.
        state.focus = Focus::Field(0);
        press(&mut state, &[KeyCode::Right], &LoggingSink);
        assert!(state.wizard.can_advance());
        state.focus = Focus::Button(ButtonFocus::Next);
        press(&mut state, &[KeyCode::Enter], &LoggingSink);
        assert_eq!(state.wizard.current_step_id(), "slot");
        assert_eq!(state.focus, Focus::Field(0));
    }

    #[test]
    fn typing_updates_form_data() {
        let wizard = AppointmentForm::start(None)
            .unwrap()
            .update_field("service", "attestation")
            .unwrap()
            .advance()
            .unwrap();
        let mut state = TuiState::new(wizard);
        let keys: Vec<KeyCode> = "2026-11-03".chars().map(KeyCode::Char).collect();
        press(&mut state, &keys, &LoggingSink);
        assert_eq!(state.wizard.form_data().date, "2026-11-03");
    }

    #[test]
    fn back_keeps_entered_values_in_inputs() {
        let wizard = AppointmentForm::engine()
            .unwrap()
            .initialize(AppointmentForm::sample())
            .advance()
            .unwrap()
            .advance()
            .unwrap();
        let mut state = TuiState::new(wizard);
        state.focus = Focus::Button(ButtonFocus::Back);
        press(&mut state, &[KeyCode::Enter], &LoggingSink);

        assert_eq!(state.wizard.current_step_id(), "slot");
        assert_eq!(state.inputs["date"].value, "2026-11-02");
        assert_eq!(state.inputs["time"].value, "10:30");
    }

    #[test]
    fn failed_submit_shows_retryable_message_and_keeps_step() {
        let mut wizard = AppointmentForm::engine()
            .unwrap()
            .initialize(AppointmentForm::sample());
        while !wizard.is_last_step() {
            wizard = wizard.advance().unwrap();
        }
        let mut state = TuiState::new(wizard);
        state.focus = Focus::Button(ButtonFocus::Next);

        press(&mut state, &[KeyCode::Enter], &DownSink);
        assert!(matches!(state.modal, Some(Modal::Message { .. })));
        assert!(state.result.is_none());
        assert!(state.wizard.is_last_step());

        // Dismiss, retry against a working sink.
        press(&mut state, &[KeyCode::Enter], &LoggingSink);
        state.focus = Focus::Button(ButtonFocus::Next);
        press(&mut state, &[KeyCode::Enter], &LoggingSink);
        assert!(state.result.is_some());
        assert!(state.wizard.is_complete());
    }

    #[test]
    fn escape_asks_before_quitting() {
        let mut state = TuiState::new(AppointmentForm::start(None).unwrap());
        press(&mut state, &[KeyCode::Esc], &LoggingSink);
        assert_eq!(
            state.modal,
            Some(Modal::ConfirmCancel { yes_focused: false })
        );
        press(&mut state, &[KeyCode::Enter], &LoggingSink);
        assert!(state.modal.is_none());
        assert!(!state.quit);

        press(
            &mut state,
            &[KeyCode::Esc, KeyCode::Left, KeyCode::Enter],
            &LoggingSink,
        );
        assert!(state.quit);
    }

    #[test]
    fn smoke_renders_every_application() {
        let etc = smoke::<EtcForm>(None).unwrap();
        assert!(etc.contains("Emergency Travel Certificate"), "{}", etc);
        assert!(etc.contains("Personal Details"), "{}", etc);

        let nol = smoke::<NolForm>(Some("purpose")).unwrap();
        assert!(nol.contains("Step 2 of 4"), "{}", nol);

        let att = smoke::<AttestationForm>(Some("review")).unwrap();
        assert!(att.contains("Submit"), "{}", att);

        let apt = smoke::<AppointmentForm>(Some("slot")).unwrap();
        assert!(apt.contains("2026-11-02"), "{}", apt);
    }

    #[test]
    fn smoke_rejects_unknown_step() {
        assert!(smoke::<EtcForm>(Some("payment")).is_err());
    }
}
