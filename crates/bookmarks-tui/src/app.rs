//! Event loop and key handling.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bookmarks_application::{BookmarkViewModel, MutationOutcome, Rejection};
use bookmarks_core::view::{Screen, ViewMode, ViewState};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::diagnostics::Diagnostic;
use crate::terminal::TerminalSession;
use crate::ui;

const MAX_DIAGNOSTICS: usize = 50;
const TICK: Duration = Duration::from_millis(250);

/// Which part of the bookmarks screen receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Title,
    Url,
    List,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Title => Focus::Url,
            Focus::Url => Focus::List,
            Focus::List => Focus::Title,
        }
    }

    fn prev(self) -> Self {
        match self {
            Focus::Title => Focus::List,
            Focus::Url => Focus::Title,
            Focus::List => Focus::Url,
        }
    }
}

/// Work that has to leave the key handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login,
    Logout,
    Add,
    Remove(String),
    Open(String),
}

pub struct App {
    view_model: Arc<BookmarkViewModel>,
    pub focus: Focus,
    pub selected: usize,
    pub show_diagnostics: bool,
    pub diagnostics: VecDeque<Diagnostic>,
    pub should_quit: bool,
    login: Option<JoinHandle<ViewMode>>,
}

impl App {
    pub fn new(view_model: Arc<BookmarkViewModel>) -> Self {
        Self {
            view_model,
            focus: Focus::Title,
            selected: 0,
            show_diagnostics: false,
            diagnostics: VecDeque::new(),
            should_quit: false,
            login: None,
        }
    }

    /// True while a browser sign-in is outstanding.
    pub fn login_in_progress(&self) -> bool {
        self.login.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        if self.diagnostics.len() == MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(diagnostic);
    }

    /// Keeps the selection inside the list after it changed underneath us.
    pub fn clamp_selection(&mut self, rows: usize) {
        if rows == 0 {
            self.selected = 0;
        } else if self.selected >= rows {
            self.selected = rows - 1;
        }
    }

    /// Applies `key` to local UI state and the draft. Anything that needs
    /// the backend comes back as a [`Command`].
    pub fn handle_key(&mut self, key: KeyEvent, state: &ViewState) -> Option<Command> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.should_quit = true;
                return None;
            }
            KeyCode::Char('c') if ctrl => {
                self.should_quit = true;
                return None;
            }
            KeyCode::F(2) => {
                self.show_diagnostics = !self.show_diagnostics;
                return None;
            }
            _ => {}
        }

        match state.screen() {
            Screen::Loading => None,
            Screen::SignIn => match key.code {
                KeyCode::Enter | KeyCode::Char('l') => Some(Command::Login),
                _ => None,
            },
            Screen::Bookmarks { rows, draft, .. } => {
                self.clamp_selection(rows.len());
                match key.code {
                    KeyCode::Char('l') if ctrl => return Some(Command::Logout),
                    KeyCode::Tab => {
                        self.focus = self.focus.next();
                        return None;
                    }
                    KeyCode::BackTab => {
                        self.focus = self.focus.prev();
                        return None;
                    }
                    _ => {}
                }

                match self.focus {
                    Focus::Title | Focus::Url => {
                        let mut text = match self.focus {
                            Focus::Title => draft.title,
                            _ => draft.url,
                        };
                        match key.code {
                            KeyCode::Enter => return Some(Command::Add),
                            KeyCode::Backspace => {
                                text.pop();
                            }
                            KeyCode::Char(c) if !ctrl => text.push(c),
                            _ => return None,
                        }
                        if self.focus == Focus::Title {
                            self.view_model.set_draft_title(text);
                        } else {
                            self.view_model.set_draft_url(text);
                        }
                        None
                    }
                    Focus::List => match key.code {
                        KeyCode::Up | KeyCode::Char('k') => {
                            self.selected = self.selected.saturating_sub(1);
                            None
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            if self.selected + 1 < rows.len() {
                                self.selected += 1;
                            }
                            None
                        }
                        KeyCode::Enter | KeyCode::Char('o') => {
                            rows.get(self.selected).map(|row| Command::Open(row.url.clone()))
                        }
                        KeyCode::Delete | KeyCode::Char('d') => {
                            rows.get(self.selected).map(|row| Command::Remove(row.id.clone()))
                        }
                        _ => None,
                    },
                }
            }
        }
    }

    /// Runs `command` in the background; results arrive through the
    /// view-model's state channel.
    pub fn dispatch(&mut self, command: Command) {
        let vm = self.view_model.clone();
        match command {
            Command::Login => {
                if self.login_in_progress() {
                    tracing::debug!("[App] Login already in progress");
                    return;
                }
                self.login = Some(tokio::spawn(async move { vm.login().await }));
            }
            Command::Logout => {
                self.focus = Focus::Title;
                tokio::spawn(async move { vm.logout().await });
            }
            Command::Add => {
                tokio::spawn(async move {
                    if let MutationOutcome::Rejected(rejection) = vm.add_bookmark().await {
                        report_rejection("add", rejection);
                    }
                });
            }
            Command::Remove(id) => {
                tokio::spawn(async move {
                    if let MutationOutcome::Rejected(rejection) = vm.remove_bookmark(&id).await {
                        report_rejection("remove", rejection);
                    }
                });
            }
            Command::Open(url) => {
                if let Err(e) = open::that_detached(&url) {
                    tracing::warn!("[App] Failed to open {}: {}", url, e);
                }
            }
        }
    }
}

fn report_rejection(action: &str, rejection: Rejection) {
    match rejection {
        Rejection::EmptyDraft(reason) => tracing::warn!("[App] Cannot {}: {}", action, reason),
        Rejection::NotSignedIn => tracing::warn!("[App] Cannot {}: not signed in", action),
        Rejection::PendingRow => {
            tracing::warn!("[App] Cannot {}: bookmark is still being saved", action)
        }
    }
}

/// Drives the UI until the user quits, then releases the subscription.
pub async fn run(
    view_model: Arc<BookmarkViewModel>,
    mut diagnostics: mpsc::UnboundedReceiver<Diagnostic>,
) -> Result<()> {
    let mut terminal = TerminalSession::new()?;
    let mut app = App::new(view_model.clone());

    let activation = tokio::spawn({
        let vm = view_model.clone();
        async move { vm.activate().await }
    });

    let result = event_loop(&mut terminal, &mut app, &view_model, &mut diagnostics).await;

    drop(terminal);
    activation.abort();
    if let Some(login) = app.login.take() {
        login.abort();
    }
    view_model.deactivate().await;
    tracing::info!("[App] Exited");
    result
}

async fn event_loop(
    terminal: &mut TerminalSession,
    app: &mut App,
    view_model: &BookmarkViewModel,
    diagnostics: &mut mpsc::UnboundedReceiver<Diagnostic>,
) -> Result<()> {
    let mut state_rx = view_model.watch();
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK);

    while !app.should_quit {
        let state = state_rx.borrow_and_update().clone();
        if let Screen::Bookmarks { rows, .. } = state.screen() {
            app.clamp_selection(rows.len());
        }
        terminal.draw(|frame| ui::draw(frame, app, &state))?;

        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Some(diagnostic) = diagnostics.recv() => app.push_diagnostic(diagnostic),
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if let Some(command) = app.handle_key(key, &state) {
                        app.dispatch(command);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            // Redraw so the sign-in indicator tracks the login task.
            _ = tick.tick() => {}
        }
    }
    Ok(())
}
