use std::sync::Arc;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use hardware::{MsigdTransport, Transport};
use monitor_sense::store::SharedStore;
use monitor_sense::{ControllerState, MonitorController, Severity, Toast, UiSession};
use shared::{Command, Response, SettingKey, Tab};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::ui;

// ═══════════════════════════════════════════════════════════════════════════════
//  Application State
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything that wakes the main loop besides state changes.
enum AppEvent {
    Key(KeyEvent),
    Redraw,
    Toast(String, Severity),
}

/// What one frame is drawn from.
pub struct View {
    pub state: ControllerState,
    pub tab: Tab,
    pub rows: Vec<SettingKey>,
    pub row: usize,
    pub toast: Option<Toast>,
}

pub struct App {
    transport: Arc<MsigdTransport>,
    controller: Arc<MonitorController<MsigdTransport>>,
    session: UiSession,
    state: watch::Receiver<ControllerState>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events: mpsc::UnboundedReceiver<AppEvent>,
    row: usize,
    quit: bool,
}

impl App {
    pub fn new(transport: Arc<MsigdTransport>, store: SharedStore) -> Self {
        let controller = Arc::new(MonitorController::new(transport.clone(), store.clone()));
        let (events_tx, events) = mpsc::unbounded_channel();
        Self {
            state: controller.subscribe(),
            session: UiSession::new(store),
            transport,
            controller,
            events_tx,
            events,
            row: 0,
            quit: false,
        }
    }

    fn rows(&self) -> Vec<SettingKey> {
        SettingKey::for_tab(self.session.active_tab()).collect()
    }

    fn view(&self) -> View {
        View {
            state: self.state.borrow().clone(),
            tab: self.session.active_tab(),
            rows: self.rows(),
            row: self.row,
            toast: self.session.toast(),
        }
    }

    // ─── Key Handling ───────────────────────────────────────────────────────

    async fn on_key(&mut self, k: KeyEvent) {
        if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }

        let rows = self.rows().len();
        match k.code {
            KeyCode::F(n @ 1..=4) => self.set_tab(Tab::ALL[usize::from(n) - 1]).await,
            KeyCode::Tab | KeyCode::BackTab => {
                let next = self.session.active_tab().next();
                self.set_tab(next).await;
            }
            KeyCode::Char('q') | KeyCode::Char('Q') => self.quit = true,
            KeyCode::Esc => {
                self.session.hide_toast();
                self.controller.clear_error();
            }
            KeyCode::Char('[') => self.switch_monitor(false),
            KeyCode::Char(']') => self.switch_monitor(true),
            KeyCode::Char('r') | KeyCode::Char('R') => self.refresh(),
            KeyCode::Char('m') | KeyCode::Char('M') => self.rescan(),
            KeyCode::Up | KeyCode::Char('k') if rows > 0 => {
                self.row = if self.row > 0 { self.row - 1 } else { rows - 1 };
            }
            KeyCode::Down | KeyCode::Char('j') if rows > 0 => {
                self.row = (self.row + 1) % rows;
            }
            KeyCode::Left | KeyCode::Char('h') => self.step(false).await,
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Enter => self.step(true).await,
            _ => {}
        }
    }

    async fn set_tab(&mut self, tab: Tab) {
        self.session.set_tab(tab).await;
        self.row = 0;
    }

    fn switch_monitor(&mut self, forward: bool) {
        let state = self.state.borrow().clone();
        let len = state.monitors.len();
        if len == 0 {
            self.session.show_toast("No monitors connected", Severity::Error);
            return;
        }
        let cur = state
            .selected_id
            .as_deref()
            .and_then(|id| state.monitors.iter().position(|m| m.id == id))
            .unwrap_or(0);
        let next = if forward { (cur + 1) % len } else { (cur + len - 1) % len };
        let id = state.monitors[next].id.clone();

        let controller = self.controller.clone();
        tokio::spawn(async move { controller.select_monitor(&id).await });
    }

    fn refresh(&self) {
        let controller = self.controller.clone();
        tokio::spawn(async move { controller.refresh_from_hardware().await });
    }

    fn rescan(&self) {
        let controller = self.controller.clone();
        tokio::spawn(async move { controller.load_monitors().await });
    }

    /// Steps the highlighted setting. The local change lands first; the
    /// monitor is told afterwards, and a rejected change is reconciled by
    /// re-reading the hardware.
    async fn step(&mut self, forward: bool) {
        let Some(key) = self.rows().get(self.row).copied() else {
            return;
        };
        let current = self.state.borrow().settings.as_ref().map(|s| s.get(key));
        let Some(current) = current else {
            self.session.show_toast("Settings not loaded yet", Severity::Error);
            return;
        };

        let update = current.stepped(forward);
        let Some((id, settings)) = self.controller.update_setting(update.clone()).await else {
            return;
        };
        let command = update.hardware_command(&id, &settings);

        let transport = self.transport.clone();
        let controller = self.controller.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let (message, severity) = match transport.invoke(command).await {
                Ok(_) => (format!("{} → {}", key.label(), update.wire_value()), Severity::Success),
                Err(err) => {
                    warn!(monitor = %id, ?key, error = %err, "hardware rejected change");
                    controller.refresh_from_hardware().await;
                    (format!("{}: {err}", key.label()), Severity::Error)
                }
            };
            let _ = events.send(AppEvent::Toast(message, severity));
        });
    }

    fn startup(&self) {
        let transport = self.transport.clone();
        let controller = self.controller.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            match transport.invoke(Command::CheckAvailable).await {
                Ok(Response::Available(true)) => {}
                _ => {
                    let _ = events.send(AppEvent::Toast(
                        "msigd not found: install it or pass --msigd".into(),
                        Severity::Error,
                    ));
                }
            }
            controller.load_monitors().await;
        });
    }

    // ─── Main Loop ──────────────────────────────────────────────────────────

    pub async fn run(mut self, mut term: ratatui::DefaultTerminal) -> Result<()> {
        self.controller.initialize().await;
        self.session.initialize().await;
        info!(tab = ?self.session.active_tab(), "session restored");

        spawn_input_reader(self.events_tx.clone());
        self.startup();

        let mut toast = self.session.subscribe_toast();
        loop {
            let view = self.view();
            term.draw(|f| ui::draw(f, &view))?;

            let event = tokio::select! {
                changed = self.state.changed() => match changed {
                    Ok(()) => AppEvent::Redraw,
                    Err(_) => break,
                },
                _ = toast.changed() => AppEvent::Redraw,
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                AppEvent::Key(k) => self.on_key(k).await,
                AppEvent::Toast(message, severity) => self.session.show_toast(message, severity),
                AppEvent::Redraw => {}
            }

            if self.quit {
                break;
            }
        }
        Ok(())
    }
}

/// crossterm reads block, so keys are forwarded from a plain thread.
fn spawn_input_reader(events: mpsc::UnboundedSender<AppEvent>) {
    std::thread::spawn(move || {
        loop {
            let forwarded = match event::read() {
                Ok(Event::Key(k)) if k.kind == KeyEventKind::Press => events.send(AppEvent::Key(k)),
                Ok(Event::Resize(..)) => events.send(AppEvent::Redraw),
                Ok(_) => Ok(()),
                Err(err) => {
                    error!(error = %err, "terminal input failed");
                    return;
                }
            };
            if forwarded.is_err() {
                return;
            }
        }
    });
}
