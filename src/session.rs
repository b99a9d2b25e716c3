use std::sync::Arc;
use std::time::Duration;

use shared::Tab;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::persisted::{PersistedPatch, load_persisted_state, save_persisted_state};
use crate::store::SharedStore;

pub const TOAST_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Increases with every toast shown, so a timer only clears its own.
    pub id: u64,
    pub message: String,
    pub severity: Severity,
}

/// Per-window UI state: the active tab, which is persisted, and at most
/// one transient toast, which is not.
pub struct UiSession {
    store: SharedStore,
    active_tab: Tab,
    toast: Arc<watch::Sender<Option<Toast>>>,
    next_toast: u64,
    timer: Option<AbortHandle>,
    duration: Duration,
}

impl UiSession {
    pub fn new(store: SharedStore) -> Self {
        let (toast, _) = watch::channel(None);
        Self {
            store,
            active_tab: Tab::default(),
            toast: Arc::new(toast),
            next_toast: 0,
            timer: None,
            duration: TOAST_DURATION,
        }
    }

    pub fn with_toast_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Restores the tab that was active when the app last ran.
    pub async fn initialize(&mut self) {
        self.active_tab = load_persisted_state(&self.store).await.active_tab;
        debug!(tab = ?self.active_tab, "restored active tab");
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub async fn set_tab(&mut self, tab: Tab) {
        if self.active_tab == tab {
            return;
        }
        self.active_tab = tab;
        save_persisted_state(&self.store, PersistedPatch::active_tab(tab)).await;
    }

    /// Shows `message` until the toast duration passes or another toast
    /// replaces it. Must be called from within a tokio runtime.
    pub fn show_toast(&mut self, message: impl Into<String>, severity: Severity) {
        self.cancel_timer();
        self.next_toast += 1;
        let id = self.next_toast;
        self.toast.send_replace(Some(Toast {
            id,
            message: message.into(),
            severity,
        }));

        let toast = self.toast.clone();
        let duration = self.duration;
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            toast.send_if_modified(|current| {
                if current.as_ref().is_some_and(|t| t.id == id) {
                    *current = None;
                    true
                } else {
                    false
                }
            });
        });
        self.timer = Some(task.abort_handle());
    }

    pub fn hide_toast(&mut self) {
        self.cancel_timer();
        self.toast.send_replace(None);
    }

    pub fn toast(&self) -> Option<Toast> {
        self.toast.borrow().clone()
    }

    pub fn subscribe_toast(&self) -> watch::Receiver<Option<Toast>> {
        self.toast.subscribe()
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for UiSession {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonStore;
    use tokio::time::sleep;

    #[tokio::test]
    async fn tab_survives_a_restart() {
        let store = JsonStore::in_memory().shared();
        let mut session = UiSession::new(store.clone());
        session.initialize().await;
        assert_eq!(session.active_tab(), Tab::Display);

        session.set_tab(Tab::Led).await;
        drop(session);

        let mut restored = UiSession::new(store);
        restored.initialize().await;
        assert_eq!(restored.active_tab(), Tab::Led);
    }

    #[tokio::test(start_paused = true)]
    async fn toast_clears_itself() {
        let mut session = UiSession::new(JsonStore::in_memory().shared());
        session.show_toast("Brightness set", Severity::Success);
        assert_eq!(session.toast().map(|t| t.severity), Some(Severity::Success));

        sleep(TOAST_DURATION - Duration::from_millis(100)).await;
        assert!(session.toast().is_some());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(session.toast(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_toast_restarts_the_timer() {
        let mut session = UiSession::new(JsonStore::in_memory().shared());
        session.show_toast("first", Severity::Success);
        sleep(Duration::from_secs(2)).await;

        session.show_toast("second", Severity::Error);
        sleep(Duration::from_secs(2)).await;
        let shown = session.toast().unwrap();
        assert_eq!(shown.message, "second");
        assert_eq!(shown.severity, Severity::Error);

        sleep(Duration::from_millis(1100)).await;
        assert_eq!(session.toast(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn hiding_cancels_the_timer() {
        let mut session = UiSession::new(JsonStore::in_memory().shared())
            .with_toast_duration(Duration::from_secs(1));
        let mut rx = session.subscribe_toast();

        session.show_toast("saved", Severity::Success);
        session.hide_toast();
        rx.borrow_and_update();

        sleep(Duration::from_secs(5)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(session.toast(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_session_stops_the_timer() {
        let mut session = UiSession::new(JsonStore::in_memory().shared());
        let rx = session.subscribe_toast();
        session.show_toast("bye", Severity::Success);
        drop(session);

        sleep(TOAST_DURATION * 2).await;
        assert_eq!(rx.borrow().as_ref().map(|t| t.message.as_str()), Some("bye"));
    }
}
