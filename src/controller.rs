use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hardware::{Transport, TransportError};
use shared::{Command, LedSettings, Monitor, MonitorSettings, Response, SettingUpdate};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::cache::SettingsCache;
use crate::directory::MonitorDirectory;
use crate::persisted::{PersistedPatch, load_persisted_state, save_persisted_state};
use crate::store::SharedStore;

// ==========================================
// OBSERVABLE STATE
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSource {
    Cache,
    Hardware,
}

/// Where the current settings stand. Loading and showing cached data are
/// separate variants, so "loading from cache" cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    Ready(SettingsSource),
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    pub monitors: Vec<Monitor>,
    pub selected_id: Option<String>,
    pub settings: Option<MonitorSettings>,
    pub phase: LoadPhase,
}

impl ControllerState {
    pub fn loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            LoadPhase::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_from_cache(&self) -> bool {
        self.phase == LoadPhase::Ready(SettingsSource::Cache)
    }

    pub fn selected_monitor(&self) -> Option<&Monitor> {
        let id = self.selected_id.as_deref()?;
        self.monitors.iter().find(|m| m.id == id)
    }
}

// ==========================================
// THE CONTROLLER
// ==========================================

/// Decides whether the visible settings come from the cache or the hardware
/// and keeps the two consistent.
///
/// Every hardware load takes a number from `request_seq`; its result is only
/// applied while that number is still the latest one handed out. Superseded
/// loads run to completion and are then ignored. Adopting a cached snapshot
/// on selection also takes a number, so a slower load for the previous
/// selection cannot overwrite it.
pub struct MonitorController<T> {
    transport: Arc<T>,
    directory: MonitorDirectory<T>,
    cache: SettingsCache,
    store: SharedStore,
    state: watch::Sender<ControllerState>,
    request_seq: AtomicU64,
}

impl<T: Transport> MonitorController<T> {
    pub fn new(transport: Arc<T>, store: SharedStore) -> Self {
        let (state, _) = watch::channel(ControllerState::default());
        Self {
            directory: MonitorDirectory::new(transport.clone()),
            cache: SettingsCache::new(store.clone()),
            transport,
            store,
            state,
            request_seq: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ControllerState {
        self.state.borrow().clone()
    }

    pub fn cache(&self) -> &SettingsCache {
        &self.cache
    }

    fn next_request(&self) -> u64 {
        self.request_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, seq: u64) -> bool {
        self.request_seq.load(Ordering::SeqCst) == seq
    }

    /// Restores the last selection and, when the cache has it, its settings.
    /// Never touches the hardware.
    pub async fn initialize(&self) {
        let persisted = load_persisted_state(&self.store).await;
        let Some(id) = persisted.selected_monitor_id else {
            debug!("no previous selection");
            return;
        };

        let cached = self.cache.get(&id).await;
        let seq = self.next_request();
        self.state.send_if_modified(|s| {
            if !self.is_latest(seq) {
                return false;
            }
            s.selected_id = Some(id.clone());
            if let Some(settings) = cached {
                s.settings = Some(settings);
                s.phase = LoadPhase::Ready(SettingsSource::Cache);
            }
            true
        });
        info!(monitor = %id, from_cache = self.state.borrow().is_from_cache(), "restored selection");
    }

    /// Re-enumerates monitors and reconciles the selection with what is
    /// actually connected.
    pub async fn load_monitors(&self) {
        let monitors = match self.directory.list().await {
            Ok(monitors) => monitors,
            Err(err) => {
                error!(error = %err, "failed to enumerate monitors");
                self.state
                    .send_modify(|s| s.phase = LoadPhase::Failed(err.to_string()));
                return;
            }
        };
        info!(count = monitors.len(), "monitors enumerated");

        let first = monitors.first().map(|m| m.id.clone());
        let selected = self.state.borrow().selected_id.clone();
        let present = selected
            .as_deref()
            .is_some_and(|id| monitors.iter().any(|m| m.id == id));
        self.state.send_modify(|s| s.monitors = monitors);

        let Some(first) = first else {
            self.next_request();
            self.state.send_modify(|s| {
                s.settings = None;
                s.phase = LoadPhase::Idle;
            });
            return;
        };

        match selected {
            Some(id) if present => {
                let has_settings = self.state.borrow().settings.is_some();
                if has_settings {
                    debug!(monitor = %id, "keeping settings already shown");
                } else {
                    self.select_monitor(&id).await;
                }
            }
            Some(id) => {
                info!(monitor = %id, "selected monitor disconnected, dropping its cache");
                self.cache.clear(&id).await;
                self.select_monitor(&first).await;
            }
            None => self.select_monitor(&first).await,
        }
    }

    /// Makes `id` the current monitor. The selection is saved before anything
    /// else happens. A cached snapshot is adopted in the same update that
    /// switches the selection; on a miss the panel clears and the hardware is
    /// queried.
    pub async fn select_monitor(&self, id: &str) {
        save_persisted_state(&self.store, PersistedPatch::selected_monitor(Some(id.to_string())))
            .await;
        let cached = self.cache.get(id).await;
        let from_cache = cached.is_some();

        // numbered after the store I/O: the latest switch wins, and it outdates any load in flight
        self.next_request();
        self.state.send_modify(|s| {
            let changed = s.selected_id.as_deref() != Some(id);
            s.selected_id = Some(id.to_string());
            match cached {
                Some(settings) => {
                    s.settings = Some(settings);
                    s.phase = LoadPhase::Ready(SettingsSource::Cache);
                }
                None => {
                    // another monitor's values must not be shown, or carried, under this one
                    if changed {
                        s.settings = None;
                    }
                    s.phase = LoadPhase::Loading;
                }
            }
        });

        if from_cache {
            debug!(monitor = %id, "settings served from cache");
        } else {
            self.load_from_hardware(id, LedSettings::default()).await;
        }
    }

    /// Queries the hardware for `id`. LED fields are carried over from the
    /// settings on screen, then from the cache, then defaults.
    pub async fn load_settings(&self, id: &str) {
        let fallback = self
            .cache
            .get(id)
            .await
            .map(|cached| cached.led())
            .unwrap_or_default();
        self.load_from_hardware(id, fallback).await;
    }

    /// Re-reads the selected monitor, keeping the LED state currently shown.
    pub async fn refresh_from_hardware(&self) {
        let selected = self.state.borrow().selected_id.clone();
        match selected {
            Some(id) => self.load_from_hardware(&id, LedSettings::default()).await,
            None => debug!("refresh requested with nothing selected"),
        }
    }

    async fn load_from_hardware(&self, id: &str, fallback: LedSettings) {
        let seq = self.next_request();
        self.state.send_modify(|s| s.phase = LoadPhase::Loading);
        debug!(monitor = %id, seq, "querying hardware");

        match self.query_settings(id).await {
            Ok(reported) => {
                let mut merged = None;
                self.state.send_if_modified(|s| {
                    if !self.is_latest(seq) {
                        return false;
                    }
                    let led = s
                        .settings
                        .as_ref()
                        .filter(|_| s.selected_id.as_deref() == Some(id))
                        .map(MonitorSettings::led)
                        .unwrap_or(fallback);
                    let settings = reported.with_led(led);
                    merged = Some(settings.clone());
                    s.settings = Some(settings);
                    s.phase = LoadPhase::Ready(SettingsSource::Hardware);
                    true
                });
                match merged {
                    Some(settings) => self.cache.set(id, &settings).await,
                    None => debug!(monitor = %id, seq, "dropping superseded hardware response"),
                }
            }
            Err(err) => {
                let message = err.to_string();
                let applied = self.state.send_if_modified(|s| {
                    if !self.is_latest(seq) {
                        return false;
                    }
                    s.phase = LoadPhase::Failed(message);
                    true
                });
                if applied {
                    error!(monitor = %id, error = %err, "failed to read monitor settings");
                } else {
                    debug!(monitor = %id, seq, error = %err, "dropping superseded failure");
                }
            }
        }
    }

    async fn query_settings(&self, id: &str) -> Result<MonitorSettings, TransportError> {
        let command = Command::GetMonitorSettings {
            monitor_id: id.to_string(),
        };
        let name = command.name();
        match self.transport.invoke(command).await? {
            Response::Settings(settings) => Ok(settings),
            _ => Err(TransportError::UnexpectedResponse(name)),
        }
    }

    /// Applies `update` to the settings on screen and waits for the cache
    /// write. Sending the change to the monitor is up to the caller; the
    /// returned snapshot is what that command should be built from.
    /// Does nothing until settings are loaded.
    pub async fn update_setting(&self, update: SettingUpdate) -> Option<(String, MonitorSettings)> {
        let key = update.key();
        let mut updated = None;
        self.state.send_if_modified(|s| {
            let (Some(id), Some(settings)) = (s.selected_id.clone(), s.settings.as_mut()) else {
                return false;
            };
            settings.apply(update);
            updated = Some((id, settings.clone()));
            true
        });

        let Some((id, settings)) = updated else {
            debug!(?key, "no settings loaded, update ignored");
            return None;
        };
        debug!(monitor = %id, ?key, "setting updated locally");
        self.cache.set(&id, &settings).await;
        Some((id, settings))
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| {
            if s.error().is_none() {
                return false;
            }
            s.phase = LoadPhase::Idle;
            true
        });
    }
}
