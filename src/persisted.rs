//! The versioned document behind [`crate::store::JsonStore`]: selected
//! monitor, active tab and the per-monitor settings cache.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::{MonitorSettings, Tab};
use tracing::{error, warn};

use crate::store::{JsonStore, SharedStore, StoreError};

pub const STORE_VERSION: u32 = 1;

pub const KEY_VERSION: &str = "version";
pub const KEY_SELECTED_MONITOR: &str = "selectedMonitorId";
pub const KEY_ACTIVE_TAB: &str = "activeTab";
pub const KEY_SETTINGS_CACHE: &str = "settingsCache";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSettings {
    pub settings: MonitorSettings,
    /// Milliseconds since the Unix epoch.
    pub cached_at: u64,
}

impl CachedSettings {
    pub fn now(settings: MonitorSettings) -> Self {
        Self {
            settings,
            cached_at: now_millis(),
        }
    }

    pub fn age(&self) -> Duration {
        Duration::from_millis(now_millis().saturating_sub(self.cached_at))
    }
}

pub type SettingsCacheMap = HashMap<String, CachedSettings>;

#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub version: u32,
    pub selected_monitor_id: Option<String>,
    pub active_tab: Tab,
    pub settings_cache: SettingsCacheMap,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            selected_monitor_id: None,
            active_tab: Tab::default(),
            settings_cache: HashMap::new(),
        }
    }
}

/// Keys to write; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct PersistedPatch {
    pub selected_monitor_id: Option<Option<String>>,
    pub active_tab: Option<Tab>,
    pub settings_cache: Option<SettingsCacheMap>,
}

impl PersistedPatch {
    pub fn selected_monitor(id: Option<String>) -> Self {
        Self {
            selected_monitor_id: Some(id),
            ..Self::default()
        }
    }

    pub fn active_tab(tab: Tab) -> Self {
        Self {
            active_tab: Some(tab),
            ..Self::default()
        }
    }
}

/// Reads the persisted state. Missing or unrecognised versions mean a fresh
/// install; a key that no longer decodes falls back to its default.
pub async fn load_persisted_state(store: &SharedStore) -> PersistedState {
    let store = store.lock().await;

    let version = match store.get::<u32>(KEY_VERSION) {
        Ok(Some(v)) => v,
        Ok(None) => return PersistedState::default(),
        Err(err) => {
            warn!(error = %err, "unreadable store version, using defaults");
            return PersistedState::default();
        }
    };
    if version != STORE_VERSION {
        warn!(found = version, expected = STORE_VERSION, "unknown store version, using defaults");
        return PersistedState::default();
    }

    PersistedState {
        version,
        selected_monitor_id: read_or_default(&store, KEY_SELECTED_MONITOR),
        active_tab: read_or_default(&store, KEY_ACTIVE_TAB),
        settings_cache: read_or_default(&store, KEY_SETTINGS_CACHE),
    }
}

fn read_or_default<T: DeserializeOwned + Default>(store: &JsonStore, key: &str) -> T {
    store.get(key).unwrap_or_else(|err| {
        warn!(error = %err, "discarding stored value");
        None
    })
    .unwrap_or_default()
}

/// Writes the keys present in `patch` and flushes. Failures are logged; the
/// in-memory state stays authoritative either way.
pub async fn save_persisted_state(store: &SharedStore, patch: PersistedPatch) {
    let mut store = store.lock().await;
    if let Err(err) = apply_patch(&mut store, patch) {
        error!(error = %err, "failed to update persisted state");
        return;
    }
    if let Err(err) = store.save().await {
        error!(error = %err, "failed to save persisted state");
    }
}

fn apply_patch(store: &mut JsonStore, patch: PersistedPatch) -> Result<(), StoreError> {
    claim_document(store)?;
    if let Some(selected) = patch.selected_monitor_id {
        store.set(KEY_SELECTED_MONITOR, &selected)?;
    }
    if let Some(tab) = patch.active_tab {
        store.set(KEY_ACTIVE_TAB, &tab)?;
    }
    if let Some(cache) = patch.settings_cache {
        store.set(KEY_SETTINGS_CACHE, &cache)?;
    }
    Ok(())
}

/// Whether the document was written under [`STORE_VERSION`].
pub(crate) fn has_current_version(store: &JsonStore) -> bool {
    matches!(store.get::<u32>(KEY_VERSION), Ok(Some(STORE_VERSION)))
}

/// Stamps [`STORE_VERSION`] before a write. Keys left by another schema are
/// dropped first so the stamp never revives them.
pub(crate) fn claim_document(store: &mut JsonStore) -> Result<(), StoreError> {
    if !has_current_version(store) {
        for key in [KEY_SELECTED_MONITOR, KEY_ACTIVE_TAB, KEY_SETTINGS_CACHE] {
            store.remove(key);
        }
    }
    store.set(KEY_VERSION, &STORE_VERSION)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{TempDir, unwritable_store};

    #[tokio::test]
    async fn empty_store_is_a_fresh_install() {
        let store = JsonStore::in_memory().shared();
        assert_eq!(load_persisted_state(&store).await, PersistedState::default());
    }

    #[tokio::test]
    async fn unknown_version_is_a_fresh_install() {
        let store = JsonStore::in_memory().shared();
        {
            let mut s = store.lock().await;
            s.set(KEY_VERSION, &99u32).unwrap();
            s.set(KEY_ACTIVE_TAB, &Tab::Led).unwrap();
        }
        assert_eq!(load_persisted_state(&store).await, PersistedState::default());
    }

    #[tokio::test]
    async fn first_write_over_a_foreign_version_drops_its_keys() {
        let store = JsonStore::in_memory().shared();
        {
            let mut s = store.lock().await;
            s.set(KEY_VERSION, &99u32).unwrap();
            s.set(KEY_ACTIVE_TAB, &Tab::Led).unwrap();
            s.set(KEY_SELECTED_MONITOR, "OLD").unwrap();
        }

        save_persisted_state(&store, PersistedPatch::active_tab(Tab::Color)).await;

        let state = load_persisted_state(&store).await;
        assert_eq!(state.active_tab, Tab::Color);
        assert_eq!(state.selected_monitor_id, None);
    }

    #[tokio::test]
    async fn saving_a_tab_leaves_other_keys_alone() {
        let dir = TempDir::new();
        let path = dir.file("settings.json");
        let store = JsonStore::load(&path).await.unwrap().shared();

        let mut cache = SettingsCacheMap::new();
        cache.insert("SN1".into(), CachedSettings::now(MonitorSettings::default()));
        save_persisted_state(
            &store,
            PersistedPatch {
                selected_monitor_id: Some(Some("SN1".into())),
                settings_cache: Some(cache.clone()),
                ..PersistedPatch::default()
            },
        )
        .await;

        save_persisted_state(&store, PersistedPatch::active_tab(Tab::Color)).await;

        let reopened = JsonStore::load(&path).await.unwrap().shared();
        let state = load_persisted_state(&reopened).await;
        assert_eq!(state.active_tab, Tab::Color);
        assert_eq!(state.selected_monitor_id.as_deref(), Some("SN1"));
        assert_eq!(state.settings_cache, cache);
    }

    #[tokio::test]
    async fn selection_can_be_cleared() {
        let store = JsonStore::in_memory().shared();
        save_persisted_state(&store, PersistedPatch::selected_monitor(Some("SN1".into()))).await;
        save_persisted_state(&store, PersistedPatch::selected_monitor(None)).await;

        assert_eq!(load_persisted_state(&store).await.selected_monitor_id, None);
    }

    #[tokio::test]
    async fn undecodable_key_falls_back_alone() {
        let store = JsonStore::in_memory().shared();
        save_persisted_state(&store, PersistedPatch::selected_monitor(Some("SN1".into()))).await;
        store.lock().await.set(KEY_ACTIVE_TAB, "hologram").unwrap();

        let state = load_persisted_state(&store).await;
        assert_eq!(state.active_tab, Tab::Display);
        assert_eq!(state.selected_monitor_id.as_deref(), Some("SN1"));
    }

    #[tokio::test]
    async fn save_failures_are_swallowed() {
        let dir = TempDir::new();
        let store = unwritable_store(&dir).await.shared();

        save_persisted_state(&store, PersistedPatch::active_tab(Tab::Led)).await;

        // in-memory copy still reflects the write
        assert_eq!(load_persisted_state(&store).await.active_tab, Tab::Led);
    }
}
