use shared::MonitorSettings;
use tracing::{debug, warn};

use crate::persisted::{
    CachedSettings, KEY_SETTINGS_CACHE, SettingsCacheMap, claim_document, has_current_version,
};
use crate::store::{JsonStore, SharedStore, StoreError};

/// Last known settings per monitor, kept in the shared store.
///
/// Every operation is fail-soft: a store problem is logged and reads as
/// "nothing cached" or "write skipped". Entries stay until their monitor
/// disconnects; the set of physical monitors is small enough to need no eviction.
#[derive(Clone)]
pub struct SettingsCache {
    store: SharedStore,
}

impl SettingsCache {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, monitor_id: &str) -> Option<MonitorSettings> {
        self.entry(monitor_id).await.map(|entry| entry.settings)
    }

    /// The cached snapshot together with when it was taken.
    pub async fn entry(&self, monitor_id: &str) -> Option<CachedSettings> {
        let store = self.store.lock().await;
        match read_map(&store) {
            Ok(mut map) => map.remove(monitor_id),
            Err(err) => {
                warn!(monitor = %monitor_id, error = %err, "settings cache unreadable");
                None
            }
        }
    }

    pub async fn set(&self, monitor_id: &str, settings: &MonitorSettings) {
        let entry = CachedSettings::now(settings.clone());
        self.modify(monitor_id, "update", |map| {
            map.insert(monitor_id.to_string(), entry);
        })
        .await;
    }

    pub async fn clear(&self, monitor_id: &str) {
        self.modify(monitor_id, "clear", |map| {
            map.remove(monitor_id);
        })
        .await;
    }

    async fn modify<F>(&self, monitor_id: &str, action: &str, mutate: F)
    where
        F: FnOnce(&mut SettingsCacheMap),
    {
        let mut store = self.store.lock().await;
        // an unreadable map is replaced rather than blocking every future write
        let mut map = read_map(&store).unwrap_or_default();
        mutate(&mut map);
        let result = match write_map(&mut store, &map) {
            Ok(()) => store.save().await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => debug!(monitor = %monitor_id, action, "settings cache written"),
            Err(err) => warn!(monitor = %monitor_id, action, error = %err, "settings cache write failed"),
        }
    }
}

/// A document from another schema holds no usable entries.
fn read_map(store: &JsonStore) -> Result<SettingsCacheMap, StoreError> {
    if !has_current_version(store) {
        return Ok(SettingsCacheMap::new());
    }
    Ok(store.get(KEY_SETTINGS_CACHE)?.unwrap_or_default())
}

fn write_map(store: &mut JsonStore, map: &SettingsCacheMap) -> Result<(), StoreError> {
    claim_document(store)?;
    store.set(KEY_SETTINGS_CACHE, map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persisted::{KEY_ACTIVE_TAB, KEY_VERSION, load_persisted_state};
    use crate::store::tests::{TempDir, unwritable_store};

    #[tokio::test]
    async fn set_get_clear() {
        let cache = SettingsCache::new(JsonStore::in_memory().shared());
        let mut settings = MonitorSettings::default();
        settings.brightness = 90;

        assert_eq!(cache.get("SN1").await, None);
        cache.set("SN1", &settings).await;
        assert_eq!(cache.get("SN1").await, Some(settings.clone()));

        let entry = cache.entry("SN1").await.unwrap();
        assert!(entry.cached_at > 0);

        cache.clear("SN1").await;
        assert_eq!(cache.get("SN1").await, None);
    }

    #[tokio::test]
    async fn entries_are_independent_per_monitor() {
        let store = JsonStore::in_memory().shared();
        let cache = SettingsCache::new(store.clone());
        cache.set("SN1", &MonitorSettings::default()).await;
        cache.set("SN2", &MonitorSettings::default()).await;
        cache.clear("SN1").await;

        let state = load_persisted_state(&store).await;
        assert!(!state.settings_cache.contains_key("SN1"));
        assert!(state.settings_cache.contains_key("SN2"));
    }

    #[tokio::test]
    async fn corrupt_cache_reads_as_empty_and_is_replaced_on_write() {
        let store = JsonStore::in_memory().shared();
        store.lock().await.set(KEY_SETTINGS_CACHE, "garbage").unwrap();
        let cache = SettingsCache::new(store);

        assert_eq!(cache.get("SN1").await, None);
        cache.set("SN1", &MonitorSettings::default()).await;
        assert_eq!(cache.get("SN1").await, Some(MonitorSettings::default()));
    }

    #[tokio::test]
    async fn entries_under_another_version_are_ignored_then_replaced() {
        let store = JsonStore::in_memory().shared();
        {
            let mut foreign = SettingsCacheMap::new();
            foreign.insert("SN1".into(), CachedSettings::now(MonitorSettings::default()));
            let mut s = store.lock().await;
            s.set(KEY_VERSION, &99u32).unwrap();
            s.set(KEY_SETTINGS_CACHE, &foreign).unwrap();
            s.set(KEY_ACTIVE_TAB, "led").unwrap();
        }
        let cache = SettingsCache::new(store.clone());

        assert_eq!(cache.get("SN1").await, None);

        cache.set("SN2", &MonitorSettings::default()).await;
        assert_eq!(cache.get("SN1").await, None);
        assert!(cache.get("SN2").await.is_some());
        let s = store.lock().await;
        assert_eq!(s.get::<String>(KEY_ACTIVE_TAB).unwrap(), None);
    }

    #[tokio::test]
    async fn failed_save_does_not_surface() {
        let dir = TempDir::new();
        let cache = SettingsCache::new(unwritable_store(&dir).await.shared());

        cache.set("SN1", &MonitorSettings::default()).await;
        // the write stays visible for this process even though it never hit disk
        assert!(cache.get("SN1").await.is_some());
    }
}
