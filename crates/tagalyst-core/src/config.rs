use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::CONFIG_STORAGE_KEY;
use crate::storage::{StorageError, StorageGateway, StorageRecord};

// =============================================================================
// CoreConfig - engine timing knobs
// =============================================================================

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Wait for the host app shell to mount before activating
    pub startup_delay: Duration,
    /// Delay before the single retry when the transcript root is missing
    pub root_retry_delay: Duration,
    pub url_poll_interval: Duration,
    /// Animation-frame stand-in for the render scheduler
    pub frame_interval: Duration,
    /// Passes slower than this log a warning; `None` disables the check
    pub slow_render_threshold: Option<Duration>,
}

impl CoreConfig {
    /// Zero delays, for tests and one-shot tooling
    pub fn immediate() -> Self {
        Self {
            startup_delay: Duration::ZERO,
            root_retry_delay: Duration::ZERO,
            url_poll_interval: Duration::from_millis(1),
            frame_interval: Duration::from_millis(1),
            slow_render_threshold: None,
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_millis(300),
            root_retry_delay: Duration::from_millis(750),
            url_poll_interval: Duration::from_millis(500),
            frame_interval: Duration::from_millis(16),
            slow_render_threshold: Some(Duration::from_millis(50)),
        }
    }
}

// =============================================================================
// Config - user-facing feature flags
// =============================================================================

fn default_true() -> bool {
    true
}

/// Feature toggles. Every flag defaults to enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_true")]
    pub search_enabled: bool,
    #[serde(default = "default_true")]
    pub tags_enabled: bool,
    #[serde(default = "default_true")]
    pub overview_enabled: bool,
    #[serde(default = "default_true")]
    pub search_expands: bool,
    #[serde(default = "default_true")]
    pub tags_expands: bool,
    #[serde(default = "default_true")]
    pub overview_expands: bool,
    #[serde(default = "default_true")]
    pub meta_toolbar_enabled: bool,
    #[serde(default = "default_true")]
    pub sidebar_labels_enabled: bool,
    #[serde(default = "default_true")]
    pub nav_toolbar_enabled: bool,
    #[serde(default = "default_true")]
    pub message_toolbar_enabled: bool,
    #[serde(default = "default_true")]
    pub project_labels_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_enabled: true,
            tags_enabled: true,
            overview_enabled: true,
            search_expands: true,
            tags_expands: true,
            overview_expands: true,
            meta_toolbar_enabled: true,
            sidebar_labels_enabled: true,
            nav_toolbar_enabled: true,
            message_toolbar_enabled: true,
            project_labels_enabled: true,
        }
    }
}

impl Config {
    /// Overlay persisted overrides onto the defaults.
    ///
    /// Only recognized keys holding booleans are taken; unknown keys and
    /// values of any other type are ignored, so the result is always complete.
    pub fn merged(overrides: &Value) -> Self {
        let Value::Object(mut base) = serde_json::to_value(Self::default()).unwrap_or_default()
        else {
            return Self::default();
        };
        if let Some(overrides) = overrides.as_object() {
            for (key, value) in overrides {
                if let (Some(slot), Value::Bool(_)) = (base.get_mut(key), value) {
                    *slot = value.clone();
                }
            }
        }
        serde_json::from_value(Value::Object(base)).unwrap_or_default()
    }

    /// Set a flag by its persisted (camelCase) name.
    /// Returns false for unknown names.
    pub fn set_flag(&mut self, name: &str, enabled: bool) -> bool {
        let Ok(Value::Object(mut map)) = serde_json::to_value(*self) else {
            return false;
        };
        match map.get_mut(name) {
            Some(slot) => *slot = Value::Bool(enabled),
            None => return false,
        }
        match serde_json::from_value(Value::Object(map)) {
            Ok(updated) => {
                *self = updated;
                true
            }
            Err(_) => false,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[source] StorageError),
    #[error("Failed to save config: {0}")]
    Save(#[source] StorageError),
    #[error("Unknown config flag: {0}")]
    UnknownFlag(String),
}

// =============================================================================
// ConfigService - load/merge/persist plus change notification
// =============================================================================

pub type ConfigListener = Rc<dyn Fn(&Config)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

pub struct ConfigService {
    storage: Rc<dyn StorageGateway>,
    current: Cell<Config>,
    listeners: RefCell<Vec<(SubscriptionId, ConfigListener)>>,
    next_id: Cell<u64>,
}

impl ConfigService {
    pub fn new(storage: Rc<dyn StorageGateway>) -> Self {
        Self {
            storage,
            current: Cell::new(Config::default()),
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn current(&self) -> Config {
        self.current.get()
    }

    /// Read the persisted overrides and merge them over the defaults.
    pub async fn load(&self) -> Result<Config, ConfigError> {
        let record = self
            .storage
            .read(&[CONFIG_STORAGE_KEY.to_string()])
            .await
            .map_err(ConfigError::Load)?;
        let overrides = record.get(CONFIG_STORAGE_KEY).cloned().unwrap_or(Value::Null);
        let config = Config::merged(&overrides);
        self.replace(config);
        Ok(config)
    }

    /// Persist a full config and notify subscribers.
    pub async fn save(&self, config: Config) -> Result<(), ConfigError> {
        let record = StorageRecord::from([(CONFIG_STORAGE_KEY.to_string(), config.to_json())]);
        self.storage.write(record).await.map_err(ConfigError::Save)?;
        self.replace(config);
        Ok(())
    }

    pub async fn set_flag(&self, name: &str, enabled: bool) -> Result<Config, ConfigError> {
        let mut config = self.current();
        if !config.set_flag(name, enabled) {
            return Err(ConfigError::UnknownFlag(name.to_string()));
        }
        self.save(config).await?;
        Ok(config)
    }

    fn replace(&self, config: Config) {
        let previous = self.current.replace(config);
        if previous != config {
            self.notify(&config);
        }
    }

    pub fn subscribe(&self, listener: ConfigListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
    }

    fn notify(&self, config: &Config) {
        // Snapshot first: a listener may subscribe or unsubscribe re-entrantly
        let listeners: Vec<ConfigListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(config);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    #[test]
    fn test_merged_backfills_defaults() {
        let config = Config::merged(&json!({
            "searchEnabled": false,
            "tagsEnabled": "nope",
            "somethingNew": false
        }));
        assert!(!config.search_enabled);
        assert!(config.tags_enabled);
        assert!(config.overview_enabled);
        assert_eq!(Config::merged(&Value::Null), Config::default());
    }

    #[test]
    fn test_set_flag_by_name() {
        let mut config = Config::default();
        assert!(config.set_flag("overviewEnabled", false));
        assert!(!config.overview_enabled);
        assert!(!config.set_flag("bogus", false));
    }

    #[tokio::test]
    async fn test_load_merges_persisted_overrides() {
        let storage = Rc::new(MemoryStorage::new());
        storage.insert(CONFIG_STORAGE_KEY, json!({"tagsEnabled": false}));
        let service = ConfigService::new(storage);
        let config = service.load().await.unwrap();
        assert!(!config.tags_enabled);
        assert!(config.search_enabled);
        assert_eq!(service.current(), config);
    }

    #[tokio::test]
    async fn test_set_flag_persists_and_notifies() {
        let storage = Rc::new(MemoryStorage::new());
        let service = ConfigService::new(storage.clone());
        let seen = Rc::new(Cell::new(0));
        let seen_clone = seen.clone();
        let id = service.subscribe(Rc::new(move |config: &Config| {
            assert!(!config.search_enabled);
            seen_clone.set(seen_clone.get() + 1);
        }));

        service.set_flag("searchEnabled", false).await.unwrap();
        assert_eq!(seen.get(), 1);
        assert_eq!(
            storage.get(CONFIG_STORAGE_KEY).unwrap()["searchEnabled"],
            json!(false)
        );

        // Same value again: no change, no notification
        service.set_flag("searchEnabled", false).await.unwrap();
        assert_eq!(seen.get(), 1);

        service.unsubscribe(id);
        assert!(matches!(
            service.set_flag("nope", true).await,
            Err(ConfigError::UnknownFlag(_))
        ));
    }
}
