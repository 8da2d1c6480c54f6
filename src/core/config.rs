use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::cache::write_atomic_blocking;
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::maven::{QUILT_RELEASE_CHANNEL, QUILT_SNAPSHOT_CHANNEL};
use crate::core::version::Version;

const APP_DIR_NAME: &str = "quiltflower";
const SETTINGS_FILE: &str = "settings.json";

/// Transport timeouts. `None` leaves the client default (no timeout).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

/// User-facing updater configuration, persisted by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enabled: bool,
    pub auto_update: bool,
    pub enable_snapshots: bool,
    pub selected_version: Option<Version>,
    pub release_base_url: String,
    pub snapshot_base_url: String,
    pub http: HttpConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_update: true,
            enable_snapshots: false,
            selected_version: None,
            release_base_url: QUILT_RELEASE_CHANNEL.to_string(),
            snapshot_base_url: QUILT_SNAPSHOT_CHANNEL.to_string(),
            http: HttpConfig::default(),
        }
    }
}

/// Persistence collaborator owned by the host application.
pub trait SettingsStore: Send + Sync {
    /// Called on the coordinator task; keep it cheap (in-memory).
    fn load(&self) -> Settings;

    /// Called whenever the coordinator changes the active version. Runs on
    /// the blocking pool, so implementations may do synchronous I/O.
    fn save_selected_version(&self, version: Option<&Version>) -> UpdaterResult<()>;
}

/// On-disk locations used by the updater.
#[derive(Debug, Clone)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    /// `<config-dir>/quiltflower`, falling back to the working directory
    /// when the platform has no config dir.
    pub fn new() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_root(base.join(APP_DIR_NAME))
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jars_dir(&self) -> PathBuf {
        self.root.join("jars")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// `SettingsStore` persisting to a pretty-printed JSON file.
pub struct JsonSettingsStore {
    path: PathBuf,
    current: Mutex<Settings>,
}

impl JsonSettingsStore {
    /// Read settings from `path`. A missing or unreadable file yields defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = load_settings_from_disk(&path).unwrap_or_default();
        Self {
            path,
            current: Mutex::new(current),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the whole settings object and persist it.
    pub fn replace(&self, settings: Settings) -> UpdaterResult<()> {
        write_settings(&self.path, &settings)?;
        *self.lock() = settings;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Settings> {
        // A panic while holding the lock cannot leave `Settings` half-updated.
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Settings {
        self.lock().clone()
    }

    fn save_selected_version(&self, version: Option<&Version>) -> UpdaterResult<()> {
        let mut next = self.lock().clone();
        next.selected_version = version.cloned();
        self.replace(next)
    }
}

fn load_settings_from_disk(path: &Path) -> Option<Settings> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!("Ignoring corrupt settings file {:?}: {}", path, e);
            None
        }
    }
}

fn write_settings(path: &Path, settings: &Settings) -> UpdaterResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| UpdaterError::io(parent, e))?;

    let json = serde_json::to_string_pretty(settings)?;
    write_atomic_blocking(parent, path, json.as_bytes())?;

    debug!("Saved settings to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_quilt_maven() {
        let settings = Settings::default();
        assert!(settings.enabled);
        assert!(settings.auto_update);
        assert!(!settings.enable_snapshots);
        assert!(settings.release_base_url.ends_with("/quiltflower/"));
        assert!(settings.snapshot_base_url.contains("snapshot"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "enableSnapshots": true, "selectedVersion": "1.9.0" }"#)
                .unwrap();
        assert!(settings.enable_snapshots);
        assert!(settings.auto_update);
        assert_eq!(settings.selected_version, Version::parse("1.9.0"));
        assert_eq!(settings.release_base_url, QUILT_RELEASE_CHANNEL);
    }

    #[test]
    fn store_persists_selected_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let store = JsonSettingsStore::open(&path);
        assert_eq!(store.load(), Settings::default());

        let version = Version::parse("1.10.0").unwrap();
        store.save_selected_version(Some(&version)).unwrap();

        let reopened = JsonSettingsStore::open(&path);
        assert_eq!(reopened.load().selected_version, Some(version));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonSettingsStore::open(&path);
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn paths_layout() {
        let paths = AppPaths::with_root("/tmp/qf");
        assert_eq!(paths.jars_dir(), PathBuf::from("/tmp/qf/jars"));
        assert_eq!(paths.settings_file(), PathBuf::from("/tmp/qf/settings.json"));
    }
}
