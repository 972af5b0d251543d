use crate::app_dirs::AppDirs;
use crate::audio::AudioMode;
use crate::catalog::{Catalog, DEFAULT_MODE};
use crate::draw::{DrawPolicy, PairRule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_CADENCE_SECS: u32 = 3;
pub const MIN_CADENCE_SECS: u32 = 1;
pub const MAX_CADENCE_SECS: u32 = 10;

pub const DEFAULT_TIME_LIMIT_SECS: u32 = 300;
pub const MAX_TIME_LIMIT_SECS: u32 = 600;
pub const TIME_LIMIT_STEP_SECS: u32 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable trainer settings. Session runtime state (running, timers) is never
/// part of this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub cadence_secs: u32,
    pub time_limit_secs: u32,
    pub mode: String,
    pub audio_mode: AudioMode,
    pub total_score: u64,
    pub draw_policy: DrawPolicy,
    pub pair_rule: PairRule,
    pub speech_command: Option<String>,
    pub custom_modes: BTreeMap<String, Vec<u8>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cadence_secs: DEFAULT_CADENCE_SECS,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            mode: DEFAULT_MODE.to_string(),
            audio_mode: AudioMode::default(),
            total_score: 0,
            draw_policy: DrawPolicy::default(),
            pair_rule: PairRule::default(),
            speech_command: None,
            custom_modes: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Clamp numeric fields into range and fall back to the default mode when
    /// the stored one no longer exists.
    pub fn sanitized(mut self) -> Self {
        self.cadence_secs = self.cadence_secs.clamp(MIN_CADENCE_SECS, MAX_CADENCE_SECS);
        self.time_limit_secs = self.time_limit_secs.min(MAX_TIME_LIMIT_SECS);
        let catalog = Catalog::with_custom_modes(&self.custom_modes);
        if !catalog.contains_mode(&self.mode) {
            warn!(mode = %self.mode, "stored mode not found, using default");
            self.mode = DEFAULT_MODE.to_string();
        }
        self
    }

    /// Copy into `self` the session-owned fields that differ between `before`
    /// and `after`. Everything else in `self` is left as stored. Returns
    /// whether anything was copied.
    pub fn merge_changes(&mut self, before: &Config, after: &Config) -> bool {
        let mut changed = false;
        if before.cadence_secs != after.cadence_secs {
            self.cadence_secs = after.cadence_secs;
            changed = true;
        }
        if before.time_limit_secs != after.time_limit_secs {
            self.time_limit_secs = after.time_limit_secs;
            changed = true;
        }
        if before.mode != after.mode {
            self.mode = after.mode.clone();
            changed = true;
        }
        if before.audio_mode != after.audio_mode {
            self.audio_mode = after.audio_mode;
            changed = true;
        }
        if before.total_score != after.total_score {
            self.total_score = after.total_score;
            changed = true;
        }
        changed
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("footwork_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return Config::default(),
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg.sanitized(),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "unreadable config, using defaults");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

/// Config store that keeps everything in memory; used with `--no-save` and in tests
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    cfg: std::cell::RefCell<Option<Config>>,
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Config {
        self.cfg.borrow().clone().unwrap_or_default()
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        *self.cfg.borrow_mut() = Some(cfg.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let mut custom_modes = BTreeMap::new();
        custom_modes.insert("lunges".to_string(), vec![4, 8]);
        let cfg = Config {
            cadence_secs: 5,
            time_limit_secs: 90,
            mode: "lunges".into(),
            audio_mode: AudioMode::Speech,
            total_score: 42,
            draw_policy: DrawPolicy::Uniform,
            pair_rule: PairRule::CoinFlip,
            speech_command: Some("espeak".into()),
            custom_modes,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn merge_copies_only_changed_fields() {
        let mut stored = Config::default();
        let before = Config {
            cadence_secs: 7,
            mode: "corners".into(),
            draw_policy: DrawPolicy::Uniform,
            ..Config::default()
        };
        assert!(!stored.merge_changes(&before, &before.clone()));
        assert_eq!(stored, Config::default());

        let after = Config {
            audio_mode: AudioMode::Speech,
            total_score: 1,
            ..before.clone()
        };
        assert!(stored.merge_changes(&before, &after));
        assert_eq!(stored.audio_mode, AudioMode::Speech);
        assert_eq!(stored.total_score, 1);
        assert_eq!(stored.cadence_secs, Config::default().cadence_secs);
        assert_eq!(stored.mode, Config::default().mode);
        assert_eq!(stored.draw_policy, DrawPolicy::LeastDrawn);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{ not json").unwrap();
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn running_flag_in_stored_file_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"running": true, "cadence_secs": 4}"#).unwrap();
        let loaded = FileConfigStore::with_path(&path).load();
        assert_eq!(loaded.cadence_secs, 4);
        assert_eq!(loaded.mode, DEFAULT_MODE);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cfg = Config {
            cadence_secs: 0,
            time_limit_secs: 9999,
            mode: "vanished".into(),
            ..Config::default()
        }
        .sanitized();
        assert_eq!(cfg.cadence_secs, MIN_CADENCE_SECS);
        assert_eq!(cfg.time_limit_secs, MAX_TIME_LIMIT_SECS);
        assert_eq!(cfg.mode, DEFAULT_MODE);
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryConfigStore::default();
        assert_eq!(store.load(), Config::default());
        let cfg = Config {
            total_score: 7,
            ..Config::default()
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load().total_score, 7);
    }
}
