//! Injected configuration for the watch side and the converter.
//!
//! Defaults are overlaid by `slothwatch.toml` (all keys optional) and, for
//! the watch side, by `SLOTH_*` environment variables.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::reconstruct::comparator::{Comparator, ComparatorTable, FallbackPolicy};
use crate::snapshot::model::SessionState;

pub const CONFIG_FILENAME: &str = "slothwatch.toml";

const ENV_INSTANCE_ID: &str = "SLOTH_INSTANCE_ID";
const ENV_SNAPSHOT_ID: &str = "SLOTH_SNAPSHOT_ID";
const ENV_STATE: &str = "SLOTH_STATE";
const ENV_DUMP_ITER_COUNT: &str = "SLOTH_DUMP_ITER_COUNT";
const ENV_OUTPUT_DIR: &str = "SLOTH_OUTPUT_DIR";

pub const DEFAULT_DUMP_ITER_COUNT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub instance_id: String,
    /// Used verbatim for the first container instead of the session id.
    pub snapshot_id: Option<String>,
    pub initial_state: SessionState,
    /// Records per container before automatic rotation. Zero disables it.
    pub dump_iter_count: usize,
    pub output_dir: PathBuf,
    pub capture_call_stack: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            instance_id: String::new(),
            snapshot_id: None,
            initial_state: SessionState::Idle,
            dump_iter_count: DEFAULT_DUMP_ITER_COUNT,
            output_dir: PathBuf::from("."),
            capture_call_stack: true,
        }
    }
}

impl WatchConfig {
    /// Defaults overlaid by the process environment.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `SLOTH_*` overrides from `lookup`. Unparseable values are
    /// logged and ignored.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(instance) = non_empty(ENV_INSTANCE_ID) {
            self.instance_id = instance.trim().to_string();
        }
        if let Some(snapshot) = non_empty(ENV_SNAPSHOT_ID) {
            self.snapshot_id = Some(snapshot.trim().to_string());
        }
        if let Some(raw) = non_empty(ENV_STATE) {
            match raw.parse::<SessionState>() {
                Ok(state) => self.initial_state = state,
                Err(err) => tracing::warn!(var = ENV_STATE, error = %err, "ignoring invalid value"),
            }
        }
        if let Some(raw) = non_empty(ENV_DUMP_ITER_COUNT) {
            match raw.trim().parse::<usize>() {
                Ok(count) => self.dump_iter_count = count,
                Err(err) => {
                    tracing::warn!(var = ENV_DUMP_ITER_COUNT, error = %err, "ignoring invalid value")
                }
            }
        }
        if let Some(dir) = non_empty(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        self
    }

    fn merge(&mut self, toml: TomlWatchConfig) {
        if let Some(instance_id) = toml.instance_id {
            self.instance_id = instance_id;
        }
        if toml.snapshot_id.is_some() {
            self.snapshot_id = toml.snapshot_id;
        }
        if let Some(state) = toml.state {
            self.initial_state = state;
        }
        if let Some(count) = toml.dump_iter_count {
            self.dump_iter_count = count;
        }
        if let Some(dir) = toml.output_dir {
            self.output_dir = dir;
        }
        if let Some(enabled) = toml.capture_call_stack {
            self.capture_call_stack = enabled;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertConfig {
    /// Crate that owns the watched functions. Inferred from the scope path
    /// when unset.
    pub crate_name: Option<String>,
    pub data_module: String,
    pub test_prefix: String,
    /// Path of the generic `fn(&str) -> T` used to restore opaque values.
    pub restore_fn: String,
    pub comparators: ComparatorTable,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            crate_name: None,
            data_module: "sloth_test_parval".to_string(),
            test_prefix: "test_sloth".to_string(),
            restore_fn: "slothwatch::restore".to_string(),
            comparators: ComparatorTable::default(),
        }
    }
}

impl ConvertConfig {
    fn merge(
        &mut self,
        toml: TomlConvertConfig,
        comparators: BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        if toml.crate_name.is_some() {
            self.crate_name = toml.crate_name;
        }
        if let Some(data_module) = toml.data_module {
            self.data_module = data_module;
        }
        if let Some(test_prefix) = toml.test_prefix {
            self.test_prefix = test_prefix;
        }
        if let Some(restore_fn) = toml.restore_fn {
            self.restore_fn = restore_fn;
        }
        if let Some(fallback) = toml.fallback {
            self.comparators.set_fallback(fallback);
        }
        for (type_name, raw) in comparators {
            let comparator =
                raw.parse::<Comparator>()
                    .map_err(|reason| ConfigError::Invalid {
                        key: format!("comparators.\"{type_name}\""),
                        value: raw.clone(),
                        reason,
                    })?;
            self.comparators.insert(type_name, comparator);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub watch: WatchConfig,
    pub convert: ConvertConfig,
}

impl Config {
    /// Parse a config file and merge it over the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let toml_config: TomlConfig = toml::from_str(contents)?;
        let mut config = Config::default();

        if let Some(watch) = toml_config.watch {
            config.watch.merge(watch);
        }
        config.convert.merge(
            toml_config.convert.unwrap_or_default(),
            toml_config.comparators.unwrap_or_default(),
        )?;

        Ok(config)
    }
}

/// TOML representation of `[watch]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlWatchConfig {
    pub instance_id: Option<String>,
    pub snapshot_id: Option<String>,
    pub state: Option<SessionState>,
    pub dump_iter_count: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub capture_call_stack: Option<bool>,
}

/// TOML representation of `[convert]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConvertConfig {
    pub crate_name: Option<String>,
    pub data_module: Option<String>,
    pub test_prefix: Option<String>,
    pub restore_fn: Option<String>,
    pub fallback: Option<FallbackPolicy>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub watch: Option<TomlWatchConfig>,
    pub convert: Option<TomlConvertConfig>,
    /// Type name to comparator spec (`eq`, `method:<name>`, `fn:<path>`).
    pub comparators: Option<BTreeMap<String, String>>,
}
