//! Configuration loading and store factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use spacedrep_core::engine::SchedulingPolicy;
use spacedrep_core::grading::QualityMapping;
use spacedrep_core::store::CardStore;
use spacedrep_core::SchedulerConfig;

use crate::json::JsonFileStore;
use crate::memory::InMemoryCardStore;

/// Which card store backend to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    Json {
        #[serde(default = "default_store_path")]
        path: String,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Json {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "./spacedrep-data.json".to_string()
}

/// Defaults for session requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    pub max_size: usize,
    pub new_card_ratio: f64,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            max_size: 20,
            new_card_ratio: 0.2,
        }
    }
}

/// Top-level spacedrep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacedrepConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scheduling: SchedulingPolicy,
    #[serde(default)]
    pub session: SessionDefaults,
    #[serde(default)]
    pub grading: QualityMapping,
    /// Upper bound on a single store call in milliseconds.
    #[serde(default = "default_storage_timeout")]
    pub storage_timeout_ms: u64,
}

fn default_storage_timeout() -> u64 {
    5000
}

impl Default for SpacedrepConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            scheduling: SchedulingPolicy::default(),
            session: SessionDefaults::default(),
            grading: QualityMapping::default(),
            storage_timeout_ms: default_storage_timeout(),
        }
    }
}

impl SpacedrepConfig {
    /// The scheduler service settings this config describes.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            policy: self.scheduling.clone(),
            grading: self.grading.clone(),
            storage_timeout: Duration::from_millis(self.storage_timeout_ms),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `spacedrep.toml` in the current directory
/// 2. `~/.config/spacedrep/config.toml`
///
/// Environment variable override: `SPACEDREP_STORE_PATH` (switches the store
/// to the JSON backend at that path).
pub fn load_config() -> Result<SpacedrepConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<SpacedrepConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("spacedrep.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<SpacedrepConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        None => SpacedrepConfig::default(),
    };

    // Apply env var overrides
    if let Ok(path) = std::env::var("SPACEDREP_STORE_PATH") {
        config.store = StoreConfig::Json { path };
    }

    if let StoreConfig::Json { path } = &mut config.store {
        *path = resolve_env_vars(path);
    }

    config
        .scheduling
        .validate()
        .context("invalid [scheduling] config")?;
    config
        .grading
        .validate(&config.scheduling)
        .context("invalid [grading] config")?;
    if !(0.0..=1.0).contains(&config.session.new_card_ratio) {
        anyhow::bail!(
            "invalid [session] config: new_card_ratio must be between 0.0 and 1.0, got {}",
            config.session.new_card_ratio
        );
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("spacedrep"))
}

/// Create a store instance from its configuration.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn CardStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(InMemoryCardStore::new())),
        StoreConfig::Json { path } => {
            let store = JsonFileStore::open(path)
                .with_context(|| format!("failed to open store: {path}"))?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_SPACEDREP_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_SPACEDREP_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_SPACEDREP_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("no_close_${brace"), "no_close_${brace");
        std::env::remove_var("_SPACEDREP_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = SpacedrepConfig::default();
        assert_eq!(config.session.max_size, 20);
        assert_eq!(config.session.new_card_ratio, 0.2);
        assert_eq!(config.storage_timeout_ms, 5000);
        assert!(matches!(config.store, StoreConfig::Json { .. }));
        assert_eq!(
            config.scheduler_config().storage_timeout,
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
storage_timeout_ms = 250

[store]
type = "memory"

[scheduling]
min_ease = 1.5
second_interval_days = 4

[session]
max_size = 30

[grading]
correct = 4
"#;
        let config: SpacedrepConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store, StoreConfig::Memory);
        assert_eq!(config.scheduling.min_ease, 1.5);
        assert_eq!(config.scheduling.second_interval_days, 4);
        assert_eq!(config.scheduling.initial_ease, 2.5);
        assert_eq!(config.session.max_size, 30);
        assert_eq!(config.session.new_card_ratio, 0.2);
        assert_eq!(config.grading.correct, 4);
        assert_eq!(config.grading.incorrect, 2);
        assert_eq!(config.storage_timeout_ms, 250);
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spacedrep.toml");
        std::fs::write(
            &path,
            "[store]\ntype = \"json\"\npath = \"/tmp/cards.json\"\n",
        )
        .unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        if std::env::var("SPACEDREP_STORE_PATH").is_err() {
            assert_eq!(
                config.store,
                StoreConfig::Json {
                    path: "/tmp/cards.json".into()
                }
            );
        }
    }

    #[test]
    fn invalid_policy_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[session]\nnew_card_ratio = 2.0\n").unwrap();
        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("new_card_ratio"));

        std::fs::write(&path, "[scheduling]\ninitial_ease = 1.0\n").unwrap();
        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("[scheduling]"));
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let err = load_config_from(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn create_memory_store() {
        let store = create_store(&StoreConfig::Memory).unwrap();
        assert_eq!(store.name(), "memory");
    }
}
