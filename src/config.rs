use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::sprite_manager::UidPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptConfig {
    #[serde(default = "ScriptConfig::default_main_script")]
    pub main_script: PathBuf,
    #[serde(default)]
    pub hot_reload: bool,
    #[serde(default)]
    pub deterministic_seed: Option<u64>,
    #[serde(default = "ScriptConfig::default_max_operations")]
    pub max_operations: u64,
    #[serde(default = "ScriptConfig::default_max_call_levels")]
    pub max_call_levels: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LevelConfig {
    #[serde(default = "LevelConfig::default_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub uid_policy: UidPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub script: ScriptConfig,
    #[serde(default)]
    pub level: LevelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub level: Option<PathBuf>,
    pub script: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl ScriptConfig {
    fn default_main_script() -> PathBuf {
        PathBuf::from("assets/scripts/demo.rhai")
    }

    const fn default_max_operations() -> u64 {
        500_000
    }

    const fn default_max_call_levels() -> usize {
        64
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            main_script: Self::default_main_script(),
            hot_reload: false,
            deterministic_seed: None,
            max_operations: Self::default_max_operations(),
            max_call_levels: Self::default_max_call_levels(),
        }
    }
}

impl LevelConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("assets/levels/demo.json")
    }
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self { path: Self::default_path(), uid_policy: UidPolicy::default() }
    }
}

impl LoggingConfig {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: Self::default_filter() }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "config_fallback_to_defaults");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(level) = &overrides.level {
            self.level.path = level.clone();
        }
        if let Some(script) = &overrides.script {
            self.script.main_script = script.clone();
        }
        if let Some(seed) = overrides.seed {
            self.script.deterministic_seed = Some(seed);
        }
    }
}

impl AppConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.level.is_none() && self.script.is_none() && self.seed.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.level.is_some() {
            fields.push("level");
        }
        if self.script.is_some() {
            fields.push("script");
        }
        if self.seed.is_some() {
            fields.push("seed");
        }
        fields
    }
}
