use crate::validate::{CommandBuilder, DEFAULT_ENGINE, DEFAULT_TIMEOUT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use texpack_resolve::ResolveConfig;

pub const PROJECT_CONFIG_NAME: &str = ".texpack.json";

/// Settings for an archive run.
///
/// Layered lowest to highest: built-in defaults, the user file
/// (`<config dir>/texpack/config.json`), the project file
/// (`<root>/.texpack.json`), then command-line flags applied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    #[serde(flatten)]
    pub resolve: ResolveConfig,
    pub validate: bool,
    pub engine: String,
    pub timeout_secs: u64,
    pub lockfile: bool,
    pub include_bbl: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            resolve: ResolveConfig::default(),
            validate: false,
            engine: DEFAULT_ENGINE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            lockfile: false,
            include_bbl: false,
        }
    }
}

impl ArchiveConfig {
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("texpack").join("config.json"))
    }

    /// Defaults overlaid with the user and project config files that exist.
    pub fn load(root: &Path) -> Result<Self> {
        let mut layers = Vec::new();
        if let Some(user) = Self::user_config_path() {
            layers.push(user);
        }
        layers.push(root.join(PROJECT_CONFIG_NAME));
        Self::from_layers(&layers)
    }

    /// Overlays each existing file in order; later files win key by key.
    pub fn from_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;
        for path in paths {
            if !path.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let layer: Value = serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in config {}", path.display()))?;
            log::debug!("Loaded config layer {}", path.display());
            merge(&mut merged, layer);
        }
        let config = serde_json::from_value(merged).context("Invalid configuration")?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn builder(&self) -> CommandBuilder {
        CommandBuilder::for_engine(&self.engine).with_timeout(self.timeout())
    }
}

fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, layer) => *base = layer,
    }
}
