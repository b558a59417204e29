//! `arq.toml` loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use arq_core::{IdCodec, PrefixStrategy};
use arq_store::{RetryPolicy, Settings};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "arq.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            delay_secs: policy.delay.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory the workbook lives in.
    pub store_root: PathBuf,
    /// Workbook object path under `store_root`.
    pub workbook: String,
    /// Suffix digit width.
    pub digits: u32,
    pub prefix_strategy: PrefixStrategy,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("."),
            workbook: Settings::default().workbook,
            digits: IdCodec::default().digits(),
            prefix_strategy: PrefixStrategy::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Parse a config file. A relative `store_root` is taken relative to the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: Self =
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        if config.store_root.is_relative() {
            if let Some(dir) = path.parent() {
                config.store_root = dir.join(&config.store_root);
            }
        }
        Ok(config)
    }

    /// Resolve the configuration: an explicit file must exist; otherwise
    /// `arq.toml` in the working directory is used when present. Environment
    /// overrides apply last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `ARQ_STORE_ROOT` and `ARQ_WORKBOOK`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("ARQ_STORE_ROOT").filter(|v| !v.trim().is_empty()) {
            self.store_root = PathBuf::from(root);
        }
        if let Some(workbook) = lookup("ARQ_WORKBOOK").filter(|v| !v.trim().is_empty()) {
            self.workbook = workbook;
        }
    }

    /// Service settings for this configuration.
    pub fn settings(&self) -> Result<Settings> {
        let codec = IdCodec::new(self.digits).context("invalid `digits` in config")?;
        Ok(Settings {
            workbook: self.workbook.clone(),
            codec,
            strategy: self.prefix_strategy,
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                delay: Duration::from_secs(self.retry.delay_secs),
            },
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing config")
    }
}
