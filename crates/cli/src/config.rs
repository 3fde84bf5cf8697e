//! Settings for the CLI
//!
//! Sources, later ones winning: built-in defaults, the settings file,
//! `CRC_*` environment variables, then command-line flags.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use reconciler_lib::{HttpInventoryClient, ReconcileOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of the environment variables read into [`ReconcileSettings`]
pub const ENV_PREFIX: &str = "CRC";

/// Connection and cycle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    /// Control plane endpoint
    pub api_url: String,
    /// Sent as the `X-API-Key` header when set
    pub api_key: Option<String>,
    pub authoritative: bool,
    pub concurrency: usize,
    pub call_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        let options = ReconcileOptions::default();
        Self {
            api_url: "http://localhost:8080".to_string(),
            api_key: None,
            authoritative: options.authoritative,
            concurrency: options.concurrency,
            call_timeout_secs: options.call_timeout.as_secs(),
            request_timeout_secs: 60,
        }
    }
}

/// Flag values that override loaded settings
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub authoritative: bool,
    pub concurrency: Option<usize>,
    pub call_timeout_secs: Option<u64>,
}

impl ReconcileSettings {
    /// Load from `path` (or the default settings file if it exists) and the
    /// environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        match path {
            Some(path) => builder = builder.add_source(File::from(path).required(true)),
            None => {
                if let Some(default) = Self::default_path() {
                    builder = builder.add_source(File::from(default).required(false));
                }
            }
        }

        let config = builder
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to load settings")?;

        config.try_deserialize().context("Failed to parse settings")
    }

    /// `~/.config/crc/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("crc").join("config.toml"))
    }

    pub fn apply(&mut self, overrides: SettingsOverrides) {
        if let Some(url) = overrides.api_url {
            self.api_url = url;
        }
        if let Some(key) = overrides.api_key {
            self.api_key = Some(key);
        }
        if overrides.authoritative {
            self.authoritative = true;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(secs) = overrides.call_timeout_secs {
            self.call_timeout_secs = secs;
        }
    }

    pub fn options(&self, dry_run: bool) -> ReconcileOptions {
        ReconcileOptions {
            authoritative: self.authoritative,
            concurrency: self.concurrency.max(1),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            dry_run,
        }
    }

    pub fn client(&self) -> Result<HttpInventoryClient> {
        let mut builder = HttpInventoryClient::builder()
            .endpoint(self.api_url.clone())
            .request_timeout(Duration::from_secs(self.request_timeout_secs));
        if let Some(key) = &self.api_key {
            builder = builder.api_key(key.clone());
        }
        builder.build().context("Failed to create control plane client")
    }
}
