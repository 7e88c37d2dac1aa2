//! Infrastructure implementation of the `ConfigStore` port.
//!
//! YAML file at `~/.flotilla/config.yaml` (path override via the
//! `FLOTILLA_CONFIG` environment variable). Disk I/O runs under
//! `tokio::task::spawn_blocking`; `FLOTILLA_BASE_URL` and
//! `FLOTILLA_API_KEY` override the file's server settings at load time.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::config::FlotillaConfig;

/// Production implementation of `ConfigStore` that uses a YAML file on disk.
pub struct YamlConfigStore {
    path: PathBuf,
}

impl YamlConfigStore {
    /// Create a config store at the default (or `FLOTILLA_CONFIG`) path.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        if let Ok(val) = std::env::var("FLOTILLA_CONFIG") {
            return Ok(Self::with_path(PathBuf::from(val)));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::with_path(home.join(".flotilla").join("config.yaml")))
    }

    /// Create a config store with an explicit path (used in tests).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the file contents only, environment overrides skipped.
    /// `config set` edits through this so `FLOTILLA_BASE_URL` /
    /// `FLOTILLA_API_KEY` never get baked into the saved file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_for_edit(&self) -> Result<FlotillaConfig> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || YamlConfigStore::with_path(path).load_file_sync())
            .await
            .context("config load task panicked")?
    }

    fn load_file_sync(&self) -> Result<FlotillaConfig> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)
                .with_context(|| format!("cannot read {}", self.path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("cannot parse {}", self.path.display()))
        } else {
            Ok(FlotillaConfig::default())
        }
    }

    fn load_sync(&self) -> Result<FlotillaConfig> {
        let mut config = self.load_file_sync()?;
        if let Ok(url) = std::env::var("FLOTILLA_BASE_URL") {
            if !url.is_empty() {
                config.server.base_url = Some(url);
            }
        }
        if let Ok(key) = std::env::var("FLOTILLA_API_KEY") {
            if !key.is_empty() {
                config.server.api_key = Some(key);
            }
        }
        Ok(config)
    }

    fn save_sync(&self, config: &FlotillaConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(config).context("cannot serialize config")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("cannot write {}", self.path.display()))?;

        // the file may hold an API key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("cannot set permissions on {}", self.path.display()))?;
        }
        Ok(())
    }
}

impl ConfigStore for YamlConfigStore {
    async fn load_async(&self) -> Result<FlotillaConfig> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || YamlConfigStore::with_path(path).load_sync())
            .await
            .context("config load task panicked")?
    }

    async fn save_async(&self, config: &FlotillaConfig) -> Result<()> {
        let path = self.path.clone();
        let config = config.clone();
        tokio::task::spawn_blocking(move || YamlConfigStore::with_path(path).save_sync(&config))
            .await
            .context("config save task panicked")?
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }
}
