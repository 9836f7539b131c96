//! Configuration sources.
//!
//! The core consumes an opaque [`ProbeConfig`] record. Where it comes from
//! (a file, a DDNS service, a fixed value) is hidden behind [`ConfigSource`].

use super::settings::{AppSettings, ProbeConfig, ProbeSettings};
use crate::error::ConfigResult;
use async_trait::async_trait;
use std::path::PathBuf;

/// Supplies the configuration record for the next detection attempt.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch a fresh configuration record.
    async fn fetch(&self) -> ConfigResult<ProbeConfig>;
}

/// Re-reads a JSON settings file on every fetch, then applies overrides.
pub struct FileConfigSource {
    path: Option<PathBuf>,
    overrides: ProbeSettings,
}

impl FileConfigSource {
    /// Read from `path`, or from the default settings location if `None`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            overrides: ProbeSettings::empty(),
        }
    }

    /// Values that replace the file's when non-empty / non-zero.
    pub fn with_overrides(mut self, overrides: ProbeSettings) -> Self {
        self.overrides = overrides;
        self
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn fetch(&self) -> ConfigResult<ProbeConfig> {
        let path = self.path.clone();
        let settings = tokio::task::spawn_blocking(move || {
            AppSettings::load_or_default(path.as_deref())
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        settings.probe.overridden_by(&self.overrides).into_config()
    }
}

/// Always returns the same record.
pub struct StaticConfigSource(ProbeConfig);

impl StaticConfigSource {
    /// Wrap a fixed record.
    pub fn new(config: ProbeConfig) -> Self {
        Self(config)
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn fetch(&self) -> ConfigResult<ProbeConfig> {
        Ok(self.0.clone())
    }
}
