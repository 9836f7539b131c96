//! Application settings and paths.
//!
//! The settings file is JSON. Probe fields sit at the top level using the
//! same names as the DDNS configuration record (`serverIP`, `serverPort`,
//! `timeout`, `clientIP`) plus `responseTimeout`; server and watch settings
//! live in nested objects.

use crate::error::{ConfigError, ConfigResult};
use crate::probe::RESPONSE_TIMEOUT;
use crate::server::DEFAULT_PORT;
use crate::types::DEFAULT_TOKEN_LENGTH;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/reachback)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve paths using XDG directories.
    pub fn new() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "reachback", "reachback")
            .ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Probe client settings as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Rendezvous server host name or IP literal.
    #[serde(rename = "serverIP")]
    pub server_ip: String,
    /// Rendezvous server port.
    #[serde(rename = "serverPort")]
    pub server_port: u16,
    /// Callback wait in seconds.
    pub timeout: u64,
    /// Candidate address to test.
    #[serde(rename = "clientIP")]
    pub client_ip: String,
    /// Wait for the server's response in seconds.
    #[serde(rename = "responseTimeout")]
    pub response_timeout: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            server_ip: String::new(),
            server_port: DEFAULT_PORT,
            timeout: 10,
            client_ip: String::new(),
            response_timeout: RESPONSE_TIMEOUT.as_secs(),
        }
    }
}

impl ProbeSettings {
    /// Settings with every field unset, for use as an override set.
    pub fn empty() -> Self {
        Self {
            server_ip: String::new(),
            server_port: 0,
            timeout: 0,
            client_ip: String::new(),
            response_timeout: 0,
        }
    }

    /// Replace fields with those of `overrides` that are set
    /// (non-empty strings, non-zero numbers).
    pub fn overridden_by(mut self, overrides: &ProbeSettings) -> Self {
        if !overrides.server_ip.is_empty() {
            self.server_ip = overrides.server_ip.clone();
        }
        if overrides.server_port != 0 {
            self.server_port = overrides.server_port;
        }
        if overrides.timeout != 0 {
            self.timeout = overrides.timeout;
        }
        if !overrides.client_ip.is_empty() {
            self.client_ip = overrides.client_ip.clone();
        }
        if overrides.response_timeout != 0 {
            self.response_timeout = overrides.response_timeout;
        }
        self
    }

    /// Validate and convert into the typed record used by a probe session.
    pub fn into_config(self) -> ConfigResult<ProbeConfig> {
        let server_host = self.server_ip.trim().to_string();
        if server_host.is_empty() {
            return Err(ConfigError::Missing("serverIP"));
        }
        if self.server_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "serverPort",
                reason: "port must be non-zero".to_string(),
            });
        }
        if self.timeout == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout",
                reason: "timeout must be at least 1 second".to_string(),
            });
        }
        if self.response_timeout == 0 {
            return Err(ConfigError::InvalidValue {
                field: "responseTimeout",
                reason: "timeout must be at least 1 second".to_string(),
            });
        }
        let client_ip = self.client_ip.trim();
        if client_ip.is_empty() {
            return Err(ConfigError::Missing("clientIP"));
        }
        let client_ip: IpAddr = client_ip
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                field: "clientIP",
                reason: format!("'{}' is not an IP address", client_ip),
            })?;

        Ok(ProbeConfig {
            server_host,
            server_port: self.server_port,
            timeout: Duration::from_secs(self.timeout),
            client_ip,
            response_timeout: Duration::from_secs(self.response_timeout),
        })
    }
}

/// Validated input record for one probe session.
///
/// Treated as read-only by the core; callers re-fetch it between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Rendezvous server host name or IP literal.
    pub server_host: String,
    /// Rendezvous server port.
    pub server_port: u16,
    /// Bound on the wait for the callback connection.
    pub timeout: Duration,
    /// Candidate IP to bind and announce.
    pub client_ip: IpAddr,
    /// Bound on the server's response on the control connection.
    pub response_timeout: Duration,
}

impl ProbeConfig {
    /// Create a configuration record.
    pub fn new(
        server_host: impl Into<String>,
        server_port: u16,
        timeout: Duration,
        client_ip: IpAddr,
    ) -> Self {
        Self {
            server_host: server_host.into(),
            server_port,
            timeout,
            client_ip,
            response_timeout: RESPONSE_TIMEOUT,
        }
    }

    /// Same record with a different response bound.
    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    /// Same record with a different candidate IP.
    pub fn with_client_ip(mut self, client_ip: IpAddr) -> Self {
        self.client_ip = client_ip;
        self
    }

    /// `host:port` of the server for display. IPv6 literals are bracketed.
    pub fn server_display(&self) -> String {
        if self.server_host.contains(':') && !self.server_host.starts_with('[') {
            format!("[{}]:{}", self.server_host, self.server_port)
        } else {
            format!("{}:{}", self.server_host, self.server_port)
        }
    }
}

/// Rendezvous server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to accept control connections on.
    pub listen: SocketAddr,
    /// Bound on each blocking step of a callback attempt, in seconds.
    pub step_timeout_secs: u64,
    /// Length of generated tokens.
    pub token_length: usize,
    /// Maximum number of connections processed concurrently.
    pub max_workers: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            step_timeout_secs: 5,
            token_length: DEFAULT_TOKEN_LENGTH,
            max_workers: 64,
        }
    }
}

impl ServerSettings {
    /// Per-step timeout as a duration (never zero).
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs.max(1))
    }

    /// Longest time between receiving an announcement and answering it:
    /// one connect-back step plus one token write step.
    pub fn response_delay_bound(&self) -> Duration {
        self.step_timeout() * 2
    }
}

/// Re-detection loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Seconds between detection attempts.
    pub interval_secs: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

/// Application-wide settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Probe client settings (top-level fields).
    #[serde(flatten)]
    pub probe: ProbeSettings,
    /// Rendezvous server settings.
    pub server: ServerSettings,
    /// Watch loop settings.
    pub watch: WatchSettings,
}

impl AppSettings {
    /// Load settings from the default location, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::new()?.settings_file();

        if !file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from `path` if given, otherwise from the default location.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(serde_json::from_str(&content)?)
    }
}
