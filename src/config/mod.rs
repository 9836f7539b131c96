//! Configuration management for reachback.
//!
//! Provides XDG-compliant settings storage, the typed configuration record
//! consumed by the probe client, and the [`ConfigSource`] abstraction the
//! watch loop re-fetches between attempts.

mod settings;
mod source;

pub use settings::{
    AppSettings, Paths, ProbeConfig, ProbeSettings, ServerSettings, WatchSettings,
};
pub use source::{ConfigSource, FileConfigSource, StaticConfigSource};
