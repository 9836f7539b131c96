//! # reachback - Connect-Back Reachability Checking
//!
//! reachback answers one question: can a host out on the internet open a
//! TCP connection to a given local address? A probe client listens on the
//! candidate address, announces it to a rendezvous server, and waits for
//! the server to connect back and deliver a random token.
//!
//! ## Features
//!
//! - **Probe client**: one-shot checks for a single candidate or every
//!   local interface address
//! - **Rendezvous server**: concurrent connect-back verification
//! - **Watch loop**: periodic re-detection with backoff on network errors
//! - **Multiple Output Formats**: Plain text and JSON
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use reachback::config::ProbeConfig;
//! use reachback::probe::detect;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ProbeConfig::new(
//!         "rendezvous.example.net",
//!         8066,
//!         Duration::from_secs(10),
//!         "198.51.100.7".parse().unwrap(),
//!     );
//!     let report = detect(config).await;
//!     println!("{}", report.outcome);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Addresses, tokens, attempt ids and outcomes
//! - [`protocol`] - Line framing and the server's response vocabulary
//! - [`probe`] - The client side of a detection attempt
//! - [`server`] - The rendezvous server
//! - [`watch`] - Periodic re-detection
//! - [`candidates`] - Local candidate discovery
//! - [`config`] - Settings files and configuration sources
//! - [`error`] - Error types
//! - [`output`] - Output formatting utilities

pub mod candidates;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod probe;
pub mod protocol;
pub mod server;
pub mod types;
pub mod watch;

// Re-export commonly used types
pub use config::{ConfigSource, ProbeConfig};
pub use error::{CliError, ConfigError, ProbeError};
pub use probe::{detect, ProbeReport};
pub use server::RendezvousServer;
pub use types::{AddressSpec, Announcement, DetectionOutcome, Token};
