//! Core type definitions shared by the probe client and the rendezvous server.
//!
//! These types prevent common logic errors by making invalid states unrepresentable
//! at compile time: an [`Announcement`] can never carry the wildcard address,
//! a [`Token`] is never empty.

mod address;
mod attempt_id;
mod outcome;
mod token;

pub use address::{AddressError, AddressFamily, AddressSpec, Announcement};
pub use attempt_id::{AttemptId, AttemptIdError};
pub use outcome::{DetectionOutcome, Peer};
pub use token::{Token, TokenGenerator, DEFAULT_TOKEN_LENGTH};
