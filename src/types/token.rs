//! Random liveness tokens pushed over the connect-back connection.
//!
//! A token only proves that bytes arrived. It is not a credential.

use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use rand::Rng;
use std::fmt;

/// Default token length in characters.
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// A random alphanumeric token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Get the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the token bytes as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Token length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the token is empty (never true for generated tokens).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates fixed-length tokens from the 62-symbol alphanumeric alphabet.
///
/// Owned by the rendezvous server and shared by reference with its
/// workers. Each call draws fresh bytes from the OS entropy source, so
/// consecutive tokens are independent.
#[derive(Debug, Clone, Copy)]
pub struct TokenGenerator {
    length: usize,
}

impl TokenGenerator {
    /// Create a generator producing tokens of `length` characters.
    ///
    /// A length of 0 is raised to 1: an empty token would leave the
    /// callback connection without payload.
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }

    /// Configured token length.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Generate a fresh token.
    pub fn generate(&self) -> Token {
        self.generate_with(&mut OsRng)
    }

    /// Generate a token from a caller-supplied random source.
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Token {
        Token(Alphanumeric.sample_string(rng, self.length))
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_length() {
        let token = TokenGenerator::default().generate();
        assert_eq!(token.len(), 32);
    }

    #[test]
    fn test_alphabet() {
        let token = TokenGenerator::new(256).generate();
        assert!(token.as_str().bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_consecutive_tokens_differ() {
        let generator = TokenGenerator::default();
        let a = generator.generate();
        let b = generator.generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_length_is_raised() {
        let generator = TokenGenerator::new(0);
        assert_eq!(generator.length(), 1);
        assert!(!generator.generate().is_empty());
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let generator = TokenGenerator::new(16);
        let a = generator.generate_with(&mut StdRng::seed_from_u64(7));
        let b = generator.generate_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
