//! Session token generation

use crate::types::SessionId;
use chrono::{DateTime, Local};
use rand::Rng;
use tracing::debug;

/// Upper bound (inclusive) of the random component
const RANDOM_MAX: u32 = 99_999_999;

/// Mints session tokens.
///
/// The pre-hash source is `YYYYDDMMHHMMSS` local time, a 4-digit fraction of
/// the current second and an 8-digit random number, hashed with BLAKE3.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierGenerator;

impl IdentifierGenerator {
    /// Create a generator
    pub fn new() -> Self {
        Self
    }

    /// Mint a fresh token
    pub fn generate(&self) -> SessionId {
        let source = Self::source(Local::now(), rand::thread_rng().gen_range(0..=RANDOM_MAX));
        let id = SessionId::from_digest(blake3::hash(source.as_bytes()));
        debug!("Generated new session id {}", id);
        id
    }

    /// Build the pre-hash source string
    fn source(now: DateTime<Local>, random: u32) -> String {
        // Ten-thousandths of a second, always below 10_000
        let fraction = now.timestamp_subsec_micros().min(999_999) / 100;
        format!("{}{:04}{:08}", now.format("%Y%d%m%H%M%S"), fraction, random)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_source_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap()
            + chrono::Duration::microseconds(123_456);
        let source = IdentifierGenerator::source(at, 42);

        assert_eq!(source, "20240703090502123400000042");
        assert_eq!(source.len(), 14 + 4 + 8);
    }

    #[test]
    fn test_generated_token_is_valid() {
        let id = IdentifierGenerator::new().generate();
        assert!(SessionId::validate(id.as_str()));
    }

    #[test]
    fn test_consecutive_tokens_differ() {
        let generator = IdentifierGenerator::new();
        let mut previous = generator.generate();
        for _ in 0..10_000 {
            let next = generator.generate();
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn test_tokens_unique_within_batch() {
        let generator = IdentifierGenerator::new();
        let ids: HashSet<_> = (0..1_000).map(|_| generator.generate()).collect();
        assert_eq!(ids.len(), 1_000);
    }
}
