//! Idempotency key generation for saga steps

use serde::{Deserialize, Serialize};

use crate::RunId;

/// Idempotency key for deduplicating side effects.
///
/// The engine delivers at least once, so executors derive resource keys
/// deterministically from context instead of minting random ids; the
/// same logical action then lands on the same key on every attempt.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(pub Box<str>);

impl IdempotencyKey {
    /// Key for a step's forward effect within a run
    pub fn for_step(run_id: &RunId, step_name: &str) -> Self {
        Self(format!("run:{run_id}:step:{step_name}").into_boxed_str())
    }

    /// Key for a step's compensation within a run
    pub fn for_compensation(run_id: &RunId, step_name: &str) -> Self {
        Self(format!("run:{run_id}:compensate:{step_name}").into_boxed_str())
    }

    /// Deterministic key derived from every relevant upstream identifier.
    ///
    /// All parts participate in the hash, so two keys collide only when
    /// every input matches; a partial overlap (same flight, different
    /// rental) yields a distinct key.
    pub fn derive(parts: &[&str]) -> Self {
        // FNV-1a, stable across processes and runs
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
        let mut hash = FNV_OFFSET;
        for part in parts {
            for byte in part.as_bytes() {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
            // Separator keeps ["ab","c"] and ["a","bc"] distinct
            hash ^= 0x1f;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        Self(format!("{hash:016x}").into_boxed_str())
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        let a = IdempotencyKey::derive(&["LHR", "JFK"]);
        let b = IdempotencyKey::derive(&["LHR", "JFK"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_uses_every_part() {
        let both = IdempotencyKey::derive(&["F123", "C456"]);
        assert_ne!(both, IdempotencyKey::derive(&["F123", "C457"]));
        assert_ne!(both, IdempotencyKey::derive(&["F124", "C456"]));
        assert_ne!(both, IdempotencyKey::derive(&["F123"]));
    }

    #[test]
    fn test_part_boundaries_matter() {
        assert_ne!(
            IdempotencyKey::derive(&["ab", "c"]),
            IdempotencyKey::derive(&["a", "bc"])
        );
    }
}
