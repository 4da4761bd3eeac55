//! Deferred, memoized computation with fail-fast cycle detection
//!
//! A `MemoMap` caches the result of an expensive computation per key. The
//! computation runs at most once; re-entrant forcing of a key that is still
//! being computed is reported as a `CycleError` instead of recursing forever.
//!
//! The caller drives the computation explicitly:
//!
//! ```rust
//! use wf_memo::{MemoMap, Probe};
//!
//! let mut memo: MemoMap<u32, String> = MemoMap::new();
//! if let Probe::Started = memo.probe(1).unwrap() {
//!     // compute here, possibly probing other keys
//!     memo.fulfil(1, "one".to_string());
//! }
//! assert_eq!(memo.get(&1), Some(&"one".to_string()));
//! ```
//!
//! This split API (instead of a closure-taking `get_or_insert_with`) lets the
//! computation borrow the surrounding context mutably while the map itself is
//! only touched at the probe/fulfil boundaries.

use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::Hash;
use thiserror::Error;

/// Forcing a value that is already being forced
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cyclic deferred computation for key {key}")]
pub struct CycleError {
    /// Rendered key that cycled
    pub key: String,
}

/// State of one memoized slot
#[derive(Debug, Clone)]
enum Slot<V> {
    /// Computation started but not yet fulfilled
    InProgress,
    /// Computation finished
    Ready(V),
}

/// Result of probing a key
///
/// `Done` carries no payload so the caller keeps full use of the map (and of
/// whatever context the computation needs); fetch the value with [`MemoMap::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The value is already computed; read it with `get`
    Done,
    /// The slot was vacant; it is now marked in-progress and the caller
    /// must `fulfil` (or `abandon`) it
    Started,
}

/// Memoized computation cache keyed by `K`
#[derive(Debug, Clone)]
pub struct MemoMap<K, V> {
    slots: FxHashMap<K, Slot<V>>,
}

impl<K: Eq + Hash + Copy + fmt::Debug, V> MemoMap<K, V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            slots: FxHashMap::default(),
        }
    }

    /// Get an already-computed value, if any
    pub fn get(&self, key: &K) -> Option<&V> {
        match self.slots.get(key) {
            Some(Slot::Ready(value)) => Some(value),
            _ => None,
        }
    }

    /// Probe a key: report the cached state, or mark the slot in-progress
    ///
    /// # Errors
    ///
    /// Returns `CycleError` if the key is already in-progress, i.e. the
    /// computation re-entered itself.
    pub fn probe(&mut self, key: K) -> Result<Probe, CycleError> {
        match self.slots.get(&key) {
            Some(Slot::InProgress) => Err(CycleError {
                key: format!("{key:?}"),
            }),
            Some(Slot::Ready(_)) => Ok(Probe::Done),
            None => {
                self.slots.insert(key, Slot::InProgress);
                Ok(Probe::Started)
            }
        }
    }

    /// Store the computed value for a key previously marked in-progress
    ///
    /// Fulfilling a slot that is not in-progress indicates a driver bug; the
    /// call returns `false` and an already-ready slot is left untouched.
    pub fn fulfil(&mut self, key: K, value: V) -> bool {
        match self.slots.get(&key) {
            Some(Slot::InProgress) => {
                self.slots.insert(key, Slot::Ready(value));
                true
            }
            _ => false,
        }
    }

    /// Drop an in-progress marker on an error path so the key can be retried
    pub fn abandon(&mut self, key: &K) {
        if matches!(self.slots.get(key), Some(Slot::InProgress)) {
            self.slots.remove(key);
        }
    }
}

impl<K: Eq + Hash + Copy + fmt::Debug, V> Default for MemoMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_then_fulfil() {
        let mut memo: MemoMap<u32, u32> = MemoMap::new();
        assert_eq!(memo.probe(7), Ok(Probe::Started));
        assert!(memo.fulfil(7, 49));
        assert_eq!(memo.probe(7), Ok(Probe::Done));
        assert_eq!(memo.get(&7), Some(&49));
    }

    #[test]
    fn test_reentrant_probe_is_cycle() {
        let mut memo: MemoMap<u32, u32> = MemoMap::new();
        assert_eq!(memo.probe(1), Ok(Probe::Started));
        let err = memo.probe(1).unwrap_err();
        assert!(err.key.contains('1'));
    }

    #[test]
    fn test_abandon_allows_retry() {
        let mut memo: MemoMap<u32, u32> = MemoMap::new();
        assert_eq!(memo.probe(3), Ok(Probe::Started));
        memo.abandon(&3);
        assert_eq!(memo.probe(3), Ok(Probe::Started));
    }

    #[test]
    fn test_fulfil_without_probe_is_rejected() {
        let mut memo: MemoMap<u32, u32> = MemoMap::new();
        assert!(!memo.fulfil(9, 81));
        assert_eq!(memo.get(&9), None);
    }
}
