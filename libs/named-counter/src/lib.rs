//! # named-counter
//!
//! A table of independent, monotonically increasing counters keyed by name.
//! Handles are cheap to clone and every clone shares the same table, so one
//! instance can be handed to many concurrent runs. Counters for unrelated keys
//! never block each other: the table is sharded and each counter is its own
//! atomic.
#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use thiserror::Error;
use tracing::trace;

/// Errors returned by counter operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CounterError {
    /// the counter key was empty
    #[error("invalid argument: counter key must not be empty")]
    InvalidArgument,
}

/// Shorthand result alias for counter operations.
pub type Result<T> = std::result::Result<T, CounterError>;

/// Shared table of named counters
///
/// # Examples
/// ```
/// let counters = named_counter::NamedCounter::new();
/// assert_eq!(counters.get_next("shots").unwrap(), 1);
/// assert_eq!(counters.get_next("shots").unwrap(), 2);
/// assert_eq!(counters.read_count("other").unwrap(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NamedCounter {
    counters: Arc<DashMap<String, AtomicU64>>,
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CounterError::InvalidArgument);
    }
    Ok(())
}

impl NamedCounter {
    /// Create an empty counter table
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for `key` and return the new value. Unknown keys
    /// start at 0, so the first call returns 1.
    pub fn get_next(&self, key: &str) -> Result<u64> {
        check_key(key)?;
        // existing counters only need the shard's read lock
        if let Some(counter) = self.counters.get(key) {
            return Ok(counter.fetch_add(1, Ordering::AcqRel) + 1);
        }
        let counter = self
            .counters
            .entry(key.to_owned())
            .or_insert_with(AtomicU64::default);
        let next = counter.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(key, next, "created counter");
        Ok(next)
    }

    /// Current value for `key` without modifying it, 0 for unknown keys
    pub fn read_count(&self, key: &str) -> Result<u64> {
        check_key(key)?;
        Ok(self
            .counters
            .get(key)
            .map(|counter| counter.load(Ordering::Acquire))
            .unwrap_or(0))
    }

    /// Set the counter for `key` back to 0. Unknown keys are left absent.
    pub fn reset(&self, key: &str) -> Result<()> {
        check_key(key)?;
        if let Some(counter) = self.counters.get(key) {
            counter.store(0, Ordering::Release);
        }
        Ok(())
    }

    /// Delete the counter for `key`, returning its last value if it existed
    pub fn remove(&self, key: &str) -> Result<Option<u64>> {
        check_key(key)?;
        Ok(self
            .counters
            .remove(key)
            .map(|(_, counter)| counter.into_inner()))
    }

    /// Delete every counter
    pub fn clear(&self) {
        self.counters.clear();
    }

    /// Number of counters currently in the table
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the table holds no counters
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, thread};

    use super::*;

    #[test]
    fn test_sequential_next() {
        let counters = NamedCounter::new();
        let got = (0..100)
            .map(|_| counters.get_next("k").unwrap())
            .collect::<Vec<_>>();
        assert_eq!(got, (1..=100).collect::<Vec<_>>());
        assert_eq!(counters.read_count("k").unwrap(), 100);
    }

    #[test]
    fn test_keys_are_independent() {
        let counters = NamedCounter::new();
        assert_eq!(counters.get_next("a").unwrap(), 1);
        assert_eq!(counters.get_next("a").unwrap(), 2);
        assert_eq!(counters.get_next("b").unwrap(), 1);
        assert_eq!(counters.read_count("a").unwrap(), 2);
        assert_eq!(counters.read_count("missing").unwrap(), 0);
        // reading does not create the key
        assert_eq!(counters.len(), 2);
    }

    #[test]
    fn test_concurrent_next_is_unique() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;
        let counters = NamedCounter::new();

        let handles = (0..THREADS)
            .map(|_| {
                let counters = counters.clone();
                thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|_| counters.get_next("shared").unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        let mut seen = HashSet::new();
        for handle in handles {
            for n in handle.join().unwrap() {
                assert!(seen.insert(n), "duplicate value {n}");
            }
        }
        assert_eq!(seen.len(), THREADS * PER_THREAD);
        assert_eq!(
            counters.read_count("shared").unwrap(),
            (THREADS * PER_THREAD) as u64
        );
    }

    #[test]
    fn test_concurrent_distinct_keys() {
        let counters = NamedCounter::new();
        let handles = (0..16)
            .map(|i| {
                let counters = counters.clone();
                thread::spawn(move || {
                    let key = format!("key-{i}");
                    for _ in 0..250 {
                        counters.get_next(&key).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        for i in 0..16 {
            assert_eq!(counters.read_count(&format!("key-{i}")).unwrap(), 250);
        }
    }

    #[test]
    fn test_reset_remove_clear() {
        let counters = NamedCounter::new();
        counters.get_next("a").unwrap();
        counters.get_next("a").unwrap();
        counters.get_next("b").unwrap();

        counters.reset("a").unwrap();
        assert_eq!(counters.read_count("a").unwrap(), 0);
        assert_eq!(counters.get_next("a").unwrap(), 1);

        assert_eq!(counters.remove("b").unwrap(), Some(1));
        assert_eq!(counters.remove("b").unwrap(), None);
        assert_eq!(counters.get_next("b").unwrap(), 1);

        counters.clear();
        assert!(counters.is_empty());
        assert_eq!(counters.get_next("a").unwrap(), 1);
    }

    #[test]
    fn test_empty_key_rejected() {
        let counters = NamedCounter::new();
        assert_eq!(counters.get_next(""), Err(CounterError::InvalidArgument));
        assert_eq!(counters.read_count(""), Err(CounterError::InvalidArgument));
        assert_eq!(counters.reset(""), Err(CounterError::InvalidArgument));
        assert_eq!(counters.remove(""), Err(CounterError::InvalidArgument));
    }
}
