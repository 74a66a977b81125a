//! # metrics
//!
//! process wide counters for transactions, artifacts and teardown
#![allow(missing_docs)] // lazy_static items dont play nicely with docstrings

use lazy_static::lazy_static;
use prometheus::{Histogram, IntCounter, register_histogram, register_int_counter};

use crate::unit::TimedUnit;

lazy_static! {
    /// transactions started
    pub static ref TXN_STARTED: IntCounter = register_int_counter!("txn_started", "transactions started").unwrap();
    /// transactions completed successfully
    pub static ref TXN_PASSED: IntCounter = register_int_counter!("txn_passed", "transactions completed successfully").unwrap();
    /// transactions completed with a failure
    pub static ref TXN_FAILED: IntCounter = register_int_counter!("txn_failed", "transactions completed with a failure").unwrap();
    /// transactions still open at teardown and failed by it
    pub static ref TXN_ABANDONED: IntCounter = register_int_counter!("txn_abandoned", "transactions failed by teardown").unwrap();

    /// histogram of completed transaction durations
    pub static ref TXN_DURATION: Histogram = register_histogram!(
        "txn_duration",
        "transaction duration (seconds)"
    )
    .unwrap();

    /// explicit or buffered artifact writes that failed
    pub static ref ARTIFACT_WRITE_FAILURES: IntCounter = register_int_counter!("artifact_write_failures", "artifact writes that failed").unwrap();
    /// teardown steps that failed
    pub static ref TEARDOWN_STEP_FAILURES: IntCounter = register_int_counter!("teardown_step_failures", "teardown steps that failed").unwrap();
}

/// record a completed unit
pub(crate) fn observe(unit: &TimedUnit) {
    if unit.success() {
        TXN_PASSED.inc();
    } else {
        TXN_FAILED.inc();
    }
    TXN_DURATION.observe(unit.elapsed_ms().max(0) as f64 / 1_000.0);
}
