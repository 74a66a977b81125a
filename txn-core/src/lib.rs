//! # txn-core
//!
//! Transaction timing and result aggregation for load-test script runs.
//!
//! A [`Run`] tracks named, possibly concurrent timed operations, collects the
//! completed ones into a single [`ResultAggregate`], lets callers rename or
//! delete recorded entries in bulk, mints unique artifact names and finally
//! tears the run down without ever failing.
//!
//! ```
//! use txn_core::{Run, config::RunConfig, named_counter::NamedCounter};
//!
//! let run = Run::new(RunConfig::default(), NamedCounter::new());
//! run.start("login")?;
//! run.end("login")?;
//! run.set_completed("think", 250)?;
//! let report = run.teardown();
//! assert!(report.outcome.is_pass());
//! assert_eq!(run.aggregate().labels(), vec!["login", "think"]);
//! # Ok::<(), txn_core::TxnError>(())
//! ```
#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![allow(clippy::cognitive_complexity)]
#![deny(rustdoc::broken_intra_doc_links)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]
pub use anyhow;
pub use artifact_store;
pub use chrono;
pub use named_counter;
pub use tracing;

pub use crate::{
    aggregate::{AggregateSnapshot, ResultAggregate},
    error::{StepFailure, TxnError},
    run::Run,
    teardown::TeardownReport,
    unit::{Category, Outcome, TimedUnit},
};

pub mod aggregate;
pub mod config;
pub mod error;
pub mod metrics;
pub mod prelude;
pub mod registry;
pub mod run;
pub mod select;
pub mod teardown;
pub mod unit;
