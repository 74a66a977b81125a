//! txn-core prelude

pub use crate::{
    AggregateSnapshot, Category, Outcome, Run, TimedUnit, TxnError,
    anyhow::{self, Context, Result},
    config::RunConfig,
    named_counter::NamedCounter,
    select::{Renamer, Selector},
    teardown::{SummarySink, TeardownReport},
    tracing::{self, debug, error, info, instrument, trace, warn},
};

pub use std::sync::Arc;
