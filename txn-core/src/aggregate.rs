//! The run level result: ordered completed units plus overall status
//!
//! All mutation of the subresult list (append, bulk rename, bulk delete)
//! happens under a single lock. A bulk operation reads, computes and swaps in
//! one critical section, so concurrent bulk operations on disjoint selections
//! never lose or duplicate entries, and a unit appended while a bulk pass is
//! running is only seen by the next pass.
//!
//! Appending never stamps the run's end time; only [`ResultAggregate::finalize`]
//! does, exactly once.
//!
//! Selectors and renamers run while the list is locked and must not call back
//! into the aggregate.
use std::sync::{
    OnceLock,
    atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::{
    error::{Result, TxnError},
    select::{Renamer, Selector},
    unit::{Category, Outcome, TimedUnit},
};

#[derive(Debug)]
struct Status {
    success: bool,
    response_code: String,
    response_message: String,
    category: Category,
}

/// One run's result tree
#[derive(Debug)]
pub struct ResultAggregate {
    name: String,
    start_time: DateTime<Utc>,
    end_time: OnceLock<DateTime<Utc>>,
    forced_fail: AtomicBool,
    status: Mutex<Status>,
    subresults: Mutex<Vec<TimedUnit>>,
}

/// Point in time copy of a [`ResultAggregate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateSnapshot {
    /// run name
    pub name: String,
    /// category of the run record, `Parent` once finalized
    pub category: Category,
    /// when the run started
    pub start_time: DateTime<Utc>,
    /// when the run was finalized
    pub end_time: Option<DateTime<Utc>>,
    /// overall status
    pub success: bool,
    /// overall response code
    pub response_code: String,
    /// overall response message
    pub response_message: String,
    /// whether the run was explicitly failed
    pub forced_fail: bool,
    /// completed units in completion order
    pub subresults: Vec<TimedUnit>,
}

impl AggregateSnapshot {
    /// run duration in milliseconds, 0 until finalized
    pub fn elapsed_ms(&self) -> i64 {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
            .unwrap_or(0)
    }

    /// labels of all subresults, in order
    pub fn labels(&self) -> Vec<&str> {
        self.subresults.iter().map(TimedUnit::label).collect()
    }
}

impl ResultAggregate {
    /// New, empty, not yet finalized run result starting now
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_time: Utc::now(),
            end_time: OnceLock::new(),
            forced_fail: AtomicBool::new(false),
            status: Mutex::new(Status {
                success: true,
                response_code: String::new(),
                response_message: String::new(),
                category: Category::Transaction,
            }),
            subresults: Mutex::new(Vec::new()),
        }
    }

    /// run name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// when the run started
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// when the run was finalized, if it has been
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time.get().copied()
    }

    /// add a completed unit to the end of the list
    pub fn append(&self, unit: TimedUnit) {
        trace!(label = unit.label(), "appending subresult");
        self.subresults.lock().push(unit);
    }

    /// number of completed units
    pub fn len(&self) -> usize {
        self.subresults.lock().len()
    }

    /// whether no unit has completed yet
    pub fn is_empty(&self) -> bool {
        self.subresults.lock().is_empty()
    }

    /// copy of the completed units
    pub fn subresults(&self) -> Vec<TimedUnit> {
        self.subresults.lock().clone()
    }

    /// Relabel every selected unit in place, returns how many were renamed.
    /// If any computed label is blank nothing is renamed and
    /// [`TxnError::InvalidArgument`] is returned.
    pub fn rename_matching<S, R>(&self, selector: &S, renamer: &R) -> Result<usize>
    where
        S: Selector + ?Sized,
        R: Renamer + ?Sized,
    {
        let mut guard = self.subresults.lock();
        // compute every new label before touching the list
        let renames = guard
            .iter()
            .enumerate()
            .filter(|(_, unit)| selector.matches(unit))
            .map(|(idx, unit)| (idx, renamer.rename(unit)))
            .collect::<Vec<_>>();
        if let Some((idx, _)) = renames.iter().find(|(_, label)| label.trim().is_empty()) {
            warn!(label = guard[*idx].label(), "rename would blank a label, nothing renamed");
            return Err(TxnError::InvalidArgument("rename would leave a blank label"));
        }
        for (idx, label) in &renames {
            debug!(from = guard[*idx].label(), to = %label, "renaming subresult");
            guard[*idx].label.clone_from(label);
        }
        Ok(renames.len())
    }

    /// Remove every selected unit, returns how many were removed
    pub fn delete_matching<S>(&self, selector: &S) -> usize
    where
        S: Selector + ?Sized,
    {
        let mut guard = self.subresults.lock();
        let kept = guard
            .iter()
            .filter(|unit| !selector.matches(unit))
            .cloned()
            .collect::<Vec<_>>();
        let removed = guard.len() - kept.len();
        *guard = kept;
        if removed > 0 {
            debug!(removed, remaining = guard.len(), "deleted subresults");
        }
        removed
    }

    /// Mark the run failed regardless of its subresults
    pub fn force_fail(&self) {
        if !self.forced_fail.swap(true, Ordering::AcqRel) {
            debug!(run = %self.name, "run forced to fail");
        }
    }

    /// whether [`force_fail`](Self::force_fail) was called
    pub fn is_forced_fail(&self) -> bool {
        self.forced_fail.load(Ordering::Acquire)
    }

    /// `Pass` iff every subresult passed and the run was not forced to fail
    pub fn overall_outcome(&self) -> Outcome {
        if self.is_forced_fail() {
            return Outcome::Fail;
        }
        Outcome::from_success(self.subresults.lock().iter().all(TimedUnit::success))
    }

    /// Stamp the end time if it is unset, then overwrite the status fields and
    /// mark the record as the run parent. Safe to call repeatedly: the end
    /// time is only ever written once.
    pub fn finalize(&self, outcome: Outcome) {
        let end = *self.end_time.get_or_init(Utc::now);
        let mut status = self.status.lock();
        status.success = outcome.is_pass();
        status.response_code = outcome.default_code().to_owned();
        status.response_message = outcome.message().to_owned();
        status.category = Category::Parent;
        debug!(run = %self.name, %outcome, %end, "finalized run");
    }

    /// Consistent copy of status and subresults
    pub fn snapshot(&self) -> AggregateSnapshot {
        let status = self.status.lock();
        let subresults = self.subresults.lock().clone();
        AggregateSnapshot {
            name: self.name.clone(),
            category: status.category.clone(),
            start_time: self.start_time,
            end_time: self.end_time(),
            success: status.success,
            response_code: status.response_code.clone(),
            response_message: status.response_message.clone(),
            forced_fail: self.is_forced_fail(),
            subresults,
        }
    }
}
