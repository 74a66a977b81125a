//! Open transactions
//!
//! Tracks units that were started but not yet ended. Labels are unique while
//! open; the open set is a sharded map so unrelated labels never contend.
use std::sync::Arc;

use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    aggregate::ResultAggregate,
    error::{Result, TxnError},
    metrics,
    unit::{Category, Outcome, TimedUnit},
};

fn check_label(label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(TxnError::InvalidArgument("transaction label is blank"));
    }
    Ok(())
}

/// Whether an ended unit is appended to the aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// append to the run result
    Yes,
    /// measure only
    No,
}

/// Starts and ends transactions for one run
#[derive(Debug)]
pub struct TransactionRegistry {
    open: DashMap<String, TimedUnit>,
    most_recent: RwLock<Option<String>>,
    aggregate: Arc<ResultAggregate>,
}

impl TransactionRegistry {
    /// registry feeding completed units into `aggregate`
    pub fn new(aggregate: Arc<ResultAggregate>) -> Self {
        Self {
            open: DashMap::new(),
            most_recent: RwLock::new(None),
            aggregate,
        }
    }

    /// the aggregate completed units go to
    pub fn aggregate(&self) -> &Arc<ResultAggregate> {
        &self.aggregate
    }

    /// Open a transaction called `label`
    pub fn start(&self, label: &str, category: Category) -> Result<()> {
        check_label(label)?;
        match self.open.entry(label.to_owned()) {
            Entry::Occupied(_) => return Err(TxnError::DuplicateActive(label.to_owned())),
            Entry::Vacant(entry) => {
                entry.insert(TimedUnit::started(label, category));
            }
        }
        *self.most_recent.write() = Some(label.to_owned());
        metrics::TXN_STARTED.inc();
        debug!(label, "transaction started");
        Ok(())
    }

    /// Close the open transaction `label`. A missing `response_code` defaults
    /// to the outcome's code. With [`Record::Yes`] the completed unit is also
    /// appended to the aggregate.
    pub fn end(
        &self,
        label: &str,
        outcome: Outcome,
        response_code: Option<String>,
        record: Record,
    ) -> Result<TimedUnit> {
        check_label(label)?;
        let now = Utc::now();
        let (_, mut unit) = self
            .open
            .remove(label)
            .ok_or_else(|| TxnError::NotFound(label.to_owned()))?;
        unit.close(now, outcome, response_code);
        metrics::observe(&unit);
        debug!(
            label,
            %outcome,
            elapsed_ms = unit.elapsed_ms(),
            ?record,
            "transaction ended"
        );
        if record == Record::Yes {
            self.aggregate.append(unit.clone());
        }
        Ok(unit)
    }

    /// Record a unit that already took `elapsed_ms` without ever opening it
    pub fn set_completed(
        &self,
        label: &str,
        elapsed_ms: u64,
        success: bool,
        response_code: Option<String>,
        category: Category,
    ) -> Result<TimedUnit> {
        check_label(label)?;
        let unit = TimedUnit::completed(
            label,
            category,
            elapsed_ms,
            Outcome::from_success(success),
            response_code,
        );
        metrics::observe(&unit);
        debug!(label, elapsed_ms, success, "transaction recorded as completed");
        self.aggregate.append(unit.clone());
        Ok(unit)
    }

    /// labels currently open, in no particular order
    pub fn open_labels(&self) -> Vec<String> {
        self.open.iter().map(|entry| entry.key().clone()).collect()
    }

    /// whether `label` is currently open
    pub fn is_open(&self, label: &str) -> bool {
        self.open.contains_key(label)
    }

    /// label passed to the latest successful [`start`](Self::start)
    pub fn most_recently_started(&self) -> Option<String> {
        self.most_recent.read().clone()
    }
}
