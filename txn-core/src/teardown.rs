//! Run finalization
//!
//! Teardown always runs these steps in order, each isolated from the others:
//!
//! 1. fail every transaction that is still open
//! 2. compute the overall outcome and finalize the aggregate, falling back to
//!    an emergency `Fail` finalize if that goes wrong
//! 3. optionally write a per-transaction summary, then flush buffered
//!    artifacts (flush problems are only logged)
//! 4. log one status line
//!
//! An error or a panic inside a step is caught, recorded on the
//! [`TeardownReport`] and logged. Teardown itself never fails, and running it
//! again leaves the aggregate as the first run left it.
use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use anyhow::{Result, anyhow};
use artifact_store::ArtifactBuffer;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    aggregate::ResultAggregate,
    error::{Step, StepFailure, TxnError},
    metrics,
    registry::{Record, TransactionRegistry},
    unit::{Outcome, TimedUnit},
};

/// Receives one summary line per completed transaction
pub trait SummarySink: fmt::Debug + Send + Sync {
    /// report a single completed unit
    fn line(&self, unit: &TimedUnit) -> Result<()>;
}

/// Writes the summary to the `tracing` log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSummary;

impl SummarySink for LogSummary {
    fn line(&self, unit: &TimedUnit) -> Result<()> {
        info!(
            label = unit.label(),
            message = unit.response_message(),
            code = unit.response_code(),
            elapsed_ms = unit.elapsed_ms(),
            "transaction summary"
        );
        Ok(())
    }
}

/// What a teardown pass did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// transactions that were still open and got failed
    pub failed_in_flight: Vec<String>,
    /// the overall outcome the aggregate was finalized with
    pub outcome: Outcome,
    /// buffered artifacts that could not be written
    pub flush_failures: Vec<String>,
    /// step failures, in the order they happened
    pub failures: Vec<StepFailure>,
}

impl TeardownReport {
    /// true when no step failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_owned()
    }
}

/// run `f`, turning both errors and panics into a [`StepFailure`]
pub(crate) fn guarded<T>(step: Step, f: impl FnOnce() -> Result<T>) -> Result<T, StepFailure> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(StepFailure {
            step,
            message: format!("{err:#}"),
        }),
        Err(payload) => Err(StepFailure {
            step,
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Drives one run's registry and aggregate to their final state
#[derive(Debug)]
pub struct TeardownReconciler<'a> {
    registry: &'a TransactionRegistry,
    aggregate: &'a ResultAggregate,
    buffer: Option<&'a ArtifactBuffer>,
    summary: Option<&'a dyn SummarySink>,
}

impl<'a> TeardownReconciler<'a> {
    /// reconciler for `registry` and the aggregate it feeds
    pub fn new(registry: &'a TransactionRegistry) -> Self {
        Self {
            registry,
            aggregate: registry.aggregate(),
            buffer: None,
            summary: None,
        }
    }

    /// flush `buffer` as part of teardown
    pub fn buffer(mut self, buffer: &'a ArtifactBuffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// write a per-transaction summary to `sink`
    pub fn summary(mut self, sink: &'a dyn SummarySink) -> Self {
        self.summary = Some(sink);
        self
    }

    /// Run every step. Never fails.
    pub fn run(self) -> TeardownReport {
        let mut failures = Vec::new();

        // 1. fail in-flight
        let failed_in_flight = match guarded(Step::FailInFlight, || self.fail_in_flight()) {
            Ok(labels) => labels,
            Err(failure) => {
                error!(%failure, "teardown step failed");
                failures.push(failure);
                Vec::new()
            }
        };

        // 2. compute outcome & finalize
        let outcome = match guarded(Step::Finalize, || {
            let outcome = self.aggregate.overall_outcome();
            self.aggregate.finalize(outcome);
            Ok(outcome)
        }) {
            Ok(outcome) => outcome,
            Err(failure) => {
                error!(%failure, "teardown step failed, finalizing as failed");
                failures.push(failure);
                if let Err(failure) = guarded(Step::FinalizeFallback, || {
                    self.aggregate.finalize(Outcome::Fail);
                    Ok(())
                }) {
                    error!(%failure, "emergency finalize failed");
                    failures.push(failure);
                }
                Outcome::Fail
            }
        };

        // 3. optional summary
        if let Some(sink) = self.summary {
            if let Err(failure) = guarded(Step::Summary, || self.write_summary(sink)) {
                error!(%failure, "teardown step failed");
                failures.push(failure);
            }
        }

        let flush_failures = self.flush();

        // 4. status
        metrics::TEARDOWN_STEP_FAILURES.inc_by(failures.len() as u64);
        if failures.is_empty() {
            info!(
                run = self.aggregate.name(),
                %outcome,
                failed_in_flight = failed_in_flight.len(),
                "teardown complete"
            );
        } else {
            let errors = failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            warn!(
                run = self.aggregate.name(),
                %outcome,
                %errors,
                "teardown completed with errors"
            );
        }

        TeardownReport {
            failed_in_flight,
            outcome,
            flush_failures,
            failures,
        }
    }

    fn fail_in_flight(&self) -> Result<Vec<String>> {
        let mut failed = Vec::new();
        let mut errors = Vec::new();
        for label in self.registry.open_labels() {
            match self.registry.end(&label, Outcome::Fail, None, Record::Yes) {
                Ok(_) => {
                    metrics::TXN_ABANDONED.inc();
                    warn!(%label, "transaction still open at teardown, marking failed");
                    failed.push(label);
                }
                // ended by another thread in the meantime
                Err(TxnError::NotFound(_)) => {}
                Err(err) => errors.push(format!("{label}: {err}")),
            }
        }
        if !errors.is_empty() {
            return Err(anyhow!(errors.join(", ")));
        }
        Ok(failed)
    }

    fn write_summary(&self, sink: &dyn SummarySink) -> Result<()> {
        let subresults = self.aggregate.subresults();
        let mut errors = 0;
        for unit in &subresults {
            if let Err(err) = sink.line(unit) {
                errors += 1;
                warn!(label = unit.label(), ?err, "failed to write summary line");
            }
        }
        if errors > 0 {
            return Err(anyhow!(
                "{errors} of {} summary lines failed",
                subresults.len()
            ));
        }
        Ok(())
    }

    fn flush(&self) -> Vec<String> {
        let Some(buffer) = self.buffer else {
            return Vec::new();
        };
        match panic::catch_unwind(AssertUnwindSafe(|| buffer.flush())) {
            Ok(report) => {
                metrics::ARTIFACT_WRITE_FAILURES.inc_by(report.failed.len() as u64);
                report.failed
            }
            Err(payload) => {
                error!(
                    reason = %panic_message(payload.as_ref()),
                    "flushing buffered artifacts failed"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;
    use crate::unit::Category;

    #[derive(Debug)]
    struct BrokenSink;

    impl SummarySink for BrokenSink {
        fn line(&self, unit: &TimedUnit) -> Result<()> {
            Err(anyhow!("sink closed while writing {}", unit.label()))
        }
    }

    #[derive(Debug)]
    struct PanickingSink;

    impl SummarySink for PanickingSink {
        fn line(&self, _unit: &TimedUnit) -> Result<()> {
            panic!("sink exploded")
        }
    }

    fn registry() -> TransactionRegistry {
        TransactionRegistry::new(Arc::new(ResultAggregate::new("run")))
    }

    #[test]
    fn test_guarded_catches_errors_and_panics() {
        let ok = guarded(Step::Summary, || Ok(5));
        assert_eq!(ok, Ok(5));

        let err = guarded::<()>(Step::Summary, || Err(anyhow!("nope"))).unwrap_err();
        assert_eq!(err.step, Step::Summary);
        assert_eq!(err.message, "nope");

        let err = guarded::<()>(Step::Finalize, || panic!("boom")).unwrap_err();
        assert_eq!(err.step, Step::Finalize);
        assert_eq!(err.message, "panicked: boom");
    }

    #[test]
    #[traced_test]
    fn test_fails_open_transactions() {
        let reg = registry();
        reg.start("X", Category::Transaction).unwrap();
        let report = TeardownReconciler::new(&reg).run();

        assert!(report.is_clean());
        assert_eq!(report.failed_in_flight, vec!["X"]);
        assert_eq!(report.outcome, Outcome::Fail);
        let snap = reg.aggregate().snapshot();
        assert_eq!(snap.labels(), vec!["X"]);
        assert!(!snap.subresults[0].success());
        assert!(!snap.success);
        assert!(logs_contain("teardown complete"));
    }

    #[test]
    #[traced_test]
    fn test_summary_failure_is_isolated() {
        let reg = registry();
        reg.set_completed("A", 10, true, None, Category::Transaction)
            .unwrap();
        let report = TeardownReconciler::new(&reg).summary(&BrokenSink).run();

        assert_eq!(report.outcome, Outcome::Pass);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].step, Step::Summary);
        // the run outcome is not affected by a broken summary
        assert!(reg.aggregate().snapshot().success);
        assert!(logs_contain("teardown completed with errors"));
    }

    #[test]
    #[traced_test]
    fn test_panicking_summary_still_logs_status() {
        let reg = registry();
        reg.set_completed("A", 10, true, None, Category::Transaction)
            .unwrap();
        let report = TeardownReconciler::new(&reg).summary(&PanickingSink).run();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("sink exploded"));
        assert!(reg.aggregate().end_time().is_some());
        assert!(logs_contain("teardown completed with errors"));
    }

    #[test]
    #[traced_test]
    fn test_log_summary_lines() {
        let reg = registry();
        reg.set_completed("checkout", 42, true, None, Category::Transaction)
            .unwrap();
        let report = TeardownReconciler::new(&reg).summary(&LogSummary).run();
        assert!(report.is_clean());
        assert!(logs_contain("transaction summary"));
        assert!(logs_contain("checkout"));
    }
}
