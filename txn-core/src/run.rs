//! One script execution
//!
//! [`Run`] is the surface scripts and drivers talk to. It owns the open set,
//! the result aggregate and the artifact buffer of a single run; the
//! [`NamedCounter`] is passed in so several runs can share it.
use std::sync::Arc;

use artifact_store::{
    ArtifactBuffer, ArtifactNamer, ArtifactStore, BufferError, FlushReport, NamingContext,
};
use named_counter::NamedCounter;
use tracing::{debug, error};

use crate::{
    aggregate::{AggregateSnapshot, ResultAggregate},
    config::RunConfig,
    error::{Result, TxnError},
    metrics,
    registry::{Record, TransactionRegistry},
    select::{FixedLabel, LabelIs, LabelPrefix, Renamer, ReplacePrefix, Selector},
    teardown::{LogSummary, SummarySink, TeardownReconciler, TeardownReport},
    unit::{Category, Outcome, TimedUnit},
};

fn check_label(label: &str, what: &'static str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(TxnError::InvalidArgument(what));
    }
    Ok(())
}

/// Transactions, results and artifacts of one script execution
#[derive(Debug)]
pub struct Run {
    config: RunConfig,
    registry: TransactionRegistry,
    buffer: ArtifactBuffer,
    namer: ArtifactNamer,
    summary: Option<Box<dyn SummarySink>>,
}

impl Run {
    /// New run writing artifacts to the configured destination, if any
    pub fn new(config: RunConfig, counter: NamedCounter) -> Self {
        let store = config.artifacts.store();
        Self::with_store(config, counter, store)
    }

    /// New run writing artifacts to `store` instead of the configured
    /// destination. Without a store artifacts are dropped and
    /// [`reserve_name`](Self::reserve_name) returns `None`.
    pub fn with_store(
        config: RunConfig,
        counter: NamedCounter,
        store: Option<Arc<dyn ArtifactStore>>,
    ) -> Self {
        let ctx = NamingContext::current(config.thread_group.clone(), config.name.clone());
        let namer =
            ArtifactNamer::new(&config.artifacts, &ctx, counter).with_enabled(store.is_some());
        let summary = config
            .summary
            .then(|| Box::new(LogSummary) as Box<dyn SummarySink>);
        debug!(run = %config.name, prefix = namer.prefix(), "created run");
        Self {
            registry: TransactionRegistry::new(Arc::new(ResultAggregate::new(
                config.name.clone(),
            ))),
            buffer: ArtifactBuffer::new(store),
            namer,
            summary,
            config,
        }
    }

    /// Write the teardown summary to `sink` instead of the log
    pub fn with_summary_sink(mut self, sink: Box<dyn SummarySink>) -> Self {
        self.summary = Some(sink);
        self
    }

    /// the config this run was built from
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// open `label` as an ordinary transaction
    pub fn start(&self, label: &str) -> Result<()> {
        self.registry.start(label, Category::Transaction)
    }

    /// open `label` with an explicit category
    pub fn start_with(&self, label: &str, category: Category) -> Result<()> {
        self.registry.start(label, category)
    }

    /// end `label` as passed
    pub fn end(&self, label: &str) -> Result<TimedUnit> {
        self.registry.end(label, Outcome::Pass, None, Record::Yes)
    }

    /// end `label` with an explicit outcome and optional response code
    pub fn end_with(
        &self,
        label: &str,
        outcome: Outcome,
        response_code: Option<&str>,
    ) -> Result<TimedUnit> {
        self.registry
            .end(label, outcome, response_code.map(str::to_owned), Record::Yes)
    }

    /// end `label` and return its measurement without recording it
    pub fn end_without_recording(
        &self,
        label: &str,
        outcome: Outcome,
        response_code: Option<&str>,
    ) -> Result<TimedUnit> {
        self.registry
            .end(label, outcome, response_code.map(str::to_owned), Record::No)
    }

    /// record a passed transaction that took `elapsed_ms`
    pub fn set_completed(&self, label: &str, elapsed_ms: u64) -> Result<TimedUnit> {
        self.registry
            .set_completed(label, elapsed_ms, true, None, Category::Transaction)
    }

    /// record a finished transaction with full control over its status
    pub fn set_completed_with(
        &self,
        label: &str,
        elapsed_ms: u64,
        success: bool,
        response_code: Option<&str>,
        category: Category,
    ) -> Result<TimedUnit> {
        self.registry.set_completed(
            label,
            elapsed_ms,
            success,
            response_code.map(str::to_owned),
            category,
        )
    }

    /// relabel every recorded `from` unit to `to`
    pub fn rename(&self, from: &str, to: &str) -> Result<usize> {
        check_label(from, "label to rename is blank")?;
        check_label(to, "new label is blank")?;
        self.rename_matching(&LabelIs(from.to_owned()), &FixedLabel(to.to_owned()))
    }

    /// replace the leading `old_prefix` of matching labels with `new_prefix`
    pub fn rename_prefixed(&self, old_prefix: &str, new_prefix: &str) -> Result<usize> {
        check_label(old_prefix, "prefix to rename is blank")?;
        self.rename_matching(
            &LabelPrefix(old_prefix.to_owned()),
            &ReplacePrefix {
                old: old_prefix.to_owned(),
                new: new_prefix.to_owned(),
            },
        )
    }

    /// relabel every selected unit, see [`ResultAggregate::rename_matching`]
    pub fn rename_matching<S, R>(&self, selector: &S, renamer: &R) -> Result<usize>
    where
        S: Selector + ?Sized,
        R: Renamer + ?Sized,
    {
        self.registry.aggregate().rename_matching(selector, renamer)
    }

    /// delete every recorded unit called `label`
    pub fn delete(&self, label: &str) -> Result<usize> {
        check_label(label, "label to delete is blank")?;
        Ok(self.delete_matching(&LabelIs(label.to_owned())))
    }

    /// delete every recorded unit whose label starts with `prefix`
    pub fn delete_prefixed(&self, prefix: &str) -> Result<usize> {
        check_label(prefix, "prefix to delete is blank")?;
        Ok(self.delete_matching(&LabelPrefix(prefix.to_owned())))
    }

    /// delete every selected unit, see [`ResultAggregate::delete_matching`]
    pub fn delete_matching<S>(&self, selector: &S) -> usize
    where
        S: Selector + ?Sized,
    {
        self.registry.aggregate().delete_matching(selector)
    }

    /// snapshot of the run result
    pub fn aggregate(&self) -> AggregateSnapshot {
        self.registry.aggregate().snapshot()
    }

    /// label of the latest started transaction
    pub fn most_recently_started(&self) -> Option<String> {
        self.registry.most_recently_started()
    }

    /// labels of transactions that are still open
    pub fn open_labels(&self) -> Vec<String> {
        self.registry.open_labels()
    }

    /// fail the run whatever its transactions report
    pub fn force_fail(&self) {
        self.registry.aggregate().force_fail();
    }

    /// Finalize the run. Never fails and is safe to call more than once.
    pub fn teardown(&self) -> TeardownReport {
        let reconciler = TeardownReconciler::new(&self.registry).buffer(&self.buffer);
        match &self.summary {
            Some(sink) => reconciler.summary(sink.as_ref()).run(),
            None => reconciler.run(),
        }
    }

    /// hold an artifact until the next flush, returns whether it was kept
    pub fn buffer(&self, name: &str, bytes: impl Into<Vec<u8>>) -> Result<bool> {
        Ok(self.buffer.buffer(name, bytes)?)
    }

    /// write every buffered artifact now
    pub fn flush_buffered(&self) -> FlushReport {
        let report = self.buffer.flush();
        metrics::ARTIFACT_WRITE_FAILURES.inc_by(report.failed.len() as u64);
        report
    }

    /// Reserve a unique artifact name under the latest started transaction.
    /// `None` means no destination is configured and nothing should be
    /// written.
    pub fn reserve_name(&self, base: &str, suffix: &str) -> Option<String> {
        let label = self.most_recently_started();
        self.namer.reserve_name(label.as_deref(), base, suffix)
    }

    /// Write an artifact immediately. A failed write is returned to the
    /// caller and also fails the run.
    pub fn write_artifact(&self, name: &str, bytes: &[u8]) -> Result<()> {
        match self.buffer.write_now(name, bytes) {
            Ok(()) => Ok(()),
            Err(BufferError::Store(err)) => {
                metrics::ARTIFACT_WRITE_FAILURES.inc();
                error!(name, reason = err.reason(), %err, "artifact write failed, failing run");
                self.force_fail();
                Err(TxnError::IoFailure(err))
            }
            Err(err) => Err(err.into()),
        }
    }
}
