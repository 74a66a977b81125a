use serde::Serialize;
use txn_core::{AggregateSnapshot, TeardownReport};

use crate::script::StepError;

/// Outcome of one virtual user
#[derive(Debug, Clone, Serialize)]
pub struct VuserResult {
    pub vuser: usize,
    pub passed: bool,
    pub step_errors: Vec<StepError>,
    pub teardown: TeardownReport,
    pub aggregate: AggregateSnapshot,
}

impl VuserResult {
    pub fn new(
        vuser: usize,
        step_errors: Vec<StepError>,
        teardown: TeardownReport,
        aggregate: AggregateSnapshot,
    ) -> Self {
        Self {
            vuser,
            passed: teardown.outcome.is_pass(),
            step_errors,
            teardown,
            aggregate,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Totals {
    pub planned_vusers: usize,
    pub completed_vusers: usize,
    pub passed_vusers: usize,
    pub failed_vusers: usize,
    pub transactions: usize,
    pub failed_transactions: usize,
    pub abandoned_transactions: usize,
    pub step_errors: usize,
    pub teardown_failures: usize,
    pub flush_failures: usize,
}

impl Totals {
    pub fn compute(runs: &[VuserResult], planned_vusers: usize) -> Self {
        let mut totals = Totals {
            planned_vusers,
            completed_vusers: runs.len(),
            ..Default::default()
        };
        for run in runs {
            if run.passed {
                totals.passed_vusers += 1;
            } else {
                totals.failed_vusers += 1;
            }
            totals.transactions += run.aggregate.subresults.len();
            totals.failed_transactions += run
                .aggregate
                .subresults
                .iter()
                .filter(|unit| !unit.success())
                .count();
            totals.abandoned_transactions += run.teardown.failed_in_flight.len();
            totals.step_errors += run.step_errors.len();
            totals.teardown_failures += run.teardown.failures.len();
            totals.flush_failures += run.teardown.flush_failures.len();
        }
        totals
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverReport {
    pub script: String,
    pub dry_run: bool,
    pub passed: bool,
    pub duration_ms: u128,
    pub totals: Totals,
    pub runs: Vec<VuserResult>,
}

impl DriverReport {
    pub fn dry_run(script: String, planned_vusers: usize) -> Self {
        Self {
            script,
            dry_run: true,
            passed: true,
            duration_ms: 0,
            totals: Totals {
                planned_vusers,
                ..Default::default()
            },
            runs: Vec::new(),
        }
    }

    pub fn human_summary(&self) -> String {
        let mut output = String::new();
        output.push_str("transaction run report\n");
        output.push_str(&format!(
            "status: {}\n",
            if self.passed { "PASS" } else { "FAIL" }
        ));
        output.push_str(&format!("script: {}\n", self.script));
        if self.dry_run {
            output.push_str("dry run: script and config parsed, nothing executed\n");
            return output;
        }
        output.push_str(&format!(
            "vusers: planned={}, completed={}, passed={}, failed={}\n",
            self.totals.planned_vusers,
            self.totals.completed_vusers,
            self.totals.passed_vusers,
            self.totals.failed_vusers
        ));
        output.push_str(&format!(
            "transactions: recorded={}, failed={}, abandoned={}\n",
            self.totals.transactions,
            self.totals.failed_transactions,
            self.totals.abandoned_transactions
        ));
        output.push_str(&format!(
            "errors: steps={}, teardown={}, artifacts={}\n",
            self.totals.step_errors, self.totals.teardown_failures, self.totals.flush_failures
        ));
        output.push_str(&format!("timing: duration={}ms\n", self.duration_ms));

        for run in &self.runs {
            output.push_str(&format!(
                "vuser [{}] {}: {} units, {}ms\n",
                if run.passed { "PASS" } else { "FAIL" },
                run.aggregate.name,
                run.aggregate.subresults.len(),
                run.aggregate.elapsed_ms()
            ));
            for err in &run.step_errors {
                output.push_str(&format!(
                    "  step {} ({}): {}\n",
                    err.index, err.op, err.message
                ));
            }
            for label in &run.teardown.failed_in_flight {
                output.push_str(&format!("  abandoned: {label}\n"));
            }
        }

        output
    }
}
