//! Timed units: one measured operation inside a run
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// default response code for a passing unit
pub const PASS_CODE: &str = "200";
/// default response code for a failing unit
pub const FAIL_CODE: &str = "-1";

/// Classification of a [`TimedUnit`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// ordinary transaction
    #[default]
    Transaction,
    /// metric or datapoint rather than a timed operation
    Metric,
    /// marks the run level parent record
    Parent,
    /// provider specific tag
    Tagged(String),
}

/// Pass or fail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// passed
    #[default]
    Pass,
    /// failed
    Fail,
}

impl Outcome {
    /// outcome for a success flag
    pub const fn from_success(success: bool) -> Self {
        if success { Self::Pass } else { Self::Fail }
    }

    /// whether this is [`Outcome::Pass`]
    pub const fn is_pass(self) -> bool {
        matches!(self, Self::Pass)
    }

    /// response code used when the caller supplies none
    pub const fn default_code(self) -> &'static str {
        match self {
            Self::Pass => PASS_CODE,
            Self::Fail => FAIL_CODE,
        }
    }

    /// response message for this outcome
    pub const fn message(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// One named, measured interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedUnit {
    pub(crate) label: String,
    pub(crate) category: Category,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) end_time: Option<DateTime<Utc>>,
    pub(crate) success: bool,
    pub(crate) response_code: String,
    pub(crate) response_message: String,
}

impl TimedUnit {
    /// open unit starting now
    pub(crate) fn started(label: impl Into<String>, category: Category) -> Self {
        Self {
            label: label.into(),
            category,
            start_time: Utc::now(),
            end_time: None,
            success: false,
            response_code: String::new(),
            response_message: String::new(),
        }
    }

    /// Already completed unit that took `elapsed_ms`, starting now
    pub(crate) fn completed(
        label: impl Into<String>,
        category: Category,
        elapsed_ms: u64,
        outcome: Outcome,
        response_code: Option<String>,
    ) -> Self {
        let mut unit = Self::started(label, category);
        let elapsed = i64::try_from(elapsed_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .unwrap_or(Duration::MAX);
        let end = unit
            .start_time
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        unit.close(end, outcome, response_code);
        unit
    }

    /// stamp the end time and the status fields
    pub(crate) fn close(
        &mut self,
        end_time: DateTime<Utc>,
        outcome: Outcome,
        response_code: Option<String>,
    ) {
        self.end_time = Some(end_time);
        self.success = outcome.is_pass();
        self.response_code = response_code
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| outcome.default_code().to_owned());
        self.response_message = outcome.message().to_owned();
    }

    /// label of the unit
    pub fn label(&self) -> &str {
        &self.label
    }

    /// category of the unit
    pub fn category(&self) -> &Category {
        &self.category
    }

    /// when the unit started
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// when the unit ended, `None` while it is still open
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// whether the unit passed
    pub fn success(&self) -> bool {
        self.success
    }

    /// response code, empty while open
    pub fn response_code(&self) -> &str {
        &self.response_code
    }

    /// response message, empty while open
    pub fn response_message(&self) -> &str {
        &self.response_message
    }

    /// elapsed time in milliseconds, 0 while open
    pub fn elapsed_ms(&self) -> i64 {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_unit_elapsed() {
        let unit = TimedUnit::completed("C", Category::Transaction, 250, Outcome::Pass, None);
        assert_eq!(unit.elapsed_ms(), 250);
        assert!(unit.success());
        assert_eq!(unit.response_code(), "200");
        assert_eq!(unit.response_message(), "PASS");
    }

    #[test]
    fn test_default_codes() {
        let mut unit = TimedUnit::started("x", Category::Metric);
        assert_eq!(unit.elapsed_ms(), 0);
        unit.close(unit.start_time(), Outcome::Fail, Some(String::new()));
        assert!(!unit.success());
        assert_eq!(unit.response_code(), "-1");
        assert_eq!(unit.response_message(), "FAIL");

        unit.close(unit.start_time(), Outcome::Pass, Some("302".into()));
        assert_eq!(unit.response_code(), "302");
    }
}
