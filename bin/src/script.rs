use std::{path::Path, thread, time::Duration};

use serde::{Deserialize, Serialize};
use txn_core::prelude::*;

fn yes() -> bool {
    true
}

/// One scripted action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Start {
        label: String,
        #[serde(default)]
        category: Category,
    },
    End {
        label: String,
        #[serde(default)]
        outcome: Outcome,
        #[serde(default)]
        code: Option<String>,
        #[serde(default = "yes")]
        record: bool,
    },
    Sleep {
        ms: u64,
    },
    SetCompleted {
        label: String,
        elapsed_ms: u64,
        #[serde(default = "yes")]
        success: bool,
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        category: Category,
    },
    Rename {
        from: String,
        to: String,
    },
    RenamePrefixed {
        from: String,
        to: String,
    },
    Delete {
        label: String,
    },
    DeletePrefixed {
        prefix: String,
    },
    ForceFail,
    Artifact {
        base: String,
        suffix: String,
        #[serde(default)]
        content: String,
        /// write right away instead of buffering until flush/teardown
        #[serde(default)]
        immediate: bool,
    },
    Flush,
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::Start { .. } => "start",
            Step::End { .. } => "end",
            Step::Sleep { .. } => "sleep",
            Step::SetCompleted { .. } => "set_completed",
            Step::Rename { .. } => "rename",
            Step::RenamePrefixed { .. } => "rename_prefixed",
            Step::Delete { .. } => "delete",
            Step::DeletePrefixed { .. } => "delete_prefixed",
            Step::ForceFail => "force_fail",
            Step::Artifact { .. } => "artifact",
            Step::Flush => "flush",
        }
    }

    /// apply this step to `run`
    pub fn apply(&self, run: &Run) -> Result<()> {
        match self {
            Step::Start { label, category } => run.start_with(label, category.clone())?,
            Step::End {
                label,
                outcome,
                code,
                record: true,
            } => {
                run.end_with(label, *outcome, code.as_deref())?;
            }
            Step::End {
                label,
                outcome,
                code,
                record: false,
            } => {
                run.end_without_recording(label, *outcome, code.as_deref())?;
            }
            Step::Sleep { ms } => thread::sleep(Duration::from_millis(*ms)),
            Step::SetCompleted {
                label,
                elapsed_ms,
                success,
                code,
                category,
            } => {
                run.set_completed_with(
                    label,
                    *elapsed_ms,
                    *success,
                    code.as_deref(),
                    category.clone(),
                )?;
            }
            Step::Rename { from, to } => {
                run.rename(from, to)?;
            }
            Step::RenamePrefixed { from, to } => {
                run.rename_prefixed(from, to)?;
            }
            Step::Delete { label } => {
                run.delete(label)?;
            }
            Step::DeletePrefixed { prefix } => {
                run.delete_prefixed(prefix)?;
            }
            Step::ForceFail => run.force_fail(),
            Step::Artifact {
                base,
                suffix,
                content,
                immediate,
            } => match run.reserve_name(base, suffix) {
                Some(name) if *immediate => run.write_artifact(&name, content.as_bytes())?,
                Some(name) => {
                    run.buffer(&name, content.as_bytes())?;
                }
                None => debug!(base, "no artifact destination, skipping"),
            },
            Step::Flush => {
                run.flush_buffered();
            }
        }
        Ok(())
    }
}

/// A failed step, the run carries on after it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepError {
    pub index: usize,
    pub op: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("failed to find script at {}", path.display()))?;
        Self::parse_str(input)
    }

    /// attempts to decode the script first as JSON, then YAML
    pub fn parse_str<S: AsRef<str>>(s: S) -> Result<Self> {
        let s = s.as_ref();
        Ok(match serde_json::from_str(s) {
            Ok(script) => script,
            Err(_err) => serde_yaml::from_str(s).context("script is neither valid JSON nor YAML")?,
        })
    }

    /// Run every step against `run`. A failing step fails the run and is
    /// returned, the remaining steps still execute.
    pub fn execute(&self, run: &Run) -> Vec<StepError> {
        let mut errors = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            if let Err(err) = step.apply(run) {
                error!(index, op = step.op(), ?err, "script step failed");
                run.force_fail();
                errors.push(StepError {
                    index,
                    op: step.op(),
                    message: format!("{err:#}"),
                });
            }
        }
        errors
    }
}
