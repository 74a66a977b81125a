//! Artifact naming
//!
//! Names are built as
//! `<prefix tokens>_<transaction label>_<sequence>_<base>.<suffix>`, where the
//! sequence comes from a [`NamedCounter`] shared by every run in the process.
//! Two calls never yield the same name even with identical arguments.
use std::{path::PathBuf, sync::Arc, thread};

use named_counter::NamedCounter;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{ArtifactStore, FsStore};

/// counter key every namer draws its sequence from
pub const ARTIFACT_COUNTER_KEY: &str = "artifact";
/// label used when no transaction has been started yet
pub const NO_TRANSACTION: &str = "NO_TXN";
/// width the sequence number is zero padded to
pub const SEQUENCE_WIDTH: usize = 6;

/// One piece of the constant leading portion of an artifact name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameToken {
    /// name of the thread driving the run
    Thread,
    /// the virtual-user group the run belongs to
    ThreadGroup,
    /// the operation or sampler being executed
    Operation,
    /// fixed text
    Literal(String),
}

/// Where artifacts go and how their names start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// destination directory, artifacts are dropped when unset
    pub destination: Option<PathBuf>,
    /// leading name tokens, in order
    pub tokens: Vec<NameToken>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            destination: None,
            tokens: vec![NameToken::ThreadGroup, NameToken::Thread],
        }
    }
}

impl NamingConfig {
    /// filesystem store for the configured destination, if there is one
    pub fn store(&self) -> Option<Arc<dyn ArtifactStore>> {
        self.destination
            .as_ref()
            .map(|dest| Arc::new(FsStore::new(dest)) as Arc<dyn ArtifactStore>)
    }
}

/// Identity values [`NameToken`]s resolve against
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamingContext {
    /// thread identity
    pub thread: String,
    /// thread group identity
    pub thread_group: String,
    /// operation identity
    pub operation: String,
}

impl NamingContext {
    /// context for the calling thread
    pub fn current(thread_group: impl Into<String>, operation: impl Into<String>) -> Self {
        let current = thread::current();
        let thread = match current.name() {
            Some(name) => name.to_owned(),
            None => format!("{:?}", current.id()),
        };
        Self {
            thread,
            thread_group: thread_group.into(),
            operation: operation.into(),
        }
    }

    fn resolve<'a>(&'a self, token: &'a NameToken) -> &'a str {
        match token {
            NameToken::Thread => &self.thread,
            NameToken::ThreadGroup => &self.thread_group,
            NameToken::Operation => &self.operation,
            NameToken::Literal(text) => text,
        }
    }
}

/// keep names usable as a single file name
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Mints unique artifact names
#[derive(Debug, Clone)]
pub struct ArtifactNamer {
    counter: NamedCounter,
    prefix: String,
    configured: bool,
}

impl ArtifactNamer {
    /// Resolve the prefix tokens once; they stay constant for the run
    pub fn new(config: &NamingConfig, ctx: &NamingContext, counter: NamedCounter) -> Self {
        let prefix = config
            .tokens
            .iter()
            .map(|token| ctx.resolve(token))
            .filter(|part| !part.is_empty())
            .map(sanitize)
            .collect::<Vec<_>>()
            .join("_");
        Self {
            counter,
            prefix,
            configured: config.destination.is_some(),
        }
    }

    /// Override whether names are handed out, for stores that are injected
    /// rather than built from the configured destination
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.configured = enabled;
        self
    }

    /// whether [`reserve_name`](Self::reserve_name) hands out names
    pub fn is_enabled(&self) -> bool {
        self.configured
    }

    /// the constant leading portion of every name
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the next name for `base.suffix` under the transaction `label`.
    /// Returns `None` when no destination is configured, callers must then
    /// skip writing entirely.
    pub fn reserve_name(&self, label: Option<&str>, base: &str, suffix: &str) -> Option<String> {
        if !self.configured {
            return None;
        }
        let seq = match self.counter.get_next(ARTIFACT_COUNTER_KEY) {
            Ok(seq) => seq,
            Err(err) => {
                warn!(?err, "artifact sequence unavailable");
                return None;
            }
        };
        let label = label
            .filter(|label| !label.trim().is_empty())
            .unwrap_or(NO_TRANSACTION);

        let mut name = String::new();
        if !self.prefix.is_empty() {
            name.push_str(&self.prefix);
            name.push('_');
        }
        name.push_str(&sanitize(label));
        name.push_str(&format!("_{seq:0width$}_", width = SEQUENCE_WIDTH));
        name.push_str(&sanitize(base));
        if !suffix.is_empty() {
            name.push('.');
            name.push_str(&sanitize(suffix.trim_start_matches('.')));
        }
        Some(name)
    }
}
