//! run configs

use std::path::Path;

use anyhow::{Context, Result};
use artifact_store::NamingConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// default run name
pub const DEFAULT_RUN_NAME: &str = "run";
/// default thread group name
pub const DEFAULT_THREAD_GROUP: &str = "default";

/// Settings for one script execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// name of the run record
    pub name: String,
    /// thread group the run belongs to, used in artifact names
    pub thread_group: String,
    /// write a per-transaction summary at teardown
    pub summary: bool,
    /// artifact destination & naming
    pub artifacts: NamingConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_RUN_NAME.to_owned(),
            thread_group: DEFAULT_THREAD_GROUP.to_owned(),
            summary: false,
            artifacts: NamingConfig::default(),
        }
    }
}

impl RunConfig {
    /// read the config at `path`, see [`RunConfig::parse_str`]
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("failed to find config at {}", path.display()))?;
        Self::parse_str(input)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    /// attempts to decode the config first as JSON, then YAML, finally erroring if neither work
    pub fn parse_str<S: AsRef<str>>(s: S) -> Result<Self> {
        let s = s.as_ref();
        let config = match serde_json::from_str(s) {
            Ok(config) => config,
            Err(err) => {
                debug!(?err, "config is not JSON, trying YAML");
                serde_yaml::from_str(s).context("config is neither valid JSON nor YAML")?
            }
        };
        debug!(?config);
        Ok(config)
    }
}

pub mod trace {
    //! tracing configuration, logs go to stderr so stdout stays free for reports
    use std::io;

    use anyhow::Result;
    use tracing_subscriber::{
        filter::EnvFilter,
        fmt::{
            self,
            format::{Format, PrettyFields},
        },
        prelude::__tracing_subscriber_SubscriberExt,
        util::SubscriberInitExt,
    };

    /// log as "json", "pretty" or "standard" (unstructured)
    pub static DEFAULT_LOG_FORMAT: &str = "standard";

    /// Configuration for the global subscriber
    #[derive(Debug)]
    pub struct Config {
        /// formatting to apply to logs
        pub log_frmt: String,
    }

    impl Config {
        /// Install the global subscriber. `level` accepts any `RUST_LOG`
        /// style directive, `log_frmt` is one of `json`, `pretty` or
        /// `standard`.
        pub fn parse(level: &str, log_frmt: &str) -> Result<Self> {
            let filter = EnvFilter::try_new(level).or_else(|_| EnvFilter::try_new("info"))?;

            match log_frmt {
                "json" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json().with_writer(io::stderr))
                        .try_init()?;
                }
                "pretty" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(
                            fmt::layer()
                                .event_format(
                                    Format::default().pretty().with_source_location(false),
                                )
                                .fmt_fields(PrettyFields::new())
                                .with_writer(io::stderr),
                        )
                        .try_init()?;
                }
                _ => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().with_writer(io::stderr))
                        .try_init()?;
                }
            }

            Ok(Self {
                log_frmt: log_frmt.to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use artifact_store::NameToken;

    use super::*;

    #[test]
    fn test_parse_yaml() {
        let cfg = RunConfig::parse_str(
            "name: checkout\nsummary: true\nartifacts:\n  destination: /tmp/out\n  tokens: [thread_group, operation]\n",
        )
        .unwrap();
        assert_eq!(cfg.name, "checkout");
        assert_eq!(cfg.thread_group, DEFAULT_THREAD_GROUP);
        assert!(cfg.summary);
        assert_eq!(cfg.artifacts.destination, Some(PathBuf::from("/tmp/out")));
        assert_eq!(
            cfg.artifacts.tokens,
            vec![NameToken::ThreadGroup, NameToken::Operation]
        );
    }

    #[test]
    fn test_parse_json_defaults() {
        let cfg = RunConfig::parse_str(r#"{"thread_group": "buyers"}"#).unwrap();
        assert_eq!(cfg.name, DEFAULT_RUN_NAME);
        assert_eq!(cfg.thread_group, "buyers");
        assert!(!cfg.summary);
        assert_eq!(cfg.artifacts, NamingConfig::default());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(RunConfig::parse_str("name: [unterminated").is_err());
        assert!(RunConfig::parse("/definitely/not/here.yaml").is_err());
    }
}
