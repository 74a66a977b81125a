use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::Parser;
use txn_core::config::{RunConfig, trace::DEFAULT_LOG_FORMAT};

use crate::script::Script;

pub const DEFAULT_VUSERS: usize = 1;
pub const DEFAULT_RAMP_PER_SEC: usize = 0;
/// default log level. Can use this argument or TXN_LOG env var
pub const DEFAULT_TXN_LOG: &str = "info";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "txnrun",
    about = "Run a load-test script through the transaction engine"
)]
pub struct Cli {
    /// path to the YAML or JSON script
    #[arg(short, long, env = "TXN_SCRIPT")]
    pub script: PathBuf,
    /// path to the run config, defaults apply when omitted
    #[arg(short, long, env = "TXN_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,
    /// number of virtual users running the script concurrently
    #[arg(long, env = "TXN_VUSERS", default_value_t = DEFAULT_VUSERS)]
    pub vusers: usize,
    /// virtual users started per second, 0 starts them all at once
    #[arg(long, default_value_t = DEFAULT_RAMP_PER_SEC)]
    pub ramp_per_sec: usize,
    /// print the report as JSON
    #[arg(long)]
    pub json: bool,
    /// only parse the config and script
    #[arg(long)]
    pub dry_run: bool,
    /// set the log level. All valid RUST_LOG arguments are accepted
    #[arg(long, env, default_value = DEFAULT_TXN_LOG)]
    pub txn_log: String,
    /// log as "json", "pretty" or "standard"
    #[arg(long, env, default_value = DEFAULT_LOG_FORMAT)]
    pub log_format: String,
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub script_path: PathBuf,
    pub script: Arc<Script>,
    pub run: RunConfig,
    pub vusers: usize,
    pub ramp_per_sec: usize,
    pub dry_run: bool,
}

impl DriverConfig {
    /// run config for one virtual user, named after it
    pub fn run_config_for(&self, vuser: usize) -> RunConfig {
        let mut config = self.run.clone();
        config.name = format!("{}-{vuser}", self.run.name);
        config
    }
}

impl TryFrom<Cli> for DriverConfig {
    type Error = anyhow::Error;

    fn try_from(args: Cli) -> Result<Self> {
        if args.vusers == 0 {
            bail!("--vusers must be greater than 0");
        }

        let run = match &args.config_path {
            Some(path) => RunConfig::parse(path)?,
            None => RunConfig::default(),
        };
        let script = Script::parse(&args.script)
            .with_context(|| format!("failed to load script `{}`", args.script.display()))?;
        if script.steps.is_empty() {
            bail!("script `{}` has no steps", args.script.display());
        }

        Ok(Self {
            script_path: args.script,
            script: Arc::new(script),
            run,
            vusers: args.vusers,
            ramp_per_sec: args.ramp_per_sec,
            dry_run: args.dry_run,
        })
    }
}
