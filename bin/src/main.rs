use anyhow::Result;
use clap::Parser;
use tokio::runtime::Builder;
use tracing::{debug, error};
use txn_bin::{Cli, DriverConfig, run_script};
use txn_core::config::trace;

fn main() -> Result<()> {
    // parses from cli or environment var
    let cli = Cli::parse();
    let trace_config = trace::Config::parse(&cli.txn_log, &cli.log_format)?;
    debug!(?cli, ?trace_config);
    let output_json = cli.json;

    let config = match DriverConfig::try_from(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err:#}");
            std::process::exit(2);
        }
    };

    let rt = Builder::new_multi_thread()
        .thread_name("txnrun-worker")
        .enable_all()
        .build()?;

    match rt.block_on(run_script(config)) {
        Ok(report) => {
            if output_json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(err) => {
                        eprintln!("failed to serialize report: {err:#}");
                        std::process::exit(2);
                    }
                }
            } else {
                println!("{}", report.human_summary());
            }

            if report.passed {
                std::process::exit(0);
            }
            std::process::exit(1);
        }
        Err(err) => {
            error!(?err, "run failed");
            eprintln!("run failed: {err:#}");
            std::process::exit(1);
        }
    }
}
