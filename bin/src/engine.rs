use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{debug, info};
use txn_core::{Run, named_counter::NamedCounter};

use crate::config::DriverConfig;
use crate::report::{DriverReport, Totals, VuserResult};

pub async fn run(config: DriverConfig) -> Result<DriverReport> {
    let started = Instant::now();
    let script = config.script_path.display().to_string();

    if config.dry_run {
        return Ok(DriverReport::dry_run(script, config.vusers));
    }

    // one counter for every vuser so artifact names never collide
    let counter = NamedCounter::new();
    let ramp_delay = ramp_delay(config.ramp_per_sec);

    let mut tasks = JoinSet::new();
    for vuser in 0..config.vusers {
        let config = config.clone();
        let counter = counter.clone();
        // scripts block on sleeps and file writes
        tasks.spawn_blocking(move || run_vuser(vuser, &config, counter));

        if let Some(delay) = ramp_delay {
            tokio::time::sleep(delay).await;
        }
    }

    let mut runs = Vec::with_capacity(config.vusers);
    while let Some(joined) = tasks.join_next().await {
        let result = joined.context("vuser task join failed")?;
        runs.push(result);
    }
    runs.sort_by_key(|run| run.vuser);

    let totals = Totals::compute(&runs, config.vusers);
    let passed = totals.failed_vusers == 0 && totals.completed_vusers == config.vusers;
    info!(
        passed,
        vusers = config.vusers,
        transactions = totals.transactions,
        "script finished"
    );

    Ok(DriverReport {
        script,
        dry_run: false,
        passed,
        duration_ms: started.elapsed().as_millis(),
        totals,
        runs,
    })
}

fn run_vuser(vuser: usize, config: &DriverConfig, counter: NamedCounter) -> VuserResult {
    let run = Run::new(config.run_config_for(vuser), counter);
    debug!(vuser, run = %run.config().name, "vuser started");
    let step_errors = config.script.execute(&run);
    let teardown = run.teardown();
    VuserResult::new(vuser, step_errors, teardown, run.aggregate())
}

fn ramp_delay(ramp_per_sec: usize) -> Option<Duration> {
    if ramp_per_sec == 0 {
        None
    } else {
        Some(Duration::from_secs_f64(1.0 / ramp_per_sec as f64))
    }
}
