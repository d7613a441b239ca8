mod assign;
mod cycle;
mod filter;
mod ingest;
mod padding;
mod plan;
mod render;

use std::path::Path;
use std::time::Duration;

use lanecast_db::config::PlannerConfig;
use log::{error, info, warn};
use miette::IntoDiagnostic;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::{Instant, interval_at};

#[tokio::main]
async fn main() -> miette::Result<()> {
    env_logger::init();

    let mut config = PlannerConfig::config().into_diagnostic()?;
    prepare_paths(&config).into_diagnostic()?;
    lanecast_db::run_migrations(&config.db_path).into_diagnostic()?;

    // Best effort: a failed initial refresh must not stop the scheduler
    info!("Initial refresh starting");
    run_and_log(&config).await;

    let period = Duration::from_secs(config.schedule_hours.max(1) as u64 * 3600);
    let mut ticks = interval_at(Instant::now() + period, period);
    let mut hangups = signal(SignalKind::hangup()).into_diagnostic()?;

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                info!("Scheduled refresh starting");
            }
            _ = hangups.recv() => {
                info!("Refresh requested by SIGHUP");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }

        // Tunables and filter rules are re-read on every refresh
        match PlannerConfig::config() {
            Ok(fresh) => config = fresh,
            Err(err) => warn!("Ignoring invalid configuration update: {err}"),
        }

        run_and_log(&config).await;
    }

    Ok(())
}

async fn run_and_log(config: &PlannerConfig) {
    match cycle::run_cycle(config).await {
        Ok(stats) => info!(
            "plan {}: {} programmes ({} real, {} placeholders), {} dropped, {} airings ingested",
            stats.plan_id,
            stats.programmes,
            stats.real,
            stats.placeholders,
            stats.dropped,
            stats.ingested,
        ),
        Err(err) => error!("Refresh cycle failed; last good plan stays active: {err:?}"),
    }
}

fn prepare_paths(config: &PlannerConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(&config.db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&config.out_dir)
}
