// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod sched;
pub mod store;
pub mod timefmt;
pub mod types;

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::cli::CliArgs;
use crate::config::Settings;
use crate::sched::Scheduler;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - scheduler construction (loading persisted state)
/// - caller-supplied task registration
/// - the fixed-cadence driver loop
/// - Ctrl-C handling
///
/// The scheduler itself performs no timing; this loop is the external driver
/// that invokes the poll-and-persist operation once per tick.
pub async fn run<F>(args: CliArgs, register: F) -> Result<()>
where
    F: FnOnce(&mut Scheduler) -> errors::Result<()>,
{
    let settings = config::load_or_default(&args.config)?;

    if args.dry_run {
        print_dry_run(&settings);
        return Ok(());
    }

    let mut scheduler = Scheduler::from_settings(&settings)?;
    register(&mut scheduler)?;

    // Seed the state file with the freshly registered tasks so a crash
    // before the first persistence tick still leaves a coherent document.
    if scheduler.has_state_file() {
        scheduler.update_file()?;
    }

    info!(
        tasks = scheduler.task_names().count(),
        tick_secs = settings.tick.as_secs(),
        "persched driver loop started"
    );

    let mut ticker = tokio::time::interval(settings.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval fires immediately; skip it so the
    // first poll happens one full tick after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = scheduler.run_pending_and_update_file() {
                    // Per-poll persistence failures are reported without
                    // crashing the driver loop.
                    error!(error = %err, "poll-and-persist tick failed");
                }
                if args.once {
                    info!("--once: single tick complete; exiting");
                    break;
                }
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    error!(error = %err, "failed to listen for Ctrl+C");
                }
                info!("shutdown requested");
                break;
            }
        }
    }

    // Final durable flush so no more than one tick of progress is lost.
    if scheduler.has_state_file() {
        scheduler.update_file()?;
    }

    info!("persched driver loop exiting");
    Ok(())
}

/// Simple dry-run output: print the effective settings.
fn print_dry_run(settings: &Settings) {
    println!("persched dry-run");
    match &settings.state_file {
        Some(path) => println!("  scheduler.state_file = {}", path.display()),
        None => println!("  scheduler.state_file = <none> (persistence disabled)"),
    }
    println!(
        "  scheduler.file_update_interval = {}",
        settings.file_update_interval
    );
    println!("  scheduler.tick_seconds = {}", settings.tick.as_secs());
    println!("  scheduler.stamp_policy = {:?}", settings.stamp_policy);
}
