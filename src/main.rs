// src/main.rs

use std::sync::Arc;

use chrono::TimeDelta;
use tracing::info;

use persched::sched::{spawn_once_with_jitter, TaskSpec};
use persched::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("persched error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;

    // One-shot warmup, desynchronized so a fleet restarted together does not
    // fire it in lockstep.
    spawn_once_with_jitter(
        TimeDelta::seconds(2),
        Arc::new(announce),
        vec!["warmup".to_string()],
    );

    run(args, |scheduler| {
        // Demo tasks; real deployments would register their own work here.
        // `register_if_absent` resumes each task's schedule from the state
        // file across restarts.
        scheduler.register_if_absent(
            TaskSpec::new("heartbeat-fast", TimeDelta::seconds(1), announce)
                .args(["heartbeat-fast"]),
        )?;
        scheduler.register_if_absent(
            TaskSpec::new("heartbeat-slow", TimeDelta::seconds(4), announce)
                .args(["heartbeat-slow"])
                .jitter_max(TimeDelta::seconds(2)),
        )?;
        Ok(())
    })
    .await
}

fn announce(args: &[String]) {
    info!(args = ?args, "task fired");
}
