// src/sched/jitter.rs

//! Startup jitter.
//!
//! Many scheduler processes started by a coordinated deployment would
//! otherwise fire identical periodic work at the same instant. Two knobs
//! spread them out:
//!
//! - a per-task `jitter_max`, applied once before the owning group's first
//!   dispatch (see the scheduler's dispatch path);
//! - [`spawn_once_with_jitter`], an independent "run once near process
//!   start" helper.

use std::time::Duration;

use chrono::TimeDelta;
use rand::Rng;
use tracing::{debug, info};

use crate::sched::task::TaskFn;

/// Sample a uniform-random delay in `[0, max]`, at millisecond resolution.
///
/// Non-positive bounds yield a zero delay.
pub fn sample_delay(max: TimeDelta) -> Duration {
    let max_ms = max.num_milliseconds();
    if max_ms <= 0 {
        return Duration::ZERO;
    }
    let ms = rand::thread_rng().gen_range(0..=max_ms as u64);
    Duration::from_millis(ms)
}

/// Invoke `callable` exactly once after a uniform-random delay in `[0, max]`.
///
/// Must be called from within a Tokio runtime. The callable runs on the
/// blocking pool so it may block freely.
pub fn spawn_once_with_jitter(
    max: TimeDelta,
    callable: TaskFn,
    args: Vec<String>,
) -> tokio::task::JoinHandle<()> {
    let delay = sample_delay(max);
    info!(delay_ms = delay.as_millis() as u64, "scheduling one-shot startup task");

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        debug!("startup jitter elapsed; running one-shot task");
        let run = tokio::task::spawn_blocking(move || callable(&args));
        if let Err(err) = run.await {
            tracing::error!(error = %err, "one-shot startup task failed");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn delay_stays_within_bounds() {
        let max = TimeDelta::seconds(2);
        for _ in 0..1000 {
            let d = sample_delay(max);
            assert!(d <= Duration::from_secs(2));
        }
    }

    #[test]
    fn delay_is_roughly_uniform() {
        let max = TimeDelta::seconds(2);
        let samples: Vec<u64> = (0..1000)
            .map(|_| sample_delay(max).as_millis() as u64)
            .collect();

        let min = *samples.iter().min().unwrap();
        let max_seen = *samples.iter().max().unwrap();
        let mean = samples.iter().sum::<u64>() / samples.len() as u64;

        // Statistical bounds, extremely loose: with 1000 uniform samples in
        // [0, 2000] these fail with negligible probability.
        assert!(min < 200, "min sample {min} suspiciously high");
        assert!(max_seen > 1800, "max sample {max_seen} suspiciously low");
        assert!((700..=1300).contains(&mean), "mean {mean} not near 1000");
    }

    #[test]
    fn non_positive_bound_yields_zero_delay() {
        assert_eq!(sample_delay(TimeDelta::zero()), Duration::ZERO);
        assert_eq!(sample_delay(TimeDelta::seconds(-5)), Duration::ZERO);
    }

    #[tokio::test]
    async fn one_shot_runs_exactly_once_with_bound_args() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let count_c = Arc::clone(&count);
        let seen_c = Arc::clone(&seen);
        let callable: TaskFn = Arc::new(move |args: &[String]| {
            count_c.fetch_add(1, Ordering::SeqCst);
            seen_c.lock().unwrap().extend(args.iter().cloned());
        });

        let handle = spawn_once_with_jitter(
            TimeDelta::milliseconds(50),
            callable,
            vec!["a".to_string(), "b".to_string()],
        );
        handle.await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }
}
