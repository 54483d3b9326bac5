// src/types.rs

use std::str::FromStr;

use serde::Deserialize;

/// Policy for when a task's `last` timestamp is written.
///
/// - `Completion`: a task's `last` is stamped with the instant its own
///   execution finished. The worker carries the completion instant back in
///   the group's token, and the scheduler applies it on the next poll
///   (default behaviour).
/// - `Dispatch`: `last` is stamped for the dispatched task at the moment its
///   group token is consumed, before the work runs. The next trigger is then
///   measured from dispatch rather than from completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StampPolicy {
    Completion,
    Dispatch,
}

impl Default for StampPolicy {
    fn default() -> Self {
        StampPolicy::Completion
    }
}

impl FromStr for StampPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completion" => Ok(StampPolicy::Completion),
            "dispatch" => Ok(StampPolicy::Dispatch),
            other => Err(format!(
                "invalid stamp_policy: {other} (expected \"completion\" or \"dispatch\")"
            )),
        }
    }
}
