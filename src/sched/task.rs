// src/sched/task.rs

//! Task descriptors: the registration-time spec and the registry entry.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

/// The work a task performs, invoked with the argument list bound at
/// registration. Return values are ignored by the scheduler.
pub type TaskFn = Arc<dyn Fn(&[String]) + Send + Sync + 'static>;

/// Everything a caller supplies when registering a task.
///
/// The group defaults to the task's own name, so every task runs in its own
/// group unless explicitly shared.
#[derive(Clone)]
pub struct TaskSpec {
    pub(crate) name: String,
    pub(crate) interval: TimeDelta,
    pub(crate) callable: TaskFn,
    pub(crate) args: Vec<String>,
    pub(crate) group: Option<String>,
    pub(crate) jitter_max: Option<TimeDelta>,
}

impl TaskSpec {
    pub fn new(
        name: impl Into<String>,
        interval: TimeDelta,
        callable: impl Fn(&[String]) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            interval,
            callable: Arc::new(callable),
            args: Vec::new(),
            group: None,
            jitter_max: None,
        }
    }

    /// Bind a fixed ordered argument list; passed verbatim on every run.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Share a serial-execution group with other tasks.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Bound for the one-time random delay before this group's first dispatch.
    pub fn jitter_max(mut self, max: TimeDelta) -> Self {
        self.jitter_max = Some(max);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective group name: explicit group, or the task's own name.
    pub(crate) fn effective_group(&self) -> String {
        self.group.clone().unwrap_or_else(|| self.name.clone())
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("args", &self.args)
            .field("group", &self.group)
            .field("jitter_max", &self.jitter_max)
            .finish_non_exhaustive()
    }
}

/// A registered task as held by the scheduler's registry.
#[derive(Clone)]
pub struct TaskEntry {
    pub name: String,
    pub interval: TimeDelta,
    /// Instant of the most recent trigger, per the scheduler's stamp policy.
    pub last: DateTime<Utc>,
    pub group: String,
    pub callable: TaskFn,
    pub args: Vec<String>,
    pub jitter_max: Option<TimeDelta>,
}

impl TaskEntry {
    pub(crate) fn from_spec(spec: TaskSpec, group: String, last: DateTime<Utc>) -> Self {
        Self {
            name: spec.name,
            interval: spec.interval,
            last,
            group,
            callable: spec.callable,
            args: spec.args,
            jitter_max: spec.jitter_max,
        }
    }

    /// Whether this task is due at `now`. Strict inequality: a task whose
    /// elapsed time equals its interval exactly is not yet due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last) > self.interval
    }
}

impl fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskEntry")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("last", &self.last)
            .field("group", &self.group)
            .field("args", &self.args)
            .field("jitter_max", &self.jitter_max)
            .finish_non_exhaustive()
    }
}
