// src/sched/scheduler.rs

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::errors::{Result, SchedError};
use crate::sched::group::{CompletionToken, GroupSlot};
use crate::sched::jitter;
use crate::sched::task::{TaskEntry, TaskSpec};
use crate::store;
use crate::timefmt;
use crate::types::StampPolicy;

/// Recurring-task scheduler with per-group single-flight execution and a
/// persisted last-run map.
///
/// The scheduler owns the task registry and all group slots; there are no
/// process-wide singletons. It performs no timing of its own: an external
/// driver loop calls [`Scheduler::run_pending`] (or
/// [`Scheduler::run_pending_and_update_file`]) on a fixed cadence, and the
/// poll itself never blocks on task completion.
///
/// Dispatch requires a Tokio runtime context: workers are spawned onto the
/// runtime and run their callables on the blocking pool.
pub struct Scheduler {
    tasks: HashMap<String, TaskEntry>,
    /// Registration order; polling iterates tasks in this order.
    order: Vec<String>,
    groups: HashMap<String, GroupSlot>,
    /// Last-run instants loaded from the backing store at construction,
    /// consulted by [`Scheduler::register_if_absent`].
    seeded: HashMap<String, DateTime<Utc>>,
    state_path: Option<PathBuf>,
    file_update_interval: u32,
    file_update_cursor: u32,
    stamp_policy: StampPolicy,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.order)
            .field("state_path", &self.state_path)
            .field("file_update_interval", &self.file_update_interval)
            .field("stamp_policy", &self.stamp_policy)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Scheduler without a backing store. Persistence calls are rejected
    /// with [`SchedError::Storage`].
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            order: Vec::new(),
            groups: HashMap::new(),
            seeded: HashMap::new(),
            state_path: None,
            file_update_interval: 1,
            file_update_cursor: 0,
            stamp_policy: StampPolicy::default(),
        }
    }

    /// Scheduler backed by a state file, loading any previously persisted
    /// last-run instants. The file is created empty if absent; unreadable or
    /// corrupt content aborts construction.
    pub fn with_state_file(
        path: impl Into<PathBuf>,
        file_update_interval: u32,
    ) -> Result<Self> {
        let path = path.into();
        let seeded = store::load(&path)?;

        info!(
            path = %path.display(),
            seeded = seeded.len(),
            "scheduler state loaded"
        );

        let mut scheduler = Self::new();
        scheduler.seeded = seeded;
        scheduler.state_path = Some(path);
        scheduler.file_update_interval = file_update_interval.max(1);
        Ok(scheduler)
    }

    /// Construct from validated [`Settings`] (the binary entry point).
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut scheduler = match &settings.state_file {
            Some(path) => Self::with_state_file(path.clone(), settings.file_update_interval)?,
            None => Self::new(),
        };
        scheduler.stamp_policy = settings.stamp_policy;
        Ok(scheduler)
    }

    /// Override the last-stamp policy; see [`StampPolicy`].
    pub fn set_stamp_policy(&mut self, policy: StampPolicy) {
        self.stamp_policy = policy;
    }

    pub fn stamp_policy(&self) -> StampPolicy {
        self.stamp_policy
    }

    pub fn has_state_file(&self) -> bool {
        self.state_path.is_some()
    }

    /// Register a new task with `last = now`.
    ///
    /// Fails with [`SchedError::DuplicateTask`] if the name is taken; the
    /// scheduler state is unchanged in that case. Registering into a group
    /// recreates that group's slot.
    pub fn register(&mut self, spec: TaskSpec) -> Result<()> {
        self.register_with_last(spec, timefmt::now())
    }

    /// Like [`Scheduler::register`], but when the task name was present in
    /// the loaded state file, `last` resumes from the persisted instant so
    /// the task's schedule survives process restarts.
    pub fn register_if_absent(&mut self, spec: TaskSpec) -> Result<()> {
        match self.seeded.get(spec.name()).copied() {
            Some(last) => {
                debug!(
                    task = %spec.name(),
                    last = %timefmt::encode_instant(last),
                    "resuming task schedule from persisted state"
                );
                self.register_with_last(spec, last)
            }
            None => self.register(spec),
        }
    }

    fn register_with_last(&mut self, spec: TaskSpec, last: DateTime<Utc>) -> Result<()> {
        if self.tasks.contains_key(spec.name()) {
            return Err(SchedError::DuplicateTask(spec.name().to_string()));
        }
        if spec.interval < TimeDelta::zero() {
            return Err(SchedError::ConfigError(format!(
                "task '{}' has a negative interval",
                spec.name()
            )));
        }
        if spec.jitter_max.is_some_and(|j| j < TimeDelta::zero()) {
            return Err(SchedError::ConfigError(format!(
                "task '{}' has a negative jitter_max",
                spec.name()
            )));
        }

        let group = spec.effective_group();
        let entry = TaskEntry::from_spec(spec, group.clone(), last);

        info!(
            task = %entry.name,
            group = %group,
            interval_ms = entry.interval.num_milliseconds(),
            "registered task"
        );

        // Registering into a group recreates its slot, primed with this
        // task's name and initial last-run instant.
        self.groups
            .insert(group, GroupSlot::new(&entry.name, entry.last));
        self.order.push(entry.name.clone());
        self.tasks.insert(entry.name.clone(), entry);
        Ok(())
    }

    /// Remove a task from the registry.
    ///
    /// The task's group slot is deliberately left in place even if the group
    /// becomes empty; tasks are not expected to be removed at high churn.
    pub fn unregister(&mut self, name: &str) -> Result<()> {
        if self.tasks.remove(name).is_none() {
            return Err(SchedError::ConfigError(format!(
                "cannot unregister unknown task '{name}'"
            )));
        }
        self.order.retain(|n| n != name);
        info!(task = %name, "unregistered task");
        Ok(())
    }

    /// Registered task names, in registration order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// The `last` instant currently recorded for a task.
    pub fn last_of(&self, name: &str) -> Option<DateTime<Utc>> {
        self.tasks.get(name).map(|t| t.last)
    }

    /// The effective group of a task.
    pub fn group_of(&self, name: &str) -> Option<&str> {
        self.tasks.get(name).map(|t| t.group.as_str())
    }

    /// One polling pass: dispatch every due task whose group is idle.
    ///
    /// Busy groups are skipped and re-evaluated on the next poll; nothing is
    /// queued. The poll never blocks on running workers.
    pub fn run_pending(&mut self) {
        let now = timefmt::now();

        if self.stamp_policy == StampPolicy::Completion {
            self.absorb_completions();
        }

        let names = self.order.clone();
        for name in names {
            let (due, group) = match self.tasks.get(&name) {
                Some(entry) => (entry.is_due(now), entry.group.clone()),
                None => continue,
            };
            if !due {
                continue;
            }
            self.try_dispatch(&name, &group, now);
        }
    }

    /// Wraps [`Scheduler::run_pending`] with the persistence cadence: every
    /// `file_update_interval`-th call also rewrites the state file.
    pub fn run_pending_and_update_file(&mut self) -> Result<()> {
        self.run_pending();

        self.file_update_cursor += 1;
        if self.file_update_cursor >= self.file_update_interval {
            self.file_update_cursor = 0;
            self.update_file()?;
        }
        Ok(())
    }

    /// Rewrite the state file from the registry's current `last` values.
    ///
    /// Fails with [`SchedError::Storage`] if the scheduler was constructed
    /// without a backing file.
    pub fn update_file(&self) -> Result<()> {
        let path = self.state_path.as_deref().ok_or_else(|| {
            SchedError::Storage("no state file configured for this scheduler".to_string())
        })?;

        store::save(
            path,
            self.order.iter().filter_map(|name| {
                self.tasks.get(name).map(|t| (t.name.as_str(), t.last))
            }),
        )
    }

    /// Apply completion stamps carried by idle groups' tokens.
    ///
    /// Workers hand their completion instant back inside the token; the poll
    /// absorbs those stamps before due-checking so `last` reflects each
    /// task's own completion time.
    fn absorb_completions(&mut self) {
        let groups: Vec<String> = self.groups.keys().cloned().collect();
        for group in groups {
            let token = match self.groups.get_mut(&group) {
                Some(slot) => slot.try_acquire(),
                None => None,
            };
            let Some(token) = token else { continue };

            self.apply_completion(&token);
            if let Some(slot) = self.groups.get_mut(&group) {
                slot.put_back(token);
            }
        }
    }

    fn apply_completion(&mut self, token: &CompletionToken) {
        match self.tasks.get_mut(&token.task) {
            Some(entry) => {
                // Monotonic: re-applying an already absorbed stamp is a no-op.
                if entry.last < token.completed_at {
                    debug!(
                        task = %entry.name,
                        completed_at = %timefmt::encode_instant(token.completed_at),
                        "stamping last from completion token"
                    );
                    entry.last = token.completed_at;
                }
            }
            None => {
                debug!(
                    task = %token.task,
                    "completion token for unregistered task; dropping stamp"
                );
            }
        }
    }

    /// Attempt to dispatch `name` through its group's slot.
    fn try_dispatch(&mut self, name: &str, group: &str, now: DateTime<Utc>) {
        let (token, first_dispatch) = {
            let Some(slot) = self.groups.get_mut(group) else {
                warn!(task = %name, group = %group, "no slot for group; skipping");
                return;
            };
            let Some(token) = slot.try_acquire() else {
                debug!(task = %name, group = %group, "group busy; skipping this poll");
                return;
            };
            (token, !slot.has_dispatched())
        };

        match self.stamp_policy {
            StampPolicy::Completion => {
                // A worker may have returned its token between the absorb
                // pass and this acquisition; apply its stamp and re-check.
                self.apply_completion(&token);
                let still_due = self
                    .tasks
                    .get(name)
                    .is_some_and(|entry| entry.is_due(now));
                if !still_due {
                    if let Some(slot) = self.groups.get_mut(group) {
                        slot.put_back(token);
                    }
                    return;
                }
            }
            StampPolicy::Dispatch => {
                if let Some(entry) = self.tasks.get_mut(name) {
                    entry.last = now;
                }
            }
        }

        let Some(entry) = self.tasks.get(name) else {
            if let Some(slot) = self.groups.get_mut(group) {
                slot.put_back(token);
            }
            return;
        };

        let delay = if first_dispatch {
            entry.jitter_max.map(jitter::sample_delay)
        } else {
            None
        };

        let Some(slot) = self.groups.get_mut(group) else { return };
        let token_tx = slot.sender();
        let task_name = entry.name.clone();
        let callable = entry.callable.clone();
        let args = entry.args.clone();

        info!(
            task = %task_name,
            group = %group,
            delay_ms = delay.map(|d| d.as_millis() as u64).unwrap_or(0),
            "dispatching task"
        );

        let worker_name = task_name.clone();
        let handle = tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let run = tokio::task::spawn_blocking(move || callable(&args));
            match run.await {
                Ok(()) => debug!(task = %worker_name, "task execution finished"),
                Err(err) => {
                    // A panicking callable must not starve its group: log the
                    // failure and return the token regardless.
                    error!(
                        task = %worker_name,
                        error = %err,
                        "task execution failed; releasing group slot"
                    );
                }
            }

            let token = CompletionToken {
                task: worker_name.clone(),
                completed_at: timefmt::now(),
            };
            if token_tx.send(token).await.is_err() {
                debug!(
                    task = %worker_name,
                    "scheduler dropped before completion token could be returned"
                );
            }
        });

        slot.set_worker(handle);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
