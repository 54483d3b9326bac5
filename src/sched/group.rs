// src/sched/group.rs

//! Per-group single-flight execution control.
//!
//! Each group owns exactly one [`GroupSlot`]: a one-capacity token channel
//! plus a handle to the most recently spawned worker. Token present means the
//! group is idle; token absent means a worker is in flight. The single
//! capacity makes the hand-off safe: two workers can never both believe the
//! slot is free.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, warn};

/// Token returned to a group's slot when a worker finishes.
///
/// Carries the name of the task that held the slot and the instant its
/// execution completed, so the scheduler can stamp `last` with the task's own
/// completion time under [`crate::types::StampPolicy::Completion`].
#[derive(Debug, Clone)]
pub struct CompletionToken {
    pub task: String,
    pub completed_at: DateTime<Utc>,
}

/// One-capacity completion slot for a group.
#[derive(Debug)]
pub struct GroupSlot {
    token_tx: mpsc::Sender<CompletionToken>,
    token_rx: mpsc::Receiver<CompletionToken>,
    /// Most recently spawned worker for this group. Retained for lifecycle
    /// observability, never awaited by the scheduler.
    worker: Option<tokio::task::JoinHandle<()>>,
    /// Whether this group has ever dispatched (gates startup jitter).
    dispatched: bool,
}

impl GroupSlot {
    /// Create an idle slot, pre-loaded with a token naming the registering
    /// task. The token's `completed_at` carries that task's initial `last`
    /// so that applying it is a no-op.
    pub fn new(task: &str, last: DateTime<Utc>) -> Self {
        let (token_tx, token_rx) = mpsc::channel(1);
        token_tx
            .try_send(CompletionToken {
                task: task.to_string(),
                completed_at: last,
            })
            .expect("fresh one-capacity channel accepts the priming token");

        Self {
            token_tx,
            token_rx,
            worker: None,
            dispatched: false,
        }
    }

    /// Consume the completion token if the group is idle.
    ///
    /// Non-blocking: a busy group (token absent) returns `None` and the
    /// caller re-evaluates on its next poll.
    pub fn try_acquire(&mut self) -> Option<CompletionToken> {
        match self.token_rx.try_recv() {
            Ok(token) => Some(token),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                // Both halves live in this struct, so this is unreachable in
                // practice; treat it as a busy group.
                warn!("group token channel disconnected");
                None
            }
        }
    }

    /// Return a previously acquired token without dispatching.
    pub fn put_back(&mut self, token: CompletionToken) {
        if let Err(err) = self.token_tx.try_send(token) {
            // Capacity 1 and we hold the only consumed token, so this should
            // never fire.
            warn!(error = %err, "failed to return group token");
        }
    }

    /// Sender half workers use to hand their completion token back.
    pub fn sender(&self) -> mpsc::Sender<CompletionToken> {
        self.token_tx.clone()
    }

    pub fn has_dispatched(&self) -> bool {
        self.dispatched
    }

    /// Record a dispatch and retain the worker's handle.
    pub fn set_worker(&mut self, handle: tokio::task::JoinHandle<()>) {
        self.dispatched = true;
        if let Some(previous) = self.worker.replace(handle) {
            if !previous.is_finished() {
                // The token protocol guarantees the previous worker returned
                // its token before a new one was dispatched; it may still be
                // finishing its final send.
                debug!("previous group worker handle still settling");
            }
        }
    }
}
