//! Deferred tasks: registration while offline, execution on reconnect.
//!
//! A tag is *pending* from [`SyncManager::register`] until the executor picks
//! it up. Registering a tag that is already pending is a no-op, so one offline
//! session produces at most one execution per tag. A registration made while
//! the same tag is running queues one more execution.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use easel_common::{retry_if, EaselError, RetryConfig};
use easel_core::NotificationPayload;
use hashbrown::HashMap;
use tracing::{debug, error, info};

use crate::notify::Notifier;

/// Result of [`SyncManager::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Queued,
    AlreadyPending,
}

/// Lifecycle of one execution of a deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    /// Every attempt failed; the task was dropped without notifying the user.
    Abandoned,
}

/// Pending deferred-task registrations.
#[derive(Debug, Default)]
pub struct SyncManager {
    inner: Mutex<SyncState>,
}

#[derive(Debug, Default)]
struct SyncState {
    pending: BTreeSet<String>,
    running: HashSet<String>,
    outcomes: HashMap<String, TaskState>,
}

impl SyncManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SyncState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue `tag` for execution once connectivity returns.
    pub fn register(&self, tag: &str) -> Registration {
        if self.state().pending.insert(tag.to_string()) {
            info!(tag, "Background sync registered");
            Registration::Queued
        } else {
            debug!(tag, "Background sync already pending");
            Registration::AlreadyPending
        }
    }

    pub fn is_pending(&self, tag: &str) -> bool {
        self.state().pending.contains(tag)
    }

    pub fn pending_tags(&self) -> Vec<String> {
        self.state().pending.iter().cloned().collect()
    }

    /// Current state: `Pending`, `Running`, or `None` when absent.
    pub fn state_of(&self, tag: &str) -> Option<TaskState> {
        let state = self.state();
        if state.running.contains(tag) {
            Some(TaskState::Running)
        } else if state.pending.contains(tag) {
            Some(TaskState::Pending)
        } else {
            None
        }
    }

    /// Terminal state of the most recent execution of `tag`.
    pub fn last_outcome(&self, tag: &str) -> Option<TaskState> {
        self.state().outcomes.get(tag).copied()
    }

    /// Move `tag` from pending to running. False if it was not pending or is already running.
    fn begin(&self, tag: &str) -> bool {
        let mut state = self.state();
        if state.running.contains(tag) || !state.pending.remove(tag) {
            return false;
        }
        state.running.insert(tag.to_string());
        true
    }

    fn finish(&self, tag: &str, outcome: TaskState) {
        let mut state = self.state();
        state.running.remove(tag);
        state.outcomes.insert(tag.to_string(), outcome);
    }
}

/// The work a deferred save performs.
#[async_trait]
pub trait SaveTask: Send + Sync {
    async fn run(&self) -> easel_common::Result<()>;
}

/// Stand-in save: waits a fixed latency and succeeds.
#[derive(Debug, Clone)]
pub struct SimulatedSave {
    latency: Duration,
}

impl SimulatedSave {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl SaveTask for SimulatedSave {
    async fn run(&self) -> easel_common::Result<()> {
        tokio::time::sleep(self.latency).await;
        Ok(())
    }
}

/// Runs the deferred save and announces completion.
pub struct TaskExecutor {
    task: Arc<dyn SaveTask>,
    notifier: Arc<dyn Notifier>,
    payload: NotificationPayload,
    retry: RetryConfig,
}

impl TaskExecutor {
    pub fn new(
        task: Arc<dyn SaveTask>,
        notifier: Arc<dyn Notifier>,
        payload: NotificationPayload,
        retry: RetryConfig,
    ) -> Self {
        Self {
            task,
            notifier,
            payload,
            retry,
        }
    }

    /// Execute `tag` if it is pending. Returns the terminal state, or `None`
    /// when there was nothing to run.
    pub async fn run(&self, sync: &SyncManager, tag: &str) -> Option<TaskState> {
        if !sync.begin(tag) {
            debug!(tag, "No runnable registration");
            return None;
        }

        info!(tag, "Syncing image save");
        let task = self.task.clone();
        let result = retry_if(
            &self.retry,
            move || {
                let task = task.clone();
                async move { task.run().await }
            },
            EaselError::is_retryable,
        )
        .await;

        let outcome = match result {
            Ok(()) => {
                info!(tag, "Image save synced successfully");
                self.notifier.notify(&self.payload);
                TaskState::Completed
            }
            Err(e) => {
                error!(tag, error = %e, category = e.category(), "Deferred task abandoned");
                TaskState::Abandoned
            }
        };

        sync.finish(tag, outcome);
        Some(outcome)
    }
}
