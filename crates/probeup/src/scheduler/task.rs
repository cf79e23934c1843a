//! Per-path check task.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::{sync::Mutex, time::Instant};
use tokio_util::sync::CancellationToken;

/// Lifecycle of a check task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Registered, `start` event not yet emitted
    Starting,
    /// Ticking; check events may be emitted
    Active,
    /// Cancelled; no further events will be emitted
    Stopping,
    /// Removed from the registry
    Removed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Starting => write!(f, "starting"),
            TaskState::Active => write!(f, "active"),
            TaskState::Stopping => write!(f, "stopping"),
            TaskState::Removed => write!(f, "removed"),
        }
    }
}

/// One monitored path and its schedule
///
/// The state lock is held while a worker emits a check event and while the
/// dispatcher moves the task to `Stopping`, so a stop can never be overtaken
/// by a check for the same path.
pub struct CheckTask {
    path: String,
    interval: Duration,
    created: Instant,
    sequence: AtomicU64,
    state: Mutex<TaskState>,
    cancel: CancellationToken,
}

impl fmt::Debug for CheckTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckTask")
            .field("path", &self.path)
            .field("interval", &self.interval)
            .field("sequence", &self.sequence())
            .finish()
    }
}

impl CheckTask {
    pub fn new(path: impl Into<String>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            created: Instant::now(),
            sequence: AtomicU64::new(0),
            state: Mutex::new(TaskState::Starting),
            cancel: CancellationToken::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Instant the schedule is anchored at; tick `i` is due at
    /// `created + i * interval`
    pub fn created(&self) -> Instant {
        self.created
    }

    /// Number of ticks started so far
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Claim the next tick number
    pub(crate) fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn state(&self) -> TaskState {
        *self.state.lock().await
    }

    pub(crate) fn state_lock(&self) -> &Mutex<TaskState> {
        &self.state
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Move to `Stopping` and cancel future ticks.
    ///
    /// Returns `false` if the task was already stopping or removed.
    pub async fn begin_stop(&self) -> bool {
        let mut state = self.state.lock().await;
        let was_running = matches!(*state, TaskState::Starting | TaskState::Active);
        if was_running {
            *state = TaskState::Stopping;
        }
        self.cancel.cancel();
        was_running
    }

    pub async fn set_state(&self, new_state: TaskState) {
        *self.state.lock().await = new_state;
    }
}
