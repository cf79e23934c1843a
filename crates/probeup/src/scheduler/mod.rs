//! Path scheduler - one independent periodic worker per monitored path.
//!
//! Tick #0 probes as soon as the task is scheduled. Later ticks are due at
//! `created + i * interval`; a tick that comes due while the previous probe
//! is still running is skipped and reported as blocked, so ticks for one
//! path never overlap and a slow path never delays any other.

mod task;

use std::{sync::Arc, time::Duration};

use tokio::time::{interval_at, timeout, Instant, Interval, MissedTickBehavior};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

pub use task::{CheckTask, TaskState};

use crate::{emitter::EventEmitter, probe::{Probe, ProbeResult}};

/// Path scheduler - owns the workers of every check task
pub struct PathScheduler {
    probe: Arc<dyn Probe>,
    emitter: EventEmitter,
    workers: TaskTracker,
}

impl PathScheduler {
    /// Create a new path scheduler
    pub fn new(probe: Arc<dyn Probe>, emitter: EventEmitter) -> Self {
        Self {
            probe,
            emitter,
            workers: TaskTracker::new(),
        }
    }

    /// Start ticking `task`. The task must already be `Active`.
    pub fn schedule(&self, task: Arc<CheckTask>) {
        let worker = Worker {
            task,
            probe: self.probe.clone(),
            emitter: self.emitter.clone(),
        };
        self.workers.spawn(worker.run());
    }

    /// Cancel the future ticks of `task`.
    ///
    /// When this returns no new tick will start and no check event for the
    /// task will be emitted; a probe already running is abandoned and its
    /// result dropped.
    pub async fn cancel(&self, task: &CheckTask) -> bool {
        task.begin_stop().await
    }

    /// Cancel every task and wait up to `wait` for the workers to exit
    pub async fn shutdown(&self, tasks: Vec<Arc<CheckTask>>, wait: Duration) -> bool {
        for task in &tasks {
            task.begin_stop().await;
            task.set_state(TaskState::Removed).await;
        }
        self.workers.close();

        match timeout(wait, self.workers.wait()).await {
            Ok(()) => {
                debug!("all {} checkers stopped", tasks.len());
                true
            }
            Err(_) => {
                warn!("{} checkers still running after {:?}", self.workers.len(), wait);
                false
            }
        }
    }

    /// Number of workers that have not exited yet
    pub fn running(&self) -> usize {
        self.workers.len()
    }
}

struct Worker {
    task: Arc<CheckTask>,
    probe: Arc<dyn Probe>,
    emitter: EventEmitter,
}

impl Worker {
    async fn run(self) {
        let path = self.task.path();
        let interval = self.task.interval();
        let cancel = self.task.cancel_token().clone();
        info!("checker {:?} started", path);

        let mut timer = interval_at(self.task.created() + interval, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if self.tick(&mut timer).await {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = timer.tick() => {
                        if !self.tick(&mut timer).await {
                            break;
                        }
                    }
                }
            }
        }

        info!("checker {:?} stopped after {} checks", path, self.task.sequence());
    }

    /// Run one probe and emit its result. Returns `false` once the worker
    /// should exit.
    async fn tick(&self, timer: &mut Interval) -> bool {
        let path = self.task.path();
        let cancel = self.task.cancel_token();
        let sequence = self.task.next_sequence();
        let started = Instant::now();
        debug!("checking {:?} (tick {})...", path, sequence);

        let probe = self.probe.probe(path);
        tokio::pin!(probe);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("checker {:?} stopped while checking, dropping result", path);
                    return false;
                }
                outcome = &mut probe => break outcome,
                _ = timer.tick() => {
                    warn!(
                        "checker {:?} is blocked for {:.6} seconds",
                        path,
                        started.elapsed().as_secs_f64()
                    );
                }
            }
        };

        let result = ProbeResult::new(path.to_string(), sequence, outcome);
        match &result.outcome {
            Ok(latency) => debug!(
                "check {:?} #{} completed in {:.6} seconds at {:.6}",
                path,
                result.sequence,
                latency.as_secs_f64(),
                result.unix_time()
            ),
            Err(errno) => error!(
                "check {:?} #{} failed: {}",
                path,
                result.sequence,
                errno.description()
            ),
        }

        let state = self.task.state_lock().lock().await;
        if *state != TaskState::Active {
            debug!("checker {:?} is {}, dropping result", path, *state);
            return false;
        }
        let sent = self.emitter.emit(result.into_event()).await;
        drop(state);

        sent.is_ok()
    }
}
