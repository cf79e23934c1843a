//! Probe engine - measures how long one read of a path takes
//!
//! This module is responsible for:
//! - Defining the [`Probe`] seam the scheduler calls on every tick
//! - Classifying probe outcomes into errno-style codes
//! - The production direct I/O probe

pub mod directio;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::protocol::{Errno, Event};

pub use directio::DirectIoProbe;

/// Probe trait for different ways of reading a path
#[async_trait]
pub trait Probe: Send + Sync {
    /// Read from `path` once and report the latency or the failure
    async fn probe(&self, path: &str) -> Result<Duration, Errno>;
}

/// Result of one probe
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Path that was probed
    pub path: String,

    /// Tick number of the task that ran the probe
    pub sequence: u64,

    /// Wall clock time the probe completed
    pub timestamp: SystemTime,

    /// Latency of the read, or the errno it failed with
    pub outcome: Result<Duration, Errno>,
}

impl ProbeResult {
    /// Create a new probe result
    pub fn new(path: String, sequence: u64, outcome: Result<Duration, Errno>) -> Self {
        Self {
            path,
            sequence,
            timestamp: SystemTime::now(),
            outcome,
        }
    }

    /// Completion time in seconds since the epoch
    pub fn unix_time(&self) -> f64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    pub fn error(&self) -> Errno {
        match self.outcome {
            Ok(_) => Errno::SUCCESS,
            Err(errno) => errno,
        }
    }

    /// The `check` event reporting this result
    pub fn into_event(self) -> Event {
        match self.outcome {
            Ok(latency) => Event::checked(self.path, latency),
            Err(errno) => Event::check_failed(self.path, errno),
        }
    }
}
