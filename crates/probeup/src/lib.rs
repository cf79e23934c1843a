//! probeup - Direct I/O path health checking for Uppe
//!
//! This library checks that storage paths (domain metadata files,
//! multipath devices) keep answering reads. A driver process sends
//! `start <path> <interval>` and `stop <path>` lines; the daemon probes every
//! path on its own schedule and answers with one event line per outcome.

use std::time::Duration;

pub mod config;
pub mod daemon;
pub mod dispatcher;
pub mod emitter;
pub mod error;
pub mod probe;
pub mod protocol;
pub mod registry;
pub mod scheduler;

// Re-export main types
pub use config::{DaemonConfig, DaemonConfigBuilder};
pub use daemon::Daemon;
pub use dispatcher::CommandDispatcher;
pub use emitter::{EventEmitter, EventWriter};
pub use error::{DaemonError, EmitError};
pub use probe::{DirectIoProbe, Probe, ProbeResult};
pub use protocol::{Command, Errno, Event, EventName};
pub use registry::CheckRegistry;
pub use scheduler::{CheckTask, PathScheduler, TaskState};

/// Bytes read by each probe, and the alignment of its buffer
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Shortest interval accepted by default
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Longest interval accepted by default
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Default capacity of the outgoing event queue
pub const DEFAULT_EVENT_QUEUE: usize = 128;
