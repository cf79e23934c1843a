//! Daemon configuration types.

use std::time::Duration;

use crate::{DEFAULT_BLOCK_SIZE, DEFAULT_EVENT_QUEUE, DEFAULT_MAX_INTERVAL, DEFAULT_MIN_INTERVAL};

/// Configuration options for the check daemon
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    /// Shortest interval a `start` command may ask for
    pub min_interval: Duration,

    /// Longest interval a `start` command may ask for
    pub max_interval: Duration,

    /// Number of bytes read from the start of the path by each probe
    pub probe_size: usize,

    /// Alignment of the probe buffer, required by direct I/O
    pub probe_align: usize,

    /// Open paths with `O_DIRECT`
    pub direct_io: bool,

    /// Fall back to a buffered read after dropping the page cache when the
    /// filesystem refuses `O_DIRECT`
    pub buffered_fallback: bool,

    /// Capacity of the outgoing event queue
    pub event_queue: usize,

    /// How long a producer may wait for room in the event queue before the
    /// reader is considered gone
    pub send_timeout: Duration,

    /// Longest accepted control line, in bytes
    pub max_line_length: usize,

    /// Upper bound on waiting for workers and the writer at shutdown
    pub shutdown_timeout: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            probe_size: DEFAULT_BLOCK_SIZE,
            probe_align: DEFAULT_BLOCK_SIZE,
            direct_io: true,
            buffered_fallback: true,
            event_queue: DEFAULT_EVENT_QUEUE,
            send_timeout: Duration::from_secs(2),
            max_line_length: 4096,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl DaemonConfig {
    /// Create a new configuration builder
    pub fn builder() -> DaemonConfigBuilder {
        DaemonConfigBuilder::default()
    }
}

/// Builder for DaemonConfig
#[derive(Default)]
pub struct DaemonConfigBuilder {
    pub(crate) config: DaemonConfig,
}
