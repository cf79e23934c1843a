//! Daemon configuration methods.

use std::time::Duration;

use anyhow::{anyhow, Result};

use super::types::{DaemonConfig, DaemonConfigBuilder};

impl DaemonConfig {
    /// Whether `interval` is inside the accepted range
    pub fn accepts_interval(&self, interval: Duration) -> bool {
        interval >= self.min_interval && interval <= self.max_interval
    }

    /// Check the configuration for values the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.min_interval.is_zero() {
            return Err(anyhow!("Minimum interval must be positive"));
        }

        if self.min_interval > self.max_interval {
            return Err(anyhow!(
                "Interval range is inverted: min {:?} > max {:?}",
                self.min_interval,
                self.max_interval
            ));
        }

        if self.probe_size == 0 {
            return Err(anyhow!("Probe size must be positive"));
        }

        if !self.probe_align.is_power_of_two() {
            return Err(anyhow!("Probe alignment must be a power of two: {}", self.probe_align));
        }

        if self.direct_io && self.probe_size % self.probe_align != 0 {
            return Err(anyhow!(
                "Probe size {} must be a multiple of the alignment {} for direct I/O",
                self.probe_size,
                self.probe_align
            ));
        }

        if self.event_queue == 0 {
            return Err(anyhow!("Event queue capacity must be positive"));
        }

        if self.max_line_length == 0 {
            return Err(anyhow!("Maximum line length must be positive"));
        }

        Ok(())
    }
}

impl DaemonConfigBuilder {
    /// Build the configuration
    pub fn build(self) -> DaemonConfig {
        self.config
    }

    /// Set shortest accepted interval
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.config.min_interval = interval;
        self
    }

    /// Set longest accepted interval
    pub fn max_interval(mut self, interval: Duration) -> Self {
        self.config.max_interval = interval;
        self
    }

    /// Set probe read size
    pub fn probe_size(mut self, size: usize) -> Self {
        self.config.probe_size = size;
        self
    }

    /// Set probe buffer alignment
    pub fn probe_align(mut self, align: usize) -> Self {
        self.config.probe_align = align;
        self
    }

    /// Disable direct I/O
    pub fn buffered(mut self) -> Self {
        self.config.direct_io = false;
        self
    }

    /// Disable the buffered fallback
    pub fn strict_direct_io(mut self) -> Self {
        self.config.direct_io = true;
        self.config.buffered_fallback = false;
        self
    }

    /// Set event queue capacity
    pub fn event_queue(mut self, capacity: usize) -> Self {
        self.config.event_queue = capacity;
        self
    }

    /// Set event send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout = timeout;
        self
    }

    /// Set longest control line
    pub fn max_line_length(mut self, length: usize) -> Self {
        self.config.max_line_length = length;
        self
    }

    /// Set shutdown wait bound
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }
}
