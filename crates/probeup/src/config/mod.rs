//! Daemon configuration for probeup.
//!
//! This module defines the tunables of the daemon: accepted interval range,
//! probe geometry, event queue sizing and shutdown limits.

mod methods;
mod types;

pub use types::{DaemonConfig, DaemonConfigBuilder};
