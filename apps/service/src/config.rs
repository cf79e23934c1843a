use std::{env, fmt, fs, path, time::Duration};

use probeup::DaemonConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read {0}: {1}")]
    ReadFailed(path::PathBuf, #[source] std::io::Error),
    #[error("Failed to write {0}: {1}")]
    WriteFailed(path::PathBuf, #[source] std::io::Error),
    #[error("Failed to parse {0}: {1}")]
    ParseFailed(path::PathBuf, #[source] toml::de::Error),
    #[error("Failed to serialize configuration: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("{0}: {1} must be a positive number of seconds")]
    InvalidDuration(&'static str, f64),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub check: Check,
    pub probe: Probe,
    pub events: Events,
}

/// Limits applied to `start` commands
#[derive(Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Check {
    pub min_interval: f64,
    pub max_interval: f64,
    pub max_line_length: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Probe {
    pub size: usize,
    pub align: usize,
    pub direct_io: bool,
    pub buffered_fallback: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Events {
    pub queue: usize,
    pub send_timeout: f64,
    pub shutdown_timeout: f64,
}

impl Default for Check {
    fn default() -> Self {
        let defaults = DaemonConfig::default();
        Self {
            min_interval: defaults.min_interval.as_secs_f64(),
            max_interval: defaults.max_interval.as_secs_f64(),
            max_line_length: defaults.max_line_length,
        }
    }
}

impl Default for Probe {
    fn default() -> Self {
        let defaults = DaemonConfig::default();
        Self {
            size: defaults.probe_size,
            align: defaults.probe_align,
            direct_io: defaults.direct_io,
            buffered_fallback: defaults.buffered_fallback,
        }
    }
}

impl Default for Events {
    fn default() -> Self {
        let defaults = DaemonConfig::default();
        Self {
            queue: defaults.event_queue,
            send_timeout: defaults.send_timeout.as_secs_f64(),
            shutdown_timeout: defaults.shutdown_timeout.as_secs_f64(),
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/check.toml or
/// $HOME/.config/...)
pub fn default_config_path() -> Option<path::PathBuf> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else {
        env::home_dir()?.join(".config")
    };

    Some(path.join("uppe/check.toml"))
}

fn seconds(label: &'static str, value: f64) -> Result<Duration, Error> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidDuration(label, value));
    }
    Duration::try_from_secs_f64(value).map_err(|_| Error::InvalidDuration(label, value))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Check")?;
        write_1(f, "Minimum Interval (s)", &self.check.min_interval)?;
        write_1(f, "Maximum Interval (s)", &self.check.max_interval)?;
        write_1(f, "Maximum Line Length", &self.check.max_line_length)?;
        write_title_1(f, "Probe")?;
        write_1(f, "Read Size", &self.probe.size)?;
        write_1(f, "Buffer Alignment", &self.probe.align)?;
        write_1(f, "Direct I/O", &self.probe.direct_io)?;
        write_1(f, "Buffered Fallback", &self.probe.buffered_fallback)?;
        write_title_1(f, "Events")?;
        write_1(f, "Queue Capacity", &self.events.queue)?;
        write_1(f, "Send Timeout (s)", &self.events.send_timeout)?;
        write_1(f, "Shutdown Timeout (s)", &self.events.shutdown_timeout)?;

        Ok(())
    }
}

impl Config {
    /// Read the configuration file, or the defaults when there is none.
    ///
    /// An explicit path must exist; the default path
    /// (`~/.config/uppe/check.toml`) is only used if present.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path = match optional_path {
            Some(path) => normalize_toml_path(path.as_ref()),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let raw_string = fs::read_to_string(&config_path)
            .map_err(|err| Error::ReadFailed(config_path.clone(), err))?;
        toml::from_str(raw_string.as_str()).map_err(|err| Error::ParseFailed(config_path, err))
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))
    }

    /// Settings for the daemon. Range checks happen when the daemon is built.
    pub fn to_daemon_config(&self) -> Result<DaemonConfig, Error> {
        let mut builder = DaemonConfig::builder()
            .min_interval(seconds("check.min_interval", self.check.min_interval)?)
            .max_interval(seconds("check.max_interval", self.check.max_interval)?)
            .max_line_length(self.check.max_line_length)
            .probe_size(self.probe.size)
            .probe_align(self.probe.align)
            .event_queue(self.events.queue)
            .send_timeout(seconds("events.send_timeout", self.events.send_timeout)?)
            .shutdown_timeout(seconds("events.shutdown_timeout", self.events.shutdown_timeout)?);

        if !self.probe.direct_io {
            builder = builder.buffered();
        } else if !self.probe.buffered_fallback {
            builder = builder.strict_direct_io();
        }

        Ok(builder.build())
    }
}
