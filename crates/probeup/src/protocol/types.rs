//! Protocol type definitions for the check daemon.
//!
//! Commands arrive one per line as `start <path> <interval>` or
//! `stop <path>`; events leave one per line as
//! `<name> <path> <error> <data>`.

use std::{fmt, str::FromStr, time::Duration};

use super::errno::Errno;

/// Placeholder rendered for an absent path or command name.
pub const NO_VALUE: &str = "-";

/// A validated control command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Begin checking `path` every `interval`
    Start { path: String, interval: Duration },

    /// Stop checking `path`
    Stop { path: String },
}

impl Command {
    /// Name of the command as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Stop { .. } => "stop",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Command::Start { path, .. } | Command::Stop { path } => path,
        }
    }
}

/// A control line that could not be turned into a [`Command`].
///
/// Rejections always answer with `EINVAL`; `name` and `path` are echoed back
/// so the driver can match the answer to its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub path: Option<String>,
    pub reason: &'static str,
}

impl Rejection {
    pub fn new(name: impl Into<String>, path: Option<String>, reason: &'static str) -> Self {
        Self {
            name: name.into(),
            path,
            reason,
        }
    }

    /// The error event answering this rejection
    pub fn into_event(self) -> Event {
        Event::new(EventName::from_token(&self.name), self.path, Errno::EINVAL, self.reason)
    }
}

/// Name field of an event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    Start,
    Check,
    Stop,
    /// Literal token of a rejected command line; empty renders as `-`
    Other(String),
}

impl EventName {
    pub fn from_token(token: &str) -> Self {
        match token {
            "start" => EventName::Start,
            "check" => EventName::Check,
            "stop" => EventName::Stop,
            NO_VALUE => EventName::Other(String::new()),
            other => EventName::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventName::Start => "start",
            EventName::Check => "check",
            EventName::Stop => "stop",
            EventName::Other(token) if token.is_empty() => NO_VALUE,
            EventName::Other(token) => token,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the event stream
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// What happened
    pub name: EventName,

    /// Path the event refers to, `None` when unknown
    pub path: Option<String>,

    /// `0` on success, errno otherwise
    pub error: Errno,

    /// `started`/`stopped`, a latency in seconds, or a description
    pub data: String,
}

impl Event {
    pub fn new(
        name: EventName,
        path: Option<String>,
        error: Errno,
        data: impl Into<String>,
    ) -> Self {
        Self {
            name,
            path,
            error,
            data: data.into(),
        }
    }

    /// `start <path> 0 started`
    pub fn started(path: impl Into<String>) -> Self {
        Self::new(EventName::Start, Some(path.into()), Errno::SUCCESS, "started")
    }

    /// `stop <path> 0 stopped`
    pub fn stopped(path: impl Into<String>) -> Self {
        Self::new(EventName::Stop, Some(path.into()), Errno::SUCCESS, "stopped")
    }

    /// Successful check carrying the read latency
    pub fn checked(path: impl Into<String>, latency: Duration) -> Self {
        Self::new(
            EventName::Check,
            Some(path.into()),
            Errno::SUCCESS,
            format!("{:.6}", latency.as_secs_f64()),
        )
    }

    /// Failed check carrying the OS description of `error`
    pub fn check_failed(path: impl Into<String>, error: Errno) -> Self {
        Self::new(EventName::Check, Some(path.into()), error, error.description())
    }

    pub fn path_str(&self) -> &str {
        match self.path.as_deref() {
            Some(path) if !path.is_empty() => path,
            _ => NO_VALUE,
        }
    }

    /// Latency of a successful check event
    pub fn latency(&self) -> Option<f64> {
        if self.name != EventName::Check || !self.error.is_success() {
            return None;
        }
        self.data.parse().ok()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.name, self.path_str(), self.error, self.data)
    }
}

/// Error parsing an event line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed event line: {0:?}")]
pub struct ParseEventError(pub String);

impl FromStr for Event {
    type Err = ParseEventError;

    /// Parse a wire line back into an event. Used by drivers and tests.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseEventError(line.to_string());
        let line = line.trim_end_matches(['\r', '\n']);

        let mut fields = line.splitn(4, ' ');
        let name = fields.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
        let path = fields.next().ok_or_else(malformed)?;
        let error = fields.next().ok_or_else(malformed)?;
        let data = fields.next().unwrap_or_default();

        let error: i32 = error.parse().map_err(|_| malformed())?;
        let path = (path != NO_VALUE).then(|| path.to_string());

        Ok(Event::new(EventName::from_token(name), path, Errno::new(error), data))
    }
}
