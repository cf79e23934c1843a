//! Errno-style result codes carried by protocol events.

use std::{fmt, io};

/// POSIX error number reported in the `<error>` field of an event.
///
/// `0` means success; anything else is the positive `errno` value of the
/// failure, so existing drivers can compare against their platform constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(i32);

impl Errno {
    pub const SUCCESS: Errno = Errno(0);
    pub const ENOENT: Errno = Errno(libc::ENOENT);
    pub const EIO: Errno = Errno(libc::EIO);
    pub const EEXIST: Errno = Errno(libc::EEXIST);
    pub const EINVAL: Errno = Errno(libc::EINVAL);

    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    pub const fn code(self) -> i32 {
        self.0
    }

    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Classify an I/O error. Errors that did not come from the OS map to `EIO`.
    pub fn from_io_error(error: &io::Error) -> Self {
        match error.raw_os_error() {
            Some(code) if code > 0 => Self(code),
            _ => Self::EIO,
        }
    }

    /// Human readable text for the code, as the OS describes it.
    pub fn description(self) -> String {
        if self.is_success() {
            return "success".to_string();
        }
        let text = io::Error::from_raw_os_error(self.0).to_string();
        // std appends " (os error N)", drivers only want the message
        match text.rfind(" (os error ") {
            Some(idx) => text[..idx].to_string(),
            None => text,
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Errno {
    fn from(code: i32) -> Self {
        Self(code)
    }
}
