//! Protocol module for the check daemon.
//!
//! This module contains the typed commands and events exchanged with the
//! driving process and the line codecs that keep the text wire format.

pub mod codec;
pub mod errno;
pub mod types;

pub use codec::{parse_command, CommandCodec, EventCodec, Request};
pub use errno::Errno;
pub use types::{Command, Event, EventName, ParseEventError, Rejection, NO_VALUE};
