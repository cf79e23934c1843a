//! Line codecs for the control and event streams.
//!
//! [`CommandCodec`] turns the control stream into validated commands (or
//! rejections to answer with `EINVAL`); [`EventCodec`] writes one event per
//! line.

use std::{fmt::Write as _, io, time::Duration};

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use super::types::{Command, Event, Rejection};

/// Result of decoding one control line
pub type Request = Result<Command, Rejection>;

/// Parse one control line.
///
/// The command token ends at the first whitespace, so a line starting with
/// whitespace has an empty command. Arguments are separated by any amount of
/// whitespace. A missing path is reported as `-`, a missing or bad interval
/// is reported against the given path.
pub fn parse_command(line: &str) -> Request {
    let mut tokens = line.split_whitespace();
    let name = if line.starts_with(char::is_whitespace) {
        ""
    } else {
        tokens.next().unwrap_or_default()
    };

    match name {
        "" => Err(Rejection::new("", None, "empty command")),
        "start" => {
            let path = tokens
                .next()
                .ok_or_else(|| Rejection::new(name, None, "path is required"))?;
            let reject = |reason| Rejection::new(name, Some(path.to_string()), reason);

            let interval = tokens.next().ok_or_else(|| reject("interval is required"))?;
            let interval = parse_interval(interval).ok_or_else(|| reject("invalid interval"))?;
            if tokens.next().is_some() {
                return Err(reject("too many arguments"));
            }

            Ok(Command::Start {
                path: path.to_string(),
                interval,
            })
        }
        "stop" => {
            let path = tokens
                .next()
                .ok_or_else(|| Rejection::new(name, None, "path is required"))?;
            if tokens.next().is_some() {
                return Err(Rejection::new(name, Some(path.to_string()), "too many arguments"));
            }

            Ok(Command::Stop {
                path: path.to_string(),
            })
        }
        other => Err(Rejection::new(other, None, "unknown command")),
    }
}

/// Interval in seconds; fractions are allowed, zero, negative and
/// non-finite values are not.
fn parse_interval(token: &str) -> Option<Duration> {
    let seconds: f64 = token.parse().ok()?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}

/// Decoder for the control stream
#[derive(Debug)]
pub struct CommandCodec {
    lines: LinesCodec,
}

impl CommandCodec {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_line_length),
        }
    }
}

impl Decoder for CommandCodec {
    type Item = Request;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.lines.decode(src) {
            Ok(line) => Ok(line.map(|line| parse_command(&line))),
            // The inner codec discards the rest of the line on the next call
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                Ok(Some(Err(Rejection::new("", None, "line too long"))))
            }
            Err(LinesCodecError::Io(e)) => Err(e),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.lines.decode_eof(src) {
            Ok(line) => Ok(line.map(|line| parse_command(&line))),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                Ok(Some(Err(Rejection::new("", None, "line too long"))))
            }
            Err(LinesCodecError::Io(e)) => Err(e),
        }
    }
}

/// Encoder for the event stream
#[derive(Debug, Clone, Copy, Default)]
pub struct EventCodec;

impl Encoder<Event> for EventCodec {
    type Error = io::Error;

    fn encode(&mut self, event: Event, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut line = String::with_capacity(64 + event.data.len());
        writeln!(line, "{event}").map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        dst.reserve(line.len());
        dst.put(line.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::NO_VALUE;

    fn rejected(line: &str) -> Rejection {
        parse_command(line).expect_err("line should be rejected")
    }

    #[test]
    fn test_parse_start() {
        let command = parse_command("start /dev/mapper/a 10").unwrap();
        assert_eq!(
            
            command,
            Command::Start {
                path: "/dev/mapper/a".to_string(),
                interval: Duration::from_secs(10),
            }
        );
    }

    #[test]
    fn test_parse_start_fractional_interval() {
        let command = parse_command("start  /a\t0.5 ").unwrap();
        assert_eq!(
            command,
            Command::Start {
                path: "/a".to_string(),
                interval: Duration::from_millis(500),
            }
        );
    }

    #[test]
    fn test_parse_start_missing_arguments() {
        let no_path = rejected("start");
        assert_eq!(no_path.name, "start");
        assert_eq!(no_path.path, None);

        let no_interval = rejected("start /a");
        assert_eq!(no_interval.path.as_deref(), Some("/a"));
        assert_eq!(no_interval.reason, "interval is required");
    }

    #[test]
    fn test_parse_start_bad_interval() {
        for line in [
            "start /a x",
            "start /a 0",
            "start /a -1",
            "start /a inf",
            "start /a NaN",
        ] {
            let rejection = rejected(line);
            assert_eq!(rejection.path.as_deref(), Some("/a"), "{line}");
            assert_eq!(rejection.reason, "invalid interval", "{line}");
        }
        assert_eq!(rejected("start /a 1 2").reason, "too many arguments");
    }

    #[test]
    fn test_parse_stop() {
        assert_eq!(
            parse_command("stop /a").unwrap(),
            Command::Stop {
                path: "/a".to_string(),
            }
        );
        assert_eq!(rejected("stop").path, None);
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        let unknown = rejected("unknown path 1");
        assert_eq!(unknown.name, "unknown");
        assert_eq!(unknown.path, None);

        let empty = rejected("   ").into_event();
        assert_eq!(empty.name.as_str(), NO_VALUE);
        assert_eq!(empty.path_str(), NO_VALUE);

        let blank_name = rejected(" path 1");
        assert_eq!(blank_name.reason, "empty command");
        assert_eq!(
            blank_name.into_event().to_string(),
            format!("- - {} empty command", libc::EINVAL)
        );
    }

    #[test]
    fn test_decoder_reports_long_lines_and_recovers() {
        let mut codec = CommandCodec::new(16);
        let mut buf = BytesMut::from(&b"start /a/very/long/path/name 1\nstop /b\n"[..]);

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.unwrap_err().reason, "line too long");

        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            second.unwrap(),
            Command::Stop {
                path: "/b".to_string(),
            }
        );
    }

    #[test]
    fn test_decoder_handles_missing_final_newline() {
        let mut codec = CommandCodec::new(4096);
        let mut buf = BytesMut::from(&b"stop /a"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        let last = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(
            last.unwrap(),
            Command::Stop {
                path: "/a".to_string(),
            }
        );
    }

    #[test]
    fn test_event_encoder_writes_one_line() {
        let mut buf = BytesMut::new();
        EventCodec.encode(Event::stopped("/a"), &mut buf).unwrap();
        let unknown = Rejection::new("bogus", None, "unknown command").into_event();
        EventCodec.encode(unknown, &mut buf).unwrap();

        let text = String::from_utf8(buf.to_vec()).unwrap();
        assert_eq!(
            text,
            format!("stop /a 0 stopped\nbogus - {} unknown command\n", libc::EINVAL)
        );
    }
}
