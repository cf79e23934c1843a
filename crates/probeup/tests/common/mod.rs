//! Shared harness driving a real daemon over in-memory pipes.

#![allow(dead_code)]

use std::time::Duration;

use probeup::{Daemon, DaemonConfig, DaemonError, Event};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Client side of a running daemon
pub struct Harness {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<(), DaemonError>>,
}

impl Harness {
    pub fn start() -> Self {
        Self::with_config(DaemonConfig::default())
    }

    pub fn with_config(config: DaemonConfig) -> Self {
        let _ = tracing_subscriber::fmt::try_init();

        let (input, daemon_input) = tokio::io::duplex(64 * 1024);
        let (daemon_output, output) = tokio::io::duplex(256 * 1024);

        let daemon = Daemon::new(config).expect("valid config");
        let shutdown = daemon.shutdown_token();
        let handle = tokio::spawn(daemon.run(daemon_input, daemon_output));

        Self {
            input,
            output: BufReader::new(output).lines(),
            shutdown,
            handle,
        }
    }

    pub async fn send(&mut self, line: &str) {
        self.input.write_all(format!("{line}\n").as_bytes()).await.expect("daemon input closed");
    }

    pub async fn recv(&mut self) -> Event {
        self.try_recv(RECV_TIMEOUT).await.expect("timeout waiting for event")
    }

    pub async fn try_recv(&mut self, wait: Duration) -> Option<Event> {
        let line = timeout(wait, self.output.next_line()).await.ok()?;
        let line = line.expect("daemon output failed").expect("daemon output closed");
        Some(line.parse().expect("malformed event line"))
    }

    /// Request shutdown and wait for the daemon to return
    pub async fn close(self) -> Result<(), DaemonError> {
        self.shutdown.cancel();
        self.handle.await.expect("daemon task panicked")
    }

    /// Close the control input and wait for the daemon to return
    pub async fn hang_up(self) -> (Result<(), DaemonError>, Lines<BufReader<DuplexStream>>) {
        drop(self.input);
        let result = self.handle.await.expect("daemon task panicked");
        (result, self.output)
    }
}

pub fn assert_success(event: &Event, name: &str, path: &str) {
    assert_eq!(event.name.as_str(), name, "unexpected event {event}");
    assert_eq!(event.path_str(), path, "unexpected event {event}");
    assert_eq!(event.error.code(), 0, "unexpected event {event}");
}

pub fn assert_error(event: &Event, name: &str, path: &str, errno: i32) {
    assert_eq!(event.name.as_str(), name, "unexpected event {event}");
    assert_eq!(event.path_str(), path, "unexpected event {event}");
    assert_eq!(event.error.code(), errno, "unexpected event {event}");
}
