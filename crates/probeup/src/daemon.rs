//! Daemon run loop: reads control lines, dispatches them and writes events
//! until the input ends, shutdown is requested or the output breaks.

use std::{io, sync::Arc};

use futures::StreamExt;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task::JoinError,
    time::timeout,
};
use tokio_util::{codec::FramedRead, sync::CancellationToken};
use tracing::{debug, error, info, warn};

use crate::{
    config::DaemonConfig,
    dispatcher::CommandDispatcher,
    emitter::{EventEmitter, EventWriter},
    error::{DaemonError, EmitError},
    probe::{DirectIoProbe, Probe},
    protocol::CommandCodec,
    registry::CheckRegistry,
    scheduler::PathScheduler,
};

/// The check daemon
pub struct Daemon {
    config: DaemonConfig,
    probe: Arc<dyn Probe>,
    shutdown: CancellationToken,
}

impl Daemon {
    /// Create a daemon probing with direct I/O
    pub fn new(config: DaemonConfig) -> Result<Self, DaemonError> {
        let probe = Arc::new(DirectIoProbe::from_config(&config));
        Self::with_probe(config, probe)
    }

    /// Create a daemon with a custom probe
    pub fn with_probe(config: DaemonConfig, probe: Arc<dyn Probe>) -> Result<Self, DaemonError> {
        config.validate().map_err(DaemonError::Config)?;
        Ok(Self {
            config,
            probe,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token that stops the daemon when cancelled. Cancelling it stops
    /// reading commands, cancels every check and returns from [`Daemon::run`]
    /// without emitting further events.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Serve commands from `input`, writing events to `output`.
    pub async fn run<R, W>(self, input: R, output: W) -> Result<(), DaemonError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (emitter, events) =
            EventEmitter::channel(self.config.event_queue, self.config.send_timeout);
        let mut writer = tokio::spawn(EventWriter::new(output).run(events));
        let mut writer_finished = false;

        let registry = Arc::new(CheckRegistry::new());
        let scheduler = Arc::new(PathScheduler::new(self.probe.clone(), emitter.clone()));
        let dispatcher = CommandDispatcher::new(
            self.config.clone(),
            registry.clone(),
            scheduler.clone(),
            emitter.clone(),
        );

        let mut commands = FramedRead::new(input, CommandCodec::new(self.config.max_line_length));
        info!("check daemon started");

        let outcome: Result<(), DaemonError> = loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested");
                    break Ok(());
                }
                _ = emitter.failed() => {
                    break Err(emitter.failure().unwrap_or(EmitError::Closed).into());
                }
                result = &mut writer => {
                    writer_finished = true;
                    break Err(writer_error(result));
                }
                next = commands.next() => match next {
                    Some(Ok(request)) => {
                        if let Err(e) = dispatcher.dispatch(request).await {
                            break Err(e.into());
                        }
                    }
                    Some(Err(e)) => {
                        error!("cannot read control channel: {}", e);
                        break Err(e.into());
                    }
                    None => {
                        info!("control channel closed");
                        break Ok(());
                    }
                },
            }
        };

        let tasks = registry.drain();
        info!("stopping {} checkers", tasks.len());
        scheduler.shutdown(tasks, self.config.shutdown_timeout).await;

        drop(dispatcher);
        drop(scheduler);
        drop(emitter);

        if !writer_finished {
            match timeout(self.config.shutdown_timeout, writer).await {
                Ok(Ok(Ok(written))) => debug!("event writer finished, {} events written", written),
                Ok(result) => {
                    let e = writer_error(result);
                    if outcome.is_ok() {
                        return Err(e);
                    }
                    warn!("event writer failed during shutdown: {}", e);
                }
                Err(_) => warn!(
                    "event writer did not finish within {:?}",
                    self.config.shutdown_timeout
                ),
            }
        }

        info!("check daemon stopped");
        outcome
    }
}

fn writer_error(result: Result<io::Result<u64>, JoinError>) -> DaemonError {
    match result {
        Ok(Ok(_)) => DaemonError::Emit(EmitError::Closed),
        Ok(Err(e)) => DaemonError::Io(e),
        Err(e) => DaemonError::Io(io::Error::other(e)),
    }
}
