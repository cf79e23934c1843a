//! Event emitter - serializes events from every producer into one stream.
//!
//! Producers (the dispatcher and one worker per path) push typed events into
//! a bounded queue; a single [`EventWriter`] drains it and writes whole lines.
//! Events queued by one producer keep their order, which together with the
//! per-task state lock gives the `start, check.., stop` order per path.

use std::{
    io,
    sync::{Arc, OnceLock},
    time::Duration,
};

use futures::SinkExt;
use tokio::{io::AsyncWrite, sync::mpsc, time::timeout};
use tokio_util::{codec::FramedWrite, sync::CancellationToken};
use tracing::{debug, error};

use crate::{error::EmitError, protocol::{Event, EventCodec}};

/// Cloneable handle producers use to send events
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<Event>,
    send_timeout: Duration,
    failed: CancellationToken,
    failure: Arc<OnceLock<EmitError>>,
}

impl EventEmitter {
    /// Create an emitter and the receiving end of its queue
    pub fn channel(capacity: usize, send_timeout: Duration) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        let emitter = Self {
            tx,
            send_timeout,
            failed: CancellationToken::new(),
            failure: Arc::new(OnceLock::new()),
        };
        (emitter, rx)
    }

    /// Queue `event` for output.
    ///
    /// Waiting longer than the send timeout means nobody is reading the
    /// stream; the emitter is then marked failed and the daemon terminates.
    pub async fn emit(&self, event: Event) -> Result<(), EmitError> {
        debug!("sending event {:?}", event.to_string());

        match timeout(self.send_timeout, self.tx.send(event)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                error!("event stream closed, cannot send event");
                Err(self.fail(EmitError::Closed))
            }
            Err(_) => {
                error!("timeout sending event after {:?}, terminating", self.send_timeout);
                Err(self.fail(EmitError::Timeout(self.send_timeout)))
            }
        }
    }

    /// Resolves once an event could not be delivered
    pub async fn failed(&self) {
        self.failed.cancelled().await
    }

    pub fn has_failed(&self) -> bool {
        self.failed.is_cancelled()
    }

    /// The first delivery failure, if any
    pub fn failure(&self) -> Option<EmitError> {
        self.failure.get().cloned()
    }

    fn fail(&self, error: EmitError) -> EmitError {
        let _ = self.failure.set(error.clone());
        self.failed.cancel();
        error
    }
}

/// Writes queued events to the output, one line each
pub struct EventWriter<W> {
    sink: FramedWrite<W, EventCodec>,
}

impl<W: AsyncWrite + Unpin> EventWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            sink: FramedWrite::new(output, EventCodec),
        }
    }

    /// Drain `rx` until every emitter is dropped. Returns the number of
    /// events written.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Event>) -> io::Result<u64> {
        let mut written = 0u64;

        while let Some(event) = rx.recv().await {
            self.sink.feed(event).await?;
            written += 1;

            // Write whatever else is already queued before flushing
            while let Ok(event) = rx.try_recv() {
                self.sink.feed(event).await?;
                written += 1;
            }

            if let Err(e) = self.sink.flush().await {
                error!("cannot write to event stream, terminating: {}", e);
                return Err(e);
            }
        }

        debug!("event stream finished after {} events", written);
        Ok(written)
    }
}
