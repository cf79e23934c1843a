//! Command dispatcher - applies control commands to the registry and
//! scheduler.
//!
//! Every command, accepted or not, is answered with exactly one event.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    config::DaemonConfig,
    emitter::EventEmitter,
    error::EmitError,
    protocol::{parse_command, Command, Errno, Event, EventName, Request},
    registry::CheckRegistry,
    scheduler::{CheckTask, PathScheduler, TaskState},
};

/// Applies commands, one at a time
pub struct CommandDispatcher {
    config: DaemonConfig,
    registry: Arc<CheckRegistry>,
    scheduler: Arc<PathScheduler>,
    emitter: EventEmitter,
}

impl CommandDispatcher {
    pub fn new(
        config: DaemonConfig,
        registry: Arc<CheckRegistry>,
        scheduler: Arc<PathScheduler>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            config,
            registry,
            scheduler,
            emitter,
        }
    }

    /// Parse and apply one control line
    pub async fn dispatch_line(&self, line: &str) -> Result<(), EmitError> {
        self.dispatch(parse_command(line)).await
    }

    /// Apply a decoded request. Only a failure to emit the answer is an error.
    pub async fn dispatch(&self, request: Request) -> Result<(), EmitError> {
        let command = match request {
            Ok(command) => command,
            Err(rejection) => {
                warn!("rejected command {:?}: {}", rejection.name, rejection.reason);
                return self.emitter.emit(rejection.into_event()).await;
            }
        };

        debug!("dispatching {} {:?}", command.name(), command.path());
        match command {
            Command::Start { path, interval } => self.start(path, interval).await,
            Command::Stop { path } => self.stop(path).await,
        }
    }

    async fn start(&self, path: String, interval: Duration) -> Result<(), EmitError> {
        if !self.config.accepts_interval(interval) {
            warn!("interval {:?} for {:?} out of range", interval, path);
            return self
                .reject(
                    EventName::Start,
                    path,
                    Errno::EINVAL,
                    "interval out of range",
                )
                .await;
        }

        let task = Arc::new(CheckTask::new(path.clone(), interval));
        if !self.registry.insert_if_absent(task.clone()) {
            warn!("already checking path {:?}", path);
            return self
                .reject(
                    EventName::Start,
                    path,
                    Errno::EEXIST,
                    "already checking path",
                )
                .await;
        }

        info!("start checking path {:?} every {:.3} seconds", path, interval.as_secs_f64());
        self.emitter.emit(Event::started(path)).await?;

        task.set_state(TaskState::Active).await;
        self.scheduler.schedule(task);
        Ok(())
    }

    async fn stop(&self, path: String) -> Result<(), EmitError> {
        let Some(task) = self.registry.get(&path) else {
            warn!("not checking path {:?}", path);
            return self.reject(EventName::Stop, path, Errno::ENOENT, "not checking path").await;
        };

        info!("stop checking path {:?}", path);
        self.scheduler.cancel(&task).await;
        self.registry.remove_if_present(&path);

        let sent = self.emitter.emit(Event::stopped(path)).await;
        task.set_state(TaskState::Removed).await;
        sent
    }

    async fn reject(
        &self,
        name: EventName,
        path: String,
        error: Errno,
        reason: &'static str,
    ) -> Result<(), EmitError> {
        self.emitter.emit(Event::new(name, Some(path), error, reason)).await
    }

    pub fn registry(&self) -> &Arc<CheckRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::probe::Probe;

    struct InstantProbe;

    #[async_trait]
    impl Probe for InstantProbe {
        async fn probe(&self, path: &str) -> Result<Duration, Errno> {
            if path.starts_with("/missing") {
                Err(Errno::ENOENT)
            } else {
                Ok(Duration::from_micros(50))
            }
        }
    }

    fn dispatcher() -> (CommandDispatcher, mpsc::Receiver<Event>) {
        let (emitter, rx) = EventEmitter::channel(64, Duration::from_secs(1));
        let scheduler = Arc::new(PathScheduler::new(Arc::new(InstantProbe), emitter.clone()));
        let registry = Arc::new(CheckRegistry::new());
        (CommandDispatcher::new(DaemonConfig::default(), registry, scheduler, emitter), rx)
    }

    async fn next(rx: &mut mpsc::Receiver<Event>) -> Event {
        tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_start_then_check() {
        let (dispatcher, mut rx) = dispatcher();
        dispatcher.dispatch_line("start /a 60").await.unwrap();

        assert_eq!(next(&mut rx).await, Event::started("/a"));
        let check = next(&mut rx).await;
        assert_eq!(check.name, EventName::Check);
        assert!(check.latency().unwrap() > 0.0);
        assert!(dispatcher.registry().contains("/a"));
    }

    #[tokio::test]
    async fn test_start_twice() {
        let (dispatcher, mut rx) = dispatcher();
        dispatcher.dispatch_line("start /a 60").await.unwrap();
        next(&mut rx).await;
        next(&mut rx).await;

        dispatcher.dispatch_line("start /a 60").await.unwrap();
        let event = next(&mut rx).await;
        assert_eq!(event.name, EventName::Start);
        assert_eq!(event.error, Errno::EEXIST);
        assert_eq!(dispatcher.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_interval_out_of_range() {
        let (dispatcher, mut rx) = dispatcher();
        dispatcher.dispatch_line("start /a 0.5").await.unwrap();
        dispatcher.dispatch_line("start /a 3601").await.unwrap();

        for _ in 0..2 {
            let event = next(&mut rx).await;
            assert_eq!(event.error, Errno::EINVAL);
            assert_eq!(event.path.as_deref(), Some("/a"));
            assert_eq!(event.data, "interval out of range");
        }
        assert!(dispatcher.registry().is_empty());
    }

    #[tokio::test]
    async fn test_stop() {
        let (dispatcher, mut rx) = dispatcher();
        dispatcher.dispatch_line("start /a 60").await.unwrap();
        next(&mut rx).await;
        next(&mut rx).await;

        dispatcher.dispatch_line("stop /a").await.unwrap();
        assert_eq!(next(&mut rx).await, Event::stopped("/a"));
        assert!(!dispatcher.registry().contains("/a"));

        dispatcher.dispatch_line("stop /a").await.unwrap();
        let event = next(&mut rx).await;
        assert_eq!(event.error, Errno::ENOENT);
        assert_eq!(event.path.as_deref(), Some("/a"));
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (dispatcher, mut rx) = dispatcher();
        dispatcher.dispatch_line("start /a 60").await.unwrap();
        next(&mut rx).await;
        next(&mut rx).await;
        dispatcher.dispatch_line("stop /a").await.unwrap();
        next(&mut rx).await;

        dispatcher.dispatch_line("start /a 60").await.unwrap();
        assert_eq!(next(&mut rx).await, Event::started("/a"));
    }

    #[tokio::test]
    async fn test_failed_probe_keeps_path_registered() {
        let (dispatcher, mut rx) = dispatcher();
        dispatcher.dispatch_line("start /missing 60").await.unwrap();
        next(&mut rx).await;

        let check = next(&mut rx).await;
        assert_eq!(check.error, Errno::ENOENT);
        assert!(dispatcher.registry().contains("/missing"));
    }

    #[tokio::test]
    async fn test_rejections() {
        let (dispatcher, mut rx) = dispatcher();
        let cases = [
            ("start", "start", None),
            ("start /a", "start", Some("/a")),
            ("stop", "stop", None),
            ("unknown path 1", "unknown", None),
            ("", "-", None),
        ];

        for (line, name, path) in cases {
            dispatcher.dispatch_line(line).await.unwrap();
            let event = next(&mut rx).await;
            assert_eq!(event.name.as_str(), name, "{line:?}");
            assert_eq!(event.path.as_deref(), path, "{line:?}");
            assert_eq!(event.error, Errno::EINVAL, "{line:?}");
        }
    }
}
