//! Link-driven lifecycle of the single server instance.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use illum_ctl::IlluminationControl;
use link_watch::LinkEvent;

/// Running server owned by the lifecycle cell.
pub(crate) trait ServerHandle: Send {
    /// Stop the server and block until it is torn down.
    fn stop(self: Box<Self>);
}

/// Link-gated state machine owning the only server handle.
///
/// Listening state is exactly the presence of the handle: `None` while the
/// link is down. Both transitions are idempotent, so the watcher's
/// at-least-once event delivery is safe.
pub(crate) struct LinkLifecycle<F>
where
    F: FnMut() -> Result<Box<dyn ServerHandle>>,
{
    start_server: F,
    server: Option<Box<dyn ServerHandle>>,
    illumination: Arc<dyn IlluminationControl>,
    idle_duty: u32,
}

impl<F> LinkLifecycle<F>
where
    F: FnMut() -> Result<Box<dyn ServerHandle>>,
{
    pub(crate) fn new(
        start_server: F,
        illumination: Arc<dyn IlluminationControl>,
        idle_duty: u32,
    ) -> Self {
        Self {
            start_server,
            server: None,
            illumination,
            idle_duty,
        }
    }

    pub(crate) fn handle_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Up => self.link_up(),
            LinkEvent::Down => self.link_down(),
        }
    }

    /// Drive the machine down regardless of link state; used at process exit
    /// so the illumination head is left dark.
    pub(crate) fn shutdown(&mut self) {
        self.link_down();
    }

    fn link_up(&mut self) {
        if self.server.is_some() {
            return;
        }
        info!("link acquired; starting webserver");
        match (self.start_server)() {
            Ok(server) => {
                self.server = Some(server);
                // Minimal glow signalling "server live".
                if let Err(err) = self.illumination.set_duty(self.idle_duty) {
                    warn!("failed to raise idle illumination: {err}");
                }
            }
            Err(err) => error!("error starting server: {err:#}"),
        }
    }

    fn link_down(&mut self) {
        if let Some(server) = self.server.take() {
            info!("link lost; stopping webserver");
            // The head must be dark before the server handle goes away.
            if let Err(err) = self.illumination.set_duty(0) {
                warn!("failed to zero illumination: {err}");
            }
            server.stop();
        }
    }

    #[cfg(test)]
    fn is_up(&self) -> bool {
        self.server.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use anyhow::bail;

    use illum_ctl::IllumError;

    use super::*;

    type EventLog = Arc<Mutex<Vec<String>>>;

    fn push(log: &EventLog, entry: impl Into<String>) {
        log.lock().expect("test lock").push(entry.into());
    }

    struct FakeServer {
        log: EventLog,
        live: Arc<AtomicUsize>,
    }

    impl ServerHandle for FakeServer {
        fn stop(self: Box<Self>) {
            push(&self.log, "stop");
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct LogIllumination {
        log: EventLog,
    }

    impl IlluminationControl for LogIllumination {
        fn set_duty(&self, raw: u32) -> Result<(), IllumError> {
            push(&self.log, format!("duty:{raw}"));
            Ok(())
        }
    }

    struct Fixture {
        log: EventLog,
        live: Arc<AtomicUsize>,
        starts: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                log: EventLog::default(),
                live: Arc::new(AtomicUsize::new(0)),
                starts: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn lifecycle(
            &self,
            fail_first_start: bool,
        ) -> LinkLifecycle<impl FnMut() -> Result<Box<dyn ServerHandle>>> {
            let log = self.log.clone();
            let live = self.live.clone();
            let starts = self.starts.clone();
            LinkLifecycle::new(
                move || {
                    let attempt = starts.fetch_add(1, Ordering::SeqCst);
                    if fail_first_start && attempt == 0 {
                        bail!("no free sockets");
                    }
                    push(&log, "start");
                    live.fetch_add(1, Ordering::SeqCst);
                    Ok(Box::new(FakeServer {
                        log: log.clone(),
                        live: live.clone(),
                    }) as Box<dyn ServerHandle>)
                },
                Arc::new(LogIllumination {
                    log: self.log.clone(),
                }),
                64,
            )
        }

        fn entries(&self) -> Vec<String> {
            self.log.lock().expect("test lock").clone()
        }
    }

    #[test]
    fn duplicate_link_up_creates_one_instance() {
        let fixture = Fixture::new();
        let mut lifecycle = fixture.lifecycle(false);
        lifecycle.handle_event(LinkEvent::Up);
        lifecycle.handle_event(LinkEvent::Up);
        assert_eq!(fixture.live.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.starts.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.entries(), vec!["start", "duty:64"]);
    }

    #[test]
    fn link_down_without_instance_is_a_noop() {
        let fixture = Fixture::new();
        let mut lifecycle = fixture.lifecycle(false);
        lifecycle.handle_event(LinkEvent::Down);
        lifecycle.handle_event(LinkEvent::Down);
        assert!(fixture.entries().is_empty());
    }

    #[test]
    fn link_down_darkens_before_stopping() {
        let fixture = Fixture::new();
        let mut lifecycle = fixture.lifecycle(false);
        lifecycle.handle_event(LinkEvent::Up);
        lifecycle.handle_event(LinkEvent::Down);
        assert_eq!(
            fixture.entries(),
            vec!["start", "duty:64", "duty:0", "stop"]
        );
        assert_eq!(fixture.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn instance_count_stays_at_most_one_across_any_sequence() {
        let fixture = Fixture::new();
        let mut lifecycle = fixture.lifecycle(false);
        let sequence = [
            LinkEvent::Down,
            LinkEvent::Up,
            LinkEvent::Up,
            LinkEvent::Down,
            LinkEvent::Down,
            LinkEvent::Up,
            LinkEvent::Down,
        ];
        for event in sequence {
            lifecycle.handle_event(event);
            assert!(fixture.live.load(Ordering::SeqCst) <= 1);
        }
        assert_eq!(fixture.live.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_start_leaves_machine_down_and_retries() {
        let fixture = Fixture::new();
        let mut lifecycle = fixture.lifecycle(true);
        lifecycle.handle_event(LinkEvent::Up);
        assert!(!lifecycle.is_up());
        assert!(fixture.entries().is_empty());

        lifecycle.handle_event(LinkEvent::Up);
        assert!(lifecycle.is_up());
        assert_eq!(fixture.entries(), vec!["start", "duty:64"]);
    }

    #[test]
    fn shutdown_reuses_the_down_path() {
        let fixture = Fixture::new();
        let mut lifecycle = fixture.lifecycle(false);
        lifecycle.handle_event(LinkEvent::Up);
        lifecycle.shutdown();
        assert_eq!(
            fixture.entries(),
            vec!["start", "duty:64", "duty:0", "stop"]
        );
    }
}
