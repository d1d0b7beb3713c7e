//! Network-link monitoring.
//!
//! A watcher thread polls the kernel's operstate for one interface and
//! delivers tagged transitions over a channel. Delivery is at-least-once
//! per transition; the consuming state machine must tolerate duplicates.

use std::{fs, io, path::PathBuf, thread, time::Duration};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

/// Link transition delivered to the lifecycle dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    Up,
    Down,
}

/// Spawn a watcher for `/sys/class/net/<iface>/operstate`.
///
/// Fails when the interface does not exist at bring-up, which is fatal to
/// the appliance. The current state is delivered as the first event.
pub fn spawn_operstate_watcher(iface: &str, poll: Duration) -> io::Result<Receiver<LinkEvent>> {
    spawn_path_watcher(
        PathBuf::from(format!("/sys/class/net/{iface}/operstate")),
        poll,
    )
}

/// Watch an explicit operstate file. Split out so tests can point the
/// watcher at a scratch file.
pub fn spawn_path_watcher(path: PathBuf, poll: Duration) -> io::Result<Receiver<LinkEvent>> {
    fs::metadata(&path)?;
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("link-watch".into())
        .spawn(move || watch_loop(path, poll, tx))?;
    Ok(rx)
}

fn watch_loop(path: PathBuf, poll: Duration, tx: Sender<LinkEvent>) {
    let mut last: Option<LinkEvent> = None;
    loop {
        let event = match fs::read_to_string(&path) {
            Ok(state) => classify_operstate(&state),
            Err(_) => LinkEvent::Down,
        };
        if last != Some(event) {
            last = Some(event);
            debug!("link transition: {event:?}");
            if tx.send(event).is_err() {
                // Dispatcher is gone; the watcher has no one left to tell.
                break;
            }
        }
        thread::sleep(poll);
    }
}

/// `up` is the only operstate treated as link-acquired; `unknown`,
/// `dormant`, `down`, and unreadable files all count as down.
pub fn classify_operstate(state: &str) -> LinkEvent {
    if state.trim() == "up" {
        LinkEvent::Up
    } else {
        LinkEvent::Down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_conservative() {
        assert_eq!(classify_operstate("up\n"), LinkEvent::Up);
        assert_eq!(classify_operstate("down\n"), LinkEvent::Down);
        assert_eq!(classify_operstate("unknown"), LinkEvent::Down);
        assert_eq!(classify_operstate("dormant"), LinkEvent::Down);
        assert_eq!(classify_operstate(""), LinkEvent::Down);
    }

    #[test]
    fn missing_interface_fails_at_bring_up() {
        let err = spawn_path_watcher(PathBuf::from("/nonexistent/operstate"), Duration::ZERO)
            .err()
            .expect("missing interface must fail");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn transitions_are_delivered_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = dir.path().join("operstate");
        fs::write(&state, "down\n").expect("seed state");

        let rx = spawn_path_watcher(state.clone(), Duration::from_millis(5)).expect("watcher");
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).expect("initial"),
            LinkEvent::Down
        );

        fs::write(&state, "up\n").expect("flip state");
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).expect("transition"),
            LinkEvent::Up
        );
    }

    #[test]
    fn steady_state_emits_no_duplicate_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = dir.path().join("operstate");
        fs::write(&state, "up\n").expect("seed state");

        let rx = spawn_path_watcher(state, Duration::from_millis(5)).expect("watcher");
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).expect("initial"),
            LinkEvent::Up
        );
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
