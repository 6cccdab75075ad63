//! Process shutdown signal handling.
//!
//! A first `Ctrl+C` asks for confirmation rather than exiting immediately;
//! a second one within a short window confirms the shutdown. Mirrors the
//! original engine's `WaitForExitSignal` (a single unconfirmed Ctrl+C is a
//! common accident when attached to a live session).

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

const CONFIRM_WINDOW: Duration = Duration::from_secs(5);

struct State {
    signaled_at: Option<Instant>,
    confirmed: bool,
}

/// Blocks the calling thread until shutdown is confirmed (two Ctrl+C
/// presses within [`CONFIRM_WINDOW`], or one if `require_confirmation` is
/// false).
pub fn wait_for_exit(require_confirmation: bool) {
    let state = Arc::new((
        Mutex::new(State {
            signaled_at: None,
            confirmed: false,
        }),
        Condvar::new(),
    ));

    let handler_state = state.clone();
    ctrlc::set_handler(move || {
        let (lock, cvar) = &*handler_state;
        let mut s = lock.lock().unwrap();
        let now = Instant::now();
        let within_window = s
            .signaled_at
            .map(|t| now.duration_since(t) <= CONFIRM_WINDOW)
            .unwrap_or(false);
        if !require_confirmation || within_window {
            s.confirmed = true;
            cvar.notify_all();
        } else {
            s.signaled_at = Some(now);
            tracing::warn!(
                "received interrupt; press Ctrl+C again within {}s to confirm shutdown",
                CONFIRM_WINDOW.as_secs()
            );
        }
    })
    .expect("install ctrl+c handler");

    let (lock, cvar) = &*state;
    let guard = lock.lock().unwrap();
    let _unused = cvar
        .wait_while(guard, |s| !s.confirmed)
        .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_window_is_positive() {
        assert!(CONFIRM_WINDOW > Duration::from_secs(0));
    }
}
