//! One-shot timers with cancel-before-fire

use std::time::Duration;

use super::{CancelToken, spawn_detached};
use crate::Result;

/// Handle to a pending one-shot timer
///
/// Cancelling only guarantees the callback is skipped if the timer has not
/// fired yet. Callers that race with the callback must re-check their own
/// state under a lock when it runs.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancelToken,
}

impl TimerHandle {
    /// Cancel the timer if it has not fired
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Run `callback` on its own thread after `delay`, unless cancelled first
///
/// # Errors
///
/// Returns error if the timer thread cannot be spawned
pub fn after<F>(name: &str, delay: Duration, callback: F) -> Result<TimerHandle>
where
    F: FnOnce() + Send + 'static,
{
    let token = CancelToken::new();
    let waiter = token.clone();

    spawn_detached(name, move || {
        if !waiter.wait_timeout(delay) {
            callback();
        }
    })?;

    Ok(TimerHandle { token })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_timer_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let _handle = after("test-timer", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancelled_timer_does_not_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let handle = after("test-timer", Duration::from_millis(80), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        handle.cancel();
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
