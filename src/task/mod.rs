//! Thread primitives used by the device core
//!
//! The core runs on preemptive OS threads: one per command invocation, one per
//! pending timer, and one per long-running loop. Nothing here tracks or joins
//! detached threads.

mod cancel;
pub mod timer;

use std::panic::AssertUnwindSafe;
use std::thread::{self, JoinHandle};

pub use cancel::CancelToken;
pub use timer::TimerHandle;

use crate::{Error, Result};

/// Spawn a fire-and-forget named thread
///
/// A panic inside `f` is caught and logged so it cannot take down anything
/// else in flight.
///
/// # Errors
///
/// Returns error if the OS refuses to create the thread
pub fn spawn_detached<F>(name: &str, f: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    spawn_loop(name, f).map(drop)
}

/// Spawn a named thread and keep its handle for a bounded join at shutdown
///
/// # Errors
///
/// Returns error if the OS refuses to create the thread
pub fn spawn_loop<F>(name: &str, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let thread_name = name.to_string();
    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(f)) {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(thread = %thread_name, %reason, "thread panicked");
            }
        })
        .map_err(|e| Error::Task(format!("failed to spawn {name}: {e}")))
}

/// Join a loop thread, giving up after `timeout`
///
/// Returns `true` if the thread finished in time.
pub fn join_with_timeout(handle: JoinHandle<()>, timeout: std::time::Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while !handle.is_finished() {
        if std::time::Instant::now() >= deadline {
            tracing::warn!(
                thread = handle.thread().name().unwrap_or("unnamed"),
                "thread did not finish within grace period"
            );
            return false;
        }
        thread::sleep(std::time::Duration::from_millis(10));
    }
    // Finished, so this cannot block
    let _ = handle.join();
    true
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_panic_is_contained() {
        spawn_detached("panicking", || panic!("boom")).unwrap();

        let (tx, rx) = mpsc::channel();
        spawn_detached("healthy", move || tx.send(7).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 7);
    }

    #[test]
    fn test_join_with_timeout() {
        let quick = spawn_loop("quick", || {}).unwrap();
        assert!(join_with_timeout(quick, Duration::from_secs(2)));

        let slow = spawn_loop("slow", || thread::sleep(Duration::from_millis(500))).unwrap();
        assert!(!join_with_timeout(slow, Duration::from_millis(20)));
    }
}
