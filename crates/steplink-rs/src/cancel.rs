use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};

/// Shared stop flag. Clones observe the same flag, so one clone can live in
/// a signal handler while another is polled by the dispatch loop.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this token to stop.
    pub fn cancel(&self) {
        debug!("Cancellation requested");
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether `cancel` has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking every `check_interval` to look at the flag.
    ///
    /// Returns `false` if the sleep was cut short by cancellation.
    pub fn sleep(&self, duration: Duration, check_interval: Duration) -> bool {
        trace!("Cancellable sleep: {:?} in {:?} slices", duration, check_interval);
        let start = Instant::now();

        if self.is_cancelled() {
            return false;
        }

        while start.elapsed() < duration {
            let remaining = duration.saturating_sub(start.elapsed());
            thread::sleep(remaining.min(check_interval));

            if self.is_cancelled() {
                debug!("Sleep interrupted after {:.2}s", start.elapsed().as_secs_f64());
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let handler_side = token.clone();
        assert!(!token.is_cancelled());
        handler_side.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn sleep_returns_early_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(5), Duration::from_millis(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn sleep_wakes_up_on_cancel_from_another_thread() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(10), Duration::from_millis(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn zero_sleep_completes() {
        assert!(CancelToken::new().sleep(Duration::ZERO, Duration::from_millis(10)));
    }
}
