//! Cancellable waiting.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// A one-shot flag with a cancellable timed wait.
///
/// `Flag` is the building block for both playback cancellation and
/// session-completion signalling: a waiter sleeps up to a deadline but wakes
/// immediately when the flag is set, so stop latency is bounded by wakeup
/// time rather than by the sleep interval.
#[derive(Clone)]
pub(crate) struct Flag {
    inner: Arc<FlagInner>,
}

struct FlagInner {
    set: Mutex<bool>,
    notify: Condvar,
}

impl Flag {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(FlagInner {
                set: Mutex::new(false),
                notify: Condvar::new(),
            }),
        }
    }

    pub(crate) fn set(&self) {
        let mut set = self.inner.set.lock().unwrap();
        *set = true;
        self.inner.notify.notify_all();
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.inner.set.lock().unwrap()
    }

    /// Waits until the flag is set or `timeout` elapses.
    /// Returns true if the flag was set.
    pub(crate) fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut set = self.inner.set.lock().unwrap();
        while !*set {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .notify
                .wait_timeout(set, deadline - now)
                .unwrap();
            set = guard;
        }
        true
    }
}

/// Cooperative cancellation token handed to a playback session.
///
/// The session checks the token once per frame; pacing delays go through
/// [`CancelToken::wait_for`] so a cancellation wakes the session within one
/// frame interval.
#[derive(Clone)]
pub struct CancelToken {
    flag: Flag,
}

impl CancelToken {
    pub fn new() -> Self {
        Self { flag: Flag::new() }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.set();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.is_set()
    }

    /// Sleeps up to `interval`, waking early on cancellation.
    /// Returns true if cancellation was requested.
    pub fn wait_for(&self, interval: Duration) -> bool {
        self.flag.wait_for(interval)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
