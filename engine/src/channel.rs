//! Bounded event channel between workers and the playback consumer.
//!
//! Publishing never blocks: when the queue is full the oldest event of the
//! same source kind is dropped (oldest overall if that kind has none queued),
//! so a slow consumer can never stall a capture loop and the newest event is
//! never refused. Consuming blocks until an event arrives or the channel is
//! shut down. Events from one worker keep their emission order.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::event::RecognizedEvent;

pub const DEFAULT_CAPACITY: usize = 8;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecvError {
    /// The channel was shut down. Expected terminal signal, not a failure.
    #[error("event channel: shut down")]
    Shutdown,

    /// No event arrived within the timeout.
    #[error("event channel: receive timed out")]
    Timeout,
}

/// A bounded multi-producer/single-consumer queue of recognized events.
/// Cloning shares the same queue.
#[derive(Clone)]
pub struct EventChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    state: Mutex<ChannelState>,
    notify: Condvar,
}

struct ChannelState {
    queue: VecDeque<RecognizedEvent>,
    capacity: usize,
    shutdown: bool,
}

impl EventChannel {
    /// Creates a channel holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity > 0 {
            capacity
        } else {
            DEFAULT_CAPACITY
        };
        Self {
            inner: Arc::new(ChannelInner {
                state: Mutex::new(ChannelState {
                    queue: VecDeque::with_capacity(capacity),
                    capacity,
                    shutdown: false,
                }),
                notify: Condvar::new(),
            }),
        }
    }

    /// Enqueues an event without blocking. Returns false once the channel is
    /// shut down, which tells a worker loop to wind down.
    pub fn publish(&self, event: RecognizedEvent) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if state.shutdown {
            return false;
        }

        if state.queue.len() == state.capacity {
            let victim = state
                .queue
                .iter()
                .position(|e| e.source == event.source)
                .unwrap_or(0);
            if let Some(dropped) = state.queue.remove(victim) {
                debug!(event = %dropped, "event channel: full, dropping oldest");
            }
        }

        state.queue.push_back(event);
        self.inner.notify.notify_one();
        true
    }

    /// Blocks until an event is available or the channel is shut down.
    pub fn recv(&self) -> Result<RecognizedEvent, RecvError> {
        let mut state = self.inner.state.lock().unwrap();
        loop {
            if let Some(event) = state.queue.pop_front() {
                return Ok(event);
            }
            if state.shutdown {
                return Err(RecvError::Shutdown);
            }
            state = self.inner.notify.wait(state).unwrap();
        }
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<RecognizedEvent, RecvError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock().unwrap();
        loop {
            if let Some(event) = state.queue.pop_front() {
                return Ok(event);
            }
            if state.shutdown {
                return Err(RecvError::Shutdown);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(RecvError::Timeout);
            }
            let (guard, _) = self
                .inner
                .notify
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = guard;
        }
    }

    /// Marks the channel shut down and wakes every blocked consumer.
    /// Queued events stay readable via [`drain`](Self::drain).
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.shutdown = true;
        self.inner.notify.notify_all();
    }

    /// Removes and returns everything still queued.
    pub fn drain(&self) -> Vec<RecognizedEvent> {
        let mut state = self.inner.state.lock().unwrap();
        state.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.state.lock().unwrap().capacity
    }
}
