//! Per-label emission debouncing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Suppresses repeat emissions of the same label inside a cool-down window.
///
/// A recognizer that sees the same steady hand pose on every frame would
/// otherwise flood the channel with identical events; the debouncer lets one
/// through, then mutes that label until the window elapses. Distinct labels
/// never block each other.
pub struct Debouncer {
    window: Duration,
    last: HashMap<String, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    /// Returns true if `label` may be emitted now, recording the emission.
    pub fn admit(&mut self, label: &str) -> bool {
        if self.window.is_zero() {
            return true;
        }
        let now = Instant::now();
        match self.last.get(label) {
            Some(&at) if now.duration_since(at) < self.window => false,
            _ => {
                self.last.insert(label.to_string(), now);
                true
            }
        }
    }

    /// Forgets all recorded emissions.
    pub fn reset(&mut self) {
        self.last.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn duplicate_inside_window_is_suppressed() {
        let mut d = Debouncer::new(Duration::from_millis(100));
        assert!(d.admit("hello"));
        assert!(!d.admit("hello"));
        assert!(!d.admit("hello"));
    }

    #[test]
    fn duplicate_after_window_is_admitted() {
        let mut d = Debouncer::new(Duration::from_millis(20));
        assert!(d.admit("hello"));
        thread::sleep(Duration::from_millis(30));
        assert!(d.admit("hello"));
    }

    #[test]
    fn distinct_labels_are_independent() {
        let mut d = Debouncer::new(Duration::from_secs(10));
        assert!(d.admit("hello"));
        assert!(d.admit("goodbye"));
        assert!(!d.admit("hello"));
    }

    #[test]
    fn zero_window_disables_debouncing() {
        let mut d = Debouncer::new(Duration::ZERO);
        assert!(d.admit("hello"));
        assert!(d.admit("hello"));
    }

    #[test]
    fn reset_forgets_history() {
        let mut d = Debouncer::new(Duration::from_secs(10));
        assert!(d.admit("hello"));
        d.reset();
        assert!(d.admit("hello"));
    }
}
