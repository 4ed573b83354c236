//! Cancellable one-shot timers driven by the host's tick clock
//!
//! Each timer is keyed by a purpose (watchdog, hit recency, guard duration,
//! ...). Arming a key that is already armed replaces its deadline, and
//! cancelling is idempotent. Timers never fire on their own: the owner
//! calls [`Timers::advance`] from its tick and handles the keys it returns,
//! so a timer cannot outlive the value that owns it.

use std::collections::HashMap;
use std::hash::Hash;

/// A set of one-shot timers keyed by purpose
#[derive(Debug, Clone)]
pub struct Timers<K> {
    /// Elapsed time since creation, in seconds
    now: f64,
    /// Absolute deadline per armed key
    deadlines: HashMap<K, f64>,
}

impl<K> Default for Timers<K> {
    fn default() -> Self {
        Self {
            now: 0.0,
            deadlines: HashMap::new(),
        }
    }
}

impl<K> Timers<K>
where
    K: Copy + Eq + Hash,
{
    /// Create an empty timer set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire after `seconds`, replacing any pending deadline
    pub fn set(&mut self, key: K, seconds: f32) {
        let delay = f64::from(seconds.max(0.0));
        self.deadlines.insert(key, self.now + delay);
    }

    /// Cancel `key`. Returns whether it was armed.
    pub fn cancel(&mut self, key: K) -> bool {
        self.deadlines.remove(&key).is_some()
    }

    /// Cancel every timer
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    /// Whether `key` is armed
    #[must_use]
    pub fn is_armed(&self, key: K) -> bool {
        self.deadlines.contains_key(&key)
    }

    /// Number of armed timers
    #[must_use]
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Whether no timer is armed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Move the clock forward and return the keys that expired, earliest
    /// deadline first. Expired keys are disarmed before they are returned.
    pub fn advance(&mut self, dt: f32) -> Vec<K> {
        self.now += f64::from(dt.max(0.0));

        let mut fired: Vec<(K, f64)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= self.now)
            .map(|(key, deadline)| (*key, *deadline))
            .collect();
        fired.sort_by(|a, b| a.1.total_cmp(&b.1));

        for (key, _) in &fired {
            self.deadlines.remove(key);
        }
        fired.into_iter().map(|(key, _)| key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Key {
        Watchdog,
        Guard,
    }

    #[test]
    fn fires_once_after_deadline() {
        let mut timers = Timers::new();
        timers.set(Key::Watchdog, 2.0);

        assert!(timers.advance(1.5).is_empty());
        assert_eq!(timers.advance(0.5), vec![Key::Watchdog]);
        assert!(timers.advance(10.0).is_empty());
        assert!(!timers.is_armed(Key::Watchdog));
    }

    #[test]
    fn rearming_replaces_deadline() {
        let mut timers = Timers::new();
        timers.set(Key::Guard, 1.0);
        timers.advance(0.8);
        timers.set(Key::Guard, 1.0);

        assert!(timers.advance(0.5).is_empty());
        assert_eq!(timers.advance(0.6), vec![Key::Guard]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut timers = Timers::new();
        timers.set(Key::Watchdog, 1.0);

        assert!(timers.cancel(Key::Watchdog));
        assert!(!timers.cancel(Key::Watchdog));
        assert!(!timers.cancel(Key::Guard));
        assert!(timers.advance(5.0).is_empty());
    }

    #[test]
    fn fired_in_deadline_order() {
        let mut timers = Timers::new();
        timers.set(Key::Watchdog, 0.9);
        timers.set(Key::Guard, 0.3);

        assert_eq!(timers.advance(1.0), vec![Key::Guard, Key::Watchdog]);
        assert!(timers.is_empty());
    }
}
