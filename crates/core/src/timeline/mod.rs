use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Millisecond clock owned by the host. The core never reads wall time; every
/// scheduled callback is expressed against this clock so tests can drive it
/// deterministically.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostClock {
    now_ms: u64,
}

impl HostClock {
    /// Creates a clock at zero.
    pub fn start() -> Self {
        Self::default()
    }

    /// Returns the current time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Moves the clock forward and returns the new time.
    pub fn advance(&mut self, delta_ms: u64) -> u64 {
        self.now_ms = self.now_ms.saturating_add(delta_ms);
        self.now_ms
    }

    pub fn reset(&mut self) {
        self.now_ms = 0;
    }
}

/// Identifier returned by [`Scheduler::schedule_at`], used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(u64);

/// Cancellable one-shot timer queue.
///
/// Tasks become due once the host clock reaches their due time and are handed
/// out earliest first; timers sharing a due time fire in scheduling order.
/// Recurring work is expressed by re-arming a new timer when one fires.
#[derive(Debug)]
pub struct Scheduler<T> {
    queue: BTreeMap<(u64, TimerId), T>,
    due_by_id: HashMap<TimerId, u64>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            due_by_id: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<T> Scheduler<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` to become due at the absolute time `due_ms`.
    pub fn schedule_at(&mut self, due_ms: u64, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.queue.insert((due_ms, id), task);
        self.due_by_id.insert(id, due_ms);
        id
    }

    /// Schedules `task` to become due `delay_ms` after `now_ms`.
    pub fn schedule_after(&mut self, now_ms: u64, delay_ms: u64, task: T) -> TimerId {
        self.schedule_at(now_ms.saturating_add(delay_ms), task)
    }

    /// Cancels a pending timer. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.due_by_id.remove(&id) {
            Some(due) => self.queue.remove(&(due, id)).is_some(),
            None => false,
        }
    }

    /// Drops every pending timer and returns how many were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.due_by_id.clear();
        dropped
    }

    /// Removes and returns the earliest timer due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(TimerId, T)> {
        let key = *self.queue.keys().next()?;
        if key.0 > now_ms {
            return None;
        }
        let task = self.queue.remove(&key)?;
        self.due_by_id.remove(&key.1);
        Some((key.1, task))
    }

    /// Due time of the earliest pending timer.
    pub fn next_due(&self) -> Option<u64> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    /// Returns true if the timer has neither fired nor been cancelled.
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.due_by_id.contains_key(&id)
    }

    /// Number of timers still waiting to fire.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_and_resets() {
        let mut clock = HostClock::start();
        assert_eq!(clock.advance(50), 50);
        assert_eq!(clock.advance(1_000), 1_050);
        clock.reset();
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn fires_in_due_order_then_fifo() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(100, "late");
        scheduler.schedule_at(50, "first");
        scheduler.schedule_at(50, "second");

        assert!(scheduler.pop_due(49).is_none());
        assert_eq!(scheduler.pop_due(100).unwrap().1, "first");
        assert_eq!(scheduler.pop_due(100).unwrap().1, "second");
        assert_eq!(scheduler.pop_due(100).unwrap().1, "late");
        assert!(scheduler.pop_due(u64::MAX).is_none());
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut scheduler = Scheduler::new();
        let keep = scheduler.schedule_after(0, 10, 1);
        let drop = scheduler.schedule_after(0, 10, 2);

        assert!(scheduler.cancel(drop));
        assert!(!scheduler.cancel(drop));
        assert!(scheduler.is_pending(keep));
        assert_eq!(scheduler.pop_due(10), Some((keep, 1)));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn cancel_all_empties_the_queue() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(5, ());
        scheduler.schedule_at(7, ());
        assert_eq!(scheduler.next_due(), Some(5));
        assert_eq!(scheduler.cancel_all(), 2);
        assert_eq!(scheduler.next_due(), None);
    }
}
