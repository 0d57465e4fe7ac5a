//! Timer Supervisor: cancellable single-shot timers on a virtual clock.
//!
//! Nothing runs by itself. The session asks for the next due timer with
//! [`TimerQueue::pop_due`] while it advances the clock, so ordering is fully
//! deterministic: earliest deadline first, ties broken by scheduling order.
//!
//! A timer may carry an owning [`AdState`]. Owned timers are the ones a
//! state's entry action starts; the session cancels them all when that state
//! is exited.

use crate::state::AdState;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<A> {
    owner: Option<AdState>,
    action: A,
}

#[derive(Debug)]
pub struct TimerQueue<A> {
    now: u64,
    next_id: u64,
    pending: BTreeMap<(u64, TimerId), Entry<A>>,
    deadlines: HashMap<TimerId, u64>,
}

impl<A> TimerQueue<A> {
    pub fn new() -> Self {
        TimerQueue {
            now: 0,
            next_id: 1,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Schedule `action` to fire `delay_ms` from now.
    pub fn schedule(&mut self, delay_ms: u64, owner: Option<AdState>, action: A) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let deadline = self.now.saturating_add(delay_ms);
        self.pending.insert((deadline, id), Entry { owner, action });
        self.deadlines.insert(id, deadline);
        trace!(?id, deadline, ?owner, "timer scheduled");
        id
    }

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => {
                self.pending.remove(&(deadline, id));
                trace!(?id, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer owned by `state`. Returns how many were dropped.
    pub fn cancel_owned_by(&mut self, state: AdState) -> usize {
        let owned: Vec<(u64, TimerId)> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.owner == Some(state))
            .map(|(key, _)| *key)
            .collect();
        for (deadline, id) in &owned {
            self.pending.remove(&(*deadline, *id));
            self.deadlines.remove(id);
        }
        owned.len()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn owned_count(&self, state: AdState) -> usize {
        self.pending
            .values()
            .filter(|entry| entry.owner == Some(state))
            .count()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return the earliest timer due at or before `until`,
    /// moving the clock to its deadline.
    pub fn pop_due(&mut self, until: u64) -> Option<(TimerId, Option<AdState>, A)> {
        let (&(deadline, id), _) = self.pending.iter().next()?;
        if deadline > until {
            return None;
        }
        let entry = self.pending.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        self.now = self.now.max(deadline);
        Some((id, entry.owner, entry.action))
    }

    /// Move the clock forward without firing anything.
    pub fn settle_at(&mut self, until: u64) {
        self.now = self.now.max(until);
    }
}

impl<A> Default for TimerQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut TimerQueue<&'static str>, until: u64) -> Vec<(u64, &'static str)> {
        let mut fired = Vec::new();
        while let Some((_, _, action)) = queue.pop_due(until) {
            fired.push((queue.now(), action));
        }
        queue.settle_at(until);
        fired
    }

    #[test]
    fn default_queue_starts_empty_at_zero() {
        let q: TimerQueue<&'static str> = TimerQueue::default();
        assert_eq!(q.now(), 0);
        assert_eq!(q.pending_count(), 0);
        assert_eq!(q.next_deadline(), None);
    }

    #[test]
    fn fires_in_deadline_then_schedule_order() {
        let mut q = TimerQueue::new();
        q.schedule(10, None, "late");
        q.schedule(1, None, "first");
        q.schedule(1, None, "second");
        assert_eq!(
            drain(&mut q, 20),
            vec![(1, "first"), (1, "second"), (10, "late")]
        );
        assert_eq!(q.now(), 20);
    }

    #[test]
    fn nothing_fires_before_deadline() {
        let mut q = TimerQueue::new();
        q.schedule(100, None, "timeout");
        assert!(drain(&mut q, 99).is_empty());
        assert_eq!(drain(&mut q, 100), vec![(100, "timeout")]);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut q = TimerQueue::new();
        let id = q.schedule(5, None, "x");
        assert!(q.is_pending(id));
        assert!(q.cancel(id));
        assert!(!q.cancel(id));
        assert!(drain(&mut q, 1000).is_empty());
    }

    #[test]
    fn cancel_after_fire_is_noop() {
        let mut q = TimerQueue::new();
        let id = q.schedule(1, None, "x");
        assert_eq!(drain(&mut q, 1).len(), 1);
        assert!(!q.cancel(id));
    }

    #[test]
    fn cancel_owned_by_only_touches_that_owner() {
        let mut q = TimerQueue::new();
        q.schedule(5, Some(AdState::AwaitingPreroll), "timeout");
        q.schedule(1, Some(AdState::AwaitingPreroll), "tick");
        q.schedule(5, Some(AdState::AdPlayback), "other");
        q.schedule(5, None, "free");
        assert_eq!(q.owned_count(AdState::AwaitingPreroll), 2);
        assert_eq!(q.cancel_owned_by(AdState::AwaitingPreroll), 2);
        assert_eq!(q.pending_count(), 2);
        let fired: Vec<_> = drain(&mut q, 10).into_iter().map(|(_, a)| a).collect();
        assert_eq!(fired, vec!["other", "free"]);
    }

    #[test]
    fn delays_are_relative_to_current_time() {
        let mut q = TimerQueue::new();
        q.settle_at(500);
        q.schedule(50, None, "poll");
        assert_eq!(q.next_deadline(), Some(550));
    }
}
