//! Cancellable one-shot timers.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Schedules one-shot callbacks identified by [`TimerId`].
///
/// Firing is reported back by the owner of the service; the plot only
/// needs to schedule and cancel.
pub trait TimerService {
    fn schedule(&mut self, delay: Duration) -> TimerId;

    /// Returns `false` if the timer already fired or was never scheduled
    fn cancel(&mut self, id: TimerId) -> bool;
}

/// Timers driven by elapsed frame time
#[derive(Debug, Clone, Default)]
pub struct FrameTimers {
    now: Duration,
    next_id: u64,
    pending: Vec<(TimerId, Duration)>,
}

impl FrameTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Move the clock forward and return timers that came due, earliest first.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<TimerId> {
        self.now += elapsed;
        let now = self.now;
        let mut due: Vec<(TimerId, Duration)> = Vec::new();
        self.pending.retain(|&(id, deadline)| {
            if deadline <= now {
                due.push((id, deadline));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(id, deadline)| (deadline, id));
        due.into_iter().map(|(id, _)| id).collect()
    }
}

impl TimerService for FrameTimers {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push((id, self.now + delay));
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|&(pending, _)| pending != id);
        self.pending.len() != before
    }
}
