/*
Time helpers for the lock-step model.

Nothing in the simulator advances time on its own. The multiprocessor driver owns the global
cycle counter and hands `now` down to every tick; components that need to wait a fixed number of
cycles (non-memory instructions, bus transactions, priority jobs) hold a `Countdown` and tick it
exactly once per cycle in which they are serviced.
*/

pub type Cycle = u64;

/// Fixed-length wait, decremented once per serviced cycle. A zero-length countdown is finished
/// from the start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Countdown {
    remaining: Cycle,
}

impl Countdown {
    pub fn new(cycles: Cycle) -> Self {
        Self { remaining: cycles }
    }

    pub fn finished(&self) -> bool {
        self.remaining == 0
    }

    pub fn remaining(&self) -> Cycle {
        self.remaining
    }

    // Consume one cycle. Returns true on the tick that brings the countdown to zero, so callers can
    // run completion side effects exactly once.
    pub fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.remaining == 0
    }
}

/// Inclusive span between two cycles: a job issued and completed in the same cycle took one.
pub fn span(issued_at: Cycle, now: Cycle) -> Cycle {
    now.saturating_sub(issued_at).saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::{span, Countdown};

    #[test]
    fn zero_countdown_is_finished() {
        let mut c = Countdown::new(0);
        assert!(c.finished());
        assert!(!c.tick());
    }

    #[test]
    fn tick_reports_completion_once() {
        let mut c = Countdown::new(2);
        assert!(!c.tick());
        assert!(c.tick());
        assert!(c.finished());
        assert!(!c.tick());
    }

    #[test]
    fn span_is_inclusive() {
        assert_eq!(span(5, 5), 1);
        assert_eq!(span(1, 100), 100);
    }
}
