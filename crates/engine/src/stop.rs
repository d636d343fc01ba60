//! Stop conditions and run state
//!
//! The engine runs either until an interrupt flag is raised from a signal
//! handler or until a fixed wall-clock budget elapses. The choice is made
//! once at configuration time; both are evaluated through the same
//! [`RunState::running`] code path, checked at the loop condition and
//! inside every completion handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// When to stop submitting new requests
#[derive(Debug, Clone, Copy)]
pub enum StopCondition {
    /// Run until the flag becomes true (set by a SIGINT handler)
    Signal(&'static AtomicBool),
    /// Run for a fixed wall-clock duration
    Duration(Duration),
}

/// Tracks whether the engine should keep resubmitting.
///
/// Once `running` has observed a stop it latches: the engine never resumes.
#[derive(Debug)]
pub struct RunState {
    condition: StopCondition,
    started: Instant,
    stopped: bool,
}

impl RunState {
    pub fn new(condition: StopCondition) -> Self {
        Self {
            condition,
            started: Instant::now(),
            stopped: false,
        }
    }

    /// Re-evaluate the stop condition; false once stopping has begun.
    pub fn running(&mut self) -> bool {
        if self.stopped {
            return false;
        }

        let stop = match self.condition {
            StopCondition::Signal(flag) => flag.load(Ordering::Relaxed),
            StopCondition::Duration(budget) => self.started.elapsed() >= budget,
        };
        if stop {
            self.stopped = true;
        }

        !self.stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaked_flag() -> &'static AtomicBool {
        Box::leak(Box::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_signal_condition() {
        let flag = leaked_flag();
        let mut state = RunState::new(StopCondition::Signal(flag));

        assert!(state.running());
        flag.store(true, Ordering::Relaxed);
        assert!(!state.running());
    }

    #[test]
    fn test_stop_latches() {
        let flag = leaked_flag();
        let mut state = RunState::new(StopCondition::Signal(flag));

        flag.store(true, Ordering::Relaxed);
        assert!(!state.running());

        // Clearing the flag afterwards must not restart the engine.
        flag.store(false, Ordering::Relaxed);
        assert!(!state.running());
    }

    #[test]
    fn test_zero_duration_stops_immediately() {
        let mut state = RunState::new(StopCondition::Duration(Duration::ZERO));
        assert!(!state.running());
    }

    #[test]
    fn test_long_duration_keeps_running() {
        let mut state = RunState::new(StopCondition::Duration(Duration::from_secs(3600)));
        assert!(state.running());
        assert!(state.running());
    }
}
