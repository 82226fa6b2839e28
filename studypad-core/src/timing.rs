use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Millisecond clock injected into the controller so tests drive time
/// deterministically instead of sleeping.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock for tests.
pub struct VirtualClock {
    ms: AtomicU64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, delta_ms: u64) {
        self.ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.ms.store(ms, Ordering::SeqCst);
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }
}

/// Delays an action until a quiet period elapses after the last trigger.
/// A trigger while a request is already pending reschedules it; bursts
/// coalesce into a single firing.
#[derive(Debug)]
pub struct Debouncer {
    delay_ms: u64,
    deadline: Option<u64>,
}

impl Debouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            deadline: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn trigger(&mut self, now_ms: u64) {
        self.deadline = Some(now_ms + self.delay_ms);
    }

    /// True exactly once per quiet period, when the deadline has passed.
    pub fn fire(&mut self, now_ms: u64) -> bool {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.deadline = None;
    }
}

/// Fires at a fixed period, measured from the previous firing.
#[derive(Debug)]
pub struct IntervalTimer {
    period_ms: u64,
    next: u64,
}

impl IntervalTimer {
    pub fn new(period_ms: u64, now_ms: u64) -> Self {
        Self {
            period_ms,
            next: now_ms + period_ms,
        }
    }

    pub fn fire(&mut self, now_ms: u64) -> bool {
        if now_ms >= self.next {
            self.next = now_ms + self.period_ms;
            true
        } else {
            false
        }
    }

    pub fn restart(&mut self, now_ms: u64) {
        self.next = now_ms + self.period_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_waits_out_the_quiet_period() {
        let mut debouncer = Debouncer::new(500);
        debouncer.trigger(0);
        assert!(!debouncer.fire(499));
        assert!(debouncer.fire(500));
        assert!(!debouncer.fire(501));
    }

    #[test]
    fn retrigger_reschedules_instead_of_queuing() {
        let mut debouncer = Debouncer::new(500);
        debouncer.trigger(0);
        debouncer.trigger(300);
        assert!(!debouncer.fire(500));
        assert!(debouncer.fire(800));
        // The two triggers coalesced into a single firing.
        assert!(!debouncer.fire(2000));
    }

    #[test]
    fn idle_debouncer_never_fires() {
        let mut debouncer = Debouncer::new(500);
        assert!(!debouncer.fire(10_000));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn interval_fires_once_per_period() {
        let mut timer = IntervalTimer::new(2000, 0);
        assert!(!timer.fire(1999));
        assert!(timer.fire(2000));
        assert!(!timer.fire(2001));
        assert!(timer.fire(4001));
    }

    #[test]
    fn virtual_clock_advances_monotonically() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now_ms(), 0);
        clock.advance(250);
        clock.advance(250);
        assert_eq!(clock.now_ms(), 500);
        clock.set(100);
        assert_eq!(clock.now_ms(), 100);
    }
}
