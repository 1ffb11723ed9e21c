//! Timers driven by caller-supplied timestamps.
//!
//! Nothing here reads a clock. Callers pass `Millis` from whatever monotonic
//! source they use, which keeps the timing logic deterministic under test.

use std::time::Duration;

/// Milliseconds on the caller's monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Millis(pub u64);

impl Millis {
    pub fn after(self, delay: Duration) -> Self {
        Millis(self.0.saturating_add(delay.as_millis() as u64))
    }
}

/// Trailing-edge debounce: only the last `schedule` in a burst fires, once
/// `delay` has passed without another one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Millis>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// (Re)starts the quiet period from `now`.
    pub fn schedule(&mut self, now: Millis) {
        self.deadline = Some(now.after(self.delay));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.deadline
    }

    /// Returns true once the deadline has been reached, then disarms.
    pub fn fire(&mut self, now: Millis) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// A span of time that is open from `open(now)` until `now + length`.
#[derive(Debug, Clone)]
pub struct Window {
    length: Duration,
    until: Option<Millis>,
}

impl Window {
    pub fn new(length: Duration) -> Self {
        Self {
            length,
            until: None,
        }
    }

    pub fn open(&mut self, now: Millis) {
        self.until = Some(now.after(self.length));
    }

    pub fn until(&self) -> Option<Millis> {
        self.until
    }

    pub fn is_open(&self, now: Millis) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    /// True exactly once, on the first call after the window has run out.
    pub fn expired(&mut self, now: Millis) -> bool {
        match self.until {
            Some(until) if now >= until => {
                self.until = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_last_event_in_burst_fires() {
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.schedule(Millis(0));
        d.schedule(Millis(60));
        assert!(!d.fire(Millis(120)));
        d.schedule(Millis(120));
        assert!(!d.fire(Millis(219)));
        assert!(d.fire(Millis(220)));
        assert!(!d.fire(Millis(500)));
        assert!(!d.is_pending());
    }

    #[test]
    fn cancelled_debounce_never_fires() {
        let mut d = Debouncer::new(Duration::from_millis(10));
        d.schedule(Millis(0));
        d.cancel();
        assert!(!d.fire(Millis(1_000)));
    }

    #[test]
    fn window_opens_and_expires_once() {
        let mut w = Window::new(Duration::from_millis(250));
        assert!(!w.is_open(Millis(0)));
        w.open(Millis(1_000));
        assert!(w.is_open(Millis(1_249)));
        assert!(!w.is_open(Millis(1_250)));
        assert!(!w.expired(Millis(1_100)));
        assert!(w.expired(Millis(1_300)));
        assert!(!w.expired(Millis(1_400)));
    }
}
