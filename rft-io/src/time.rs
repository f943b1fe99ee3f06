//! Timing utilities for RFT drivers
//!
//! [`Pacer`] spaces out consecutive sends by a fixed interval; [`Timer`]
//! backs the receiver's idle and linger deadlines.

use std::thread;
use std::time::{Duration, Instant};

/// Enforces a minimum gap between consecutive sends
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last_send: Option<Instant>,
}

impl Pacer {
    /// Create a pacer with the given inter-send interval
    pub fn new(interval: Duration) -> Self {
        Pacer {
            interval,
            last_send: None,
        }
    }

    /// Time left before the next send is allowed
    pub fn time_until_ready(&self) -> Duration {
        match self.last_send {
            Some(last) => self.interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Block until the next send is allowed, then record it
    pub fn wait(&mut self) {
        let remaining = self.time_until_ready();
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
        self.last_send = Some(Instant::now());
    }
}

/// Inactivity timer
pub struct Timer {
    interval: Duration,
    last_reset: Instant,
}

impl Timer {
    /// Create a new timer with the given interval
    pub fn new(interval: Duration) -> Self {
        Timer {
            interval,
            last_reset: Instant::now(),
        }
    }

    /// Check if the timer has expired
    pub fn expired(&self) -> bool {
        self.last_reset.elapsed() >= self.interval
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        self.last_reset = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_send_is_immediate() {
        let mut pacer = Pacer::new(Duration::from_secs(10));
        assert_eq!(pacer.time_until_ready(), Duration::ZERO);

        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_pacer_spaces_sends() {
        let mut pacer = Pacer::new(Duration::from_millis(20));
        let start = Instant::now();

        pacer.wait();
        pacer.wait();
        pacer.wait();

        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_zero_interval() {
        let mut pacer = Pacer::new(Duration::ZERO);
        pacer.wait();
        assert_eq!(pacer.time_until_ready(), Duration::ZERO);
    }

    #[test]
    fn test_timer() {
        let mut timer = Timer::new(Duration::from_millis(10));
        assert!(!timer.expired());

        thread::sleep(Duration::from_millis(11));
        assert!(timer.expired());

        timer.reset();
        assert!(!timer.expired());
    }
}
