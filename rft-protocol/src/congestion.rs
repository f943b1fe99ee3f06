//! Congestion Control for RFT
//!
//! Window-based slow start / congestion avoidance. The controller knows
//! nothing about individual packets: the sender reports success signals and
//! retransmission timeouts, and reads back how many packets may be in flight.
//!
//! The numeric parameters are illustrative rather than tuned for real networks.

use tracing::debug;

/// Initial congestion window (packets)
pub const INITIAL_CWND: u32 = 1;

/// Initial slow start threshold (packets)
pub const INITIAL_THRESHOLD: u32 = 64;

/// Lowest value the threshold may be cut to
pub const MIN_THRESHOLD: u32 = 2;

/// When the sender reports a success signal to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowGrowth {
    /// One signal for every newly acknowledged packet
    #[default]
    PerAck,
    /// One signal each time a full window round has been acknowledged
    PerRound,
}

/// Congestion control state
#[derive(Debug, Clone)]
pub struct CongestionController {
    /// Congestion window size (packets)
    cwnd: u32,
    /// Slow start threshold
    threshold: u32,
    /// Number of success signals received
    signals: u64,
    /// Number of timeouts received
    timeouts: u64,
}

impl CongestionController {
    /// Create a controller with `cwnd = 1`, `threshold = 64`
    pub fn new() -> Self {
        Self::with_params(INITIAL_CWND, INITIAL_THRESHOLD)
    }

    /// Create a controller with custom starting values
    ///
    /// Values are clamped so that `cwnd >= 1` and `threshold >= 2`.
    pub fn with_params(cwnd: u32, threshold: u32) -> Self {
        CongestionController {
            cwnd: cwnd.max(1),
            threshold: threshold.max(MIN_THRESHOLD),
            signals: 0,
            timeouts: 0,
        }
    }

    /// Get current congestion window size
    #[inline]
    pub fn congestion_window(&self) -> u32 {
        self.cwnd
    }

    /// Get current slow start threshold
    #[inline]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Whether the controller is in the slow start phase
    #[inline]
    pub fn is_slow_start(&self) -> bool {
        self.cwnd < self.threshold
    }

    /// Record a successful acknowledgement signal
    pub fn on_ack_signal(&mut self) {
        self.signals += 1;

        if self.is_slow_start() {
            self.cwnd = self.cwnd.saturating_mul(2);
            debug!(cwnd = self.cwnd, "Slow start: window doubled");
        } else {
            self.cwnd = self.cwnd.saturating_add(1);
            debug!(cwnd = self.cwnd, "Congestion avoidance: window incremented");
        }
    }

    /// Record a retransmission timeout
    pub fn on_timeout(&mut self) {
        self.timeouts += 1;
        self.cwnd = 1;
        self.threshold = (self.threshold / 2).max(MIN_THRESHOLD);
        debug!(
            cwnd = self.cwnd,
            threshold = self.threshold,
            "Timeout: window reset"
        );
    }

    /// Reset to initial state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Get statistics
    pub fn stats(&self) -> CongestionStats {
        CongestionStats {
            congestion_window: self.cwnd,
            threshold: self.threshold,
            slow_start: self.is_slow_start(),
            signals: self.signals,
            timeouts: self.timeouts,
        }
    }
}

impl Default for CongestionController {
    fn default() -> Self {
        Self::new()
    }
}

/// Congestion control statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CongestionStats {
    /// Current congestion window
    pub congestion_window: u32,
    /// Slow start threshold
    pub threshold: u32,
    /// Whether in slow start phase
    pub slow_start: bool,
    /// Success signals seen
    pub signals: u64,
    /// Timeouts seen
    pub timeouts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_congestion_controller_creation() {
        let cc = CongestionController::new();

        assert_eq!(cc.congestion_window(), 1);
        assert_eq!(cc.threshold(), 64);
        assert!(cc.is_slow_start());
    }

    #[test]
    fn test_slow_start() {
        let mut cc = CongestionController::with_params(1, 2048);

        for _ in 0..10 {
            cc.on_ack_signal();
        }

        assert_eq!(cc.congestion_window(), 1024);
        assert!(cc.is_slow_start());
    }

    #[test]
    fn test_slow_start_reaches_threshold() {
        let mut cc = CongestionController::new();

        for _ in 0..6 {
            cc.on_ack_signal();
        }
        assert_eq!(cc.congestion_window(), 64);
        assert!(!cc.is_slow_start());
    }

    #[test]
    fn test_congestion_avoidance() {
        let mut cc = CongestionController::new();
        for _ in 0..6 {
            cc.on_ack_signal();
        }

        for expected in 65..75 {
            cc.on_ack_signal();
            assert_eq!(cc.congestion_window(), expected);
        }
    }

    #[test]
    fn test_timeout_penalty() {
        let mut cc = CongestionController::with_params(40, 64);
        cc.on_timeout();
        assert_eq!(cc.congestion_window(), 1);
        assert_eq!(cc.threshold(), 32);

        let mut cc = CongestionController::with_params(9, 5);
        cc.on_timeout();
        assert_eq!(cc.threshold(), 2);

        let mut cc = CongestionController::with_params(3, 2);
        cc.on_timeout();
        assert_eq!(cc.congestion_window(), 1);
        assert_eq!(cc.threshold(), 2);
    }

    #[test]
    fn test_params_are_clamped() {
        let cc = CongestionController::with_params(0, 0);
        assert_eq!(cc.congestion_window(), 1);
        assert_eq!(cc.threshold(), 2);
    }

    #[test]
    fn test_growth_saturates() {
        let mut cc = CongestionController::with_params(u32::MAX, u32::MAX);
        cc.on_ack_signal();
        assert_eq!(cc.congestion_window(), u32::MAX);
    }

    #[test]
    fn test_stats() {
        let mut cc = CongestionController::new();
        cc.on_ack_signal();
        cc.on_timeout();

        let stats = cc.stats();
        assert_eq!(stats.signals, 1);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.congestion_window, 1);
        assert_eq!(stats.threshold, 32);
        assert!(stats.slow_start);
    }
}
