//! Progress ticker
//!
//! The engine loop selects on the ticker's channel next to its command
//! queue, so progress is sampled on the engine thread between work items.

use crossbeam_channel::{never, tick, Receiver};
use std::time::{Duration, Instant};

/// Periodic tick source that can be halted and resumed
#[derive(Debug)]
pub struct ProgressTicker {
    period: Duration,
    ticks: Option<Receiver<Instant>>,
}

impl ProgressTicker {
    /// Default period, roughly 30 Hz
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(33);

    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            ticks: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.ticks.is_some()
    }

    /// Start ticking; a running ticker keeps its phase
    pub fn start(&mut self) {
        if self.ticks.is_none() {
            self.ticks = Some(tick(self.period));
        }
    }

    pub fn stop(&mut self) {
        self.ticks = None;
    }

    /// Channel to select on; never fires while stopped
    pub fn receiver(&self) -> Receiver<Instant> {
        self.ticks.clone().unwrap_or_else(never)
    }
}

impl Default for ProgressTicker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_only_while_running() {
        let mut ticker = ProgressTicker::new(Duration::from_millis(5));
        assert!(!ticker.is_running());
        assert!(ticker
            .receiver()
            .recv_timeout(Duration::from_millis(30))
            .is_err());

        ticker.start();
        assert!(ticker.is_running());
        assert!(ticker
            .receiver()
            .recv_timeout(Duration::from_millis(500))
            .is_ok());

        ticker.stop();
        assert!(!ticker.is_running());
    }

    #[test]
    fn zero_period_is_raised() {
        let ticker = ProgressTicker::new(Duration::ZERO);
        assert_eq!(ticker.period(), Duration::from_millis(1));
        assert_eq!(ProgressTicker::default().period(), Duration::from_millis(33));
    }
}
