//! Exponential backoff, shared by every worker that retries a failing
//! external call: the NotifierQueue's subscription stream (3s -> 6s -> ... ->
//! 60s cap), and any other retry-forever loop in the pipeline.

use std::time::Duration;

/// An exponential backoff with a hard cap, doubling after every failure and
/// resetting after a success.
pub struct Backoff {
    initial: Duration,
    cap: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, cap: Duration) -> Self {
        Backoff {
            initial,
            cap,
            current: initial,
        }
    }

    /// Returns the delay to wait before the next retry, then doubles it
    /// (capped) for next time.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(self.current * 2, self.cap);
        delay
    }

    /// Resets the backoff to its initial delay after a successful attempt.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_and_caps() {
        let mut b = Backoff::new(Duration::from_secs(3), Duration::from_secs(60));
        let delays: Vec<_> = (0..6).map(|_| b.next_delay()).collect();
        assert_eq!(
            delays,
            vec![3, 6, 12, 24, 48, 60].into_iter().map(Duration::from_secs).collect::<Vec<_>>()
        );
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut b = Backoff::new(Duration::from_secs(3), Duration::from_secs(60));
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_secs(3));
    }
}
