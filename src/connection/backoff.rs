use std::time::Duration;

/// Capped geometric reconnect delay.
///
/// `next_delay` hands out the current delay and then grows it by `factor`,
/// never past `max`. `reset` returns to `base` after a successful connect.
#[derive(Clone, Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    factor: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, factor: f64) -> Self {
        // A ceiling below the base would make the first delay exceed it
        let max = max.max(base);
        let factor = if factor.is_finite() && factor >= 1.0 { factor } else { 1.0 };

        Self {
            base,
            max,
            factor,
            current: base,
        }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.factor).min(self.max);
        delay
    }

    /// Delay the next call to `next_delay` will return
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}
