use crate::errors::{Error, Result};
use std::thread;
use std::time::{Duration, Instant};

/// Regulate a loop at a fixed frequency.
///
/// Each call to [`RateLimiter::sleep`] waits for the next tick, so that time
/// spent working since the previous tick is not slept again. A loop running
/// late does not try to catch up: the next tick is scheduled one period after
/// the late call.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    pub name: String,
    /// Warn when the loop is late
    pub warn: bool,
    frequency: f64,
    period: Duration,
    next_tick: Instant,
}

impl RateLimiter {
    pub fn new(frequency: f64) -> Result<Self> {
        if !(frequency > 0.0 && frequency.is_finite()) {
            return Err(Error::Settings {
                reason: format!("rate limiter frequency must be positive, got {frequency}"),
            });
        }
        let period = Duration::from_secs_f64(1.0 / frequency);
        Ok(Self {
            name: "rate limiter".to_string(),
            warn: true,
            frequency,
            period,
            next_tick: Instant::now() + period,
        })
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Nominal period in seconds, the timestep of the loop.
    pub fn dt(&self) -> f64 {
        self.period.as_secs_f64()
    }

    /// Time left until the next tick, zero when late.
    pub fn remaining(&self) -> Duration {
        self.next_tick.saturating_duration_since(Instant::now())
    }

    pub fn sleep(&mut self) {
        let now = Instant::now();
        if self.next_tick > now {
            thread::sleep(self.next_tick - now);
            self.next_tick += self.period;
        } else {
            if self.warn {
                log::warn!("{} is late by {:.3?}", self.name, now - self.next_tick);
            }
            self.next_tick = now + self.period;
        }
    }
}
