//! Pacing — how long to wait after writing a chunk.
//!
//! Pacing is open loop: nothing measures what the client actually
//! receives. The transmitter asks its [`Pacer`] for a delay after each
//! chunk and sleeps for it.
//!
//!   Fixed       — sleep chunk_bytes / rate after every chunk
//!   TokenBucket — byte bucket refilled at rate; sleep only once the
//!                 burst is spent, long enough to pay back the deficit

use std::time::Duration;

use bandgate_core::config::PacingMode;
use bandgate_core::Rate;
use tokio::time::Instant;

pub trait Pacer: Send {
    /// Delay to observe after `bytes` were written.
    fn delay_after(&mut self, bytes: usize) -> Duration;
}

/// Constant delay per chunk, proportional to its size.
#[derive(Debug)]
pub struct FixedDelay {
    rate: Rate,
}

impl FixedDelay {
    pub fn new(rate: Rate) -> Self {
        Self { rate }
    }
}

impl Pacer for FixedDelay {
    fn delay_after(&mut self, bytes: usize) -> Duration {
        self.rate.transmit_time(bytes)
    }
}

#[derive(Debug)]
pub struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Bucket of `burst_bytes` tokens, refilled at `rate`. Starts full.
    pub fn new(rate: Rate, burst_bytes: usize) -> Self {
        let capacity = burst_bytes as f64;
        Self {
            tokens: capacity,
            capacity,
            refill_rate: rate.bytes_per_sec(),
            last_refill: Instant::now(),
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens.min(self.capacity)
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

impl Pacer for TokenBucket {
    fn delay_after(&mut self, bytes: usize) -> Duration {
        self.refill();
        self.tokens -= bytes as f64;
        if self.tokens >= 0.0 {
            return Duration::ZERO;
        }
        let deficit = -self.tokens / self.refill_rate;
        Duration::try_from_secs_f64(deficit).unwrap_or(Duration::MAX)
    }
}

/// Build the pacer configured for a connection at `rate`.
pub fn pacer_for(mode: PacingMode, rate: Rate, burst_bytes: usize) -> Box<dyn Pacer> {
    match mode {
        PacingMode::Fixed => Box::new(FixedDelay::new(rate)),
        PacingMode::TokenBucket => Box::new(TokenBucket::new(rate, burst_bytes)),
    }
}
