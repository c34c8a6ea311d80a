//! Token-bucket admission gate.
//!
//! The gate sits ahead of the invocation pipeline: a fixed-capacity bucket
//! refilled at a configured interval. When the bucket is empty the call is
//! rejected with [`MeshError::LimitExceeded`]; otherwise it passes through
//! unchanged. The gate keeps no per-caller state.
//!
//! # Example
//!
//! ```
//! use meshcall_common::rate_limit::{RateGateConfig, TokenGate};
//! use std::time::Duration;
//!
//! // Bursts of up to 20 calls, one token back every 100ms.
//! let gate = TokenGate::new(RateGateConfig {
//!     capacity: 20,
//!     refill_interval: Duration::from_millis(100),
//! });
//!
//! assert!(gate.try_acquire().is_ok());
//! ```

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::protocol::error::{MeshError, Result};

/// Configuration for the token gate.
#[derive(Debug, Clone)]
pub struct RateGateConfig {
    /// Maximum number of tokens the bucket holds (burst size).
    pub capacity: u32,
    /// One token is returned to the bucket every interval.
    pub refill_interval: Duration,
}

impl Default for RateGateConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            refill_interval: Duration::from_millis(10),
        }
    }
}

struct GateState {
    tokens: u32,
    last_refill: Instant,
}

/// Fixed-capacity token bucket.
///
/// Starts full so startup bursts up to `capacity` are admitted immediately.
/// Refill is computed lazily on each acquisition; no background task runs.
pub struct TokenGate {
    config: RateGateConfig,
    state: Mutex<GateState>,
}

impl TokenGate {
    pub fn new(config: RateGateConfig) -> Self {
        let tokens = config.capacity;
        Self {
            config,
            state: Mutex::new(GateState {
                tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes one token, or rejects the call when the bucket is empty.
    pub fn try_acquire(&self) -> Result<()> {
        let mut state = self.state.lock();

        let elapsed = state.last_refill.elapsed();
        if elapsed >= self.config.refill_interval && !self.config.refill_interval.is_zero() {
            let refilled = (elapsed.as_nanos() / self.config.refill_interval.as_nanos()) as u32;
            state.tokens = state.tokens.saturating_add(refilled).min(self.config.capacity);
            // Advance by whole intervals only, so fractional progress
            // toward the next token is not lost.
            state.last_refill += self.config.refill_interval * refilled;
        }

        if state.tokens == 0 {
            return Err(MeshError::LimitExceeded);
        }
        state.tokens -= 1;
        Ok(())
    }

    /// Tokens currently available (after lazy refill).
    pub fn available(&self) -> u32 {
        let state = self.state.lock();
        let elapsed = state.last_refill.elapsed();
        if self.config.refill_interval.is_zero() {
            return state.tokens;
        }
        let refilled = (elapsed.as_nanos() / self.config.refill_interval.as_nanos()) as u32;
        state
            .tokens
            .saturating_add(refilled)
            .min(self.config.capacity)
    }
}
