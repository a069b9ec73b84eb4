// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of SunLink.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use std::time::Duration;

use crate::config::ReconnectConfig;

/// Reconnect delay schedule.
///
/// Attempt `n` (1-based) waits `min * multiplier^(n-1)`, stretched by up to
/// `jitter` of itself and capped at `max`. With `jitter <= multiplier - 1` the
/// schedule is non-decreasing whatever the random draws are, for as long as
/// the base delay stays below `max`.
///
/// Once the base delay reaches `max` the draw spreads the delay over
/// `[max / (1 + jitter), max]` so clients stuck at the ceiling do not retry in
/// lockstep.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    min_ms: f64,
    max_ms: f64,
    multiplier: f64,
    jitter: f64,
}

impl Backoff {
    #[expect(
        clippy::cast_precision_loss,
        reason = "millisecond delays are far below 2^52"
    )]
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            min_ms: config.min_delay_ms as f64,
            max_ms: config.max_delay_ms as f64,
            multiplier: config.multiplier,
            jitter: config.jitter,
        }
    }

    /// Delay before reconnect attempt `attempt`, without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        Self::millis(self.base_ms(attempt))
    }

    /// Delay before reconnect attempt `attempt` with a fresh random draw
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, rand::random::<f64>())
    }

    /// Delay for a given jitter draw in `[0, 1)`
    pub fn delay_with(&self, attempt: u32, draw: f64) -> Duration {
        let draw = draw.clamp(0.0, 1.0);
        let stretch = 1.0 + self.jitter * draw;
        let base = self.base_ms(attempt);
        if base >= self.max_ms {
            let spread = self.max_ms * stretch / (1.0 + self.jitter);
            return Self::millis(spread.min(self.max_ms));
        }
        Self::millis((base * stretch).min(self.max_ms))
    }

    pub fn max_delay(&self) -> Duration {
        Self::millis(self.max_ms)
    }

    fn base_ms(&self, attempt: u32) -> f64 {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        (self.min_ms * self.multiplier.powi(exponent)).min(self.max_ms)
    }

    fn millis(ms: f64) -> Duration {
        Duration::from_secs_f64(ms / 1000.0)
    }
}
