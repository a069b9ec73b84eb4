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

//! Channel configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ChannelError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// WebSocket endpoint of the monitoring broker
    #[serde(default = "default_url")]
    pub url: String,

    /// Upper bound for TCP/WebSocket connect plus the STOMP handshake
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Heart-beat interval offered to the broker in both directions (0 disables)
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,

    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Exponential reconnect backoff with a ceiling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectConfig {
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Random extra delay as a fraction of the base delay.
    /// Must not exceed `multiplier - 1` so delays stay non-decreasing.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_url() -> String {
    "ws://localhost:8080/ws".to_owned()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_heartbeat_ms() -> u64 {
    30_000
}

fn default_min_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    15_000
}

fn default_multiplier() -> f64 {
    1.3
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            heartbeat_ms: default_heartbeat_ms(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl ChannelConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ChannelError::Config("channel.url must be set".to_owned()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ChannelError::Config(
                "channel.connect_timeout_ms must be greater than zero".to_owned(),
            ));
        }
        self.reconnect.validate()
    }
}

impl ReconnectConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_delay_ms == 0 {
            return Err(ChannelError::Config(
                "reconnect.min_delay_ms must be greater than zero".to_owned(),
            ));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ChannelError::Config(format!(
                "reconnect.min_delay_ms ({}) exceeds reconnect.max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ChannelError::Config(format!(
                "reconnect.multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        let max_jitter = self.multiplier - 1.0;
        if !(0.0..=max_jitter).contains(&self.jitter) {
            return Err(ChannelError::Config(format!(
                "reconnect.jitter must be within [0, {max_jitter:.2}], got {}",
                self.jitter
            )));
        }
        Ok(())
    }
}
