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

use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use sunlink_channel::ChannelConfig;
use sunlink_types::TimeRange;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub view: ViewSettings,
    #[serde(default)]
    pub baseline: BaselineSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewSettings {
    /// Chart range of the installation series
    #[serde(default)]
    pub time_range: TimeRange,
    /// IANA zone used for bucket boundaries
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Retention cap for the alert feed; unbounded when unset
    #[serde(default)]
    pub max_alerts: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaselineSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Readings requested when seeding an installation series
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

fn default_timezone() -> String {
    "Europe/Prague".to_owned()
}

fn default_base_url() -> String {
    "http://localhost:8080".to_owned()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_recent_limit() -> usize {
    100
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            time_range: TimeRange::default(),
            timezone: default_timezone(),
            max_alerts: None,
        }
    }
}

impl Default for BaselineSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            recent_limit: default_recent_limit(),
        }
    }
}

impl ViewSettings {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Unknown timezone: '{}'. {e}", self.timezone))
    }
}

impl BaselineSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MonitorConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.channel
            .validate()
            .context("Invalid [channel] section")?;
        self.view.timezone()?;
        if self.view.max_alerts == Some(0) {
            bail!("view.max_alerts must be greater than zero when set");
        }
        if self.baseline.base_url.trim().is_empty() {
            bail!("baseline.base_url must be set");
        }
        if self.baseline.max_retries == 0 {
            bail!("baseline.max_retries must be at least 1");
        }
        Ok(())
    }
}
