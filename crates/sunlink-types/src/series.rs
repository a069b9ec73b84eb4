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

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============= Time Range =============

/// Chart range of a view, which fixes the bucket granularity and count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    /// One bucket per hour
    #[default]
    Day,
    /// One bucket per weekday
    Week,
    /// One bucket per day of month
    Month,
    /// One bucket per calendar month
    Year,
}

impl TimeRange {
    /// Maximum number of buckets a series of this range holds
    pub fn bucket_count(self) -> usize {
        match self {
            Self::Day => 24,
            Self::Week => 7,
            Self::Month => 31,
            Self::Year => 12,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    pub fn all() -> &'static [TimeRange] {
        &[Self::Day, Self::Week, Self::Month, Self::Year]
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(anyhow::anyhow!(
                "Unknown time range: '{}'. Supported ranges: {}",
                s,
                Self::all()
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

// ============= Time Bucket =============

/// One x-axis slot of a chart series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    /// Axis label, unique within a series (`"09:00"`, `"Mon"`, `"14"`, `"Mar"`)
    pub bucket_key: String,
    /// Start of the slot; series are ordered by this instant
    #[serde(with = "crate::timestamp")]
    pub start: DateTime<Utc>,
    #[serde(rename = "productionKW")]
    pub production_kw: f64,
    #[serde(rename = "consumptionKW")]
    pub consumption_kw: f64,
}

impl TimeBucket {
    pub fn new(
        bucket_key: impl Into<String>,
        start: DateTime<Utc>,
        production_kw: f64,
        consumption_kw: f64,
    ) -> Self {
        Self {
            bucket_key: bucket_key.into(),
            start,
            production_kw,
            consumption_kw,
        }
    }
}
