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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point reading pushed on an installation topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyReading {
    #[serde(default)]
    pub installation_id: Option<i64>,
    #[serde(default)]
    pub power_generation_watts: f64,
    #[serde(default)]
    pub power_consumption_watts: f64,
    #[serde(with = "crate::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, rename = "dailyYieldKWh")]
    pub daily_yield_kwh: Option<f64>,
    #[serde(default, rename = "totalYieldKWh")]
    pub total_yield_kwh: Option<f64>,
    #[serde(default)]
    pub is_simulated: bool,
}

impl EnergyReading {
    pub fn new(
        timestamp: DateTime<Utc>,
        power_generation_watts: f64,
        power_consumption_watts: f64,
    ) -> Self {
        Self {
            installation_id: None,
            power_generation_watts,
            power_consumption_watts,
            timestamp,
            daily_yield_kwh: None,
            total_yield_kwh: None,
            is_simulated: false,
        }
    }

    pub fn production_kw(&self) -> f64 {
        self.power_generation_watts / 1000.0
    }

    pub fn consumption_kw(&self) -> f64 {
        self.power_consumption_watts / 1000.0
    }
}
