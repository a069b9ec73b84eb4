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

/// Complete fleet-wide counters pushed on the system topic.
///
/// The server always sends the full record, so counters missing from a frame
/// read as zero instead of being carried over from an earlier snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverviewSnapshot {
    pub total_active_installations: u32,
    pub total_suspended_installations: u32,
    pub total_installations_with_tamper_alerts: u32,
    #[serde(rename = "totalSystemCapacityKW")]
    pub total_system_capacity_kw: f64,
    pub current_system_generation_watts: f64,
    #[serde(rename = "todayTotalGenerationKWh")]
    pub today_total_generation_kwh: f64,
    #[serde(rename = "todayTotalConsumptionKWh")]
    pub today_total_consumption_kwh: f64,
    #[serde(rename = "monthToDateGenerationKWh")]
    pub month_to_date_generation_kwh: f64,
    #[serde(rename = "monthToDateConsumptionKWh")]
    pub month_to_date_consumption_kwh: f64,
    #[serde(rename = "yearToDateGenerationKWh")]
    pub year_to_date_generation_kwh: f64,
    #[serde(rename = "lifetimeGenerationKWh")]
    pub lifetime_generation_kwh: f64,
    pub average_system_efficiency: f64,
    #[serde(with = "crate::timestamp::option")]
    pub last_updated: Option<DateTime<Utc>>,
}
