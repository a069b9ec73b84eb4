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
use std::fmt;

use crate::alert::AlertRecord;
use crate::overview::OverviewSnapshot;
use crate::reading::EnergyReading;

// ============= Event Kind =============

/// Closed set of events a channel can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    EnergyReading,
    AlertUpsert,
    SystemOverview,
}

impl EventKind {
    /// Normalize a wire `type` tag.
    ///
    /// The backend is not consistent about tag casing across topics, so every
    /// spelling observed in the field is accepted here and nowhere else.
    pub fn from_wire_tag(tag: &str) -> Option<Self> {
        match tag {
            "ENERGY_READING" | "energy-data" => Some(Self::EnergyReading),
            "ALERT_UPDATE" | "tamper-alert" => Some(Self::AlertUpsert),
            "system-overview" | "SYSTEM_OVERVIEW" => Some(Self::SystemOverview),
            _ => None,
        }
    }

    /// Canonical tag used when encoding events
    pub fn wire_tag(self) -> &'static str {
        match self {
            Self::EnergyReading => "ENERGY_READING",
            Self::AlertUpsert => "ALERT_UPDATE",
            Self::SystemOverview => "system-overview",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_tag())
    }
}

// ============= Inbound Event =============

/// Typed body of an inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    EnergyReading(EnergyReading),
    AlertUpsert(AlertRecord),
    SystemOverview(OverviewSnapshot),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::EnergyReading(_) => EventKind::EnergyReading,
            Self::AlertUpsert(_) => EventKind::AlertUpsert,
            Self::SystemOverview(_) => EventKind::SystemOverview,
        }
    }
}

/// One decoded frame, ready for a reconciler
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Event time as reported by the server, or receipt time when absent
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl InboundEvent {
    pub fn new(timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self { timestamp, payload }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
