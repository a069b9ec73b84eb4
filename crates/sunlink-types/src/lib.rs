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

//! Shared data model for the SunLink telemetry channels.
//!
//! Everything that crosses a crate boundary lives here: topics, the typed inbound
//! events produced by the frame codec, and the state records owned by the
//! reconcilers (time buckets, alerts, fleet overview snapshots).

pub mod alert;
pub mod event;
pub mod overview;
pub mod reading;
pub mod series;
pub mod timestamp;
pub mod topic;

// Re-export common types for convenience
pub use alert::{AlertRecord, AlertSeverity, AlertStatus};
pub use event::{EventKind, EventPayload, InboundEvent};
pub use overview::OverviewSnapshot;
pub use reading::EnergyReading;
pub use series::{TimeBucket, TimeRange};
pub use topic::Topic;
