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

use std::collections::HashSet;

use tracing::trace;

use sunlink_types::{AlertRecord, EventPayload};

use crate::Reconciler;

/// Upsert-and-dedup merge for the alert feed.
///
/// The feed is newest-first and unique by id. Updating an alert keeps its row
/// where it is so the table does not reshuffle under the operator.
#[derive(Debug, Clone, Default)]
pub struct AlertReconciler {
    max_alerts: Option<usize>,
}

impl AlertReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the oldest entries once the feed grows past `max_alerts`
    pub fn with_max_alerts(mut self, max_alerts: usize) -> Self {
        self.max_alerts = Some(max_alerts.max(1));
        self
    }

    pub fn max_alerts(&self) -> Option<usize> {
        self.max_alerts
    }

    pub fn apply(&self, mut alerts: Vec<AlertRecord>, upsert: &AlertRecord) -> Vec<AlertRecord> {
        if let Some(existing) = alerts.iter_mut().find(|a| a.id == upsert.id) {
            trace!(alert_id = %upsert.id, "Replacing alert in place");
            existing.clone_from(upsert);
            return alerts;
        }

        trace!(alert_id = %upsert.id, severity = %upsert.severity, "Prepending new alert");
        alerts.insert(0, upsert.clone());
        if let Some(max) = self.max_alerts {
            alerts.truncate(max);
        }
        alerts
    }

    /// Normalize a REST baseline: newest first, first occurrence of each id wins
    pub fn from_baseline(&self, mut records: Vec<AlertRecord>) -> Vec<AlertRecord> {
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let mut seen = HashSet::new();
        records.retain(|a| seen.insert(a.id.clone()));
        if let Some(max) = self.max_alerts {
            records.truncate(max);
        }
        records
    }
}

impl Reconciler for AlertReconciler {
    type State = Vec<AlertRecord>;
    type Update = AlertRecord;

    fn apply(&self, state: Self::State, update: &Self::Update) -> Self::State {
        AlertReconciler::apply(self, state, update)
    }

    fn extract<'a>(&self, payload: &'a EventPayload) -> Option<&'a Self::Update> {
        match payload {
            EventPayload::AlertUpsert(alert) => Some(alert),
            EventPayload::EnergyReading(_) | EventPayload::SystemOverview(_) => None,
        }
    }
}
