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

use sunlink_types::{EventPayload, OverviewSnapshot};

use crate::Reconciler;

/// Fleet overview: every push is a complete snapshot and replaces the last one.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverviewReconciler;

impl OverviewReconciler {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(
        &self,
        _previous: Option<OverviewSnapshot>,
        snapshot: &OverviewSnapshot,
    ) -> Option<OverviewSnapshot> {
        Some(snapshot.clone())
    }
}

impl Reconciler for OverviewReconciler {
    type State = Option<OverviewSnapshot>;
    type Update = OverviewSnapshot;

    fn apply(&self, state: Self::State, update: &Self::Update) -> Self::State {
        OverviewReconciler::apply(self, state, update)
    }

    fn extract<'a>(&self, payload: &'a EventPayload) -> Option<&'a Self::Update> {
        match payload {
            EventPayload::SystemOverview(snapshot) => Some(snapshot),
            EventPayload::EnergyReading(_) | EventPayload::AlertUpsert(_) => None,
        }
    }
}
