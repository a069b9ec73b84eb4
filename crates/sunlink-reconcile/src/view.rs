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

use tracing::debug;

use sunlink_types::InboundEvent;

use crate::Reconciler;

/// State owned by one view, mutated only through its reconciler
#[derive(Debug)]
pub struct TelemetryView<R: Reconciler> {
    reconciler: R,
    state: R::State,
    applied: u64,
}

impl<R: Reconciler> TelemetryView<R> {
    pub fn new(reconciler: R) -> Self {
        Self {
            reconciler,
            state: R::State::default(),
            applied: 0,
        }
    }

    pub fn reconciler(&self) -> &R {
        &self.reconciler
    }

    pub fn state(&self) -> &R::State {
        &self.state
    }

    /// Number of events merged since the last baseline
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Replace the state with a freshly fetched baseline
    pub fn reset(&mut self, baseline: R::State) {
        self.state = baseline;
        self.applied = 0;
    }

    /// Route an event to the reconciler; events of other kinds are ignored.
    ///
    /// Returns whether the event was applied.
    pub fn handle(&mut self, event: &InboundEvent) -> bool {
        let Some(update) = self.reconciler.extract(&event.payload) else {
            debug!(kind = %event.kind(), "Ignoring event not handled by this view");
            return false;
        };

        let state = std::mem::take(&mut self.state);
        self.state = self.reconciler.apply(state, update);
        self.applied += 1;
        true
    }
}
