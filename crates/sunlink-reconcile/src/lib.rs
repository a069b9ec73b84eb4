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

//! State reconciliation for telemetry views.
//!
//! Each reconciler is a pure merge of one inbound event into the state a view
//! renders. Views own their state; reconcilers hold configuration only, so they
//! can be exercised with synthetic events and no live channel.

pub mod alerts;
pub mod overview;
pub mod series;
pub mod view;

use std::fmt;

use sunlink_types::EventPayload;

pub use alerts::AlertReconciler;
pub use overview::OverviewReconciler;
pub use series::SeriesReconciler;
pub use view::TelemetryView;

/// Pure merge of one update into view state
pub trait Reconciler {
    type State: Default + fmt::Debug;
    type Update;

    /// Merge `update` into `state`, returning the new state
    fn apply(&self, state: Self::State, update: &Self::Update) -> Self::State;

    /// Borrow the update this reconciler consumes, if the payload carries one
    fn extract<'a>(&self, payload: &'a EventPayload) -> Option<&'a Self::Update>;
}
