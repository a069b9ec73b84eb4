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

//! Terminal monitor for the SunLink live telemetry channel.
//!
//! Seeds a view from the REST API, then keeps it current from the channel.

pub mod baseline;
pub mod config;
pub mod dashboard;

pub use baseline::{BaselineClient, BaselineError, BaselineResult};
pub use config::{BaselineSettings, MonitorConfig, ViewSettings};
pub use dashboard::{Dashboard, Signal, ViewTarget, apply_signal, forwarding_handlers};
