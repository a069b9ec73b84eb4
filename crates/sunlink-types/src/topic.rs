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
use std::fmt;
use std::str::FromStr;

use crate::event::EventKind;

/// Logical stream served by one channel
///
/// A channel is bound to exactly one topic for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Fleet-wide tamper/security alert feed
    Alerts,
    /// Energy readings of a single installation
    Installation(String),
    /// Fleet overview snapshots for the admin dashboard
    System,
}

impl Topic {
    pub fn installation(id: impl Into<String>) -> Self {
        Self::Installation(id.into())
    }

    /// Installation topic for an id that is safe to place in a destination path
    pub fn try_installation(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            anyhow::bail!("Installation id must not be empty");
        }
        if id.chars().any(|c| c == '/' || c.is_whitespace() || c.is_control()) {
            anyhow::bail!("Invalid installation id '{id}': no slashes or whitespace allowed");
        }
        Ok(Self::Installation(id))
    }

    /// Broker destination the subscribe frame targets
    pub fn destination(&self) -> String {
        match self {
            Self::Alerts => "/topic/admin/tamper-alerts".to_owned(),
            Self::Installation(id) => format!("/topic/installation/{id}/energy-data"),
            Self::System => "/topic/admin/system-update".to_owned(),
        }
    }

    /// The only event kind a channel on this topic accepts
    pub fn expected_kind(&self) -> EventKind {
        match self {
            Self::Alerts => EventKind::AlertUpsert,
            Self::Installation(_) => EventKind::EnergyReading,
            Self::System => EventKind::SystemOverview,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alerts => write!(f, "alerts"),
            Self::Installation(id) => write!(f, "installation:{id}"),
            Self::System => write!(f, "system"),
        }
    }
}

impl FromStr for Topic {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "alerts" => Ok(Self::Alerts),
            "system" => Ok(Self::System),
            other => match other.strip_prefix("installation:") {
                Some(id) => Self::try_installation(id),
                None => Err(anyhow::anyhow!(
                    "Unknown topic: '{s}'. Expected 'alerts', 'system' or 'installation:<id>'"
                )),
            },
        }
    }
}
