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

//! One live view: a channel feeding a reconciler, seeded from the REST baseline

use anyhow::Result;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sunlink_channel::{Channel, ChannelError, ChannelFactory, ChannelHandlers};
use sunlink_reconcile::{AlertReconciler, OverviewReconciler, SeriesReconciler, TelemetryView};
use sunlink_types::{AlertRecord, InboundEvent, OverviewSnapshot, TimeBucket, Topic};

use crate::baseline::{BaselineClient, BaselineResult};
use crate::config::MonitorConfig;

// ============= Channel Signals =============

/// Channel callbacks turned into messages for the view loop
#[derive(Debug)]
pub enum Signal {
    Event(InboundEvent),
    Error(ChannelError),
    Connected,
    Disconnected,
}

/// Handlers forwarding every callback into `tx`
pub fn forwarding_handlers(tx: &mpsc::UnboundedSender<Signal>) -> ChannelHandlers {
    let events = tx.clone();
    let errors = tx.clone();
    let connected = tx.clone();
    let disconnected = tx.clone();
    ChannelHandlers::new(
        move |event| {
            let _ = events.send(Signal::Event(event));
        },
        move |err| {
            let _ = errors.send(Signal::Error(err));
        },
    )
    .on_connected(move || {
        let _ = connected.send(Signal::Connected);
    })
    .on_disconnected(move || {
        let _ = disconnected.send(Signal::Disconnected);
    })
}

// ============= Dashboard =============

/// Which live view to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewTarget {
    Alerts,
    Installation(String),
    System,
}

impl ViewTarget {
    pub fn topic(&self) -> Topic {
        match self {
            Self::Alerts => Topic::Alerts,
            Self::Installation(id) => Topic::installation(id.clone()),
            Self::System => Topic::System,
        }
    }
}

pub enum Dashboard {
    Alerts(TelemetryView<AlertReconciler>),
    Installation {
        installation_id: String,
        recent_limit: usize,
        view: TelemetryView<SeriesReconciler>,
    },
    System(TelemetryView<OverviewReconciler>),
}

impl Dashboard {
    pub fn new(target: &ViewTarget, config: &MonitorConfig) -> Result<Self> {
        Ok(match target {
            ViewTarget::Alerts => {
                let reconciler = match config.view.max_alerts {
                    Some(cap) => AlertReconciler::new().with_max_alerts(cap),
                    None => AlertReconciler::new(),
                };
                Self::Alerts(TelemetryView::new(reconciler))
            }
            ViewTarget::Installation(id) => {
                let timezone = config.view.timezone()?;
                Self::Installation {
                    installation_id: id.clone(),
                    recent_limit: config.baseline.recent_limit,
                    view: TelemetryView::new(SeriesReconciler::new(
                        config.view.time_range,
                        timezone,
                    )),
                }
            }
            ViewTarget::System => Self::System(TelemetryView::new(OverviewReconciler::new())),
        })
    }

    pub fn open(
        &self,
        factory: &ChannelFactory,
        handlers: ChannelHandlers,
    ) -> sunlink_channel::Result<Channel> {
        match self {
            Self::Alerts(_) => Ok(factory.open_alerts_channel(handlers)),
            Self::Installation {
                installation_id, ..
            } => factory.open_installation_channel(installation_id.clone(), handlers),
            Self::System(_) => Ok(factory.open_system_channel(handlers)),
        }
    }

    /// Replace the view state with a fresh REST baseline
    pub async fn refresh(&mut self, client: &BaselineClient) -> BaselineResult<()> {
        match self {
            Self::Alerts(view) => {
                let limit = view.reconciler().max_alerts().unwrap_or(100);
                let alerts = client.fetch_alerts(limit).await?;
                let baseline = view.reconciler().from_baseline(alerts);
                view.reset(baseline);
            }
            Self::Installation {
                installation_id,
                recent_limit,
                view,
            } => {
                let readings = client
                    .fetch_recent_readings(installation_id, *recent_limit)
                    .await?;
                let baseline = view.reconciler().from_readings(&readings);
                view.reset(baseline);
            }
            Self::System(view) => {
                let overview = client.fetch_overview().await?;
                view.reset(Some(overview));
            }
        }
        debug!(view = %self, "Baseline loaded");
        Ok(())
    }

    pub fn handle(&mut self, event: &InboundEvent) -> bool {
        match self {
            Self::Alerts(view) => view.handle(event),
            Self::Installation { view, .. } => view.handle(event),
            Self::System(view) => view.handle(event),
        }
    }

    pub fn alerts(&self) -> Option<&[AlertRecord]> {
        match self {
            Self::Alerts(view) => Some(view.state()),
            Self::Installation { .. } | Self::System(_) => None,
        }
    }

    pub fn series(&self) -> Option<&[TimeBucket]> {
        match self {
            Self::Installation { view, .. } => Some(view.state()),
            Self::Alerts(_) | Self::System(_) => None,
        }
    }

    pub fn overview(&self) -> Option<&OverviewSnapshot> {
        match self {
            Self::System(view) => view.state().as_ref(),
            Self::Alerts(_) | Self::Installation { .. } => None,
        }
    }
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alerts(view) => {
                let alerts = view.state();
                let active = alerts.iter().filter(|a| a.is_active()).count();
                write!(f, "{} alerts ({active} active)", alerts.len())?;
                if let Some(newest) = alerts.first() {
                    write!(f, ", newest #{} {} {}", newest.id, newest.severity, newest.status)?;
                }
                Ok(())
            }
            Self::Installation {
                installation_id,
                view,
                ..
            } => {
                let series = view.state();
                write!(
                    f,
                    "installation {installation_id}: {}/{} {} buckets",
                    series.len(),
                    view.reconciler().capacity(),
                    view.reconciler().range()
                )?;
                if let Some(latest) = series.last() {
                    write!(
                        f,
                        ", {} {:.2} kW produced / {:.2} kW consumed",
                        latest.bucket_key, latest.production_kw, latest.consumption_kw
                    )?;
                }
                Ok(())
            }
            Self::System(view) => match view.state() {
                Some(overview) => write!(
                    f,
                    "{} active installations, {:.0} W now, {:.1} kWh today",
                    overview.total_active_installations,
                    overview.current_system_generation_watts,
                    overview.today_total_generation_kwh
                ),
                None => write!(f, "no overview yet"),
            },
        }
    }
}

impl fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dashboard").field(&self.to_string()).finish()
    }
}

// ============= Run Loop =============

/// Apply one channel signal to the dashboard.
///
/// A (re)connect re-fetches the baseline so events missed while offline are
/// covered; events queued behind the fetch are applied on top of it.
pub async fn apply_signal(dashboard: &mut Dashboard, client: &BaselineClient, signal: Signal) {
    match signal {
        Signal::Connected => {
            info!(online = true, "Live updates connected");
            if let Err(e) = dashboard.refresh(client).await {
                warn!(error = %e, "Failed to load baseline, continuing with live events only");
            }
            info!(view = %dashboard, "View state");
        }
        Signal::Disconnected => info!(online = false, "Live updates interrupted"),
        Signal::Error(err) => warn!(error = %err, "Channel reported an error"),
        Signal::Event(event) => {
            if dashboard.handle(&event) {
                info!(view = %dashboard, "View state");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sunlink_types::{AlertSeverity, EnergyReading, EventPayload};

    fn config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.view.timezone = "UTC".to_owned();
        config
    }

    #[test]
    fn test_target_topics() {
        assert_eq!(ViewTarget::Alerts.topic(), Topic::Alerts);
        assert_eq!(
            ViewTarget::Installation("7".to_owned()).topic().to_string(),
            "installation:7"
        );
        assert_eq!(ViewTarget::System.topic(), Topic::System);
    }

    #[test]
    fn test_installation_dashboard_merges_readings() {
        let mut dashboard =
            Dashboard::new(&ViewTarget::Installation("42".to_owned()), &config()).unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 6, 2, 9, 20, 0).unwrap();
        let event = InboundEvent::new(
            ts,
            EventPayload::EnergyReading(EnergyReading::new(ts, 4500.0, 750.0)),
        );

        assert!(dashboard.handle(&event));
        let series = dashboard.series().unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].bucket_key, "09:00");
        assert!(dashboard.to_string().contains("4.50 kW produced"));
        assert!(dashboard.alerts().is_none());
    }

    #[test]
    fn test_alert_dashboard_ignores_other_kinds() {
        let mut dashboard = Dashboard::new(&ViewTarget::Alerts, &config()).unwrap();
        let ts = Utc::now();
        let reading = InboundEvent::new(
            ts,
            EventPayload::EnergyReading(EnergyReading::new(ts, 1.0, 1.0)),
        );
        assert!(!dashboard.handle(&reading));

        let alert = InboundEvent::new(
            ts,
            EventPayload::AlertUpsert(AlertRecord::new("A1", AlertSeverity::High, ts)),
        );
        assert!(dashboard.handle(&alert));
        assert_eq!(dashboard.alerts().map(<[AlertRecord]>::len), Some(1));
        assert!(dashboard.to_string().starts_with("1 alerts (1 active)"));
    }
}
