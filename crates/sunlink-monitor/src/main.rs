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

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sunlink_channel::{ChannelFactory, CredentialProvider, EnvToken};
use sunlink_monitor::{
    BaselineClient, Dashboard, MonitorConfig, ViewTarget, apply_signal, forwarding_handlers,
};
use sunlink_types::TimeRange;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "sunlink-monitor")]
#[command(about = "Follow live SunLink telemetry in the terminal")]
#[command(
    long_about = "Subscribe to one live SunLink topic and print the reconciled view.\n    \nThe bearer token is read from the SUNLINK_TOKEN environment variable.\n    \nExamples:\n      sunlink-monitor alerts\n      sunlink-monitor installation 42 --range week\n      sunlink-monitor --config monitor.toml system"
)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Chart range of the installation series (day, week, month, year)
    #[arg(long)]
    range: Option<TimeRange>,

    #[command(subcommand)]
    view: ViewCommand,
}

#[derive(Subcommand)]
enum ViewCommand {
    /// Tamper alert feed
    Alerts,
    /// Energy series of one installation
    Installation {
        /// Installation identifier
        id: String,
    },
    /// Fleet-wide overview
    System,
}

impl From<ViewCommand> for ViewTarget {
    fn from(command: ViewCommand) -> Self {
        match command {
            ViewCommand::Alerts => Self::Alerts,
            ViewCommand::Installation { id } => Self::Installation(id),
            ViewCommand::System => Self::System,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("sunlink_monitor=info,sunlink_channel=info,sunlink_reconcile=info")
        }))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            MonitorConfig::from_file(path)?
        }
        None => MonitorConfig::default(),
    };
    if let Some(range) = cli.range {
        config.view.time_range = range;
    }
    config.validate()?;

    let credentials: Arc<dyn CredentialProvider> = Arc::new(EnvToken::default());
    if credentials.token().is_none() {
        warn!("SUNLINK_TOKEN is not set, connecting without credentials");
    }

    let factory = ChannelFactory::websocket(config.channel.clone(), Arc::clone(&credentials))
        .context("Failed to set up live channel")?;
    let client = BaselineClient::from_settings(&config.baseline, credentials)
        .context("Failed to set up REST client")?;

    let target = ViewTarget::from(cli.view);
    let mut dashboard = Dashboard::new(&target, &config)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let channel = dashboard.open(&factory, forwarding_handlers(&tx))?;
    drop(tx);
    info!(topic = %channel.topic(), url = %config.channel.url, "Monitoring started");

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!(connected = channel.is_connected(), "Shutting down");
                channel.close();
                // The driver drops its handlers once the farewell frames are out
                let drained = async { while rx.recv().await.is_some() {} };
                let _ = tokio::time::timeout(SHUTDOWN_GRACE, drained).await;
                break;
            }
            signal = rx.recv() => match signal {
                Some(signal) => apply_signal(&mut dashboard, &client, signal).await,
                None => break,
            },
        }
    }

    Ok(())
}
