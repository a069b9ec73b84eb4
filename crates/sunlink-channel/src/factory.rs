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

use std::sync::Arc;
use tracing::{info, warn};

use sunlink_types::Topic;

use crate::channel::{Channel, ChannelHandlers, ReconnectingChannel};
use crate::config::ChannelConfig;
use crate::credentials::CredentialProvider;
use crate::error::{ChannelError, Result};
use crate::transport::{Transport, WsTransport};

/// Named constructors for the three telemetry channels.
///
/// Every call returns an independently owned [`Channel`]; the factory keeps no
/// record of what it opened.
#[derive(Debug, Clone)]
pub struct ChannelFactory {
    launcher: ReconnectingChannel,
}

impl ChannelFactory {
    pub fn new(
        config: ChannelConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        Ok(Self {
            launcher: ReconnectingChannel::new(config, transport, credentials)?,
        })
    }

    /// Factory speaking to the broker over WebSocket
    pub fn websocket(
        config: ChannelConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        Self::new(config, Arc::new(WsTransport::new()), credentials)
    }

    pub fn config(&self) -> &ChannelConfig {
        self.launcher.config()
    }

    /// Fleet-wide tamper alerts; accepts only alert upserts
    pub fn open_alerts_channel(&self, handlers: ChannelHandlers) -> Channel {
        self.open(Topic::Alerts, handlers)
    }

    /// Energy readings of one installation; accepts only energy readings.
    ///
    /// Fails without opening anything when the id is empty or would break the
    /// destination path.
    pub fn open_installation_channel(
        &self,
        installation_id: impl Into<String>,
        handlers: ChannelHandlers,
    ) -> Result<Channel> {
        let topic = Topic::try_installation(installation_id).map_err(|e| {
            warn!(error = %e, "Refusing to open installation channel");
            ChannelError::InvalidTopic(e.to_string())
        })?;
        Ok(self.open(topic, handlers))
    }

    /// Fleet overview snapshots; accepts only system overviews
    pub fn open_system_channel(&self, handlers: ChannelHandlers) -> Channel {
        self.open(Topic::System, handlers)
    }

    fn open(&self, topic: Topic, handlers: ChannelHandlers) -> Channel {
        info!(topic = %topic, kind = %topic.expected_kind(), "Opening channel");
        self.launcher.open(topic, handlers)
    }
}
