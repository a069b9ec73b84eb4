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

//! Real-time telemetry channels for the SunLink monitoring portal.
//!
//! [`ChannelFactory`] opens one [`Channel`] per topic. Each channel keeps a STOMP
//! subscription alive over a WebSocket, reconnecting with exponential backoff,
//! and hands decoded [`sunlink_types::InboundEvent`]s to the registered
//! [`ChannelHandlers`].

pub mod backoff;
pub mod channel;
pub mod codec;
pub mod config;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod transport;

// Re-export common types for convenience
pub use backoff::Backoff;
pub use channel::{Channel, ChannelHandlers, ChannelState, ReconnectingChannel};
pub use codec::{FrameCodec, HeartBeat, StompFrame};
pub use config::{ChannelConfig, ReconnectConfig};
pub use credentials::{CredentialProvider, EnvToken, NoCredentials, StaticToken};
pub use error::{ChannelError, Result};
pub use factory::ChannelFactory;
pub use transport::{Connection, Transport, WsTransport};
