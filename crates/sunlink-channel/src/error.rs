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

use sunlink_types::EventKind;
use thiserror::Error;

/// Telemetry channel error types
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("broker error: {message}")]
    Broker { message: String },

    #[error("malformed frame: {0}")]
    Decode(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected {received} event on topic {topic} (expected {expected})")]
    ProtocolMismatch {
        topic: String,
        expected: EventKind,
        received: EventKind,
    },

    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("invalid channel URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ChannelError {
    /// Whether the error ends the current connection (and triggers a reconnect)
    /// as opposed to dropping a single frame.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::ConnectionClosed
                | Self::Timeout(_)
                | Self::Handshake(_)
                | Self::Broker { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
