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

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::fmt::Debug;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::debug;
use url::Url;

use crate::error::{ChannelError, Result};

/// Opens text-message connections to the broker
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Connection>>;
}

/// One physical connection carrying text messages
#[async_trait]
pub trait Connection: Send + Debug {
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next inbound text message; `None` once the peer has closed.
    ///
    /// Must be cancel-safe: it is polled inside `select!`.
    async fn recv(&mut self) -> Option<Result<String>>;

    async fn close(&mut self) -> Result<()>;
}

// ============= WebSocket =============

/// WebSocket transport on tokio-tungstenite
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Connection>> {
        debug!(url = %url, "Opening WebSocket");
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ChannelError::Transport(format!("WebSocket connect failed: {e}")))?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => {
                    return Some(
                        String::from_utf8(data.to_vec())
                            .map_err(|e| ChannelError::Decode(format!("binary frame: {e}"))),
                    );
                }
                Ok(Message::Close(_)) => return None,
                // Ping/Pong are answered by tungstenite itself
                Ok(_) => {}
                Err(e) => return Some(Err(ChannelError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }
}
