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

//! Scripted in-memory broker used by the lifecycle tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use url::Url;

use sunlink_channel::codec::{Command, StompFrame, parse_frames};
use sunlink_channel::{
    ChannelConfig, ChannelError, ChannelHandlers, Connection, ReconnectConfig, Result, Transport,
};
use sunlink_types::InboundEvent;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accept,
    Refuse,
}

#[derive(Debug, Default)]
struct Script {
    outcomes: VecDeque<Outcome>,
    attempts: usize,
    servers: Vec<ServerHandle>,
}

/// Transport following a fixed script; refuses once the script runs out
#[derive(Debug, Clone)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    server_heartbeat: String,
}

impl MockTransport {
    pub fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                outcomes: outcomes.into_iter().collect(),
                ..Script::default()
            })),
            server_heartbeat: "0,0".to_owned(),
        }
    }

    pub fn with_server_heartbeat(mut self, value: &str) -> Self {
        self.server_heartbeat = value.to_owned();
        self
    }

    pub fn attempts(&self) -> usize {
        self.script.lock().attempts
    }

    pub fn servers(&self) -> Vec<ServerHandle> {
        self.script.lock().servers.clone()
    }

    pub fn server(&self, index: usize) -> ServerHandle {
        self.script.lock().servers[index].clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, _url: &Url) -> Result<Box<dyn Connection>> {
        let mut script = self.script.lock();
        script.attempts += 1;
        match script.outcomes.pop_front().unwrap_or(Outcome::Refuse) {
            Outcome::Refuse => Err(ChannelError::Transport("connection refused".to_owned())),
            Outcome::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                let server = ServerHandle {
                    inbound: tx,
                    sent: Arc::new(Mutex::new(Vec::new())),
                };
                script.servers.push(server.clone());
                Ok(Box::new(MockConnection {
                    inbound: rx,
                    server,
                    heartbeat: self.server_heartbeat.clone(),
                    closed: false,
                }))
            }
        }
    }
}

enum Inbound {
    Text(String),
    Closed,
}

/// Server side of one accepted connection
#[derive(Debug, Clone)]
pub struct ServerHandle {
    inbound: mpsc::UnboundedSender<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl std::fmt::Debug for Inbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Closed => f.write_str("Closed"),
        }
    }
}

impl ServerHandle {
    pub fn push_raw(&self, text: impl Into<String>) {
        let _ = self.inbound.send(Inbound::Text(text.into()));
    }

    pub fn push_message(&self, destination: &str, body: &str) {
        self.push_raw(message_frame(destination, body));
    }

    pub fn drop_connection(&self) {
        let _ = self.inbound.send(Inbound::Closed);
    }

    /// Frames received from the client, heart-beats excluded
    pub fn sent_frames(&self) -> Vec<StompFrame> {
        self.sent
            .lock()
            .iter()
            .flat_map(|text| parse_frames(text).unwrap_or_default())
            .collect()
    }

    pub fn sent_commands(&self) -> Vec<Command> {
        self.sent_frames().iter().map(|f| f.command).collect()
    }

    pub fn count_sent(&self, command: Command) -> usize {
        self.sent_commands().iter().filter(|&&c| c == command).count()
    }

    pub fn heartbeats_received(&self) -> usize {
        self.sent.lock().iter().filter(|text| *text == "\n").count()
    }
}

pub fn message_frame(destination: &str, body: &str) -> String {
    StompFrame::new(Command::Message)
        .header("subscription", "sub-0")
        .header("destination", destination)
        .header("message-id", "1")
        .body(body)
        .encode()
}

#[derive(Debug)]
struct MockConnection {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    server: ServerHandle,
    heartbeat: String,
    closed: bool,
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&mut self, text: String) -> Result<()> {
        if self.closed {
            return Err(ChannelError::ConnectionClosed);
        }
        if text.starts_with("CONNECT\n") {
            let connected = StompFrame::new(Command::Connected)
                .header("version", "1.2")
                .header("heart-beat", self.heartbeat.clone())
                .encode();
            self.server.push_raw(connected);
        }
        self.server.sent.lock().push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        if self.closed {
            return None;
        }
        match self.inbound.recv().await {
            Some(Inbound::Text(text)) => Some(Ok(text)),
            Some(Inbound::Closed) | None => {
                self.closed = true;
                None
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

/// Records everything a channel reports
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<InboundEvent>>>,
    errors: Arc<Mutex<Vec<ChannelError>>>,
    connected: Arc<AtomicUsize>,
    disconnected: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn handlers(&self) -> ChannelHandlers {
        let events = Arc::clone(&self.events);
        let errors = Arc::clone(&self.errors);
        let connected = Arc::clone(&self.connected);
        let disconnected = Arc::clone(&self.disconnected);
        ChannelHandlers::new(
            move |event| events.lock().push(event),
            move |err| errors.lock().push(err),
        )
        .on_connected(move || {
            connected.fetch_add(1, Ordering::SeqCst);
        })
        .on_disconnected(move || {
            disconnected.fetch_add(1, Ordering::SeqCst);
        })
    }

    pub fn events(&self) -> Vec<InboundEvent> {
        self.events.lock().clone()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn count_errors(&self, matches: impl Fn(&ChannelError) -> bool) -> usize {
        self.errors.lock().iter().filter(|e| matches(e)).count()
    }

    pub fn connected(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn disconnected(&self) -> usize {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Total number of callbacks fired so far
    pub fn callbacks(&self) -> usize {
        self.events.lock().len() + self.error_count() + self.connected() + self.disconnected()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Deterministic config: no jitter, no heart-beats
pub fn test_config() -> ChannelConfig {
    ChannelConfig {
        url: "ws://broker.test/ws".to_owned(),
        connect_timeout_ms: 10_000,
        heartbeat_ms: 0,
        reconnect: ReconnectConfig {
            min_delay_ms: 1_000,
            max_delay_ms: 15_000,
            multiplier: 1.3,
            jitter: 0.0,
        },
    }
}

pub fn reading_body(generation_watts: f64) -> String {
    format!(
        r#"{{"type":"ENERGY_READING","payload":{{"installationId":42,"powerGenerationWatts":{generation_watts:.1},"powerConsumptionWatts":500.0,"timestamp":"2025-06-02T09:20:00"}}}}"#
    )
}

pub fn alert_body(id: u64) -> String {
    format!(
        r#"{{"type":"ALERT_UPDATE","payload":{{"id":{id},"severity":"HIGH","status":"NEW","eventType":"PHYSICAL_TAMPERING","timestamp":"2025-06-02T09:20:00"}}}}"#
    )
}
