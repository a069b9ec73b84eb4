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

//! Reconnecting telemetry channel.
//!
//! A channel owns one broker connection for one topic. A background task drives
//! the connection through `Connecting -> Open -> Reconnecting(n) -> Connecting`
//! until [`Channel::close`] moves it to the terminal `Closed` state.
//!
//! Callbacks run on the driver task, one at a time, each under the channel gate.
//! `close()` takes the same gate, so once it returns no callback is running and
//! none will start. The gate is reentrant, which lets a callback close its own
//! channel.

use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

use sunlink_types::{InboundEvent, Topic};

use crate::backoff::Backoff;
use crate::codec::{Command, FrameCodec, HEARTBEAT_EOL, HeartBeat, parse_frames};
use crate::config::ChannelConfig;
use crate::credentials::CredentialProvider;
use crate::error::{ChannelError, Result};
use crate::transport::{Connection, Transport};

/// Upper bound for the UNSUBSCRIBE/DISCONNECT exchange on close
const FAREWELL_TIMEOUT: Duration = Duration::from_secs(1);

// ============= State =============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    /// Waiting out the backoff before attempt `n`
    Reconnecting(u32),
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Reconnecting(attempt) => write!(f, "reconnecting (attempt {attempt})"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

// ============= Handlers =============

type MessageFn = Box<dyn FnMut(InboundEvent) + Send>;
type ErrorFn = Box<dyn FnMut(ChannelError) + Send>;
type LifecycleFn = Box<dyn FnMut() + Send>;

/// Callbacks registered when a channel is opened
pub struct ChannelHandlers {
    on_message: MessageFn,
    on_error: ErrorFn,
    on_connected: Option<LifecycleFn>,
    on_disconnected: Option<LifecycleFn>,
}

impl ChannelHandlers {
    pub fn new(
        on_message: impl FnMut(InboundEvent) + Send + 'static,
        on_error: impl FnMut(ChannelError) + Send + 'static,
    ) -> Self {
        Self {
            on_message: Box::new(on_message),
            on_error: Box::new(on_error),
            on_connected: None,
            on_disconnected: None,
        }
    }

    /// Called every time the channel reaches `Open`, including after a reconnect
    #[must_use]
    pub fn on_connected(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_connected = Some(Box::new(f));
        self
    }

    /// Called when an open connection is lost
    #[must_use]
    pub fn on_disconnected(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_disconnected = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for ChannelHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandlers")
            .field("on_connected", &self.on_connected.is_some())
            .field("on_disconnected", &self.on_disconnected.is_some())
            .finish_non_exhaustive()
    }
}

// ============= Handle =============

struct Shared {
    topic: Topic,
    closed: AtomicBool,
    gate: ReentrantMutex<()>,
    state: watch::Sender<ChannelState>,
    shutdown: Notify,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Handle to a running channel. Dropping it closes the channel.
pub struct Channel {
    shared: Arc<Shared>,
}

impl Channel {
    pub fn topic(&self) -> &Topic {
        &self.shared.topic
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    /// Receiver observing every state transition
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// Connectivity indicator: true only while `Open`
    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Stop the channel.
    ///
    /// Cancels any pending reconnect, releases the connection and waits for a
    /// running callback to return. No callback fires after this returns.
    /// Calling it again is a no-op.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            let _gate = self.shared.gate.lock();
            self.shared.state.send_replace(ChannelState::Closed);
        }
        self.shared.shutdown.notify_one();
        info!(topic = %self.shared.topic, "Channel closed");
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("topic", &self.shared.topic)
            .field("state", &self.state())
            .finish()
    }
}

// ============= Channel Launcher =============

/// Opens channels against one broker endpoint
#[derive(Debug, Clone)]
pub struct ReconnectingChannel {
    url: Url,
    config: Arc<ChannelConfig>,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
}

impl ReconnectingChannel {
    pub fn new(
        config: ChannelConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let url = Url::parse(&config.url)?;
        Ok(Self {
            url,
            config: Arc::new(config),
            transport,
            credentials,
        })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Start a channel for `topic`. Returns immediately; the handshake runs in
    /// the background. Must be called from within a tokio runtime.
    pub fn open(&self, topic: Topic, handlers: ChannelHandlers) -> Channel {
        let (state, _) = watch::channel(ChannelState::Connecting);
        let shared = Arc::new(Shared {
            topic: topic.clone(),
            closed: AtomicBool::new(false),
            gate: ReentrantMutex::new(()),
            state,
            shutdown: Notify::new(),
        });

        let driver = Driver {
            shared: Arc::clone(&shared),
            codec: FrameCodec::new(topic),
            url: self.url.clone(),
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            credentials: Arc::clone(&self.credentials),
            backoff: Backoff::from_config(&self.config.reconnect),
            handlers: Mutex::new(handlers),
        };
        tokio::spawn(driver.run());

        Channel { shared }
    }
}

// ============= Driver =============

enum Exit {
    Shutdown,
    Dropped(ChannelError),
}

struct Driver {
    shared: Arc<Shared>,
    codec: FrameCodec,
    url: Url,
    config: Arc<ChannelConfig>,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    backoff: Backoff,
    handlers: Mutex<ChannelHandlers>,
}

impl Driver {
    async fn run(self) {
        let shared = Arc::clone(&self.shared);
        let topic = self.codec.topic().clone();
        let mut attempt: u32 = 0;

        loop {
            if !self.publish(ChannelState::Connecting) {
                break;
            }
            debug!(topic = %topic, attempt, "Connecting");

            let established = tokio::select! {
                () = shared.shutdown.notified() => break,
                result = self.establish() => result,
            };

            let (mut conn, heartbeat) = match established {
                Ok(session) => session,
                Err(err) => {
                    warn!(topic = %topic, attempt, error = %err, "Connection attempt failed");
                    self.report(err);
                    attempt = attempt.saturating_add(1);
                    if self.wait_backoff(attempt).await {
                        continue;
                    }
                    break;
                }
            };

            attempt = 0;
            if !self.publish(ChannelState::Open) {
                self.farewell(conn.as_mut()).await;
                break;
            }
            info!(
                topic = %topic,
                outgoing_ms = heartbeat.outgoing_ms,
                incoming_ms = heartbeat.incoming_ms,
                "Channel open"
            );
            self.emit(|h| {
                if let Some(f) = h.on_connected.as_mut() {
                    f();
                }
            });

            match self.pump(conn.as_mut(), heartbeat).await {
                Exit::Shutdown => {
                    self.farewell(conn.as_mut()).await;
                    break;
                }
                Exit::Dropped(err) => {
                    drop(conn);
                    warn!(topic = %topic, error = %err, "Connection lost");
                    self.report(err);
                    self.emit(|h| {
                        if let Some(f) = h.on_disconnected.as_mut() {
                            f();
                        }
                    });
                    attempt = 1;
                    if !self.wait_backoff(attempt).await {
                        break;
                    }
                }
            }
        }

        debug!(topic = %topic, "Channel driver stopped");
    }

    /// Connect, authenticate and subscribe, bounded by the connect timeout
    async fn establish(&self) -> Result<(Box<dyn Connection>, HeartBeat)> {
        tokio::time::timeout(self.config.connect_timeout(), self.handshake())
            .await
            .map_err(|_| ChannelError::Timeout("handshake"))?
    }

    async fn handshake(&self) -> Result<(Box<dyn Connection>, HeartBeat)> {
        let mut conn = self.transport.connect(&self.url).await?;

        let offered = HeartBeat::new(self.config.heartbeat_ms, self.config.heartbeat_ms);
        let host = self.url.host_str().unwrap_or("localhost");
        let token = self.credentials.token();
        conn.send(FrameCodec::connect(host, token.as_deref(), offered).encode())
            .await?;

        loop {
            let text = conn.recv().await.ok_or(ChannelError::ConnectionClosed)??;
            for frame in parse_frames(&text)? {
                match frame.command {
                    Command::Connected => {
                        let granted = frame
                            .get("heart-beat")
                            .map(HeartBeat::parse)
                            .transpose()?
                            .unwrap_or_default();
                        conn.send(self.codec.subscribe().encode()).await?;
                        return Ok((conn, HeartBeat::negotiate(offered, granted)));
                    }
                    Command::Error => {
                        return Err(ChannelError::Broker {
                            message: error_message(&frame.headers, &frame.body),
                        });
                    }
                    other => debug!(command = %other, "Ignoring frame before CONNECTED"),
                }
            }
        }
    }

    /// Forward inbound frames until the connection drops or the channel closes
    async fn pump(&self, conn: &mut dyn Connection, heartbeat: HeartBeat) -> Exit {
        let shared = Arc::clone(&self.shared);
        let mut ticker = heartbeat.send_interval().map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let idle_timeout = heartbeat.idle_timeout();
        let mut last_inbound = Instant::now();

        loop {
            let idle_deadline = idle_timeout.map(|timeout| last_inbound + timeout);

            tokio::select! {
                () = shared.shutdown.notified() => return Exit::Shutdown,
                () = next_tick(&mut ticker) => {
                    if let Err(err) = conn.send(HEARTBEAT_EOL.to_owned()).await {
                        return Exit::Dropped(err);
                    }
                }
                () = sleep_until(idle_deadline) => {
                    return Exit::Dropped(ChannelError::Timeout("server heart-beat"));
                }
                inbound = conn.recv() => {
                    last_inbound = Instant::now();
                    match inbound {
                        None => return Exit::Dropped(ChannelError::ConnectionClosed),
                        Some(Err(err)) if err.is_transport() => return Exit::Dropped(err),
                        Some(Err(err)) => self.report(err),
                        Some(Ok(text)) => {
                            if let Some(exit) = self.dispatch(&text) {
                                return exit;
                            }
                        }
                    }
                }
            }
        }
    }

    fn dispatch(&self, text: &str) -> Option<Exit> {
        let frames = match parse_frames(text) {
            Ok(frames) => frames,
            Err(err) => {
                debug!(topic = %self.shared.topic, error = %err, "Dropping malformed frame");
                self.report(err);
                return None;
            }
        };

        for frame in frames {
            match frame.command {
                Command::Message => match self.codec.decode(&frame, Utc::now()) {
                    Ok(event) => self.emit(|h| (h.on_message)(event)),
                    Err(err) => {
                        if matches!(err, ChannelError::ProtocolMismatch { .. }) {
                            warn!(topic = %self.shared.topic, error = %err, "Dropping event of foreign kind");
                        } else {
                            debug!(topic = %self.shared.topic, error = %err, "Dropping undecodable event");
                        }
                        self.report(err);
                    }
                },
                Command::Error => {
                    return Some(Exit::Dropped(ChannelError::Broker {
                        message: error_message(&frame.headers, &frame.body),
                    }));
                }
                other => debug!(command = %other, "Ignoring frame"),
            }
        }
        None
    }

    /// Publish `Reconnecting(attempt)` and sleep out the backoff.
    /// Returns false when the channel was closed meanwhile.
    async fn wait_backoff(&self, attempt: u32) -> bool {
        if !self.publish(ChannelState::Reconnecting(attempt)) {
            return false;
        }
        let delay = self.backoff.delay(attempt);
        info!(
            topic = %self.shared.topic,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Reconnecting after backoff"
        );

        tokio::select! {
            () = self.shared.shutdown.notified() => false,
            () = tokio::time::sleep(delay) => !self.shared.is_closed(),
        }
    }

    /// Best-effort UNSUBSCRIBE and DISCONNECT before dropping the connection
    async fn farewell(&self, conn: &mut dyn Connection) {
        let frames = [
            self.codec.unsubscribe().encode(),
            FrameCodec::disconnect().encode(),
        ];
        let goodbye = async {
            for frame in frames {
                conn.send(frame).await?;
            }
            conn.close().await
        };
        match tokio::time::timeout(FAREWELL_TIMEOUT, goodbye).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(error = %err, "Disconnect failed"),
            Err(_) => debug!("Disconnect timed out"),
        }
    }

    fn publish(&self, state: ChannelState) -> bool {
        let _gate = self.shared.gate.lock();
        if self.shared.is_closed() {
            return false;
        }
        self.shared.state.send_replace(state);
        true
    }

    fn report(&self, err: ChannelError) {
        self.emit(|h| (h.on_error)(err));
    }

    /// Run a callback under the gate unless the channel is closed
    fn emit(&self, f: impl FnOnce(&mut ChannelHandlers)) {
        let _gate = self.shared.gate.lock();
        if self.shared.is_closed() {
            return;
        }
        f(&mut self.handlers.lock());
    }
}

fn error_message(headers: &[(String, String)], body: &str) -> String {
    headers
        .iter()
        .find(|(name, _)| name == "message")
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| body.trim().to_owned())
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
