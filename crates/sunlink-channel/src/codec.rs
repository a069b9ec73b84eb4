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

//! STOMP 1.2 text framing and the `{type, payload}` event envelope.
//!
//! The broker speaks STOMP over a WebSocket. Every WebSocket text message carries
//! one or more NUL-terminated frames, or a bare end-of-line heart-beat.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use sunlink_types::{
    AlertRecord, EnergyReading, EventKind, EventPayload, InboundEvent, OverviewSnapshot, Topic,
};

use crate::error::{ChannelError, Result};

/// Heart-beat frame sent by the client
pub const HEARTBEAT_EOL: &str = "\n";

// ============= Frames =============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    fn parse(line: &str) -> Option<Self> {
        Some(match line {
            "CONNECT" | "STOMP" => Self::Connect,
            "CONNECTED" => Self::Connected,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            _ => return None,
        })
    }

    /// CONNECT and CONNECTED headers are never escaped
    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StompFrame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header; repeated headers keep the first occurrence
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse a single frame without its trailing NUL
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        let (head, body) = split_head(raw)
            .ok_or_else(|| ChannelError::Decode("frame has no header terminator".to_owned()))?;

        let mut lines = head.lines();
        let command_line = lines.next().unwrap_or_default();
        let command = Command::parse(command_line)
            .ok_or_else(|| ChannelError::Decode(format!("unknown command '{command_line}'")))?;

        let escaped = command.escapes_headers();
        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ChannelError::Decode(format!("malformed header '{line}'")))?;
            if escaped {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_owned(), value.to_owned()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(name, _)| name == "content-length")
            .map(|(_, value)| value.as_str());
        let body = match content_length {
            Some(len) => {
                let len: usize = len
                    .parse()
                    .map_err(|_| ChannelError::Decode(format!("bad content-length '{len}'")))?;
                body.get(..len)
                    .ok_or_else(|| ChannelError::Decode("body shorter than content-length".to_owned()))?
                    .to_owned()
            }
            None => body.to_owned(),
        };
        let frame = Self {
            command,
            headers,
            body,
        };
        Ok(frame)
    }
}

/// Split one WebSocket text message into frames, skipping heart-beats
pub fn parse_frames(text: &str) -> Result<Vec<StompFrame>> {
    text.split('\0')
        .filter(|chunk| !chunk.trim_matches(['\r', '\n']).is_empty())
        .map(StompFrame::parse)
        .collect()
}

fn split_head(raw: &str) -> Option<(&str, &str)> {
    let lf = raw.find("\n\n").map(|i| (i, 2));
    let crlf = raw.find("\r\n\r\n").map(|i| (i, 4));
    let (at, skip) = match (lf, crlf) {
        (Some(a), Some(b)) => a.min(b),
        (a, b) => a.or(b)?,
    };
    Some((&raw[..at], &raw[at + skip..]))
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(ChannelError::Decode(format!(
                    "invalid header escape '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}

// ============= Heart-beating =============

/// Heart-beat intervals in milliseconds, `0` meaning "none"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    pub outgoing_ms: u64,
    pub incoming_ms: u64,
}

impl HeartBeat {
    pub fn new(outgoing_ms: u64, incoming_ms: u64) -> Self {
        Self {
            outgoing_ms,
            incoming_ms,
        }
    }

    pub fn header_value(self) -> String {
        format!("{},{}", self.outgoing_ms, self.incoming_ms)
    }

    pub fn parse(value: &str) -> Result<Self> {
        let (out, inc) = value
            .split_once(',')
            .ok_or_else(|| ChannelError::Handshake(format!("bad heart-beat '{value}'")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| ChannelError::Handshake(format!("bad heart-beat '{value}'")))
        };
        Ok(Self::new(parse(out)?, parse(inc)?))
    }

    /// Effective intervals given what the client offered and the server granted.
    pub fn negotiate(client: Self, server: Self) -> Self {
        let pick = |ours: u64, theirs: u64| {
            if ours == 0 || theirs == 0 {
                0
            } else {
                ours.max(theirs)
            }
        };
        Self {
            outgoing_ms: pick(client.outgoing_ms, server.incoming_ms),
            incoming_ms: pick(client.incoming_ms, server.outgoing_ms),
        }
    }

    pub fn send_interval(self) -> Option<Duration> {
        (self.outgoing_ms > 0).then(|| Duration::from_millis(self.outgoing_ms))
    }

    /// Silence after which the connection is considered dead
    pub fn idle_timeout(self) -> Option<Duration> {
        (self.incoming_ms > 0).then(|| Duration::from_millis(self.incoming_ms * 2))
    }
}

// ============= Event Envelope =============

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    tag: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Decode a `{type, payload}` body into a typed event.
///
/// `received_at` is used when the payload carries no timestamp of its own.
pub fn decode_event(body: &str, received_at: DateTime<Utc>) -> Result<InboundEvent> {
    let envelope: Envelope = serde_json::from_str(body)?;
    let kind = EventKind::from_wire_tag(&envelope.tag)
        .ok_or_else(|| ChannelError::Decode(format!("unknown event type '{}'", envelope.tag)))?;
    if envelope.payload.is_null() {
        return Err(ChannelError::Decode(format!("{kind} event without payload")));
    }

    let mut payload = envelope.payload;
    let event = match kind {
        EventKind::EnergyReading => {
            stamp_if_missing(&mut payload, received_at);
            let reading: EnergyReading = serde_json::from_value(payload)?;
            InboundEvent::new(reading.timestamp, EventPayload::EnergyReading(reading))
        }
        EventKind::AlertUpsert => {
            stamp_if_missing(&mut payload, received_at);
            let alert: AlertRecord = serde_json::from_value(payload)?;
            InboundEvent::new(alert.timestamp, EventPayload::AlertUpsert(alert))
        }
        EventKind::SystemOverview => {
            let snapshot: OverviewSnapshot = serde_json::from_value(payload)?;
            let timestamp = snapshot.last_updated.unwrap_or(received_at);
            InboundEvent::new(timestamp, EventPayload::SystemOverview(snapshot))
        }
    };
    Ok(event)
}

/// Give an object payload without a usable `timestamp` the receipt time
fn stamp_if_missing(payload: &mut serde_json::Value, received_at: DateTime<Utc>) {
    if let serde_json::Value::Object(fields) = payload {
        let missing = fields.get("timestamp").is_none_or(serde_json::Value::is_null);
        if missing {
            fields.insert(
                "timestamp".to_owned(),
                serde_json::Value::String(received_at.to_rfc3339()),
            );
        }
    }
}

// ============= Codec =============

/// Frame codec bound to one topic.
///
/// Builds the control frames for the topic's subscription and turns inbound
/// MESSAGE frames into events, rejecting any kind the topic does not carry.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    topic: Topic,
    subscription_id: String,
}

impl FrameCodec {
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            subscription_id: "sub-0".to_owned(),
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn connect(host: &str, token: Option<&str>, heartbeat: HeartBeat) -> StompFrame {
        let frame = StompFrame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", heartbeat.header_value());
        match token {
            Some(token) => frame.header("Authorization", format!("Bearer {token}")),
            None => frame,
        }
    }

    pub fn subscribe(&self) -> StompFrame {
        StompFrame::new(Command::Subscribe)
            .header("id", self.subscription_id.clone())
            .header("destination", self.topic.destination())
            .header("ack", "auto")
    }

    pub fn unsubscribe(&self) -> StompFrame {
        StompFrame::new(Command::Unsubscribe).header("id", self.subscription_id.clone())
    }

    pub fn disconnect() -> StompFrame {
        StompFrame::new(Command::Disconnect)
    }

    /// Decode a MESSAGE frame for this codec's topic
    pub fn decode(&self, frame: &StompFrame, received_at: DateTime<Utc>) -> Result<InboundEvent> {
        if frame.command != Command::Message {
            return Err(ChannelError::Decode(format!(
                "expected MESSAGE frame, got {}",
                frame.command
            )));
        }
        match frame.get("subscription") {
            Some(subscription) if subscription != self.subscription_id => {
                return Err(ChannelError::Decode(format!(
                    "message for unknown subscription '{subscription}'"
                )));
            }
            _ => {}
        }

        let event = decode_event(&frame.body, received_at)?;
        let expected = self.topic.expected_kind();
        if event.kind() != expected {
            return Err(ChannelError::ProtocolMismatch {
                topic: self.topic.to_string(),
                expected,
                received: event.kind(),
            });
        }
        Ok(event)
    }
}
