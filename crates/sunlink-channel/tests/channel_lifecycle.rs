#![allow(clippy::float_cmp)]
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

mod support;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use sunlink_channel::codec::Command;
use sunlink_channel::{Channel, ChannelError, ChannelFactory, ChannelState, NoCredentials, StaticToken};
use sunlink_types::{EventKind, EventPayload};

use support::{MockTransport, Outcome, Recorder, alert_body, message_frame, reading_body, test_config};

const READINGS: &str = "/topic/installation/42/energy-data";
const ALERTS: &str = "/topic/admin/tamper-alerts";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn factory(transport: &MockTransport) -> ChannelFactory {
    ChannelFactory::new(test_config(), Arc::new(transport.clone()), Arc::new(NoCredentials))
        .unwrap()
}

/// Let the driver run until it blocks
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn production_values(recorder: &Recorder) -> Vec<f64> {
    recorder
        .events()
        .into_iter()
        .filter_map(|event| match event.payload {
            EventPayload::EnergyReading(reading) => Some(reading.power_generation_watts),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Connect and subscribe
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn opens_and_subscribes_to_topic_destination() {
    let transport = MockTransport::new([Outcome::Accept]);
    let credentials = Arc::new(StaticToken::new("t0ken"));
    let factory = ChannelFactory::new(test_config(), Arc::new(transport.clone()), credentials).unwrap();
    let recorder = Recorder::default();

    let channel = factory.open_installation_channel("42", recorder.handlers()).unwrap();
    assert_eq!(channel.topic().to_string(), "installation:42");
    settle().await;

    assert_eq!(channel.state(), ChannelState::Open);
    assert!(channel.is_connected());
    assert_eq!(recorder.connected(), 1);

    let frames = transport.server(0).sent_frames();
    assert_eq!(frames[0].command, Command::Connect);
    assert_eq!(frames[0].get("Authorization"), Some("Bearer t0ken"));
    assert_eq!(frames[0].get("host"), Some("broker.test"));
    assert_eq!(frames[1].command, Command::Subscribe);
    assert_eq!(frames[1].get("destination"), Some(READINGS));
}

#[tokio::test(start_paused = true)]
async fn reconnect_resubscribes_once_per_successful_connection() {
    let transport = MockTransport::new([
        Outcome::Accept,
        Outcome::Refuse,
        Outcome::Refuse,
        Outcome::Accept,
    ]);
    let recorder = Recorder::default();
    let channel = factory(&transport).open_installation_channel("42", recorder.handlers()).unwrap();
    settle().await;
    assert_eq!(transport.attempts(), 1);

    transport.server(0).drop_connection();
    // 1000 + 1300 + 1690 ms of backoff before the fourth attempt
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(transport.attempts(), 4);
    let servers = transport.servers();
    assert_eq!(servers.len(), 2);
    for server in &servers {
        assert_eq!(server.count_sent(Command::Subscribe), 1);
    }
    assert_eq!(recorder.connected(), 2);
    assert_eq!(recorder.disconnected(), 1);
    // lost connection plus two refused attempts
    assert_eq!(recorder.count_errors(ChannelError::is_transport), 3);
    assert_eq!(channel.state(), ChannelState::Open);
}

#[tokio::test(start_paused = true)]
async fn failed_attempts_walk_through_reconnecting_states() {
    let transport = MockTransport::new([]);
    let recorder = Recorder::default();
    let channel = factory(&transport).open_system_channel(recorder.handlers());
    let mut states = channel.watch_state();

    settle().await;
    assert_eq!(*states.borrow_and_update(), ChannelState::Reconnecting(1));

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(*states.borrow_and_update(), ChannelState::Reconnecting(2));

    tokio::time::sleep(Duration::from_millis(1_300)).await;
    assert_eq!(*states.borrow_and_update(), ChannelState::Reconnecting(3));
    assert_eq!(transport.attempts(), 3);
    assert_eq!(recorder.connected(), 0);
}

// ---------------------------------------------------------------------------
// Close
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn close_during_backoff_stops_all_activity() {
    let transport = MockTransport::new([]);
    let recorder = Recorder::default();
    let channel = factory(&transport).open_alerts_channel(recorder.handlers());

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(channel.state(), ChannelState::Reconnecting(2));
    assert_eq!(transport.attempts(), 2);
    let callbacks = recorder.callbacks();

    channel.close();
    assert_eq!(channel.state(), ChannelState::Closed);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempts(), 2);
    assert_eq!(recorder.callbacks(), callbacks);
    assert_eq!(channel.state(), ChannelState::Closed);
}

#[tokio::test(start_paused = true)]
async fn close_is_idempotent_and_unsubscribes() {
    let transport = MockTransport::new([Outcome::Accept]);
    let recorder = Recorder::default();
    let channel = factory(&transport).open_installation_channel("42", recorder.handlers()).unwrap();
    settle().await;

    channel.close();
    channel.close();
    settle().await;

    let server = transport.server(0);
    assert_eq!(
        server.sent_commands(),
        vec![
            Command::Connect,
            Command::Subscribe,
            Command::Unsubscribe,
            Command::Disconnect
        ]
    );

    server.push_message(READINGS, &reading_body(100.0));
    settle().await;
    assert!(recorder.events().is_empty());
    assert_eq!(recorder.disconnected(), 0);
    assert_eq!(channel.state(), ChannelState::Closed);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_closes_the_channel() {
    let transport = MockTransport::new([Outcome::Accept]);
    let recorder = Recorder::default();
    let channel = factory(&transport).open_installation_channel("42", recorder.handlers()).unwrap();
    settle().await;

    drop(channel);
    settle().await;

    assert_eq!(transport.server(0).count_sent(Command::Disconnect), 1);
    transport.server(0).drop_connection();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn close_from_message_callback_suppresses_the_rest_of_the_batch() {
    let transport = MockTransport::new([Outcome::Accept]);
    let slot: Arc<Mutex<Option<Channel>>> = Arc::new(Mutex::new(None));
    let delivered = Arc::new(Mutex::new(0_usize));

    let handlers = {
        let slot = Arc::clone(&slot);
        let delivered = Arc::clone(&delivered);
        sunlink_channel::ChannelHandlers::new(
            move |_| {
                *delivered.lock() += 1;
                if let Some(channel) = slot.lock().as_ref() {
                    channel.close();
                }
            },
            |_| {},
        )
    };
    let channel = factory(&transport).open_installation_channel("42", handlers).unwrap();
    *slot.lock() = Some(channel);
    settle().await;

    let batch = format!(
        "{}{}",
        message_frame(READINGS, &reading_body(1.0)),
        message_frame(READINGS, &reading_body(2.0))
    );
    transport.server(0).push_raw(batch);
    settle().await;

    assert_eq!(*delivered.lock(), 1);
    let state = slot.lock().as_ref().map(Channel::state);
    assert_eq!(state, Some(ChannelState::Closed));
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn events_are_delivered_in_wire_order() {
    let transport = MockTransport::new([Outcome::Accept]);
    let recorder = Recorder::default();
    let _channel = factory(&transport).open_installation_channel("42", recorder.handlers()).unwrap();
    settle().await;

    let server = transport.server(0);
    server.push_message(READINGS, &reading_body(1.0));
    server.push_message(READINGS, &reading_body(2.0));
    // two frames and a heart-beat in one WebSocket message
    server.push_raw(format!(
        "{}\n{}",
        message_frame(READINGS, &reading_body(3.0)),
        message_frame(READINGS, &reading_body(4.0))
    ));
    server.push_message(READINGS, &reading_body(5.0));
    settle().await;

    assert_eq!(production_values(&recorder), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert!(recorder
        .events()
        .iter()
        .all(|event| event.kind() == EventKind::EnergyReading));
}

#[tokio::test(start_paused = true)]
async fn decode_error_is_reported_and_channel_stays_open() {
    let transport = MockTransport::new([Outcome::Accept]);
    let recorder = Recorder::default();
    let channel = factory(&transport).open_installation_channel("42", recorder.handlers()).unwrap();
    settle().await;

    let server = transport.server(0);
    server.push_message(READINGS, "not json");
    server.push_message(READINGS, r#"{"type":"SECURITY_EVENT","payload":{}}"#);
    server.push_raw("GARBAGE\n\n\0");
    server.push_message(READINGS, &reading_body(7.0));
    settle().await;

    assert_eq!(recorder.count_errors(|e| matches!(e, ChannelError::Json(_))), 1);
    assert_eq!(recorder.count_errors(|e| matches!(e, ChannelError::Decode(_))), 2);
    assert_eq!(production_values(&recorder), vec![7.0]);
    assert_eq!(channel.state(), ChannelState::Open);
    assert_eq!(transport.attempts(), 1);
    assert_eq!(recorder.disconnected(), 0);
}

#[tokio::test(start_paused = true)]
async fn foreign_event_kind_is_dropped_as_protocol_mismatch() {
    let transport = MockTransport::new([Outcome::Accept]);
    let recorder = Recorder::default();
    let channel = factory(&transport).open_alerts_channel(recorder.handlers());
    settle().await;

    let server = transport.server(0);
    assert_eq!(server.sent_frames()[1].get("destination"), Some(ALERTS));
    server.push_message(ALERTS, &reading_body(1.0));
    server.push_message(ALERTS, &alert_body(17));
    settle().await;

    assert_eq!(
        recorder.count_errors(|e| matches!(
            e,
            ChannelError::ProtocolMismatch {
                expected: EventKind::AlertUpsert,
                received: EventKind::EnergyReading,
                ..
            }
        )),
        1
    );
    let events = recorder.events();
    assert_eq!(events.len(), 1);
    match &events[0].payload {
        EventPayload::AlertUpsert(alert) => assert_eq!(alert.id, "17"),
        other => panic!("unexpected payload {other:?}"),
    }
    assert_eq!(channel.state(), ChannelState::Open);
}

// ---------------------------------------------------------------------------
// Broker failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn broker_error_frame_triggers_reconnect() {
    let transport = MockTransport::new([Outcome::Accept, Outcome::Accept]);
    let recorder = Recorder::default();
    let channel = factory(&transport).open_installation_channel("42", recorder.handlers()).unwrap();
    settle().await;

    transport
        .server(0)
        .push_raw("ERROR\nmessage:session expired\n\nplease log in again\0");
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(transport.attempts(), 2);
    assert_eq!(
        recorder.count_errors(|e| matches!(e, ChannelError::Broker { message } if message == "session expired")),
        1
    );
    assert_eq!(recorder.disconnected(), 1);
    assert_eq!(recorder.connected(), 2);
    assert_eq!(channel.state(), ChannelState::Open);
}

#[tokio::test(start_paused = true)]
async fn silent_server_is_treated_as_dropped() {
    let transport = MockTransport::new([Outcome::Accept, Outcome::Accept]).with_server_heartbeat("5000,5000");
    let mut config = test_config();
    config.heartbeat_ms = 5_000;
    let factory =
        ChannelFactory::new(config, Arc::new(transport.clone()), Arc::new(NoCredentials)).unwrap();
    let recorder = Recorder::default();
    let channel = factory.open_installation_channel("42", recorder.handlers()).unwrap();
    settle().await;

    // inbound traffic postpones the idle deadline
    tokio::time::sleep(Duration::from_secs(8)).await;
    transport.server(0).push_message(READINGS, &reading_body(1.0));
    tokio::time::sleep(Duration::from_secs(8)).await;
    assert_eq!(channel.state(), ChannelState::Open);
    assert!(transport.server(0).heartbeats_received() >= 3);

    // 10 s of silence after the last message, then 1 s of backoff
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(transport.attempts(), 2);
    assert_eq!(
        recorder.count_errors(|e| matches!(e, ChannelError::Timeout(_))),
        1
    );
    assert_eq!(recorder.disconnected(), 1);
    assert_eq!(channel.state(), ChannelState::Open);
}
