// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDPROS end-to-end over loopback: datagram handshake, delivery,
//! payload limits and teardown notification.

#![allow(clippy::uninlined_format_args)]

use std::thread;
use std::time::{Duration, Instant};

use roswire::{
    load_msg_from_str, Direction, ErrorKind, MsgSpec, ProtocolHandler, RawMessage, Transport,
    TransportConfig, UdpRosHandler, UDPROS,
};

fn config() -> TransportConfig {
    TransportConfig::loopback()
        .with_read_poll_interval(Duration::from_millis(20))
        .with_connect_timeout(Duration::from_secs(2))
}

fn string_spec() -> MsgSpec {
    load_msg_from_str("string data", "String", "std_msgs").unwrap().1
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(10));
    }
}

fn talker(spec: &MsgSpec) -> (UdpRosHandler, String) {
    let handler = UdpRosHandler::new("/talker", config(), None).unwrap();
    handler.bind_topic("/chatter", spec).unwrap();
    let desc = handler.init_publisher("/chatter", UDPROS).unwrap();
    (handler, desc.uri())
}

fn listener(spec: &MsgSpec) -> UdpRosHandler {
    let handler = UdpRosHandler::new("/listener", config(), None).unwrap();
    handler.bind_topic("/chatter", spec).unwrap();
    handler
}

#[test]
fn test_handshake_and_delivery() {
    let spec = string_spec();
    let (talker, uri) = talker(&spec);
    let listener = listener(&spec);

    let transport = listener
        .create_connection("/chatter", &uri, &["UDPROS"])
        .unwrap();
    assert_eq!(transport.direction(), Direction::Inbound);
    assert_eq!(transport.core().endpoint_id(), "/talker");
    assert_eq!(transport.core().transport_type(), "UDPROS");
    wait_until("subscriber attached", || talker.num_subscribers("/chatter") == 1);

    let mut rng = fastrand::Rng::with_seed(11);
    for _ in 0..16 {
        let len = rng.usize(0..1024);
        let payload: Vec<u8> = (0..len).map(|_| rng.u8(..)).collect();
        assert_eq!(
            talker
                .publish("/chatter", &RawMessage::from(payload.clone()))
                .unwrap(),
            1
        );
        // Loopback UDP does not reorder a single sender's datagrams.
        assert_eq!(transport.receive_once().unwrap().unwrap(), payload);
    }
    assert_eq!(talker.metrics().subscribers_accepted, 1);
}

#[test]
fn test_oversized_message_is_not_delivered() {
    let spec = string_spec();
    let (talker, uri) = talker(&spec);
    let listener = listener(&spec);
    let transport = listener
        .create_connection("/chatter", &uri, &["UDPROS"])
        .unwrap();
    wait_until("subscriber attached", || talker.num_subscribers("/chatter") == 1);

    let big = vec![0u8; config().max_datagram_size];
    assert_eq!(
        talker.publish("/chatter", &RawMessage::from(big)).unwrap(),
        0
    );
    // The connection survives the rejected write.
    assert_eq!(
        talker.publish("/chatter", &RawMessage::from("ok")).unwrap(),
        1
    );
    assert_eq!(transport.receive_once().unwrap().unwrap(), b"ok");
}

#[test]
fn test_contract_mismatch_is_negotiation_error() {
    let (_talker, uri) = talker(&string_spec());
    let int_spec = load_msg_from_str("int32 data", "Int32", "std_msgs").unwrap().1;
    let listener = listener(&int_spec);
    let err = listener
        .create_connection("/chatter", &uri, &["UDPROS"])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Negotiation);
}

#[test]
fn test_scheme_mismatch_is_connection_error() {
    let (_talker, uri) = talker(&string_spec());
    let listener = listener(&string_spec());
    let tcp_uri = uri.replace("udpros://", "tcpros://");
    let err = listener
        .create_connection("/chatter", &tcp_uri, &["UDPROS"])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[test]
fn test_subscriber_close_detaches() {
    let spec = string_spec();
    let (talker, uri) = talker(&spec);
    let listener = listener(&spec);
    let transport = listener
        .create_connection("/chatter", &uri, &["UDPROS"])
        .unwrap();
    wait_until("subscriber attached", || talker.num_subscribers("/chatter") == 1);

    transport.close();
    wait_until("subscriber detached", || talker.num_subscribers("/chatter") == 0);
}

#[test]
fn test_publisher_shutdown_notifies_subscriber() {
    let spec = string_spec();
    let (talker, uri) = talker(&spec);
    let listener = listener(&spec);
    let transport = listener
        .create_connection("/chatter", &uri, &["UDPROS"])
        .unwrap();
    wait_until("subscriber attached", || talker.num_subscribers("/chatter") == 1);

    talker.shutdown();
    let err = transport.receive_loop(&mut |_| {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoTerminal);
    assert!(transport.is_done());
}

#[test]
fn test_closed_subscriber_leaves_disconnected_row() {
    let spec = string_spec();
    let (talker, uri) = talker(&spec);
    let listener = listener(&spec);
    let transport = listener
        .create_connection("/chatter", &uri, &["UDPROS"])
        .unwrap();
    wait_until("subscriber attached", || talker.num_subscribers("/chatter") == 1);
    talker.publish("/chatter", &RawMessage::from("once")).unwrap();
    assert_eq!(transport.receive_once().unwrap().unwrap(), b"once");

    transport.close();
    wait_until("subscriber detached", || talker.num_subscribers("/chatter") == 0);

    let rows = talker.stats();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].connected);
    assert_eq!(rows[0].num_msg, 1);
}

#[test]
fn test_subscriber_link_is_receive_only() {
    let spec = string_spec();
    let (talker, uri) = talker(&spec);
    let listener = listener(&spec);
    let transport = listener
        .create_connection("/chatter", &uri, &["UDPROS"])
        .unwrap();
    wait_until("subscriber attached", || talker.num_subscribers("/chatter") == 1);

    for _ in 0..50 {
        let err = transport.write_data(b"flood").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }
    assert!(!transport.is_done());
    assert_eq!(transport.core().stat_num_msg(), 0);

    talker.publish("/chatter", &RawMessage::from("still here")).unwrap();
    assert_eq!(transport.receive_once().unwrap().unwrap(), b"still here");
}
