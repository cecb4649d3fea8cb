//! Tests for the connection task driven over in-memory transports.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use bytes::Bytes;
use serde_json::json;
use tokio::time::timeout;

use super::*;
use crate::{
    codec,
    message::Message,
    transport::{
        Transport,
        TransportEvent,
        memory::{self, MemoryTransport},
    },
};

const WAIT: Duration = Duration::from_secs(5);

async fn recv(peer: &mut MemoryTransport) -> Message {
    match timeout(WAIT, peer.next_event()).await.expect("peer timed out") {
        TransportEvent::Data(frame) => codec::decode(frame),
        other => panic!("expected a frame, got {other:?}"),
    }
}

async fn send(peer: &mut MemoryTransport, message: &Message) {
    peer.send(codec::encode(message)).await.expect("peer send");
}

fn numbered(mut payload: Payload, idx: u64) -> Message {
    payload.headers_mut().idx = Some(idx);
    Message::from(payload)
}

#[tokio::test]
async fn handle_clones_share_sequence_numbers() {
    let (client, _peer) = memory::pair();
    let qws = Qws::builder().adopt(client);
    let other = qws.handle();

    assert_eq!(qws.send_bin("", vec![1]).expect("send"), 0);
    assert_eq!(other.send_json("", &json!({"n": 2})).expect("send"), 1);
    assert_eq!(qws.send_bin("", vec![3]).expect("send"), 2);
}

#[tokio::test]
async fn adopted_connection_handshakes_then_flushes_queue() {
    let (client, mut peer) = memory::pair();
    let qws = Qws::builder().on_connect(|| async { Ok(4) }).adopt(client);
    qws.send_bin("blobs", Bytes::from_static(b"queued early"))
        .expect("send");

    assert_eq!(recv(&mut peer).await, Message::ready(4));
    send(&mut peer, &Message::ready(0)).await;

    let Message::Bin(message) = recv(&mut peer).await else {
        panic!("expected a binary payload");
    };
    assert_eq!(message.headers.idx, Some(0));
    assert_eq!(message.headers.route.as_deref(), Some("blobs"));
    assert_eq!(message.body, Bytes::from_static(b"queued early"));

    send(&mut peer, &Message::ack(0)).await;
    qws.close().expect("close");
    assert!(matches!(
        timeout(WAIT, peer.next_event()).await.expect("peer timed out"),
        TransportEvent::Closed
    ));
    assert_eq!(qws.join().await, Ok(()));
}

#[tokio::test]
async fn inbound_payloads_are_acknowledged_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let (client, mut peer) = memory::pair();
    let _qws = Qws::builder()
        .on_json_route("readings/:sensor", move |inbound| {
            let sink = Arc::clone(&sink);
            async move {
                let sensor = inbound.params.get("sensor").unwrap_or_default().to_owned();
                sink.lock().expect("lock").push(sensor);
                Ok(())
            }
        })
        .expect("valid route")
        .adopt(client);

    assert_eq!(recv(&mut peer).await, Message::ready(0));
    for (idx, sensor) in ["a", "b"].into_iter().enumerate() {
        let payload = Payload::json(format!("readings/{sensor}"), json!({"v": idx}));
        send(&mut peer, &numbered(payload, idx as u64)).await;
    }

    assert_eq!(recv(&mut peer).await, Message::ack(0));
    assert_eq!(recv(&mut peer).await, Message::ack(1));
    assert_eq!(*seen.lock().expect("lock"), vec!["a".to_owned(), "b".to_owned()]);
}

#[tokio::test]
async fn handler_failures_are_reported_without_dropping_the_connection() {
    let (client, mut peer) = memory::pair();
    let _qws = Qws::builder()
        .on_bin_route("explode", |_| async { panic!("sensor offline") })
        .expect("valid route")
        .on_bin_route("reject", |_| async { Err("not today".into()) })
        .expect("valid route")
        .on_bin(|_| async { Ok(()) })
        .adopt(client);

    assert_eq!(recv(&mut peer).await, Message::ready(0));
    send(&mut peer, &numbered(Payload::bin("explode", vec![0]), 0)).await;
    assert_eq!(
        recv(&mut peer).await,
        Message::error("handler panicked: sensor offline")
    );
    send(&mut peer, &numbered(Payload::bin("reject", vec![1]), 1)).await;
    assert_eq!(recv(&mut peer).await, Message::error("not today"));
    send(&mut peer, &numbered(Payload::bin("other", vec![2]), 2)).await;
    assert_eq!(recv(&mut peer).await, Message::ack(2));
}

#[tokio::test]
async fn handler_panicking_before_its_future_keeps_the_connection() {
    let (client, mut peer) = memory::pair();
    let qws = Qws::builder()
        .on_json(|inbound| {
            let count: u32 = inbound.parse().expect("numeric body");
            async move {
                assert!(count < 10);
                Ok(())
            }
        })
        .adopt(client);

    assert_eq!(recv(&mut peer).await, Message::ready(0));
    send(&mut peer, &Message::ready(0)).await;
    send(&mut peer, &numbered(Payload::json("", json!("many")), 0)).await;
    let Message::Err(err) = recv(&mut peer).await else {
        panic!("expected an err frame");
    };
    assert!(err.error.starts_with("handler panicked: numeric body"), "{}", err.error);

    send(&mut peer, &numbered(Payload::json("", json!(3)), 1)).await;
    assert_eq!(recv(&mut peer).await, Message::ack(1));

    drop(peer);
    assert_eq!(timeout(WAIT, qws.join()).await.expect("joined"), Ok(()));
}

#[tokio::test]
async fn peer_errors_reach_the_error_callback() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let (client, mut peer) = memory::pair();
    let _qws = Qws::builder()
        .on_error(move |error| sink.lock().expect("lock").push(error.clone()))
        .adopt(client);

    assert_eq!(recv(&mut peer).await, Message::ready(0));
    send(&mut peer, &Message::error("disk full")).await;
    send(&mut peer, &numbered(Payload::bin("", vec![]), 0)).await;
    assert_eq!(recv(&mut peer).await, Message::ack(0));
    assert_eq!(
        *errors.lock().expect("lock"),
        vec![ConnectionError::Peer("disk full".into())]
    );
}

#[tokio::test]
async fn adopted_connection_closed_by_peer_finishes_cleanly() {
    let closed = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&closed);
    let (client, peer) = memory::pair();
    let qws = Qws::builder()
        .on_close(move || *flag.lock().expect("lock") = true)
        .adopt(client);
    let handle = qws.handle();

    drop(peer);
    assert_eq!(timeout(WAIT, qws.join()).await.expect("joined"), Ok(()));
    assert!(*closed.lock().expect("lock"));
    assert!(matches!(handle.send_bin("", vec![1]), Err(QwsError::Closed)));
    assert!(matches!(handle.close(), Err(QwsError::Closed)));
}

#[tokio::test]
async fn adopted_connection_closed_with_pending_messages_fails() {
    let (client, mut peer) = memory::pair();
    let qws = Qws::builder().adopt(client);

    assert_eq!(recv(&mut peer).await, Message::ready(0));
    send(&mut peer, &Message::ready(0)).await;
    qws.send_bin("", vec![9]).expect("send");
    assert!(matches!(recv(&mut peer).await, Message::Bin(_)));
    drop(peer);

    assert_eq!(
        timeout(WAIT, qws.join()).await.expect("joined"),
        Err(ConnectionError::PendingOnClose { unacknowledged: 1 })
    );
}

#[tokio::test]
async fn stats_track_unacknowledged_messages() {
    let (client, mut peer) = memory::pair();
    let qws = Qws::builder().adopt(client);

    assert_eq!(recv(&mut peer).await, Message::ready(0));
    send(&mut peer, &Message::ready(0)).await;
    qws.send_bin("", vec![0; 8]).expect("send");
    assert!(matches!(recv(&mut peer).await, Message::Bin(_)));

    // Each round trip completes only after the previous event has been
    // fully processed and published.
    send(&mut peer, &numbered(Payload::bin("", vec![]), 0)).await;
    assert_eq!(recv(&mut peer).await, Message::ack(0));
    let stats = qws.stats();
    assert_eq!(stats.unacked_messages, 1);
    assert_eq!(stats.unsent_messages, 0);

    send(&mut peer, &Message::ack(0)).await;
    send(&mut peer, &numbered(Payload::bin("", vec![]), 1)).await;
    assert_eq!(recv(&mut peer).await, Message::ack(1));
    assert_eq!(qws.stats().unacked_messages, 0);
}

#[tokio::test]
async fn dropping_every_handle_requests_close() {
    let (client, mut peer) = memory::pair();
    let qws = Qws::builder().adopt(client);
    assert_eq!(recv(&mut peer).await, Message::ready(0));
    send(&mut peer, &Message::ready(0)).await;

    let Qws { handle, task } = qws;
    drop(handle);
    assert!(matches!(
        timeout(WAIT, peer.next_event()).await.expect("peer timed out"),
        TransportEvent::Closed
    ));
    assert_eq!(task.await.expect("task"), Ok(()));
}
