//! Unit tests for the outbound queue.
//!
//! Scenario tests pin down the cursor semantics used by the handshake; the
//! property test checks the cursor and byte-accounting invariants across
//! arbitrary operation sequences.

use proptest::prelude::*;
use rstest::{fixture, rstest};

use super::*;

fn payload(n: u8) -> Payload { Payload::bin("", vec![n; usize::from(n) + 1]) }

#[fixture]
fn three_sent() -> OutboundQueue {
    let mut queue = OutboundQueue::new();
    for n in 0..3 {
        queue.produce(payload(n));
    }
    for _ in 0..3 {
        queue.consume().expect("message available");
    }
    queue
}

#[test]
fn produce_assigns_sequential_indices() {
    let mut queue = OutboundQueue::new();
    assert_eq!(queue.produce(payload(0)), 0);
    assert_eq!(queue.produce(payload(1)), 1);
    assert_eq!(queue.produce(payload(2)), 2);
    assert_eq!(queue.num_unsent_messages(), 3);
    assert_eq!(queue.num_unacked_messages(), 3);
}

#[test]
fn produce_stamps_idx_into_encoded_headers() {
    let mut queue = OutboundQueue::new();
    queue.produce(payload(0));
    let idx = queue.produce(payload(1));
    queue.consume().expect("first");
    let (_, data) = queue.consume().expect("second");

    let decoded = codec::decode(data).into_payload().expect("payload");
    assert_eq!(decoded.idx(), Some(idx));
}

#[test]
fn consume_hands_out_in_fifo_order() {
    let mut queue = OutboundQueue::new();
    for n in 0..3 {
        queue.produce(payload(n));
    }
    let order: Vec<u64> = (0..3)
        .map(|_| queue.consume().expect("message available").0)
        .collect();
    assert_eq!(order, vec![0, 1, 2]);
}

#[test]
fn consume_on_empty_queue_errors() {
    let mut queue = OutboundQueue::new();
    assert_eq!(queue.consume(), Err(QueueError::Empty));
    queue.produce(payload(0));
    queue.consume().expect("one message");
    assert_eq!(queue.consume(), Err(QueueError::Empty));
}

#[rstest]
fn acknowledge_frees_up_to_and_including_index(mut three_sent: OutboundQueue) {
    three_sent.acknowledge(1);
    assert_eq!(three_sent.ack_idx(), 2);
    assert_eq!(three_sent.num_unacked_messages(), 1);
    assert_eq!(three_sent.entries.len(), 1);
}

#[rstest]
fn acknowledge_is_idempotent(mut three_sent: OutboundQueue) {
    three_sent.acknowledge(1);
    let before = three_sent.stats();
    three_sent.acknowledge(1);
    three_sent.acknowledge(0);
    assert_eq!(three_sent.stats(), before);
}

#[rstest]
fn acknowledge_beyond_last_message_is_clamped(mut three_sent: OutboundQueue) {
    three_sent.acknowledge(100);
    assert_eq!(three_sent.ack_idx(), 3);
    assert_eq!(three_sent.num_unacked_bytes(), 0);
}

#[test]
fn acknowledge_ahead_of_read_cursor_drags_it_along() {
    let mut queue = OutboundQueue::new();
    for n in 0..3 {
        queue.produce(payload(n));
    }
    queue.acknowledge(1);
    assert_eq!(queue.read_idx(), 2);
    assert_eq!(queue.num_unsent_messages(), 1);
    assert_eq!(queue.consume().expect("last message").0, 2);
}

#[rstest]
fn revert_rearms_unacknowledged_messages(mut three_sent: OutboundQueue) {
    three_sent.revert(1);
    assert_eq!(three_sent.read_idx(), 1);
    assert_eq!(three_sent.num_unsent_messages(), 2);
    assert_eq!(three_sent.consume().expect("resend").0, 1);
    assert_eq!(three_sent.consume().expect("resend").0, 2);
}

#[rstest]
fn revert_never_moves_forward(mut three_sent: OutboundQueue) {
    three_sent.revert(1);
    three_sent.revert(3);
    assert_eq!(three_sent.read_idx(), 1);
}

#[rstest]
fn revert_stops_at_ack_cursor(mut three_sent: OutboundQueue) {
    three_sent.acknowledge(1);
    three_sent.revert(0);
    assert_eq!(three_sent.read_idx(), 2);
}

/// Peer reports it processed idx 0 of two sent messages.
#[test]
fn ready_handshake_keeps_only_unprocessed_messages() {
    let mut queue = OutboundQueue::new();
    queue.produce(payload(0));
    queue.produce(payload(1));
    queue.consume().expect("idx 0");
    queue.consume().expect("idx 1");

    let ready_idx = 1;
    queue.acknowledge(ready_idx - 1);
    queue.revert(ready_idx);

    assert_eq!(queue.num_unacked_messages(), 1);
    assert_eq!(queue.num_unsent_messages(), 1);
    assert_eq!(queue.consume().expect("resend").0, 1);
}

#[derive(Clone, Debug)]
enum Op {
    Produce(u8),
    Consume,
    Acknowledge(u64),
    Revert(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u8>().prop_map(Op::Produce),
        Just(Op::Consume),
        (0u64..40).prop_map(Op::Acknowledge),
        (0u64..40).prop_map(Op::Revert),
    ]
}

proptest! {
    #[test]
    fn cursors_and_byte_counts_stay_consistent(ops in prop::collection::vec(op(), 0..120)) {
        let mut queue = OutboundQueue::new();
        let mut sizes: Vec<usize> = Vec::new();

        for op in ops {
            match op {
                Op::Produce(n) => {
                    let idx = queue.produce(payload(n));
                    prop_assert_eq!(idx, sizes.len() as u64);
                    let stored = queue.entry(idx).expect("just produced").len();
                    sizes.push(stored);
                }
                Op::Consume => {
                    if queue.num_unsent_messages() > 0 {
                        let expected = queue.read_idx();
                        prop_assert_eq!(queue.consume().expect("unsent message").0, expected);
                    } else {
                        prop_assert_eq!(queue.consume(), Err(QueueError::Empty));
                    }
                }
                Op::Acknowledge(idx) => queue.acknowledge(idx),
                Op::Revert(idx) => {
                    let limit = queue.read_idx();
                    queue.revert(idx);
                    for k in queue.read_idx()..limit {
                        prop_assert!(queue.entry(k).is_some(), "reverted message {} lost", k);
                    }
                }
            }

            let stats = queue.stats();
            prop_assert!(stats.ack_idx <= stats.read_idx);
            prop_assert!(stats.read_idx <= stats.write_idx);
            prop_assert_eq!(stats.unsent_messages, stats.write_idx - stats.read_idx);
            prop_assert_eq!(stats.unacked_messages, stats.write_idx - stats.ack_idx);

            let sum = |from: u64| sizes.iter().skip(from as usize).sum::<usize>();
            prop_assert_eq!(stats.unacked_bytes, sum(stats.ack_idx));
            prop_assert_eq!(stats.unsent_bytes, sum(stats.read_idx));
            prop_assert_eq!(queue.entries.len() as u64, stats.unacked_messages);
        }
    }
}
