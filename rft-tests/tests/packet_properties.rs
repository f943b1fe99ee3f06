//! Property-based tests for RFT framing, reassembly and congestion control
//!
//! These tests use proptest to generate random payloads, chunkings and event
//! sequences and check the invariants that must hold for all of them.

use bytes::Bytes;
use proptest::prelude::*;
use rft_protocol::packet::{checksum, decode, encode, pad_chunk, strip_padding, verify, Packet};
use rft_protocol::{CongestionController, Disposition, ReceiverSession, Reply};

// Property test strategies

fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=512)
}

/// File content that cannot collide with a control keyword and does not end
/// in padding
fn file_content_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            b'a'..=b'z',
            b'0'..=b'9',
            Just(b' '),
            Just(b'\n'),
            Just(b':'),
        ],
        0..=300,
    )
    .prop_filter("must not end in padding", |content| {
        content.last() != Some(&b' ')
    })
}

#[derive(Debug, Clone, Copy)]
enum CongestionEvent {
    Ack,
    Timeout,
}

fn congestion_events_strategy() -> impl Strategy<Value = Vec<CongestionEvent>> {
    prop::collection::vec(
        prop_oneof![
            4 => Just(CongestionEvent::Ack),
            1 => Just(CongestionEvent::Timeout),
        ],
        0..=200,
    )
}

fn deliver(session: &mut ReceiverSession, packet: &Packet) -> Vec<Reply> {
    session.handle_datagram(&packet.to_bytes()).replies
}

// Property tests

proptest! {
    #[test]
    fn prop_checksum_verifies(payload in payload_strategy()) {
        prop_assert!(verify(&payload, checksum(&payload)));
    }

    #[test]
    fn prop_bit_flip_fails_verification(
        payload in prop::collection::vec(any::<u8>(), 1..=512),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let original = checksum(&payload);
        let mut corrupted = payload.clone();
        let i = index.index(corrupted.len());
        corrupted[i] ^= 1 << bit;

        prop_assert!(!verify(&corrupted, original));
    }

    #[test]
    fn prop_decode_splits_on_first_two_separators(
        seq in any::<u32>(),
        payload in payload_strategy(),
    ) {
        // Payloads may contain ':' themselves
        let frame = encode(seq, &payload);
        let packet = decode(&frame).unwrap();

        prop_assert_eq!(packet.seq, seq);
        prop_assert_eq!(&packet.payload[..], &payload[..]);
        prop_assert!(packet.is_valid());
    }

    #[test]
    fn prop_garbage_never_panics(bytes in payload_strategy()) {
        let mut session = ReceiverSession::new();
        let delivery = session.handle_datagram(&bytes);

        if !delivery.is_accepted() {
            prop_assert_eq!(session.expected_seq(), 0);
        }
    }

    #[test]
    fn prop_padding_strips_back(
        chunk in prop::collection::vec(b'a'..=b'z', 0..=32),
        extra in 0usize..=32,
    ) {
        let chunk_size = chunk.len() + extra;
        let padded = pad_chunk(&chunk, chunk_size);

        prop_assert_eq!(padded.len(), chunk_size.max(chunk.len()));
        prop_assert_eq!(strip_padding(&padded), &chunk[..]);
    }

    #[test]
    fn prop_in_order_delivery_reassembles(
        content in file_content_strategy(),
        chunk_size in 1usize..=32,
    ) {
        let mut session = ReceiverSession::new();
        deliver(&mut session, &Packet::control(0, "SYN"));
        deliver(&mut session, &Packet::control(1, "file.txt"));

        let mut seq = 2;
        for chunk in content.chunks(chunk_size) {
            let replies = deliver(&mut session, &Packet::data(seq, chunk, chunk_size));
            prop_assert_eq!(replies, vec![Reply::Ack(seq + 1)]);
            seq += 1;
        }

        let delivery = session.handle_datagram(&Packet::control(seq, "FIN").to_bytes());
        let file = delivery.completed.unwrap();

        prop_assert_eq!(file.name, "file.txt");
        prop_assert_eq!(file.content, Bytes::from(content));
    }

    #[test]
    fn prop_redelivery_does_not_advance(
        content in prop::collection::vec(b'a'..=b'z', 1..=100),
        chunk_size in 1usize..=16,
        pick in any::<prop::sample::Index>(),
    ) {
        let mut session = ReceiverSession::new();
        let mut sent = vec![Packet::control(0, "SYN"), Packet::control(1, "file.txt")];
        for (i, chunk) in content.chunks(chunk_size).enumerate() {
            sent.push(Packet::data(i as u32 + 2, chunk, chunk_size));
        }
        for packet in &sent {
            deliver(&mut session, packet);
        }

        let expected = session.expected_seq();
        let before = session.content();

        let replayed = &sent[pick.index(sent.len())];
        let delivery = session.handle_datagram(&replayed.to_bytes());

        prop_assert!(
            matches!(delivery.disposition, Disposition::Discarded(_)),
            "replayed packet was accepted"
        );
        prop_assert_eq!(delivery.replies, vec![Reply::Ack(expected)]);
        prop_assert_eq!(session.expected_seq(), expected);
        prop_assert_eq!(session.content(), before);
    }

    #[test]
    fn prop_congestion_invariants(events in congestion_events_strategy()) {
        let mut cc = CongestionController::new();

        for event in events {
            let (cwnd, threshold) = (cc.congestion_window(), cc.threshold());
            match event {
                CongestionEvent::Ack => {
                    cc.on_ack_signal();
                    if cwnd < threshold {
                        prop_assert_eq!(cc.congestion_window(), cwnd * 2);
                    } else {
                        prop_assert_eq!(cc.congestion_window(), cwnd + 1);
                    }
                    prop_assert_eq!(cc.threshold(), threshold);
                }
                CongestionEvent::Timeout => {
                    cc.on_timeout();
                    prop_assert_eq!(cc.congestion_window(), 1);
                    prop_assert_eq!(cc.threshold(), (threshold / 2).max(2));
                }
            }

            prop_assert!(cc.congestion_window() >= 1);
            prop_assert!(cc.threshold() >= 2);
        }
    }
}

#[test]
fn test_ten_signals_from_one() {
    let mut cc = CongestionController::with_params(1, 2048);
    for _ in 0..10 {
        cc.on_ack_signal();
    }
    assert_eq!(cc.congestion_window(), 1024);
}

#[test]
fn test_default_threshold_switches_to_linear() {
    let mut cc = CongestionController::new();
    for _ in 0..6 {
        cc.on_ack_signal();
    }
    assert_eq!(cc.congestion_window(), 64);
    assert!(!cc.is_slow_start());

    for expected in 65..=70 {
        cc.on_ack_signal();
        assert_eq!(cc.congestion_window(), expected);
    }
}
