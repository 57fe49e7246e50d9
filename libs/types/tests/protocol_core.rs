//! Core Protocol Tests
//!
//! Tests fundamental wire properties shared by both peers:
//! - Fixed header sizes with no hidden padding
//! - Extension headers start with the common header
//! - Data-bearing types sort before control replies
//! - Rank sentinels never collide with real ranks

use types::{
    CancelHeader, ErrorKind, LockHeader, MessageType, PeerRank, RmaHeader, Status, WireHeader,
    ANY_SOURCE, ANY_TAG, PROC_NULL, ROOT,
};
use zerocopy::{AsBytes, FromBytes};

#[test]
fn test_every_extension_starts_with_common_header() {
    let cancel = CancelHeader::new(3, 9, 1, MessageType::Data);
    let rma = RmaHeader::new(MessageType::RmaAccumulate, 9, 1, 4, 16, 32).with_accumulate_op(2);
    let lock = LockHeader::new(MessageType::RmaUnlockRequest, 9, 1, 4);

    for (bytes, expected) in [
        (cancel.as_bytes(), MessageType::CancelDataRequestAck),
        (rma.as_bytes(), MessageType::RmaAccumulate),
        (lock.as_bytes(), MessageType::RmaUnlockRequest),
    ] {
        let common = WireHeader::peek(bytes).unwrap();
        assert_eq!(common.message_type().unwrap(), expected);
        assert_eq!(common.context_id, 9);
        assert_eq!(common.src_rank, 1);
    }
}

#[test]
fn test_rma_header_round_trips_through_bytes() {
    let rma = RmaHeader::new(MessageType::RmaPut, 2, 0, 17, u64::MAX - 1, 4096);
    let restored = RmaHeader::read_from(rma.as_bytes()).unwrap();

    assert_eq!(restored, rma);
    assert_eq!(restored.target_disp, u64::MAX - 1);
    assert_eq!(restored.accumulate_op, 0);
}

#[test]
fn test_only_data_bearing_types_are_matchable() {
    let matchable: Vec<_> = (0u32..=10)
        .map(|raw| MessageType::try_from(raw).unwrap())
        .filter(|t| t.carries_data())
        .collect();

    assert_eq!(
        matchable,
        vec![MessageType::Data, MessageType::DataRequestAck]
    );
}

#[test]
fn test_sentinels_are_distinct_from_ranks() {
    for sentinel in [PROC_NULL, ANY_SOURCE, ROOT] {
        assert!(!matches!(PeerRank::classify(sentinel), PeerRank::Process(_)));
    }
    assert_eq!(PeerRank::classify(0), PeerRank::Process(0));
    assert_eq!(ANY_TAG, PROC_NULL);
}

#[test]
fn test_status_error_taxonomy() {
    let mut status = Status::for_send(4, 128);
    assert!(!status.is_null());
    assert!(status.error.is_success());

    status.error = ErrorKind::Truncate;
    assert!(!status.error.is_fatal());
    assert_eq!(status.error.to_string(), "ERR_TRUNCATE");
}
