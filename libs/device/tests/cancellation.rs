//! Receive retraction and the two-phase send cancellation handshake

mod common;

use codec::Datatype;
use common::ranks;
use device::{Device, DeviceError, RequestHandle};
use types::ErrorKind;

/// Sender side of a send with an explicit sync flag
fn start(sender: &Device, sync: bool, payload: &[u8], tag: i32) -> RequestHandle {
    let byte = Datatype::byte();
    let dest = 1;
    if sync {
        sender.issend(payload, payload.len(), &byte, dest, tag, sender.world()).unwrap()
    } else {
        sender.isend(payload, payload.len(), &byte, dest, tag, sender.world()).unwrap()
    }
}

fn cancel_before_match(sync: bool) {
    let ranks = ranks(2);
    let handle = start(&ranks[0], sync, b"retract me", 9);

    ranks[0].cancel(handle).unwrap();
    // Peer applies the cancel request while the message is still unmatched
    assert!(ranks[1].progress() > 0);

    let sent = ranks[0].wait(handle).unwrap();
    assert!(sent.status.cancelled);
    assert_eq!(sent.status.error, ErrorKind::Success);

    assert!(ranks[1].iprobe(0, 9, ranks[1].world()).unwrap().is_none());
    assert_eq!(ranks[1].request_count(), 0);
    assert_eq!(ranks[0].request_count(), 0);
}

fn cancel_after_match(sync: bool) {
    let ranks = ranks(2);
    let byte = Datatype::byte();
    let handle = start(&ranks[0], sync, b"too late", 3);

    let received = ranks[1].recv(vec![0; 8], 8, &byte, 0, 3, ranks[1].world()).unwrap();
    assert_eq!(received.buffer.unwrap(), b"too late".to_vec());

    ranks[0].cancel(handle).unwrap();
    ranks[1].progress();

    let sent = ranks[0].wait(handle).unwrap();
    assert!(!sent.status.cancelled);
    assert_eq!(sent.status.error, ErrorKind::Success);
}

#[test_log::test]
fn test_standard_send_cancelled_before_match() {
    cancel_before_match(false);
}

#[test_log::test]
fn test_sync_send_cancelled_before_match() {
    cancel_before_match(true);
}

#[test_log::test]
fn test_standard_send_cancel_after_match_declined() {
    cancel_after_match(false);
}

#[test_log::test]
fn test_sync_send_cancel_after_match_declined() {
    cancel_after_match(true);
}

#[test_log::test]
fn test_cancelled_send_leaves_other_messages() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    ranks[0].send(b"keep", 4, &byte, 1, 1, ranks[0].world()).unwrap();
    let doomed = start(&ranks[0], false, b"drop", 2);
    ranks[0].cancel(doomed).unwrap();
    ranks[1].progress();
    assert!(ranks[0].wait(doomed).unwrap().status.cancelled);

    let kept = ranks[1].recv(vec![0; 4], 4, &byte, 0, 1, ranks[1].world()).unwrap();
    assert_eq!(kept.buffer.unwrap(), b"keep".to_vec());
    assert!(ranks[1].iprobe(0, 2, ranks[1].world()).unwrap().is_none());
}

#[test_log::test]
fn test_posted_receive_cancel() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    let handle = ranks[1].irecv(vec![7; 4], 4, &byte, 0, 1, ranks[1].world()).unwrap();
    ranks[1].cancel(handle).unwrap();
    let done = ranks[1].wait(handle).unwrap();

    assert!(done.status.cancelled);
    assert_eq!(done.status.count, 0);
    assert_eq!(done.buffer.unwrap(), vec![7; 4]);
    assert_eq!(ranks[1].stats().canceled_recvs, 1);

    // A later message is not swallowed by the cancelled receive
    ranks[0].send(b"next", 4, &byte, 1, 1, ranks[0].world()).unwrap();
    assert!(ranks[1].iprobe(0, 1, ranks[1].world()).unwrap().is_some());
}

#[test_log::test]
fn test_cancel_of_completed_request_is_noop() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    let handle = ranks[1].irecv(vec![0; 2], 2, &byte, 0, 1, ranks[1].world()).unwrap();
    ranks[0].send(b"ok", 2, &byte, 1, 1, ranks[0].world()).unwrap();
    ranks[1].progress();

    ranks[1].cancel(handle).unwrap();
    let done = ranks[1].wait(handle).unwrap();
    assert!(!done.status.cancelled);
    assert_eq!(done.buffer.unwrap(), b"ok".to_vec());
}

#[test_log::test]
fn test_repeated_cancel_sends_one_request() {
    let ranks = ranks(2);
    let handle = start(&ranks[0], false, b"once", 6);

    ranks[0].cancel(handle).unwrap();
    ranks[0].cancel(handle).unwrap();
    // Data plus a single cancel request
    assert_eq!(ranks[0].stats().messages_sent, 2);

    ranks[1].progress();
    assert!(ranks[0].wait(handle).unwrap().status.cancelled);
}

#[test_log::test]
fn test_cancel_of_released_handle_is_invalid() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    let handle = ranks[1].irecv(vec![0; 1], 1, &byte, 0, 0, ranks[1].world()).unwrap();
    ranks[1].cancel(handle).unwrap();
    ranks[1].wait(handle).unwrap();

    let err = ranks[1].cancel(handle).unwrap_err();
    assert!(matches!(err, DeviceError::InvalidRequest { .. }));
    assert_eq!(err.kind(), ErrorKind::Arg);
}

#[test_log::test]
fn test_late_cancel_spares_next_same_tag_send() {
    let ranks = ranks(2);
    let byte = Datatype::byte();
    let first = start(&ranks[0], false, b"AAAA", 1);
    let second = start(&ranks[0], false, b"BBBB", 1);

    let received = ranks[1].recv(vec![0; 4], 4, &byte, 0, 1, ranks[1].world()).unwrap();
    assert_eq!(received.buffer.unwrap(), b"AAAA".to_vec());

    // First send already matched; its cancel must not withdraw the second
    ranks[0].cancel(first).unwrap();
    ranks[1].progress();
    assert!(!ranks[0].wait(first).unwrap().status.cancelled);
    assert!(!ranks[0].wait(second).unwrap().status.cancelled);

    assert!(ranks[1].iprobe(0, 1, ranks[1].world()).unwrap().is_some());
    let next = ranks[1].recv(vec![0; 4], 4, &byte, 0, 1, ranks[1].world()).unwrap();
    assert_eq!(next.buffer.unwrap(), b"BBBB".to_vec());
}

#[test_log::test]
fn test_cancel_withdraws_only_its_own_send() {
    let ranks = ranks(2);
    let byte = Datatype::byte();
    let first = start(&ranks[0], false, b"AAAA", 1);
    let second = start(&ranks[0], false, b"BBBB", 1);

    ranks[0].cancel(second).unwrap();
    ranks[1].progress();
    assert!(ranks[0].wait(second).unwrap().status.cancelled);
    assert!(!ranks[0].wait(first).unwrap().status.cancelled);

    let kept = ranks[1].recv(vec![0; 4], 4, &byte, 0, 1, ranks[1].world()).unwrap();
    assert_eq!(kept.buffer.unwrap(), b"AAAA".to_vec());
    assert!(ranks[1].iprobe(0, 1, ranks[1].world()).unwrap().is_none());
}

#[test_log::test]
fn test_cancel_reply_not_taken_by_other_sync_send() {
    let ranks = ranks(2);
    let byte = Datatype::byte();
    let first = start(&ranks[0], true, b"AAAA", 1);
    let second = start(&ranks[0], true, b"BBBB", 1);

    ranks[0].cancel(second).unwrap();
    ranks[1].progress();
    assert!(ranks[0].wait(second).unwrap().status.cancelled);
    // The first send's ack wait is still open
    assert!(ranks[0].test(first).unwrap().is_none());

    let received = ranks[1].recv(vec![0; 4], 4, &byte, 0, 1, ranks[1].world()).unwrap();
    assert_eq!(received.buffer.unwrap(), b"AAAA".to_vec());
    assert!(!ranks[0].wait(first).unwrap().status.cancelled);
}
