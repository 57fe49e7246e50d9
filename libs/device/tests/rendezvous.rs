//! Synchronous sends complete only after the receiver matched them

mod common;

use codec::Datatype;
use common::ranks;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use types::{ErrorKind, ANY_TAG};

#[test_log::test]
fn test_ssend_blocks_until_receiver_matches() {
    let mut ranks = ranks(2);
    let receiver = Arc::new(ranks.pop().unwrap());
    let sender = ranks.pop().unwrap();
    let byte = Datatype::byte();

    let handle = sender.issend(b"rendezvous", 10, &byte, 1, 5, sender.world()).unwrap();

    let remote = receiver.clone();
    let recv_thread = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let byte = Datatype::byte();
        remote
            .recv(vec![0; 16], 16, &byte, 0, ANY_TAG, remote.world())
            .unwrap()
    });

    let sent = sender.wait(handle).unwrap();
    let received = recv_thread.join().unwrap();

    assert!(!sent.status.cancelled);
    assert_eq!(sent.status.error, ErrorKind::Success);
    assert_eq!(received.status.tag, 5);
    assert_eq!(received.status.count, 10);
    assert_eq!(&received.buffer.unwrap()[..10], b"rendezvous");
}

#[test_log::test]
fn test_sync_send_pending_until_ack() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    let handle = ranks[0].issend(b"hold", 4, &byte, 1, 2, ranks[0].world()).unwrap();
    // Data left eagerly, the ack has not
    assert!(ranks[0].test(handle).unwrap().is_none());
    assert_eq!(ranks[0].pending_counts(), (0, 1));

    ranks[1].recv(vec![0; 4], 4, &byte, 0, 2, ranks[1].world()).unwrap();

    let sent = ranks[0].test(handle).unwrap().expect("ack delivered");
    assert_eq!(sent.status.tag, 2);
    assert!(!sent.status.cancelled);
    assert_eq!(ranks[0].pending_counts(), (0, 0));
    assert_eq!(ranks[0].request_count(), 0);
}

#[test_log::test]
fn test_receive_posted_before_sync_send() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    let recv = ranks[1].irecv(vec![0; 3], 3, &byte, 0, 1, ranks[1].world()).unwrap();
    let send = ranks[0].issend(b"abc", 3, &byte, 1, 1, ranks[0].world()).unwrap();

    // Matched during delivery; the ack leaves once rank 1 applies the completion
    assert!(ranks[0].test(send).unwrap().is_none());
    let received = ranks[1].wait(recv).unwrap();
    assert_eq!(received.buffer.unwrap(), b"abc".to_vec());

    let sent = ranks[0].wait(send).unwrap();
    assert!(!sent.status.cancelled);
}

#[test_log::test]
fn test_truncated_sync_receive_still_acks() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    let handle = ranks[0].issend(b"0123456789", 10, &byte, 1, 4, ranks[0].world()).unwrap();
    let received = ranks[1].recv(vec![0; 4], 4, &byte, 0, 4, ranks[1].world()).unwrap();
    assert_eq!(received.status.error, ErrorKind::Truncate);

    let sent = ranks[0].wait(handle).unwrap();
    assert!(!sent.status.cancelled);
    assert_eq!(sent.status.error, ErrorKind::Success);
}

#[test_log::test]
fn test_ack_is_not_visible_to_probes() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    let handle = ranks[0].issend(b"x", 1, &byte, 1, 0, ranks[0].world()).unwrap();
    ranks[1].recv(vec![0; 1], 1, &byte, 0, 0, ranks[1].world()).unwrap();
    ranks[0].wait(handle).unwrap();

    assert!(ranks[0].iprobe(1, ANY_TAG, ranks[0].world()).unwrap().is_none());
}
