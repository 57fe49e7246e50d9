//! Point-to-point matching, status and buffer handling across ranks

mod common;

use codec::Datatype;
use common::{ranks, ranks_with};
use device_config::DeviceConfig;
use types::{ErrorKind, ANY_SOURCE, ANY_TAG, PROC_NULL, ROOT};

#[test_log::test]
fn test_fixed_tag_send_receive() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    let sent = ranks[0].send(b"hello", 5, &byte, 1, 7, ranks[0].world()).unwrap();
    assert_eq!(sent.tag, 7);
    assert_eq!(sent.count, 5);

    let done = ranks[1].recv(vec![0; 8], 8, &byte, 0, 7, ranks[1].world()).unwrap();
    assert_eq!(done.status.source, 0);
    assert_eq!(done.status.tag, 7);
    assert_eq!(done.status.count, 5);
    assert_eq!(done.status.error, ErrorKind::Success);
    assert!(!done.status.cancelled);
    assert_eq!(&done.buffer.unwrap()[..5], b"hello");
}

#[test_log::test]
fn test_wildcard_source_and_tag_resolve_sender() {
    let ranks = ranks(3);
    let byte = Datatype::byte();

    ranks[2].send(b"xyz", 3, &byte, 0, 11, ranks[2].world()).unwrap();
    let done = ranks[0]
        .recv(vec![0; 3], 3, &byte, ANY_SOURCE, ANY_TAG, ranks[0].world())
        .unwrap();

    assert_eq!(done.status.source, 2);
    assert_eq!(done.status.tag, 11);
}

#[test_log::test]
fn test_receive_posted_before_send() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    let handle = ranks[1].irecv(vec![0; 4], 4, &byte, 0, 1, ranks[1].world()).unwrap();
    assert!(ranks[1].test(handle).unwrap().is_none());
    assert_eq!(ranks[1].pending_counts(), (1, 0));

    ranks[0].send(b"late", 4, &byte, 1, 1, ranks[0].world()).unwrap();
    let done = ranks[1].wait(handle).unwrap();
    assert_eq!(done.buffer.unwrap(), b"late".to_vec());
    assert_eq!(ranks[1].pending_counts(), (0, 0));
}

#[test_log::test]
fn test_fixed_tag_skips_other_tags() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    ranks[0].send(b"a", 1, &byte, 1, 1, ranks[0].world()).unwrap();
    ranks[0].send(b"b", 1, &byte, 1, 2, ranks[0].world()).unwrap();

    let second = ranks[1].recv(vec![0; 1], 1, &byte, 0, 2, ranks[1].world()).unwrap();
    assert_eq!(second.buffer.unwrap(), b"b".to_vec());
    let first = ranks[1].recv(vec![0; 1], 1, &byte, 0, ANY_TAG, ranks[1].world()).unwrap();
    assert_eq!(first.buffer.unwrap(), b"a".to_vec());
}

#[test_log::test]
fn test_same_tag_messages_arrive_in_order() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    for payload in [b"one", b"two"] {
        ranks[0].send(payload, 3, &byte, 1, 4, ranks[0].world()).unwrap();
    }
    for expected in [b"one", b"two"] {
        let done = ranks[1].recv(vec![0; 3], 3, &byte, 0, 4, ranks[1].world()).unwrap();
        assert_eq!(&done.buffer.unwrap()[..], expected);
    }
}

#[test_log::test]
fn test_context_id_isolates_communicators() {
    let ranks = ranks(2);
    let byte = Datatype::byte();
    let dup0 = ranks[0].dup(ranks[0].world()).unwrap();
    let dup1 = ranks[1].dup(ranks[1].world()).unwrap();
    assert_eq!(dup0.context_id(), dup1.context_id());
    assert_ne!(dup0.context_id(), ranks[0].world().context_id());

    ranks[0].send(b"dup", 3, &byte, 1, 1, &dup0).unwrap();

    // A wildcard receive on the world communicator must not see it
    let world_recv = ranks[1]
        .irecv(vec![0; 3], 3, &byte, ANY_SOURCE, ANY_TAG, ranks[1].world())
        .unwrap();
    assert!(ranks[1].test(world_recv).unwrap().is_none());

    let done = ranks[1].recv(vec![0; 3], 3, &byte, 0, 1, &dup1).unwrap();
    assert_eq!(done.buffer.unwrap(), b"dup".to_vec());

    ranks[1].cancel(world_recv).unwrap();
    let cancelled = ranks[1].wait(world_recv).unwrap();
    assert!(cancelled.status.cancelled);
    assert_eq!(cancelled.status.error, ErrorKind::Success);
    assert_eq!(cancelled.status.count, 0);
}

#[test_log::test]
fn test_null_peer_completes_without_traffic() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    let send = ranks[0].isend(b"ignored", 7, &byte, PROC_NULL, 3, ranks[0].world()).unwrap();
    let sent = ranks[0].wait(send).unwrap();
    assert!(sent.status.is_null());
    assert_eq!(sent.status.tag, ANY_TAG);

    let recv = ranks[1].irecv(vec![9; 4], 4, &byte, PROC_NULL, 3, ranks[1].world()).unwrap();
    let received = ranks[1].wait(recv).unwrap();
    assert_eq!(received.status.source, PROC_NULL);
    assert_eq!(received.status.count, 0);
    assert_eq!(received.buffer.unwrap(), vec![9; 4]);

    assert_eq!(ranks[0].stats().messages_sent, 0);
    assert_eq!(ranks[1].stats().messages_received, 0);
}

#[test_log::test]
fn test_reserved_and_out_of_range_ranks_rejected() {
    let ranks = ranks(2);
    let byte = Datatype::byte();
    let world = ranks[0].world();

    for dest in [ANY_SOURCE, ROOT, 2, -9] {
        let err = ranks[0].isend(b"x", 1, &byte, dest, 0, world).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rank, "send to {}", dest);
    }
    for source in [ROOT, 5] {
        let err = ranks[0].irecv(vec![0; 1], 1, &byte, source, 0, world).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rank, "recv from {}", source);
    }
    assert_eq!(ranks[0].probe(ROOT, 0, world).unwrap_err().kind(), ErrorKind::Rank);
    assert_eq!(ranks[0].iprobe(3, 0, world).unwrap_err().kind(), ErrorKind::Rank);
    assert_eq!(ranks[0].request_count(), 0);
}

#[test_log::test]
fn test_request_arena_exhaustion_is_no_mem() {
    let mut config = DeviceConfig::default();
    config.device.max_requests = 2;
    let ranks = ranks_with(2, config);
    let byte = Datatype::byte();
    let world = ranks[1].world();

    let first = ranks[1].irecv(vec![0; 1], 1, &byte, 0, 1, world).unwrap();
    ranks[1].irecv(vec![0; 1], 1, &byte, 0, 2, world).unwrap();
    let err = ranks[1].irecv(vec![0; 1], 1, &byte, 0, 3, world).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoMem);

    // Freed capacity is reusable
    ranks[1].cancel(first).unwrap();
    ranks[1].wait(first).unwrap();
    ranks[1].irecv(vec![0; 1], 1, &byte, 0, 3, world).unwrap();
}

#[test_log::test]
fn test_short_buffers_are_argument_errors() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    let err = ranks[0].isend(b"abc", 10, &byte, 1, 0, ranks[0].world()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Arg);

    let err = ranks[1].irecv(vec![0; 2], 10, &byte, 0, 0, ranks[1].world()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Arg);
}

#[test_log::test]
fn test_non_contiguous_buffers_round_trip() {
    let ranks = ranks(2);
    // Three i32 blocks, every other i32
    let strided = Datatype::vector(3, 1, 2, 4).unwrap();
    let src: Vec<u8> = (1..=20).collect();

    ranks[0].send(&src, 1, &strided, 1, 8, ranks[0].world()).unwrap();
    let done = ranks[1].recv(vec![0; 20], 1, &strided, 0, 8, ranks[1].world()).unwrap();
    assert_eq!(done.status.count, 12);

    let buf = done.buffer.unwrap();
    for block in 0..3 {
        let at = block * 8;
        assert_eq!(buf[at..at + 4], src[at..at + 4], "block {}", block);
        if at + 8 <= buf.len() {
            assert_eq!(buf[at + 4..at + 8], [0u8; 4], "hole after block {}", block);
        }
    }
}

#[test_log::test]
fn test_truncated_receive_reports_capacity() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    ranks[0].send(b"0123456789", 10, &byte, 1, 1, ranks[0].world()).unwrap();
    let done = ranks[1].recv(vec![0; 4], 4, &byte, 0, 1, ranks[1].world()).unwrap();

    assert_eq!(done.status.error, ErrorKind::Truncate);
    assert_eq!(done.status.count, 4);
    assert_eq!(done.buffer.unwrap(), b"0123".to_vec());
}

#[test_log::test]
fn test_truncated_non_contiguous_receive_unpacks_what_arrived() {
    let ranks = ranks(2);
    let byte = Datatype::byte();
    let strided = Datatype::vector(2, 2, 4, 1).unwrap();

    ranks[0].send(b"abcdef", 6, &byte, 1, 2, ranks[0].world()).unwrap();
    let done = ranks[1].recv(vec![b'.'; 6], 1, &strided, 0, 2, ranks[1].world()).unwrap();

    assert_eq!(done.status.error, ErrorKind::Truncate);
    assert_eq!(done.status.count, 4);
    assert_eq!(done.buffer.unwrap(), b"ab..cd".to_vec());
}

#[test_log::test]
fn test_probe_does_not_consume() {
    let ranks = ranks(2);
    let byte = Datatype::byte();
    let world = ranks[1].world();

    assert!(ranks[1].iprobe(0, 6, world).unwrap().is_none());
    ranks[0].send(b"probe me", 8, &byte, 1, 6, ranks[0].world()).unwrap();

    let status = ranks[1].probe(ANY_SOURCE, ANY_TAG, world).unwrap();
    assert_eq!((status.source, status.tag, status.count), (0, 6, 8));
    assert!(ranks[1].iprobe(0, 6, world).unwrap().is_some());

    ranks[1].recv(vec![0; 8], 8, &byte, 0, 6, world).unwrap();
    assert!(ranks[1].iprobe(0, 6, world).unwrap().is_none());
}

#[test_log::test]
fn test_probe_of_null_peer_is_immediate() {
    let ranks = ranks(1);
    let world = ranks[0].world();

    assert!(ranks[0].probe(PROC_NULL, 0, world).unwrap().is_null());
    let status = ranks[0].iprobe(PROC_NULL, 0, world).unwrap().unwrap();
    assert!(status.is_null());
}

#[test_log::test]
fn test_send_to_self() {
    let ranks = ranks(1);
    let byte = Datatype::byte();
    let world = ranks[0].world();

    let recv = ranks[0].irecv(vec![0; 4], 4, &byte, 0, 0, world).unwrap();
    ranks[0].send(b"self", 4, &byte, 0, 0, world).unwrap();
    let done = ranks[0].wait(recv).unwrap();
    assert_eq!(done.buffer.unwrap(), b"self".to_vec());
}

#[test_log::test]
fn test_wait_all_collects_in_order() {
    let ranks = ranks(2);
    let byte = Datatype::byte();

    let handles: Vec<_> = (0..3)
        .map(|tag| {
            ranks[1]
                .irecv(vec![0; 1], 1, &byte, 0, tag, ranks[1].world())
                .unwrap()
        })
        .collect();
    for tag in (0..3).rev() {
        ranks[0].send(&[tag as u8], 1, &byte, 1, tag, ranks[0].world()).unwrap();
    }

    let done = ranks[1].wait_all(&handles).unwrap();
    let tags: Vec<_> = done.iter().map(|c| c.status.tag).collect();
    assert_eq!(tags, vec![0, 1, 2]);
    assert_eq!(done[2].buffer.as_deref(), Some(&[2u8][..]));
}
