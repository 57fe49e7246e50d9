//! Receive matching predicates
//!
//! The transport evaluates an accept predicate against the raw extended
//! header of every inbound message it offers to a posted receive or probe.
//! The predicates here only look at the common header; connection (source)
//! filtering is done by the transport itself.

use network::AcceptFn;
use std::sync::Arc;
use types::{MessageType, WireHeader, ANY_TAG};

/// Data-bearing message with a matching tag (or wildcard) and exact context id
pub fn accepts_data(header: &WireHeader, tag: i32, context_id: u32) -> bool {
    header.msg_type <= u32::from(MessageType::DataRequestAck)
        && (header.tag == tag || tag == ANY_TAG)
        && header.context_id == context_id
}

/// Rendezvous reply closing a synchronous send or a cancellation
///
/// `seq` pins the reply to one send; two sends with the same tag never
/// consume each other's acks.
pub fn accepts_ack(header: &WireHeader, tag: i32, context_id: u32, seq: u32) -> bool {
    (header.msg_type == u32::from(MessageType::DataAck)
        || header.msg_type == u32::from(MessageType::CancelDataAck))
        && header.tag == tag
        && header.context_id == context_id
        && header.seq == seq
}

/// The still-unmatched message a cancellation request wants to retract
pub fn accepts_retraction(
    header: &WireHeader,
    retract: MessageType,
    tag: i32,
    context_id: u32,
    seq: u32,
) -> bool {
    header.msg_type == u32::from(retract)
        && header.tag == tag
        && header.context_id == context_id
        && header.seq == seq
}

/// Predicate for a user receive or probe
pub fn data_predicate(tag: i32, context_id: u32) -> AcceptFn {
    Arc::new(move |raw: &[u8]| {
        WireHeader::peek(raw).map_or(false, |h| accepts_data(&h, tag, context_id))
    })
}

pub fn ack_predicate(tag: i32, context_id: u32, seq: u32) -> AcceptFn {
    Arc::new(move |raw: &[u8]| {
        WireHeader::peek(raw).map_or(false, |h| accepts_ack(&h, tag, context_id, seq))
    })
}

pub fn retraction_predicate(
    retract: MessageType,
    tag: i32,
    context_id: u32,
    seq: u32,
) -> AcceptFn {
    Arc::new(move |raw: &[u8]| {
        WireHeader::peek(raw)
            .map_or(false, |h| accepts_retraction(&h, retract, tag, context_id, seq))
    })
}
