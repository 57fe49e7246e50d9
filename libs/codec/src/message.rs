//! Tagged control-message variants
//!
//! Raw extended headers are decoded once into a [`ControlMessage`] before any
//! dispatch decision is taken. The receive router is then an exhaustive
//! `match` over this enum instead of a switch on an integer discriminant.

use crate::error::{ProtocolError, ProtocolResult};
use bytes::Bytes;
use types::{CancelHeader, LockHeader, MessageType, RmaHeader, WireHeader};
use zerocopy::{AsBytes, FromBytes};

/// A decoded wire header, one variant per message category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Data(WireHeader),
    DataRequestAck(WireHeader),
    DataAck(WireHeader),
    CancelDataRequestAck(CancelHeader),
    CancelDataAck(WireHeader),
    RmaPut(RmaHeader),
    RmaAccumulate(RmaHeader),
    RmaGetReq(RmaHeader),
    RmaLockExclusive(LockHeader),
    RmaLockShared(LockHeader),
    RmaUnlock(LockHeader),
}

impl ControlMessage {
    /// Decode a raw extended header
    pub fn decode(xheader: &[u8]) -> ProtocolResult<Self> {
        let common = WireHeader::peek(xheader).ok_or_else(|| {
            ProtocolError::header_too_small(WireHeader::SIZE, xheader.len(), "common header")
        })?;
        common.validate()?;
        let msg_type = common.message_type()?;

        let decoded = match msg_type {
            MessageType::Data => ControlMessage::Data(common),
            MessageType::DataRequestAck => ControlMessage::DataRequestAck(common),
            MessageType::DataAck => ControlMessage::DataAck(common),
            MessageType::CancelDataAck => ControlMessage::CancelDataAck(common),
            MessageType::CancelDataRequestAck => {
                let cancel = read_extension::<CancelHeader>(xheader, CancelHeader::SIZE, msg_type)?;
                let retract = cancel.retract_type()?;
                if !retract.carries_data() {
                    return Err(ProtocolError::InvalidRetraction { retract });
                }
                ControlMessage::CancelDataRequestAck(cancel)
            }
            MessageType::RmaPut => {
                ControlMessage::RmaPut(read_extension(xheader, RmaHeader::SIZE, msg_type)?)
            }
            MessageType::RmaAccumulate => {
                ControlMessage::RmaAccumulate(read_extension(xheader, RmaHeader::SIZE, msg_type)?)
            }
            MessageType::RmaGetReq => {
                ControlMessage::RmaGetReq(read_extension(xheader, RmaHeader::SIZE, msg_type)?)
            }
            MessageType::RmaLockExclusiveRequest => ControlMessage::RmaLockExclusive(
                read_extension(xheader, LockHeader::SIZE, msg_type)?,
            ),
            MessageType::RmaLockSharedRequest => ControlMessage::RmaLockShared(read_extension(
                xheader,
                LockHeader::SIZE,
                msg_type,
            )?),
            MessageType::RmaUnlockRequest => {
                ControlMessage::RmaUnlock(read_extension(xheader, LockHeader::SIZE, msg_type)?)
            }
        };

        Ok(decoded)
    }

    /// Encode into the raw extended header carried by the transport
    pub fn encode(&self) -> Bytes {
        match self {
            ControlMessage::Data(h)
            | ControlMessage::DataRequestAck(h)
            | ControlMessage::DataAck(h)
            | ControlMessage::CancelDataAck(h) => Bytes::copy_from_slice(h.as_bytes()),
            ControlMessage::CancelDataRequestAck(h) => Bytes::copy_from_slice(h.as_bytes()),
            ControlMessage::RmaPut(h)
            | ControlMessage::RmaAccumulate(h)
            | ControlMessage::RmaGetReq(h) => Bytes::copy_from_slice(h.as_bytes()),
            ControlMessage::RmaLockExclusive(h)
            | ControlMessage::RmaLockShared(h)
            | ControlMessage::RmaUnlock(h) => Bytes::copy_from_slice(h.as_bytes()),
        }
    }

    /// The common header every variant starts with
    pub fn common(&self) -> &WireHeader {
        match self {
            ControlMessage::Data(h)
            | ControlMessage::DataRequestAck(h)
            | ControlMessage::DataAck(h)
            | ControlMessage::CancelDataAck(h) => h,
            ControlMessage::CancelDataRequestAck(h) => &h.common,
            ControlMessage::RmaPut(h)
            | ControlMessage::RmaAccumulate(h)
            | ControlMessage::RmaGetReq(h) => &h.common,
            ControlMessage::RmaLockExclusive(h)
            | ControlMessage::RmaLockShared(h)
            | ControlMessage::RmaUnlock(h) => &h.common,
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            ControlMessage::Data(_) => MessageType::Data,
            ControlMessage::DataRequestAck(_) => MessageType::DataRequestAck,
            ControlMessage::DataAck(_) => MessageType::DataAck,
            ControlMessage::CancelDataRequestAck(_) => MessageType::CancelDataRequestAck,
            ControlMessage::CancelDataAck(_) => MessageType::CancelDataAck,
            ControlMessage::RmaPut(_) => MessageType::RmaPut,
            ControlMessage::RmaAccumulate(_) => MessageType::RmaAccumulate,
            ControlMessage::RmaGetReq(_) => MessageType::RmaGetReq,
            ControlMessage::RmaLockExclusive(_) => MessageType::RmaLockExclusiveRequest,
            ControlMessage::RmaLockShared(_) => MessageType::RmaLockSharedRequest,
            ControlMessage::RmaUnlock(_) => MessageType::RmaUnlockRequest,
        }
    }
}

/// Encode a plain common header
pub fn encode_header(header: &WireHeader) -> Bytes {
    Bytes::copy_from_slice(header.as_bytes())
}

fn read_extension<T: FromBytes>(
    xheader: &[u8],
    need: usize,
    msg_type: MessageType,
) -> ProtocolResult<T> {
    T::read_from_prefix(xheader).ok_or_else(|| {
        ProtocolError::header_too_small(need, xheader.len(), format!("{} extension", msg_type))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_data_header() {
        let header = WireHeader::new(MessageType::Data, 42, 3, 1);
        let decoded = ControlMessage::decode(&encode_header(&header)).unwrap();

        assert_eq!(decoded, ControlMessage::Data(header));
        assert_eq!(decoded.common().tag, 42);
        assert_eq!(decoded.message_type(), MessageType::Data);
    }

    #[test]
    fn test_decode_cancel_request_keeps_retracted_type() {
        let cancel = CancelHeader::new(8, 2, 0, MessageType::DataRequestAck);
        let raw = ControlMessage::CancelDataRequestAck(cancel).encode();

        match ControlMessage::decode(&raw).unwrap() {
            ControlMessage::CancelDataRequestAck(h) => {
                assert_eq!(h.retract_type().unwrap(), MessageType::DataRequestAck);
                assert_eq!(h.common.tag, 8);
            }
            other => panic!("unexpected variant {:?}", other),
        }
    }

    #[test]
    fn test_cancel_of_control_type_is_rejected() {
        let cancel = CancelHeader::new(8, 2, 0, MessageType::DataAck);
        let raw = Bytes::copy_from_slice(cancel.as_bytes());

        assert_eq!(
            ControlMessage::decode(&raw),
            Err(ProtocolError::InvalidRetraction {
                retract: MessageType::DataAck
            })
        );
    }

    #[test]
    fn test_truncated_extension_is_reported() {
        // A put header cut down to its common part
        let rma = RmaHeader::new(MessageType::RmaPut, 1, 0, 7, 128, 64);
        let raw = &rma.as_bytes()[..WireHeader::SIZE];

        match ControlMessage::decode(raw) {
            Err(ProtocolError::HeaderTooSmall { need, got, .. }) => {
                assert_eq!(need, RmaHeader::SIZE);
                assert_eq!(got, WireHeader::SIZE);
            }
            other => panic!("expected HeaderTooSmall, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let mut header = WireHeader::new(MessageType::Data, 0, 0, 0);
        header.msg_type = 200;

        assert!(matches!(
            ControlMessage::decode(header.as_bytes()),
            Err(ProtocolError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_lock_variants_decode() {
        let lock = LockHeader::new(MessageType::RmaLockSharedRequest, 5, 2, 11);
        let decoded = ControlMessage::decode(lock.as_bytes()).unwrap();

        assert_eq!(decoded, ControlMessage::RmaLockShared(lock));
        assert_eq!(decoded.common().src_rank, 2);
    }
}
