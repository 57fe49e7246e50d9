//! Pack/unpack service for non-contiguous buffers
//!
//! The device never touches datatype internals. It asks a [`PackService`] for
//! a [`PackedMessage`] sized for `count` elements, packs into it on the send
//! side, and unpacks the received bytes into the user buffer on the receive
//! side. Truncated receives unpack only the bytes that arrived.

use crate::datatype::Datatype;
use crate::error::{PackError, PackResult};
use bytes::Bytes;

/// Temporary packed representation of a user buffer
#[derive(Debug)]
pub struct PackedMessage {
    buffer: Vec<u8>,
    needs_unpack: bool,
    datatype: Datatype,
}

impl PackedMessage {
    /// Packed byte length
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    /// Hand the packed bytes to the transport
    pub fn freeze(self) -> Bytes {
        Bytes::from(self.buffer)
    }
}

/// Conversion between user buffers and packed transport buffers
pub trait PackService: Send + Sync {
    /// Allocate a packed buffer for `count` elements of `datatype`
    fn prepare(&self, count: usize, datatype: &Datatype) -> PackResult<PackedMessage>;

    /// Gather `count` elements from `src` into `msg`
    fn pack(&self, src: &[u8], count: usize, msg: &mut PackedMessage) -> PackResult<()>;

    /// Scatter up to `msg.len()` received bytes from `packed` into `dst`
    ///
    /// Returns the number of bytes written into `dst`.
    fn unpack(&self, packed: &[u8], dst: &mut [u8], msg: &PackedMessage) -> PackResult<usize>;

    /// Whether received data must go through [`PackService::unpack`]
    fn needs_unpack(&self, msg: &PackedMessage) -> bool {
        msg.needs_unpack
    }

    /// Release the temporary buffer and the datatype reference
    fn cleanup(&self, msg: PackedMessage) {
        drop(msg);
    }
}

/// Default engine driven by [`Datatype`] block descriptions
#[derive(Debug, Default, Clone, Copy)]
pub struct DatatypeEngine;

impl DatatypeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl PackService for DatatypeEngine {
    fn prepare(&self, count: usize, datatype: &Datatype) -> PackResult<PackedMessage> {
        let len = datatype.packed_len(count)?;
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(len)
            .map_err(|_| PackError::OutOfMemory { bytes: len })?;
        buffer.resize(len, 0);

        Ok(PackedMessage {
            buffer,
            needs_unpack: !datatype.is_contiguous(),
            datatype: datatype.clone(),
        })
    }

    fn pack(&self, src: &[u8], count: usize, msg: &mut PackedMessage) -> PackResult<()> {
        let need = msg.datatype.span(count)?;
        if src.len() < need {
            return Err(PackError::BufferTooSmall {
                need,
                got: src.len(),
                count,
            });
        }

        let extent = msg.datatype.extent();
        let mut out = 0;
        for element in 0..count {
            let base = element * extent;
            msg.datatype.for_each_block(|off, len| {
                let start = base + off;
                msg.buffer[out..out + len].copy_from_slice(&src[start..start + len]);
                out += len;
            });
        }
        Ok(())
    }

    fn unpack(&self, packed: &[u8], dst: &mut [u8], msg: &PackedMessage) -> PackResult<usize> {
        let available = packed.len().min(msg.len());
        let extent = msg.datatype.extent();

        let mut consumed = 0;
        let mut element = 0;
        while consumed < available {
            let base = element * extent;
            let mut overrun = None;
            msg.datatype.for_each_block(|off, len| {
                let take = len.min(available - consumed);
                if take == 0 || overrun.is_some() {
                    return;
                }
                let start = base + off;
                if start + take > dst.len() {
                    overrun = Some(start + take);
                    return;
                }
                dst[start..start + take].copy_from_slice(&packed[consumed..consumed + take]);
                consumed += take;
            });
            if let Some(need) = overrun {
                return Err(PackError::BufferTooSmall {
                    need,
                    got: dst.len(),
                    count: element + 1,
                });
            }
            element += 1;
        }
        Ok(consumed)
    }
}
