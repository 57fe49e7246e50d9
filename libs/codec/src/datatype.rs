//! Datatype descriptions for user buffers
//!
//! A [`Datatype`] describes where the bytes of one element live inside a user
//! buffer. Contiguous types are transferred in place; all other layouts are
//! gathered into a packed temporary before sending and scattered back after
//! receiving.
//!
//! Datatypes are reference counted. An in-flight operation holds a clone for
//! as long as it needs the layout, and drops it during cleanup.

use crate::error::{PackError, PackResult};
use std::sync::Arc;

/// Element layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// `size` bytes, no holes
    Contiguous { size: usize },

    /// `count` blocks of `blocklen` elements, block starts `stride` elements apart
    Vector {
        count: usize,
        blocklen: usize,
        stride: usize,
        elem_size: usize,
    },

    /// Explicit `(displacement, length)` byte blocks inside an element of `extent` bytes
    Indexed {
        blocks: Vec<(usize, usize)>,
        extent: usize,
    },
}

/// Shared handle to an element layout
#[derive(Debug, Clone)]
pub struct Datatype {
    layout: Arc<Layout>,
}

impl Datatype {
    /// Raw bytes
    pub fn byte() -> Self {
        Self::contiguous(1)
    }

    /// A contiguous element of `size` bytes
    pub fn contiguous(size: usize) -> Self {
        Self {
            layout: Arc::new(Layout::Contiguous { size }),
        }
    }

    pub fn vector(
        count: usize,
        blocklen: usize,
        stride: usize,
        elem_size: usize,
    ) -> PackResult<Self> {
        if count == 0 || blocklen == 0 || elem_size == 0 {
            return Err(PackError::InvalidDatatype(format!(
                "vector with empty dimension (count={}, blocklen={}, elem_size={})",
                count, blocklen, elem_size
            )));
        }
        if stride < blocklen {
            return Err(PackError::InvalidDatatype(format!(
                "vector stride {} smaller than block length {}",
                stride, blocklen
            )));
        }
        Ok(Self {
            layout: Arc::new(Layout::Vector {
                count,
                blocklen,
                stride,
                elem_size,
            }),
        })
    }

    pub fn indexed(blocks: Vec<(usize, usize)>, extent: usize) -> PackResult<Self> {
        for &(disp, len) in &blocks {
            let end = disp.checked_add(len).ok_or_else(|| {
                PackError::InvalidDatatype(format!("block at {} overflows", disp))
            })?;
            if end > extent {
                return Err(PackError::InvalidDatatype(format!(
                    "block {}..{} outside extent {}",
                    disp, end, extent
                )));
            }
        }
        Ok(Self {
            layout: Arc::new(Layout::Indexed { blocks, extent }),
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Packed bytes per element
    pub fn size(&self) -> usize {
        match &*self.layout {
            Layout::Contiguous { size } => *size,
            Layout::Vector {
                count,
                blocklen,
                elem_size,
                ..
            } => count * blocklen * elem_size,
            Layout::Indexed { blocks, .. } => blocks.iter().map(|&(_, len)| len).sum(),
        }
    }

    /// Bytes spanned in the user buffer per element
    pub fn extent(&self) -> usize {
        match &*self.layout {
            Layout::Contiguous { size } => *size,
            Layout::Vector {
                count,
                blocklen,
                stride,
                elem_size,
            } => ((count - 1) * stride + blocklen) * elem_size,
            Layout::Indexed { extent, .. } => *extent,
        }
    }

    /// True when the user buffer can be handed to the transport unchanged
    pub fn is_contiguous(&self) -> bool {
        match &*self.layout {
            Layout::Contiguous { .. } => true,
            Layout::Vector {
                count,
                blocklen,
                stride,
                ..
            } => *count == 1 || stride == blocklen,
            Layout::Indexed { .. } => false,
        }
    }

    /// Number of live handles sharing this layout
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.layout)
    }

    /// Total packed size of `count` elements
    pub fn packed_len(&self, count: usize) -> PackResult<usize> {
        count
            .checked_mul(self.size())
            .ok_or(PackError::SizeOverflow {
                count,
                size: self.size(),
            })
    }

    /// Bytes of user buffer touched by `count` elements
    ///
    /// The last element only reaches the end of its final block, not its
    /// full extent.
    pub fn span(&self, count: usize) -> PackResult<usize> {
        if count == 0 {
            return Ok(0);
        }
        let mut last_end = 0;
        self.for_each_block(|off, len| last_end = last_end.max(off + len));
        (count - 1)
            .checked_mul(self.extent())
            .and_then(|n| n.checked_add(last_end))
            .ok_or(PackError::SizeOverflow {
                count,
                size: self.extent(),
            })
    }

    /// Visit each `(offset, len)` byte block of one element, in packing order
    pub(crate) fn for_each_block(&self, mut visit: impl FnMut(usize, usize)) {
        match &*self.layout {
            Layout::Contiguous { size } => visit(0, *size),
            Layout::Vector {
                count,
                blocklen,
                stride,
                elem_size,
            } => {
                for block in 0..*count {
                    visit(block * stride * elem_size, blocklen * elem_size);
                }
            }
            Layout::Indexed { blocks, .. } => {
                for &(disp, len) in blocks {
                    visit(disp, len);
                }
            }
        }
    }
}

impl PartialEq for Datatype {
    fn eq(&self, other: &Self) -> bool {
        self.layout == other.layout
    }
}

impl Eq for Datatype {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_size_and_extent() {
        // 3 blocks of 2 i32s, every 4 i32s
        let dt = Datatype::vector(3, 2, 4, 4).unwrap();
        assert_eq!(dt.size(), 24);
        assert_eq!(dt.extent(), 40);
        assert!(!dt.is_contiguous());
    }

    #[test]
    fn test_dense_vector_is_contiguous() {
        let dt = Datatype::vector(4, 2, 2, 8).unwrap();
        assert_eq!(dt.size(), dt.extent());
        assert!(dt.is_contiguous());
    }

    #[test]
    fn test_invalid_layouts_rejected() {
        assert!(Datatype::vector(2, 4, 2, 1).is_err());
        assert!(Datatype::vector(0, 1, 1, 1).is_err());
        assert!(Datatype::indexed(vec![(4, 8)], 10).is_err());
    }

    #[test]
    fn test_ref_count_tracks_clones() {
        let dt = Datatype::contiguous(8);
        assert_eq!(dt.ref_count(), 1);
        let held = dt.clone();
        assert_eq!(dt.ref_count(), 2);
        drop(held);
        assert_eq!(dt.ref_count(), 1);
    }

    #[test]
    fn test_span_stops_at_last_block() {
        let dt = Datatype::vector(2, 1, 3, 2).unwrap();
        // extent 8, last block ends at byte 8 of the final element
        assert_eq!(dt.span(3).unwrap(), 24);
        assert_eq!(Datatype::indexed(vec![(0, 2)], 10).unwrap().span(2).unwrap(), 12);
        assert_eq!(dt.span(0).unwrap(), 0);
    }

    #[test]
    fn test_packed_len_overflow() {
        let dt = Datatype::contiguous(usize::MAX / 2 + 1);
        assert!(matches!(
            dt.packed_len(2),
            Err(PackError::SizeOverflow { count: 2, .. })
        ));
    }
}
