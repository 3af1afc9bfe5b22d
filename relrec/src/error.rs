//! Error types.
//!
//! Carving never panics: running out of arena space is reported as a
//! [`CapacityError`]. Indexed access comes in two flavours, mirroring the
//! standard library: `at()` returns a [`RangeError`], while the `Index`
//! operators panic with the same message.

use thiserror::Error;

/// An index or key that is not present in a container.
///
/// # Examples
///
/// ```
/// use relrec::error::RangeError;
///
/// let err = RangeError::Index { container: "Vector", index: 5, len: 5 };
/// assert_eq!(err.to_string(), "Vector index 5 out of range for length 5");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RangeError {
    /// Positional access outside `[0, len)`.
    #[error("{container} index {index} out of range for length {len}")]
    Index {
        /// The kind of container that was indexed.
        container: &'static str,
        /// The requested position.
        index: usize,
        /// The container's length.
        len: usize,
    },
    /// Keyed access to a map that has no entry for the key.
    #[error("nonexistent key in Map")]
    MissingKey,
}

/// The arena (or the destination block of a copy) is too small.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("insufficient capacity: {required} bytes required, {available} bytes available")]
pub struct CapacityError {
    /// Bytes the operation needed.
    pub required: usize,
    /// Bytes that were left.
    pub available: usize,
}

/// A buffer that cannot hold, or does not contain, a valid record block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum BlockError {
    /// The buffer is shorter than the block needs.
    #[error("buffer of {provided} bytes cannot hold a block of {required} bytes")]
    TooSmall {
        /// Bytes the block needs.
        required: usize,
        /// Bytes the buffer has.
        provided: usize,
    },
    /// The buffer does not start on a [`BLOCK_ALIGN`](crate::BLOCK_ALIGN) boundary.
    #[error("buffer is not aligned to {align} bytes")]
    Misaligned {
        /// The required alignment.
        align: usize,
    },
    /// Capacities are stored as `u32`.
    #[error("block of {0} bytes exceeds the 32-bit capacity limit")]
    TooLarge(usize),
    /// There is trailing free space, but not enough for the arena header.
    #[error("{0} bytes of free space cannot hold the arena header")]
    ArenaTooSmall(usize),
    /// The header of a loaded block is inconsistent with its bytes.
    #[error("corrupt record header: {0}")]
    Corrupt(&'static str),
}

#[inline(never)]
#[cold]
pub(crate) fn out_of_range(err: RangeError) -> ! {
    panic!("{}", err)
}

#[inline(never)]
#[cold]
pub(crate) fn self_reference() -> ! {
    panic!("OffsetPtr cannot point to its own storage")
}

#[inline(never)]
#[cold]
pub(crate) fn displacement_overflow() -> ! {
    panic!("OffsetPtr displacement does not fit in 32 bits")
}

#[inline(never)]
#[cold]
pub(crate) fn cross_block_reference() -> ! {
    panic!("carved storage committed into a field of a different block")
}
