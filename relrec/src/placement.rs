//! Building and loading records in memory the caller owns.
//!
//! The buffer stays owned by whoever supplied it: a stack array, a memory
//! mapping, a `bumpalo::Bump`. Dropping the returned reference runs no
//! destructors.
//!
//! Buffers must start on a [`BLOCK_ALIGN`] boundary.
//!
//! # Examples
//!
//! ```
//! use relrec::prelude::*;
//! use relrec::placement;
//!
//! #[define_record]
//! pub struct Note {
//!     pub text: Str,
//! }
//!
//! #[repr(C, align(16))]
//! struct Buf([u8; 64]);
//! # fn main() {
//! let mut a = Buf([0xff; 64]);
//! let mut note = placement::init_in::<Note>(&mut a.0).unwrap();
//! let (arena, fields) = note.as_mut().split();
//! fields.text.assign(arena.unwrap().create_string("relocate me").unwrap());
//!
//! // Relocate with a byte copy, then read in place.
//! let mut b = Buf([0; 64]);
//! b.0.copy_from_slice(&a.0);
//! let moved = unsafe { placement::from_bytes::<Note>(&b.0) }.unwrap();
//! assert_eq!(moved.text, "relocate me");
//! # }
//! ```

use crate::arena::ARENA_HEADER_SIZE;
use crate::error::BlockError;
use crate::macro_support::{free_space_for, init_block};
use crate::record::{Record, RecordHeader};
use crate::BLOCK_ALIGN;
use core::pin::Pin;
use core::ptr::NonNull;

/// What the header of a stored block says about it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockInfo {
    pub(crate) struct_size: usize,
    pub(crate) used_space: usize,
    pub(crate) capacity: usize,
    pub(crate) has_arena: bool,
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_ne_bytes(word)
}

fn rejected(err: BlockError) -> BlockError {
    tracing::debug!(%err, "rejected record block");
    err
}

/// Checks that the header and arena header in `bytes` are consistent with
/// each other and with the length of `bytes`.
pub(crate) fn inspect(bytes: &[u8]) -> Result<BlockInfo, BlockError> {
    let header_size = core::mem::size_of::<RecordHeader>();
    if bytes.len() < header_size {
        return Err(rejected(BlockError::TooSmall {
            required: header_size,
            provided: bytes.len(),
        }));
    }
    let struct_size = read_u32(bytes, 0) as usize;
    let displacement = read_u32(bytes, 4) as i32;
    if struct_size < header_size || struct_size % core::mem::align_of::<RecordHeader>() != 0 {
        return Err(rejected(BlockError::Corrupt("struct_size")));
    }
    if struct_size > bytes.len() {
        return Err(rejected(BlockError::TooSmall {
            required: struct_size,
            provided: bytes.len(),
        }));
    }
    if displacement == 0 {
        return Ok(BlockInfo {
            struct_size,
            used_space: struct_size,
            capacity: struct_size,
            has_arena: false,
        });
    }
    // The arena pointer is the second header word, at offset 4.
    if displacement as i64 != struct_size as i64 - 4 {
        return Err(rejected(BlockError::Corrupt("arena offset")));
    }
    if bytes.len() < struct_size + ARENA_HEADER_SIZE {
        return Err(rejected(BlockError::TooSmall {
            required: struct_size + ARENA_HEADER_SIZE,
            provided: bytes.len(),
        }));
    }
    let capacity = read_u32(bytes, struct_size) as usize;
    let used = read_u32(bytes, struct_size + 4) as usize;
    if used < ARENA_HEADER_SIZE || used > capacity {
        return Err(rejected(BlockError::Corrupt("arena used_space")));
    }
    let used_space = struct_size + used;
    if used_space > bytes.len() {
        return Err(rejected(BlockError::TooSmall {
            required: used_space,
            provided: bytes.len(),
        }));
    }
    Ok(BlockInfo {
        struct_size,
        used_space,
        capacity: struct_size + capacity,
        has_arena: true,
    })
}

fn check_align(ptr: *const u8) -> Result<(), BlockError> {
    if ptr as usize % BLOCK_ALIGN != 0 {
        return Err(rejected(BlockError::Misaligned { align: BLOCK_ALIGN }));
    }
    Ok(())
}

fn check_fits<S>(len: usize) -> Result<(), BlockError> {
    let required = core::mem::size_of::<S>();
    if len < required {
        return Err(rejected(BlockError::TooSmall {
            required,
            provided: len,
        }));
    }
    Ok(())
}

/// Rewrites the arena capacity of the block at `base` to fill `len` bytes.
///
/// # Safety
///
/// `base` must be valid for writes of `len` bytes and hold a block described
/// by `info`, with `info.used_space <= len`.
pub(crate) unsafe fn set_block_len(base: *mut u8, info: &BlockInfo, len: usize) -> Result<(), BlockError> {
    if len > u32::MAX as usize {
        return Err(rejected(BlockError::TooLarge(len)));
    }
    if info.has_arena {
        let capacity = base.add(info.struct_size) as *mut u32;
        capacity.write((len - info.struct_size) as u32);
    }
    Ok(())
}

/// Zero-fills `buf` and builds an empty `S` in it, with the rest of the
/// buffer as the arena.
///
/// A buffer of exactly `size_of::<S>()` bytes gives a record without an
/// arena.
pub fn init_in<S: Record>(buf: &mut [u8]) -> Result<Pin<&mut S>, BlockError> {
    check_align(buf.as_ptr())?;
    let free = free_space_for::<S>(buf.len())?;
    buf.fill(0);
    let ptr = NonNull::from(buf).cast::<S>();
    // Safety: aligned, zeroed, and `size_of::<S>() + free` bytes long.
    unsafe {
        init_block(ptr, free);
        Ok(Pin::new_unchecked(&mut *ptr.as_ptr()))
    }
}

/// Reinterprets a stored block in place, read-only.
///
/// `bytes` must cover the block's whole recorded capacity; to load a block
/// persisted as its used prefix only, use [`from_bytes_mut`] or
/// [`RecordBox::from_bytes`](crate::RecordBox::from_bytes).
///
/// # Safety
///
/// The headers are validated, but field contents are not: `bytes` must hold
/// a block that was built as an `S` (or an older version of it) by this
/// crate.
///
/// For a block built by an older version, the fields it lacks overlap its
/// arena. Do not read or write any field for which
/// [`has_member`](Record::has_member) is false.
pub unsafe fn from_bytes<S: Record>(bytes: &[u8]) -> Result<&S, BlockError> {
    check_align(bytes.as_ptr())?;
    check_fits::<S>(bytes.len())?;
    let info = inspect(bytes)?;
    if info.capacity > bytes.len() {
        return Err(rejected(BlockError::TooSmall {
            required: info.capacity,
            provided: bytes.len(),
        }));
    }
    Ok(&*(bytes.as_ptr() as *const S))
}

/// Reinterprets a stored block in place, and takes over the whole buffer as
/// its capacity.
///
/// # Safety
///
/// As for [`from_bytes`].
pub unsafe fn from_bytes_mut<S: Record>(bytes: &mut [u8]) -> Result<Pin<&mut S>, BlockError> {
    check_align(bytes.as_ptr())?;
    check_fits::<S>(bytes.len())?;
    let info = inspect(bytes)?;
    let base = bytes.as_mut_ptr();
    set_block_len(base, &info, bytes.len())?;
    Ok(Pin::new_unchecked(&mut *(base as *mut S)))
}

/// Builds an empty `S` with `capacity` bytes of block in a bump arena.
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "bumpalo")]
/// # mod demo {
/// use relrec::prelude::*;
///
/// #[define_record]
/// pub struct Tally {
///     pub counts: Vector<u64>,
/// }
/// # pub fn run() {
/// let bump = bumpalo::Bump::new();
/// let mut tally = relrec::placement::new_in::<Tally>(64, &bump).unwrap();
/// assert_eq!(tally.capacity(), 64);
/// let (arena, fields) = tally.as_mut().split();
/// fields.counts.assign(arena.unwrap().create_vector(2).unwrap());
/// assert_eq!(tally.counts.as_slice(), &[0, 0]);
/// # }
/// # }
/// # fn main() {
/// # #[cfg(feature = "bumpalo")]
/// # demo::run();
/// # }
/// ```
#[cfg(feature = "bumpalo")]
pub fn new_in<S: Record>(capacity: usize, bump: &bumpalo::Bump) -> Result<Pin<&mut S>, BlockError> {
    let free = free_space_for::<S>(capacity)?;
    let layout = core::alloc::Layout::from_size_align(capacity, BLOCK_ALIGN)
        .map_err(|_| BlockError::TooLarge(capacity))?;
    let ptr = bump.alloc_layout(layout);
    // Safety: fresh allocation of `capacity` bytes, aligned to BLOCK_ALIGN.
    unsafe {
        ptr.as_ptr().write_bytes(0, capacity);
        let ptr = ptr.cast::<S>();
        init_block(ptr, free);
        Ok(Pin::new_unchecked(&mut *ptr.as_ptr()))
    }
}
