//! Heap-allocated record blocks.
//!
//! # Examples
//!
//! ```
//! use relrec::prelude::*;
//!
//! #[define_record]
//! pub struct Message {
//!     pub id: u64,
//!     pub body: Str,
//! }
//! # fn main() {
//! let mut msg = RecordBox::<Message>::new(64).unwrap();
//! let (arena, mut fields) = msg.as_mut().split();
//! fields.id.set(7);
//! fields.body.assign(arena.unwrap().create_string("hi").unwrap());
//!
//! let copy = RecordBox::new_copy(&msg).unwrap();
//! assert_eq!(copy.capacity(), msg.used_space());
//! assert_eq!(copy.id, 7);
//! assert_eq!(copy.body, "hi");
//! # }
//! ```

use crate::error::{BlockError, CapacityError};
use crate::macro_support::{free_space_for, init_block};
use crate::placement::{inspect, set_block_len};
use crate::record::Record;
use crate::BLOCK_ALIGN;
use core::alloc::Layout;
use core::pin::Pin;
use core::ptr::NonNull;

/// A record block on the heap, freed as one unit when dropped.
pub struct RecordBox<S: Record> {
    ptr: NonNull<S>,
    size: usize,
}

// Safety: RecordBox owns its block exclusively.
unsafe impl<S: Record + Send> Send for RecordBox<S> {}
unsafe impl<S: Record + Sync> Sync for RecordBox<S> {}

fn block_layout(size: usize) -> Result<Layout, BlockError> {
    Layout::from_size_align(size, BLOCK_ALIGN).map_err(|_| BlockError::TooLarge(size))
}

fn alloc_block(layout: Layout) -> NonNull<u8> {
    // Safety: layout size is nonzero, every record has a header.
    let p = unsafe { std::alloc::alloc_zeroed(layout) };
    match NonNull::new(p) {
        Some(p) => p,
        None => std::alloc::handle_alloc_error(layout),
    }
}

impl<S: Record> RecordBox<S> {
    /// Allocates a zeroed block of `capacity` bytes and builds an empty `S`
    /// at its start. Whatever `S` leaves over becomes the arena.
    pub fn new(capacity: usize) -> Result<Self, BlockError> {
        let free = free_space_for::<S>(capacity)?;
        let layout = block_layout(capacity)?;
        let ptr = alloc_block(layout).cast::<S>();
        // Safety: fresh, zeroed, aligned allocation of `capacity` bytes.
        unsafe { init_block(ptr, free) };
        Ok(RecordBox {
            ptr,
            size: capacity,
        })
    }

    /// Copies `src` into a new block of exactly `src.used_space()` bytes.
    ///
    /// The copy has no free space left in its arena.
    pub fn new_copy(src: &RecordBox<S>) -> Result<Self, BlockError> {
        // Safety: `src` leads its own block, so its used bytes form a valid
        // block of `S`.
        unsafe { Self::from_bytes(src.as_bytes()) }
    }

    /// Overwrites this block with the used bytes of `src`, keeping this
    /// block's capacity.
    ///
    /// Fails without touching `self` when `src.used_space()` exceeds this
    /// block's capacity.
    pub fn copy_from(&mut self, src: &RecordBox<S>) -> Result<(), CapacityError> {
        // Safety: both records lead their own heap blocks.
        unsafe { Record::copy_from(self.as_mut(), src) }
    }

    /// Loads a stored block into a new heap block of `bytes.len()` bytes.
    ///
    /// `bytes` may be just the used prefix of the stored block (see
    /// [`RecordBox::as_bytes`]); the loaded record's arena capacity is set
    /// from the new block's size.
    ///
    /// # Safety
    ///
    /// Headers are validated, field contents are not: `bytes` must hold a
    /// block built as an `S` (or an older version of it) by this crate.
    ///
    /// For a block built by an older version, the fields it lacks overlap
    /// its arena. Do not read or write any field for which
    /// [`has_member`](Record::has_member) is false, nor anything that reads
    /// every field, such as a derived `Debug`.
    pub unsafe fn from_bytes(bytes: &[u8]) -> Result<Self, BlockError> {
        Self::from_bytes_with_capacity(bytes, bytes.len())
    }

    /// Like [`RecordBox::from_bytes`], with room to grow: the new block is
    /// `capacity` bytes long.
    ///
    /// # Safety
    ///
    /// As for [`RecordBox::from_bytes`].
    pub unsafe fn from_bytes_with_capacity(bytes: &[u8], capacity: usize) -> Result<Self, BlockError> {
        let info = inspect(bytes)?;
        let size = capacity.max(info.used_space).max(core::mem::size_of::<S>());
        let layout = block_layout(size)?;
        let base = alloc_block(layout);
        core::ptr::copy_nonoverlapping(bytes.as_ptr(), base.as_ptr(), info.used_space);
        if let Err(err) = set_block_len(base.as_ptr(), &info, size) {
            std::alloc::dealloc(base.as_ptr(), layout);
            return Err(err);
        }
        Ok(RecordBox {
            ptr: base.cast(),
            size,
        })
    }

    /// Mutable access to the record.
    pub fn as_mut(&mut self) -> Pin<&mut S> {
        // Safety: the block never moves while boxed.
        unsafe { Pin::new_unchecked(self.ptr.as_mut()) }
    }

    /// The used prefix of the block, for persisting.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.used_space().min(self.size);
        // Safety: the block owns `size` initialized bytes.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr() as *const u8, len) }
    }
}

impl<S: Record> core::ops::Deref for RecordBox<S> {
    type Target = S;

    #[inline]
    fn deref(&self) -> &S {
        // Safety: initialized in every constructor.
        unsafe { self.ptr.as_ref() }
    }
}

impl<S: Record + core::fmt::Debug> core::fmt::Debug for RecordBox<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&**self, f)
    }
}

impl<S: Record> Drop for RecordBox<S> {
    fn drop(&mut self) {
        // Safety: allocated with this layout; records have no drop glue.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.size, BLOCK_ALIGN);
            std::alloc::dealloc(self.ptr.as_ptr() as *mut u8, layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_type::Sample;

    #[test]
    fn too_small_for_fixed_part() {
        assert_eq!(
            RecordBox::<Sample>::new(Sample::SIZE - 1).unwrap_err(),
            BlockError::TooSmall {
                required: Sample::SIZE,
                provided: Sample::SIZE - 1
            }
        );
        assert_eq!(
            RecordBox::<Sample>::new(usize::MAX).unwrap_err(),
            BlockError::TooLarge(usize::MAX)
        );
    }

    #[test]
    fn bytes_round_trip_into_larger_block() {
        let mut rec = RecordBox::<Sample>::new(Sample::SIZE + 64).unwrap();
        {
            let (arena, mut fields) = Sample::split(rec.as_mut());
            fields.id.set(99);
            fields.name.assign(arena.unwrap().create_string("boxed").unwrap());
        }
        let bytes = rec.as_bytes().to_vec();
        assert_eq!(bytes.len(), rec.used_space());
        let loaded = unsafe { RecordBox::<Sample>::from_bytes_with_capacity(&bytes, 512) }.unwrap();
        assert_eq!(loaded.capacity(), 512);
        assert_eq!(loaded.used_space(), rec.used_space());
        assert_eq!(loaded.id, 99);
        assert_eq!(loaded.name, "boxed");
    }

    #[test]
    fn copy_is_exactly_used_space() {
        let mut rec = RecordBox::<Sample>::new(Sample::SIZE + 64).unwrap();
        {
            let (arena, fields) = Sample::split(rec.as_mut());
            fields.name.assign(arena.unwrap().create_string("x").unwrap());
        }
        let mut copy = RecordBox::new_copy(&rec).unwrap();
        assert_eq!(copy.capacity(), copy.used_space());
        assert_eq!(copy.name, rec.name);
        let mut arena = copy.as_mut().arena().unwrap();
        assert_eq!(arena.available(), 0);
        assert!(arena.create_string("").is_err());
    }
}
