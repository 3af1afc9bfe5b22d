//! Helpers called from code generated by `#[define_record]`, and shared by the
//! block constructors. Not part of the stable API.

use crate::arena::{Arena, ArenaHeader, BlockSpan, ARENA_HEADER_SIZE};
use crate::record::{Record, RecordHeader};
use crate::BLOCK_ALIGN;
use core::marker::PhantomData;
use core::pin::Pin;
use core::ptr::NonNull;

/// Compile-time check that `T` can be placed in a block.
pub struct AlignCheck<T>(PhantomData<T>);

impl<T> AlignCheck<T> {
    pub const OK: () = assert!(
        core::mem::align_of::<T>() <= BLOCK_ALIGN,
        "types stored in a record block must not be aligned above BLOCK_ALIGN"
    );
}

/// Compile-time size of a record's fixed portion.
pub struct RecordLayout<S>(PhantomData<S>);

impl<S> RecordLayout<S> {
    pub const STRUCT_SIZE: u32 = {
        let () = AlignCheck::<S>::OK;
        let size = core::mem::size_of::<S>();
        assert!(size <= u32::MAX as usize, "record too large");
        size as u32
    };
}

/// Records `struct_size` for `S`. The arena pointer is left null.
#[inline]
pub fn init_header<S: Record>(header: Pin<&mut RecordHeader>) {
    // Safety: RecordHeader is Unpin apart from its arena pointer, which we
    // only overwrite in place.
    let header = unsafe { header.get_unchecked_mut() };
    header.struct_size = RecordLayout::<S>::STRUCT_SIZE;
}

/// Builds the arena handle of the record at `base`.
///
/// # Safety
///
/// `base` must point to an initialized record that is exclusively borrowed
/// for `'a`, and whose block extends `capacity()` bytes from `base`.
pub unsafe fn arena_of<'a, S: Record>(base: *mut S) -> Option<Arena<'a>> {
    let header = &*(base as *const RecordHeader);
    if header.arena.is_null() {
        return None;
    }
    let struct_size = header.struct_size as usize;
    // Derived from `base` rather than the stored displacement, so the arena
    // keeps the provenance of the whole block.
    let arena = (base as *mut u8).add(struct_size) as *mut ArenaHeader;
    debug_assert_eq!(arena as *const ArenaHeader, header.arena.as_ptr());
    let end = struct_size + (*arena).capacity as usize;
    let span = BlockSpan::new(base as *const u8, end);
    Some(Arena::from_raw(NonNull::new_unchecked(arena), span))
}

/// Initializes a zero-filled block: the record at `ptr`, followed by
/// `free_space` bytes of arena (or no arena when `free_space` is zero).
///
/// # Safety
///
/// `ptr` must be aligned to [`BLOCK_ALIGN`] and valid for writes of
/// `size_of::<S>() + free_space` zeroed bytes. `free_space` must be zero or
/// at least [`ARENA_HEADER_SIZE`], and the total must fit in a `u32`.
pub unsafe fn init_block<S: Record>(ptr: NonNull<S>, free_space: usize) {
    debug_assert!(free_space == 0 || free_space >= ARENA_HEADER_SIZE);
    S::init_zeroed(Pin::new_unchecked(&mut *ptr.as_ptr()));
    let header = &mut *(ptr.as_ptr() as *mut RecordHeader);
    if free_space > 0 {
        let arena = (ptr.as_ptr() as *mut u8).add(header.struct_size as usize) as *mut ArenaHeader;
        arena.write(ArenaHeader::new(free_space as u32));
        header.arena.store(arena);
    } else {
        header.arena.store(core::ptr::null());
    }
    tracing::trace!(
        record = core::any::type_name::<S>(),
        struct_size = header.struct_size,
        free_space,
        "initialized record block"
    );
}

/// Checks that a block of `capacity` bytes can hold `S` and an arena.
pub(crate) fn free_space_for<S>(capacity: usize) -> Result<usize, crate::BlockError> {
    let struct_size = RecordLayout::<S>::STRUCT_SIZE as usize;
    if capacity > u32::MAX as usize {
        return Err(crate::BlockError::TooLarge(capacity));
    }
    let free = match capacity.checked_sub(struct_size) {
        Some(free) => free,
        None => {
            return Err(crate::BlockError::TooSmall {
                required: struct_size,
                provided: capacity,
            })
        }
    };
    if free != 0 && free < ARENA_HEADER_SIZE {
        return Err(crate::BlockError::ArenaTooSmall(free));
    }
    Ok(free)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_space_bounds() {
        use crate::test_type::Sample;
        let size = core::mem::size_of::<Sample>();
        assert_eq!(free_space_for::<Sample>(size), Ok(0));
        assert_eq!(free_space_for::<Sample>(size + 100), Ok(100));
        assert_eq!(
            free_space_for::<Sample>(size + 4),
            Err(crate::BlockError::ArenaTooSmall(4))
        );
        assert_eq!(
            free_space_for::<Sample>(size - 1),
            Err(crate::BlockError::TooSmall {
                required: size,
                provided: size - 1
            })
        );
    }
}
