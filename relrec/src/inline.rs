//! A record and its arena as a single value.
//!
//! # Examples
//!
//! ```
//! use relrec::prelude::*;
//! use std::pin::pin;
//!
//! #[define_record]
//! pub struct Pairing {
//!     pub left: Str,
//!     pub right: Str,
//! }
//! # fn main() {
//! let mut rec = pin!(InlineRecord::<Pairing, 100>::new());
//! assert_eq!(rec.capacity(), std::mem::size_of::<Pairing>() + 100);
//! let (arena, fields) = rec.as_mut().record_mut().split();
//! let mut arena = arena.unwrap();
//! fields.left.assign(arena.create_string("salt").unwrap());
//! fields.right.assign(arena.create_string("pepper").unwrap());
//! assert_eq!(rec.right, "pepper");
//! # }
//! ```

use crate::arena::ARENA_HEADER_SIZE;
use crate::macro_support::init_block;
use crate::record::Record;
use core::pin::Pin;
use core::ptr::NonNull;

/// A block holding `S` followed by `FREE` bytes of arena.
///
/// `FREE` must be zero or at least the size of the arena header. Until it is
/// pinned, the whole value may be moved freely: every pointer in it is
/// relative.
#[repr(C, align(16))]
pub struct InlineRecord<S: Record, const FREE: usize> {
    record: S,
    _free: [u8; FREE],
}

impl<S: Record, const FREE: usize> InlineRecord<S, FREE> {
    const CHECK: () = {
        assert!(
            FREE == 0 || FREE >= ARENA_HEADER_SIZE,
            "free space too small for the arena header"
        );
        assert!(
            core::mem::size_of::<S>() + FREE <= u32::MAX as usize,
            "block exceeds the 32-bit capacity limit"
        );
    };

    /// Builds an empty record with a `FREE`-byte arena.
    pub fn new() -> Self {
        let () = Self::CHECK;
        // Safety: every field is Plain, so all-zero bytes are valid.
        let mut this: Self = unsafe { core::mem::zeroed() };
        // Safety: the record is at offset 0, and `free` directly follows it.
        unsafe { init_block(NonNull::from(&mut this).cast::<S>(), FREE) };
        this
    }

    /// Mutable access to the record.
    pub fn record_mut(self: Pin<&mut Self>) -> Pin<&mut S> {
        // Safety: projection to the first field.
        unsafe { self.map_unchecked_mut(|r| &mut r.record) }
    }

    /// The used prefix of the block, for persisting.
    pub fn as_bytes(&self) -> &[u8] {
        // Safety: the whole value is initialized bytes.
        unsafe {
            core::slice::from_raw_parts(self as *const Self as *const u8, self.record.used_space())
        }
    }
}

impl<S: Record, const FREE: usize> Default for InlineRecord<S, FREE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Record, const FREE: usize> core::ops::Deref for InlineRecord<S, FREE> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.record
    }
}
