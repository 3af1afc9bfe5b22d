//! The record base: the header every record starts with, and the operations
//! every record supports.

use crate::arena::{Arena, ArenaHeader, BlockSpan};
use crate::error::CapacityError;
use crate::offset_ptr::OffsetPtr;
use crate::Plain;
use core::fmt;
use core::pin::Pin;

/// The leading field of every record.
///
/// `#[define_record]` inserts it as a hidden first field.
#[repr(C)]
pub struct RecordHeader {
    pub(crate) struct_size: u32,
    pub(crate) arena: OffsetPtr<ArenaHeader>,
}

unsafe impl Plain for RecordHeader {}

impl RecordHeader {
    /// Size of the record's fixed portion, as recorded at construction.
    pub fn struct_size(&self) -> usize {
        self.struct_size as usize
    }

    /// The block's arena header, if the block has an arena.
    pub fn arena(&self) -> Option<&ArenaHeader> {
        // Safety: set only by init_block, to the arena of the same block.
        unsafe { self.arena.as_ref() }
    }
}

/// Headers compare equal when they describe blocks of the same shape.
impl PartialEq for RecordHeader {
    fn eq(&self, other: &Self) -> bool {
        self.struct_size == other.struct_size && self.arena.is_null() == other.arena.is_null()
    }
}

impl fmt::Debug for RecordHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordHeader")
            .field("struct_size", &self.struct_size)
            .field("arena", &self.arena())
            .finish()
    }
}

/// A relocatable record: a fixed-size struct whose first field is a
/// [`RecordHeader`], optionally followed in the same block by an arena.
///
/// Use `#[define_record]` rather than implementing this by hand.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` with a [`RecordHeader`] as their first
/// field, and their `init_zeroed` must record `size_of::<Self>()` in it (see
/// `macro_support::init_header`).
///
/// # Examples
///
/// ```
/// use relrec::prelude::*;
///
/// #[define_record]
/// pub struct Settings {
///     pub version: u32,
///     pub title: Str,
/// }
/// # fn main() {
/// let mut rec = RecordBox::<Settings>::new(100).unwrap();
/// assert_eq!(rec.struct_size(), std::mem::size_of::<Settings>());
/// assert_eq!(rec.capacity(), 100);
/// assert_eq!(rec.used_space(), rec.struct_size() + 8);
///
/// let (arena, fields) = rec.as_mut().split();
/// fields.title.assign(arena.unwrap().create_string("hello").unwrap());
/// assert_eq!(rec.used_space(), rec.struct_size() + 8 + 6);
/// # }
/// ```
pub unsafe trait Record: Plain {
    /// The record's header.
    fn header(&self) -> &RecordHeader {
        // Safety: the header is the first field.
        unsafe { &*(self as *const Self as *const RecordHeader) }
    }

    /// Size of the fixed portion when this block was built.
    ///
    /// A block written by an older definition of the type reports a smaller
    /// size than `size_of::<Self>()`.
    fn struct_size(&self) -> usize {
        self.header().struct_size()
    }

    /// Total size of the block: fixed portion plus arena.
    fn capacity(&self) -> usize {
        self.struct_size() + self.header().arena().map_or(0, |a| a.capacity as usize)
    }

    /// Bytes of the block in use: fixed portion plus dispensed arena bytes.
    fn used_space(&self) -> usize {
        self.struct_size() + self.header().arena().map_or(0, |a| a.used_space as usize)
    }

    /// The address range of the whole block.
    fn span(&self) -> BlockSpan {
        BlockSpan::new(self as *const Self as *const u8, self.capacity())
    }

    /// Whether the field at `member` was part of the type when this block
    /// was built.
    ///
    /// # Examples
    ///
    /// ```
    /// use relrec::prelude::*;
    ///
    /// #[define_record]
    /// pub struct V1 {
    ///     pub a: u32,
    /// }
    ///
    /// #[define_record]
    /// pub struct V2 {
    ///     pub a: u32,
    ///     pub b: u64,
    /// }
    /// # fn main() {
    /// let old = RecordBox::<V1>::new(64).unwrap();
    /// // Reinterpret the old bytes with the newer definition.
    /// let new = unsafe { &*(&*old as *const V1 as *const V2) };
    /// assert!(new.has_member(std::ptr::addr_of!(new.a)));
    /// assert!(!new.has_member(std::ptr::addr_of!(new.b)));
    /// # }
    /// ```
    fn has_member<M>(&self, member: *const M) -> bool {
        let offset = (member as usize).wrapping_sub(self as *const Self as usize);
        offset < self.struct_size()
    }

    /// Reinterprets the bytes at `offset` from the start of the block as a
    /// `T`.
    ///
    /// Returns `None` when `offset + size_of::<T>()` exceeds
    /// [`capacity`](Record::capacity) or the offset is not aligned for `T`.
    ///
    /// # Safety
    ///
    /// Bounds and alignment are checked, contents are not. When `T` holds
    /// offset pointers (a container, a string, a record), the bytes at
    /// `offset` must be a `T` built in this block, so that every pointer in
    /// it resolves inside the block. Any bytes are a valid scalar or array of
    /// scalars.
    ///
    /// # Examples
    ///
    /// ```
    /// use relrec::prelude::*;
    ///
    /// #[define_record]
    /// pub struct Point {
    ///     pub x: u32,
    ///     pub y: u32,
    /// }
    /// # fn main() {
    /// let mut p = RecordBox::<Point>::new(32).unwrap();
    /// p.as_mut().muts().y.set(5);
    /// let y = unsafe { p.find::<u32>(12) };
    /// assert_eq!(y, Some(&5));
    /// # }
    /// ```
    ///
    /// Reading a container this way cannot be done from safe code, since its
    /// size and displacement could be forged from plain fields:
    ///
    /// ```compile_fail,E0133
    /// use relrec::prelude::*;
    ///
    /// #[define_record]
    /// pub struct Forged {
    ///     pub raw: u64,
    ///     pub values: Vector<u32>,
    /// }
    /// # fn main() {
    /// let rec = RecordBox::<Forged>::new(64).unwrap();
    /// let values = rec.find::<Vector<u32>>(8);
    /// # let _ = values;
    /// # }
    /// ```
    unsafe fn find<T: Plain>(&self, offset: usize) -> Option<&T> {
        let end = offset.checked_add(core::mem::size_of::<T>())?;
        if end > self.capacity() {
            return None;
        }
        let ptr = (self as *const Self as *const u8).wrapping_add(offset);
        if ptr as usize % core::mem::align_of::<T>() != 0 {
            return None;
        }
        // Safety: in bounds and aligned; contents are up to the caller.
        Some(&*(ptr as *const T))
    }

    /// The block's arena, or `None` for a record built without free space.
    fn arena(self: Pin<&mut Self>) -> Option<Arena<'_>> {
        // Safety: exclusive borrow of the record, and with it the block.
        unsafe { crate::macro_support::arena_of::<Self>(self.get_unchecked_mut()) }
    }

    /// Overwrites this block with the used bytes of `src`.
    ///
    /// Fails without touching `self` when `self.capacity()` is smaller than
    /// `src.used_space()`. Afterwards every field equals the corresponding
    /// field of `src`, and the arena keeps this block's capacity.
    /// [`RecordBox::copy_from`](crate::RecordBox::copy_from) is the safe
    /// form for heap blocks.
    ///
    /// # Safety
    ///
    /// `src` and `self` must each be the leading record of their own block.
    /// A record nested in another block, such as an element of a
    /// `Vector<S>`, reports only its fixed portion as used space, while its
    /// containers point into the enclosing block; the copy would point out
    /// of `self`'s block.
    ///
    /// ```compile_fail,E0133
    /// use relrec::prelude::*;
    ///
    /// #[define_record]
    /// pub struct Leaf {
    ///     pub name: Str,
    /// }
    ///
    /// #[define_record]
    /// pub struct Tree {
    ///     pub leaves: Vector<Leaf>,
    /// }
    /// # fn main() {
    /// let mut tree = RecordBox::<Tree>::new(128).unwrap();
    /// let (arena, fields) = tree.as_mut().split();
    /// fields.leaves.assign(arena.unwrap().create_vector::<Leaf>(1).unwrap());
    /// let mut leaf = RecordBox::<Leaf>::new(64).unwrap();
    /// let _ = leaf.as_mut().copy_from(&tree.leaves[0]);
    /// # }
    /// ```
    unsafe fn copy_from(self: Pin<&mut Self>, src: &Self) -> Result<(), CapacityError> {
        let capacity = self.capacity();
        let required = src.used_space();
        if capacity < required {
            tracing::debug!(capacity, required, "rejected record copy");
            return Err(CapacityError {
                required,
                available: capacity,
            });
        }
        // Safety: `self` is exclusively borrowed and leads `capacity` bytes;
        // `src` cannot overlap it. Both lead their blocks, so offset pointers
        // stay valid under the copy.
        let base = self.get_unchecked_mut() as *mut Self as *mut u8;
        core::ptr::copy_nonoverlapping(src as *const Self as *const u8, base, required);
        let header = &mut *(base as *mut RecordHeader);
        if !header.arena.is_null() {
            let arena = base.add(header.struct_size as usize) as *mut ArenaHeader;
            (*arena).capacity = (capacity - header.struct_size as usize) as u32;
        }
        Ok(())
    }
}
