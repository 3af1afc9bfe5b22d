#![doc = crate::doc_macro::make_svgbobdoc!(
//! The bump allocator embedded in a record block.
//!
//! A block with an arena is laid out as the record's fixed fields, then the
//! [`ArenaHeader`], then the storage dispensed so far, then free space:
//!
//! ```svgbob
//!  0              struct_size
//!  |              |
//!  v              v
//! +--------------+----------+-------------------+--------------------+
//! | "fixed part" | "header" | "dispensed bytes" | "free space"       |
//! +--------------+----------+-------------------+--------------------+
//!                 |<--------- used_space ------>|
//!                 |<-------------------- capacity ------------------>|
//! ```
//!
//! Storage is never reclaimed: `used_space` only grows. Carve operations
//! return [`Carved`], [`ListContent`], [`StrContent`] or [`WStrContent`]
//! results that the caller commits into a container field of the same block.
)]

use crate::array::Array;
use crate::carve::{Carved, ListContent, StrContent, WStrContent};
use crate::error::CapacityError;
use crate::list::List;
use crate::macro_support::AlignCheck;
use crate::map::Pair;
use crate::Plain;
use core::marker::PhantomData;
use core::pin::Pin;
use core::ptr::NonNull;

/// Size in bytes of [`ArenaHeader`].
pub const ARENA_HEADER_SIZE: usize = core::mem::size_of::<ArenaHeader>();

/// The in-block bookkeeping of an arena.
///
/// Both counts include the header itself, so a fresh arena has
/// `used_space == ARENA_HEADER_SIZE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct ArenaHeader {
    /// Bytes reserved for the arena, header included.
    pub capacity: u32,
    /// Bytes dispensed so far, header included.
    pub used_space: u32,
}

impl ArenaHeader {
    pub(crate) fn new(capacity: u32) -> Self {
        ArenaHeader {
            capacity,
            used_space: ARENA_HEADER_SIZE as u32,
        }
    }
}

unsafe impl Plain for ArenaHeader {}

/// The address range of one block.
///
/// Carve results remember the span of the block they came from, so they can
/// only be committed into fields of that block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockSpan {
    start: usize,
    end: usize,
}

impl BlockSpan {
    pub(crate) fn new(start: *const u8, len: usize) -> Self {
        let start = start as usize;
        BlockSpan {
            start,
            end: start.wrapping_add(len),
        }
    }

    /// Whether `addr` lies inside the block.
    pub fn contains(&self, addr: *const u8) -> bool {
        let addr = addr as usize;
        self.start <= addr && addr < self.end
    }

    /// Length of the block in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the block has no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub(crate) fn check(&self, addr: *const u8) {
        if !self.contains(addr) {
            crate::error::cross_block_reference()
        }
    }
}

/// Exclusive handle to the arena of one block.
///
/// Obtained from [`Record::arena`](crate::Record::arena) or from the `split`
/// method that `#[define_record]` generates.
///
/// # Examples
///
/// ```
/// use relrec::prelude::*;
///
/// #[define_record]
/// pub struct Counter {
///     pub values: Vector<u32>,
/// }
/// # fn main() {
/// let mut rec = RecordBox::<Counter>::new(128).unwrap();
/// let (arena, fields) = rec.as_mut().split();
/// let mut arena = arena.unwrap();
/// let before = arena.used_space();
/// let mut values = arena.create_vector::<u32>(3).unwrap();
/// values.as_mut_slice().copy_from_slice(&[1, 2, 3]);
/// fields.values.assign(values);
/// assert_eq!(arena.used_space(), before + 12);
/// assert_eq!(rec.values.as_slice(), &[1, 2, 3]);
/// # }
/// ```
pub struct Arena<'a> {
    header: NonNull<ArenaHeader>,
    span: BlockSpan,
    _block: PhantomData<&'a mut [u8]>,
}

impl<'a> Arena<'a> {
    /// # Safety
    ///
    /// `header` must be an exclusively borrowed arena header at the start of
    /// `header.capacity` bytes of block storage, and `span` must cover it.
    pub(crate) unsafe fn from_raw(header: NonNull<ArenaHeader>, span: BlockSpan) -> Self {
        Arena {
            header,
            span,
            _block: PhantomData,
        }
    }

    fn header(&self) -> &ArenaHeader {
        // Safety: guaranteed by from_raw.
        unsafe { self.header.as_ref() }
    }

    /// Bytes reserved for this arena, header included.
    pub fn capacity(&self) -> usize {
        self.header().capacity as usize
    }

    /// Bytes dispensed so far, header included.
    pub fn used_space(&self) -> usize {
        self.header().used_space as usize
    }

    /// Bytes still available for carving.
    pub fn available(&self) -> usize {
        self.capacity().saturating_sub(self.used_space())
    }

    /// The address range of the block this arena belongs to.
    pub fn span(&self) -> BlockSpan {
        self.span
    }

    /// Reserves zero-filled storage for `count` values of `T`.
    ///
    /// Returns `None` when `count` is zero or when the arena cannot fit the
    /// request; `used_space` is unchanged in both cases. Padding is inserted
    /// to reach `T`'s alignment. The values are not initialized beyond
    /// zero-filling; see [`Arena::create`].
    pub fn allocate<T: Plain>(&mut self, count: usize) -> Option<NonNull<T>> {
        let () = AlignCheck::<T>::OK;
        if count == 0 {
            return None;
        }
        let base = self.header.as_ptr() as *mut u8;
        let used = self.used_space();
        let available = self.available();
        let pad = (base as usize).wrapping_add(used).wrapping_neg() & (core::mem::align_of::<T>() - 1);
        let required = core::mem::size_of::<T>()
            .checked_mul(count)
            .and_then(|size| size.checked_add(pad));
        let required = match required {
            Some(required) if required <= available => required,
            _ => {
                tracing::debug!(
                    ty = core::any::type_name::<T>(),
                    count,
                    available,
                    "arena exhausted"
                );
                return None;
            }
        };
        // Safety: [used + pad, used + required) lies within capacity, which
        // the block owns exclusively through this handle.
        unsafe {
            let ptr = base.add(used + pad);
            ptr.write_bytes(0, required - pad);
            (*self.header.as_ptr()).used_space = (used + required) as u32;
            Some(NonNull::new_unchecked(ptr as *mut T))
        }
    }

    fn exhausted<T>(&self, count: usize) -> CapacityError {
        CapacityError {
            required: core::mem::size_of::<T>().saturating_mul(count),
            available: self.available(),
        }
    }

    /// Carves `count` values of `T` and runs each value's
    /// [`init_zeroed`](Plain::init_zeroed).
    ///
    /// A `count` of zero succeeds with an empty result.
    pub fn create<T: Plain>(&mut self, count: usize) -> Result<Carved<'a, T>, CapacityError> {
        if count == 0 {
            return Ok(Carved::empty(self.span));
        }
        let len = u32::try_from(count).map_err(|_| self.exhausted::<T>(count))?;
        let ptr = self
            .allocate::<T>(count)
            .ok_or_else(|| self.exhausted::<T>(count))?;
        for i in 0..count {
            // Safety: freshly carved, zero-filled and not yet shared.
            unsafe { T::init_zeroed(Pin::new_unchecked(&mut *ptr.as_ptr().add(i))) };
        }
        // Safety: `len` values of `T` starting at `ptr`, owned by the block.
        Ok(unsafe { Carved::from_raw(ptr, len, self.span) })
    }

    /// Carves one [`Array<T, N>`] with initialized elements.
    pub fn create_array<T: Plain, const N: usize>(
        &mut self,
    ) -> Result<Carved<'a, Array<T, N>>, CapacityError> {
        self.create::<Array<T, N>>(1)
    }

    /// Carves a chain of `size` list nodes and values.
    ///
    /// The first value is stored in the content itself, so `size - 1` nodes
    /// are carved. On exhaustion, nothing committed to the list changes, but
    /// the partially carved storage is not reclaimed.
    pub fn create_list<T: Plain>(&mut self, size: usize) -> Result<ListContent<'a, T>, CapacityError> {
        if size == 0 {
            return Ok(ListContent::empty(self.span));
        }
        let size32 = u32::try_from(size).map_err(|_| self.exhausted::<T>(size))?;
        let first = self.create::<T>(1)?.into_raw();
        let mut next: *mut List<T> = core::ptr::null_mut();
        let mut tail: *mut List<T> = core::ptr::null_mut();
        for i in 1..size32 {
            let node = self.create::<List<T>>(1)?.into_raw();
            let value = self.create::<T>(1)?.into_raw();
            // Safety: node and value are freshly carved from this block.
            unsafe {
                let n = &mut *node;
                n.size = size32 - i;
                n.value.store(value);
                if tail.is_null() {
                    next = node;
                } else {
                    (*tail).next.store(node);
                }
            }
            tail = node;
        }
        // Safety: the chain was carved from this block just above.
        Ok(unsafe { ListContent::from_raw(size32, first, next, self.span) })
    }

    /// Carves `size` initialized elements for a [`Vector<T>`](crate::Vector).
    pub fn create_vector<T: Plain>(&mut self, size: usize) -> Result<Carved<'a, T>, CapacityError> {
        self.create::<T>(size)
    }

    /// Carves `size` key/value pairs for a [`Map<K, V>`](crate::Map).
    pub fn create_map<K: Plain, V: Plain>(
        &mut self,
        size: usize,
    ) -> Result<Carved<'a, Pair<K, V>>, CapacityError> {
        self.create::<Pair<K, V>>(size)
    }

    /// Copies `s` into the arena as a NUL-terminated byte string.
    ///
    /// # Examples
    ///
    /// ```
    /// use relrec::prelude::*;
    ///
    /// #[define_record]
    /// pub struct Named {
    ///     pub name: Str,
    /// }
    /// # fn main() {
    /// let mut rec = RecordBox::<Named>::new(64).unwrap();
    /// let (arena, fields) = rec.as_mut().split();
    /// let s = arena.unwrap().create_string("gong").unwrap();
    /// fields.name.assign(s);
    /// assert_eq!(rec.name.as_str(), "gong");
    /// # }
    /// ```
    pub fn create_string(&mut self, s: &str) -> Result<StrContent<'a>, CapacityError> {
        let bytes = s.as_bytes();
        let ptr = self
            .allocate::<u8>(bytes.len() + 1)
            .ok_or_else(|| self.exhausted::<u8>(bytes.len() + 1))?;
        // Safety: len + 1 zeroed bytes were carved; the last stays NUL.
        unsafe {
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
            Ok(StrContent::from_raw(ptr, self.span))
        }
    }

    /// Copies `s` into the arena as NUL-terminated UTF-16.
    pub fn create_wstring(&mut self, s: &str) -> Result<WStrContent<'a>, CapacityError> {
        let len = s.encode_utf16().count();
        let ptr = self
            .allocate::<u16>(len + 1)
            .ok_or_else(|| self.exhausted::<u16>(len + 1))?;
        // Safety: len + 1 zeroed units were carved; the last stays NUL.
        unsafe {
            for (i, unit) in s.encode_utf16().enumerate() {
                ptr.as_ptr().add(i).write(unit);
            }
            Ok(WStrContent::from_raw(ptr, self.span))
        }
    }
}

impl core::fmt::Debug for Arena<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity())
            .field("used_space", &self.used_space())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_type::Sample;
    use crate::{Record, RecordBox};
    use proptest::prelude::*;

    #[test]
    fn fresh_arena_counts_its_header() {
        let mut rec = RecordBox::<Sample>::new(Sample::SIZE + 64).unwrap();
        let arena = rec.as_mut().arena().unwrap();
        assert_eq!(arena.capacity(), 64);
        assert_eq!(arena.used_space(), super::ARENA_HEADER_SIZE);
        assert_eq!(arena.available(), 56);
    }

    #[test]
    fn allocate_zero_is_none() {
        let mut rec = RecordBox::<Sample>::new(Sample::SIZE + 64).unwrap();
        let mut arena = rec.as_mut().arena().unwrap();
        assert!(arena.allocate::<u32>(0).is_none());
        assert_eq!(arena.used_space(), 8);
    }

    #[test]
    fn exhaustion_leaves_used_space() {
        let mut rec = RecordBox::<Sample>::new(Sample::SIZE + 24).unwrap();
        let mut arena = rec.as_mut().arena().unwrap();
        assert!(arena.allocate::<u64>(2).is_some());
        assert_eq!(arena.used_space(), 24);
        assert!(arena.allocate::<u8>(1).is_none());
        assert_eq!(arena.used_space(), 24);
        let err = arena.create::<u32>(1).unwrap_err();
        assert_eq!(err.required, 4);
        assert_eq!(err.available, 0);
    }

    #[test]
    fn padding_reaches_natural_alignment() {
        let mut rec = RecordBox::<Sample>::new(Sample::SIZE + 64).unwrap();
        let mut arena = rec.as_mut().arena().unwrap();
        let a = arena.allocate::<u8>(1).unwrap();
        let b = arena.allocate::<u64>(1).unwrap();
        assert_eq!(b.as_ptr() as usize % 8, 0);
        assert!(b.as_ptr() as usize > a.as_ptr() as usize);
        assert_eq!(arena.used_space(), 24);
    }

    #[test]
    fn allocations_are_zeroed_and_disjoint() {
        let mut rec = RecordBox::<Sample>::new(Sample::SIZE + 64).unwrap();
        let mut arena = rec.as_mut().arena().unwrap();
        let a = arena.create::<u32>(4).unwrap();
        let b = arena.create::<u32>(4).unwrap();
        assert_eq!(a.as_slice(), &[0; 4]);
        assert_eq!(b.as_slice(), &[0; 4]);
        assert_eq!(a.as_ptr() as usize + 16, b.as_ptr() as usize);
    }

    #[test]
    fn list_chain_has_descending_sizes() {
        let mut rec = RecordBox::<Sample>::new(Sample::SIZE + 256).unwrap();
        let mut arena = rec.as_mut().arena().unwrap();
        let list = arena.create_list::<u16>(3).unwrap();
        assert_eq!(list.len(), 3);
        let sizes: Vec<u32> = list.node_sizes().collect();
        assert_eq!(sizes, vec![3, 2, 1]);
    }

    #[test]
    fn wide_string_is_utf16() {
        let mut rec = RecordBox::<Sample>::new(Sample::SIZE + 64).unwrap();
        let mut arena = rec.as_mut().arena().unwrap();
        let s = arena.create_wstring("añ€").unwrap();
        assert_eq!(s.units(), &[0x61, 0xf1, 0x20ac]);
        assert_eq!(arena.used_space(), 8 + 8);
    }

    fn carve_one(arena: &mut super::Arena<'_>, width: u8, count: usize) -> Option<(usize, usize)> {
        let addr = match width {
            0 => arena.allocate::<u8>(count)?.as_ptr() as usize,
            1 => arena.allocate::<u16>(count)?.as_ptr() as usize,
            2 => arena.allocate::<u32>(count)?.as_ptr() as usize,
            _ => arena.allocate::<u64>(count)?.as_ptr() as usize,
        };
        Some((addr, 1 << width.min(3)))
    }

    proptest! {
        #[test]
        fn used_space_only_grows(
            requests in proptest::collection::vec((0u8..4, 0usize..12), 0..40),
        ) {
            let mut rec = RecordBox::<Sample>::new(Sample::SIZE + 160).unwrap();
            let mut arena = rec.as_mut().arena().unwrap();
            let mut last_end = 0usize;
            for (width, count) in requests {
                let before = arena.used_space();
                match carve_one(&mut arena, width, count) {
                    Some((addr, size)) => {
                        prop_assert_eq!(addr % size, 0);
                        prop_assert!(addr >= last_end);
                        prop_assert!(arena.used_space() >= before + size * count);
                        last_end = addr + size * count;
                    }
                    None => prop_assert_eq!(arena.used_space(), before),
                }
                prop_assert!(arena.used_space() <= arena.capacity());
            }
        }
    }
}
