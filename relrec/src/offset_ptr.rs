#![doc = crate::doc_macro::make_svgbobdoc!(
//! Self-relative pointers.
//!
//! An [`OffsetPtr<T>`] stores the signed byte distance from its own location
//! to its target. Moving the pointer and its target together (for example by
//! copying the whole block they live in) keeps it valid:
//!
//! ```svgbob
//!  block at 0x1000                         same bytes copied to 0x8000
//! +---------+--------+----------+          +---------+--------+----------+
//! | "+24"   |  ...   | "target" |          | "+24"   |  ...   | "target" |
//! +---------+--------+----------+          +---------+--------+----------+
//!  |                  ^                     |                  ^
//!  '------------------'                     '------------------'
//! ```
//!
//! A displacement of zero means null, so a pointer can never point to itself.
)]

use crate::arena::BlockSpan;
use crate::carve::Carved;
use core::fmt;
use core::marker::{PhantomData, PhantomPinned};
use core::pin::Pin;

/// A pointer to `T`, encoded relative to its own address.
///
/// The pointer is `!Unpin`: mutating it requires `Pin<&mut OffsetPtr<T>>`,
/// which stops safe code from moving a single pointer away from its block.
///
/// # Examples
///
/// ```
/// use relrec::OffsetPtr;
/// use std::pin::pin;
///
/// #[repr(C)]
/// struct Pair {
///     ptr: OffsetPtr<u32>,
///     value: u32,
/// }
///
/// let mut pair = pin!(Pair { ptr: OffsetPtr::null(), value: 7 });
/// let target: *const u32 = &pair.value;
/// let ptr = unsafe { pair.as_mut().map_unchecked_mut(|p| &mut p.ptr) };
/// ptr.set(target);
/// assert_eq!(pair.ptr.offset(), 4);
/// assert_eq!(pair.ptr.as_ptr(), target);
/// assert_eq!(unsafe { pair.ptr.as_ref() }, Some(&7));
/// ```
#[repr(C)]
pub struct OffsetPtr<T> {
    offset: i32,
    _target: PhantomData<*const T>,
    _pinned: PhantomPinned,
}

// Safety: the pointer is just an integer; access to the target follows the
// usual shared/exclusive rules of the block that contains both.
unsafe impl<T: Send> Send for OffsetPtr<T> {}
unsafe impl<T: Sync> Sync for OffsetPtr<T> {}

unsafe impl<T> crate::Plain for OffsetPtr<T> {}

impl<T> OffsetPtr<T> {
    /// The null pointer.
    ///
    /// # Examples
    ///
    /// ```
    /// use relrec::OffsetPtr;
    /// let p: OffsetPtr<u8> = OffsetPtr::null();
    /// assert!(p.is_null());
    /// assert!(p.as_ptr().is_null());
    /// ```
    pub const fn null() -> Self {
        OffsetPtr {
            offset: 0,
            _target: PhantomData,
            _pinned: PhantomPinned,
        }
    }

    /// The raw displacement, in bytes, from this pointer to its target.
    pub fn offset(&self) -> i32 {
        self.offset
    }

    /// Whether this is the null pointer.
    pub fn is_null(&self) -> bool {
        self.offset == 0
    }

    /// Resolves the pointer against its current address.
    ///
    /// Resolution never checks bounds; reading through the result is subject
    /// to the usual raw pointer rules.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        if self.offset == 0 {
            return core::ptr::null();
        }
        (self as *const Self)
            .cast::<u8>()
            .wrapping_offset(self.offset as isize)
            .cast::<T>()
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut T {
        if self.offset == 0 {
            return core::ptr::null_mut();
        }
        (self as *mut Self)
            .cast::<u8>()
            .wrapping_offset(self.offset as isize)
            .cast::<T>()
    }

    /// Returns a reference to the target, or `None` when null.
    ///
    /// # Safety
    ///
    /// A non-null target must be a valid, initialized `T` in the same block as
    /// this pointer, and must not be mutated for the lifetime of the returned
    /// reference.
    pub unsafe fn as_ref(&self) -> Option<&T> {
        self.as_ptr().as_ref()
    }

    /// Returns a pinned mutable reference to the target, or `None` when null.
    ///
    /// # Safety
    ///
    /// Same requirements as [`OffsetPtr::as_ref`], and additionally no other
    /// reference to the target may be live.
    pub unsafe fn as_pin_mut(self: Pin<&mut Self>) -> Option<Pin<&mut T>> {
        let ptr = self.get_unchecked_mut().as_mut_ptr();
        ptr.as_mut().map(|t| Pin::new_unchecked(t))
    }

    /// Points this pointer at `target`, or makes it null.
    ///
    /// # Panics
    ///
    /// Panics if `target` is this pointer's own address (zero displacement
    /// is reserved for null), or if the displacement does not fit in an `i32`.
    pub fn set(self: Pin<&mut Self>, target: *const T) {
        // Safety: storing an integer does not move the pointer.
        unsafe { self.get_unchecked_mut() }.store(target)
    }

    /// Makes this pointer null.
    pub fn set_null(self: Pin<&mut Self>) {
        self.set(core::ptr::null())
    }

    /// Points this pointer at the target of `other`.
    ///
    /// The displacement is recomputed for this pointer's address, so the two
    /// pointers denote the same target while storing different offsets.
    ///
    /// # Examples
    ///
    /// ```
    /// use relrec::OffsetPtr;
    /// use std::pin::pin;
    ///
    /// #[repr(C)]
    /// struct Three {
    ///     a: OffsetPtr<u32>,
    ///     b: OffsetPtr<u32>,
    ///     value: u32,
    /// }
    ///
    /// let mut t = pin!(Three { a: OffsetPtr::null(), b: OffsetPtr::null(), value: 1 });
    /// let target: *const u32 = &t.value;
    /// unsafe { t.as_mut().map_unchecked_mut(|t| &mut t.b) }.set(target);
    /// let b: *const OffsetPtr<u32> = &t.b;
    /// unsafe { t.as_mut().map_unchecked_mut(|t| &mut t.a) }.set_from(unsafe { &*b });
    /// assert_eq!(t.a.as_ptr(), t.b.as_ptr());
    /// assert_eq!((t.a.offset(), t.b.offset()), (8, 4));
    /// ```
    pub fn set_from(self: Pin<&mut Self>, other: &OffsetPtr<T>) {
        self.set(other.as_ptr())
    }

    /// Points this pointer at the first element of a carve result.
    ///
    /// An empty carve result makes the pointer null.
    ///
    /// # Panics
    ///
    /// Panics if this pointer does not live in the block the storage was
    /// carved from.
    pub fn assign(self: Pin<&mut Self>, target: &Carved<'_, T>) {
        target.span().check(&*self as *const Self as *const u8);
        self.set(target.as_ptr())
    }

    /// Stores `target` relative to this pointer's current address.
    pub(crate) fn store(&mut self, target: *const T) {
        self.offset = displacement(self as *const Self as *const u8, target as *const u8);
    }

    pub(crate) fn store_in(&mut self, span: BlockSpan, target: *const T) {
        span.check(self as *const Self as *const u8);
        self.store(target)
    }
}

fn displacement(from: *const u8, to: *const u8) -> i32 {
    if to.is_null() {
        return 0;
    }
    let diff = (to as usize).wrapping_sub(from as usize) as isize;
    if diff == 0 {
        crate::error::self_reference()
    }
    match i32::try_from(diff) {
        Ok(offset) => offset,
        Err(_) => crate::error::displacement_overflow(),
    }
}

impl<T> Default for OffsetPtr<T> {
    fn default() -> Self {
        OffsetPtr::null()
    }
}

/// Pointers are equal when they resolve to the same address.
impl<T> PartialEq for OffsetPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_ptr() == other.as_ptr()
    }
}

impl<T> Eq for OffsetPtr<T> {}

impl<T> fmt::Debug for OffsetPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("OffsetPtr(null)")
        } else {
            write!(f, "OffsetPtr({:+})", self.offset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::pin::pin;

    #[repr(C)]
    struct Slots {
        ptrs: [OffsetPtr<u64>; 2],
        values: [u64; 2],
    }

    fn slots() -> Slots {
        Slots {
            ptrs: [OffsetPtr::null(), OffsetPtr::null()],
            values: [10, 20],
        }
    }

    fn ptr_mut(s: Pin<&mut Slots>, i: usize) -> Pin<&mut OffsetPtr<u64>> {
        unsafe { s.map_unchecked_mut(|s| &mut s.ptrs[i]) }
    }

    #[test]
    fn default_is_null() {
        let p: OffsetPtr<u64> = OffsetPtr::default();
        assert!(p.is_null());
        assert!(p.as_ptr().is_null());
        assert_eq!(unsafe { p.as_ref() }, None);
        assert_eq!(format!("{:?}", p), "OffsetPtr(null)");
    }

    #[test]
    fn round_trip_resolves_to_target() {
        let mut s = pin!(slots());
        let target: *const u64 = &s.values[1];
        ptr_mut(s.as_mut(), 0).set(target);
        assert_eq!(s.ptrs[0].as_ptr(), target);
        assert_eq!(s.ptrs[0].offset(), 16);
        assert_eq!(unsafe { s.ptrs[0].as_ref() }, Some(&20));
        assert_eq!(format!("{:?}", s.ptrs[0]), "OffsetPtr(+16)");
    }

    #[test]
    fn negative_displacement() {
        #[repr(C)]
        struct Back {
            value: u32,
            ptr: OffsetPtr<u32>,
        }
        let mut b = pin!(Back { value: 3, ptr: OffsetPtr::null() });
        let target: *const u32 = &b.value;
        unsafe { b.as_mut().map_unchecked_mut(|b| &mut b.ptr) }.set(target);
        assert_eq!(b.ptr.offset(), -4);
        assert_eq!(unsafe { b.ptr.as_ref() }, Some(&3));
    }

    #[test]
    fn null_assignment_clears() {
        let mut s = pin!(slots());
        let target: *const u64 = &s.values[0];
        ptr_mut(s.as_mut(), 0).set(target);
        ptr_mut(s.as_mut(), 0).set_null();
        assert!(s.ptrs[0].is_null());
    }

    #[test]
    fn copy_assignment_recomputes_displacement() {
        let mut s = pin!(slots());
        let target: *const u64 = &s.values[0];
        ptr_mut(s.as_mut(), 1).set(target);
        let other: *const OffsetPtr<u64> = &s.ptrs[1];
        ptr_mut(s.as_mut(), 0).set_from(unsafe { &*other });
        assert_eq!(s.ptrs[0], s.ptrs[1]);
        assert_ne!(s.ptrs[0].offset(), s.ptrs[1].offset());
    }

    #[test]
    fn moving_the_whole_block_keeps_targets() {
        let mut s = Box::pin(slots());
        let target: *const u64 = &s.values[1];
        ptr_mut(s.as_mut(), 0).set(target);
        let mut moved = Box::new(core::mem::MaybeUninit::<Slots>::uninit());
        let moved = unsafe {
            core::ptr::copy_nonoverlapping(&*s as *const Slots, moved.as_mut_ptr(), 1);
            &*moved.as_ptr()
        };
        assert_eq!(unsafe { moved.ptrs[0].as_ref() }, Some(&20));
        assert_ne!(moved.ptrs[0].as_ptr(), target);
    }

    #[test]
    #[should_panic(expected = "cannot point to its own storage")]
    fn self_reference_is_rejected() {
        let mut s = pin!(slots());
        let own = &s.ptrs[0] as *const OffsetPtr<u64> as *const u64;
        ptr_mut(s.as_mut(), 0).set(own);
    }
}
