//! A fixed-size run of values carved from the arena in one piece.
//!
//! A vector never grows: to change its size, carve a new run and assign it.
//!
//! # Examples
//!
//! ```
//! use relrec::prelude::*;
//!
//! #[define_record]
//! pub struct Samples {
//!     pub values: Vector<i32>,
//! }
//! # fn main() {
//! let mut rec = RecordBox::<Samples>::new(100).unwrap();
//! let (arena, fields) = rec.as_mut().split();
//! let mut values = arena.unwrap().create_vector::<i32>(5).unwrap();
//! for (i, v) in values.as_mut_slice().iter_mut().enumerate() {
//!     *v = i as i32;
//! }
//! fields.values.assign(values);
//!
//! assert_eq!(rec.values.len(), 5);
//! assert_eq!(rec.values[4], 4);
//! assert!(rec.values.at(5).is_err());
//! # }
//! ```

use crate::carve::Carved;
use crate::error::{out_of_range, RangeError};
use crate::offset_ptr::OffsetPtr;
use crate::Plain;
use core::fmt;
use core::pin::Pin;

/// `len()` contiguous values of `T` in the same block.
#[repr(C)]
pub struct Vector<T> {
    size: u32,
    at: OffsetPtr<T>,
}

unsafe impl<T: Plain> Plain for Vector<T> {}

impl<T> Vector<T> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.size as usize
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        let ptr = self.at.as_ptr();
        if ptr.is_null() || self.size == 0 {
            return &[];
        }
        // Safety: `at` is only ever assigned from a carve of `size` values in
        // the same block.
        unsafe { core::slice::from_raw_parts(ptr, self.len()) }
    }

    /// Element at `index`, or `None` if out of range.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Element at `index`, or a [`RangeError`].
    pub fn at(&self, index: usize) -> Result<&T, RangeError> {
        self.get(index).ok_or(RangeError::Index {
            container: "Vector",
            index,
            len: self.len(),
        })
    }

    fn slice_mut_ptr(self: Pin<&mut Self>) -> *mut [T] {
        // Safety: only the pointer's target is touched.
        let this = unsafe { self.get_unchecked_mut() };
        let len = if this.at.is_null() { 0 } else { this.len() };
        let ptr = this.at.as_mut_ptr();
        let ptr = if len == 0 { core::ptr::NonNull::dangling().as_ptr() } else { ptr };
        core::ptr::slice_from_raw_parts_mut(ptr, len)
    }

    /// Pinned mutable access to the element at `index`.
    pub fn get_pin_mut(self: Pin<&mut Self>, index: usize) -> Option<Pin<&mut T>> {
        // Safety: as in as_slice; the elements stay where they are.
        let slice = unsafe { &mut *self.slice_mut_ptr() };
        slice.get_mut(index).map(|e| unsafe { Pin::new_unchecked(e) })
    }

    /// Pinned mutable access to the element at `index`, or a [`RangeError`].
    pub fn at_mut(self: Pin<&mut Self>, index: usize) -> Result<Pin<&mut T>, RangeError> {
        let len = self.len();
        self.get_pin_mut(index).ok_or(RangeError::Index {
            container: "Vector",
            index,
            len,
        })
    }

    /// Iterates over the elements.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Commits a carve result as this vector's contents.
    ///
    /// The previous contents stay in the arena but are no longer reachable.
    ///
    /// # Panics
    ///
    /// Panics if the vector does not live in the block `content` was carved
    /// from.
    pub fn assign(self: Pin<&mut Self>, content: Carved<'_, T>) {
        // Safety: fields are updated in place.
        let this = unsafe { self.get_unchecked_mut() };
        let span = content.span();
        this.size = content.len_u32();
        this.at.store_in(span, content.into_raw());
    }

    /// Makes the vector empty.
    pub fn clear(self: Pin<&mut Self>) {
        // Safety: fields are updated in place.
        let this = unsafe { self.get_unchecked_mut() };
        this.size = 0;
        this.at.store(core::ptr::null());
    }
}

impl<T: Unpin> Vector<T> {
    /// The elements as a mutable slice.
    pub fn as_mut_slice(self: Pin<&mut Self>) -> &mut [T] {
        // Safety: as in get_pin_mut; `T: Unpin`.
        unsafe { &mut *self.slice_mut_ptr() }
    }
}

impl<T> core::ops::Index<usize> for Vector<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        match self.at(index) {
            Ok(v) => v,
            Err(e) => out_of_range(e),
        }
    }
}

impl<'a, T> IntoIterator for &'a Vector<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq> PartialEq for Vector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
