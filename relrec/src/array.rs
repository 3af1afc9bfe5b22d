//! A fixed-size array stored inline.
//!
//! # Examples
//!
//! ```
//! use relrec::prelude::*;
//!
//! #[define_record]
//! pub struct Grid {
//!     pub cells: Array<u8, 4>,
//! }
//! # fn main() {
//! let mut grid = RecordBox::<Grid>::new(std::mem::size_of::<Grid>()).unwrap();
//! grid.as_mut().muts().cells.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
//! assert_eq!(grid.cells[2], 3);
//! assert!(grid.cells.at(4).is_err());
//! # }
//! ```

use crate::error::{out_of_range, RangeError};
use crate::Plain;
use core::fmt;
use core::pin::Pin;

/// `N` values of `T`, stored in place.
#[repr(transparent)]
pub struct Array<T, const N: usize> {
    elems: [T; N],
}

unsafe impl<T: Plain, const N: usize> Plain for Array<T, N> {
    fn init_zeroed(self: Pin<&mut Self>) {
        // Safety: projection to the only field.
        unsafe { self.map_unchecked_mut(|a| &mut a.elems) }.init_zeroed()
    }
}

impl<T, const N: usize> Array<T, N> {
    /// Number of elements, always `N`.
    pub const fn len(&self) -> usize {
        N
    }

    /// Whether `N` is zero.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.elems
    }

    /// Element at `index`, or `None` if out of range.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.elems.get(index)
    }

    /// Element at `index`, or a [`RangeError`].
    pub fn at(&self, index: usize) -> Result<&T, RangeError> {
        self.elems.get(index).ok_or(RangeError::Index {
            container: "Array",
            index,
            len: N,
        })
    }

    /// Pinned mutable access to the element at `index`.
    pub fn get_pin_mut(self: Pin<&mut Self>, index: usize) -> Option<Pin<&mut T>> {
        // Safety: elements are projected in place.
        let this = unsafe { self.get_unchecked_mut() };
        this.elems
            .get_mut(index)
            .map(|e| unsafe { Pin::new_unchecked(e) })
    }

    /// Pinned mutable access to the element at `index`, or a [`RangeError`].
    pub fn at_mut(self: Pin<&mut Self>, index: usize) -> Result<Pin<&mut T>, RangeError> {
        self.get_pin_mut(index).ok_or(RangeError::Index {
            container: "Array",
            index,
            len: N,
        })
    }

    /// Iterates over the elements.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.elems.iter()
    }
}

impl<T: Unpin, const N: usize> Array<T, N> {
    /// The elements as a mutable slice.
    pub fn as_mut_slice(self: Pin<&mut Self>) -> &mut [T] {
        &mut self.get_mut().elems
    }
}

impl<T, const N: usize> core::ops::Index<usize> for Array<T, N> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        match self.at(index) {
            Ok(v) => v,
            Err(e) => out_of_range(e),
        }
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a Array<T, N> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq, const N: usize> PartialEq for Array<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.elems == other.elems
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for Array<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
