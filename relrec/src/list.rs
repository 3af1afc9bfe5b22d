#![doc = crate::doc_macro::make_svgbobdoc!(
//! A singly linked list whose nodes live in the arena.
//!
//! The list field itself is the head node. Every node stores the number of
//! values from itself to the end of the chain, a pointer to its value, and a
//! pointer to the next node:
//!
//! ```svgbob
//!  "field (head)"          "arena"
//! +---+-------+------+    +---+-------+------+    +---+-------+------+
//! | 3 | value | next +--->| 2 | value | next +--->| 1 | value | null |
//! +---+---+---+------+    +---+---+---+------+    +---+---+---+------+
//!         |                       |                       |
//!         v                       v                       v
//!       "v0"                    "v1"                    "v2"
//! ```
//!
//! Appending walks to the tail, so adding n values one at a time costs
//! O(n²) in total. To build a long list, carve all of it at once with
//! [`Arena::create_list`](crate::Arena::create_list) and assign or append
//! the result as a unit. Nodes unlinked by [`List::resize`] or
//! [`List::clear`] are not reclaimed.
//!
//! # Examples
//!
//! ```
//! use relrec::prelude::*;
//!
//! #[define_record]
//! pub struct Log {
//!     pub lines: List<u32>,
//! }
//! # fn main() {
//! let mut rec = RecordBox::<Log>::new(256).unwrap();
//! let (arena, mut fields) = rec.as_mut().split();
//! let mut arena = arena.unwrap();
//! for i in 0..3 {
//!     fields.lines.as_mut().push(&mut arena, i * 10).unwrap();
//! }
//! fields.lines.as_mut().resize(&mut arena, 5).unwrap();
//! assert_eq!(fields.lines.iter().copied().collect::<Vec<_>>(), vec![0, 10, 20, 0, 0]);
//! fields.lines.as_mut().resize(&mut arena, 2).unwrap();
//! assert_eq!(rec.lines.len(), 2);
//! assert_eq!(rec.lines[1], 10);
//! # }
//! ```
)]

use crate::arena::Arena;
use crate::carve::{Carved, ListContent};
use crate::error::{cross_block_reference, out_of_range, CapacityError, RangeError};
use crate::offset_ptr::OffsetPtr;
use crate::Plain;
use core::fmt;
use core::pin::Pin;

/// A list node; as a record field, the head of the list.
#[repr(C)]
pub struct List<T> {
    pub(crate) size: u32,
    pub(crate) value: OffsetPtr<T>,
    pub(crate) next: OffsetPtr<List<T>>,
}

unsafe impl<T: Plain> Plain for List<T> {}

impl<T> List<T> {
    /// Number of values.
    pub fn len(&self) -> usize {
        self.size as usize
    }

    /// Whether the list has no values.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Iterates over the values in order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            node: if self.is_empty() { None } else { Some(self) },
            remaining: self.len(),
        }
    }

    /// Value at `index`, or `None` if out of range. O(index).
    pub fn get(&self, index: usize) -> Option<&T> {
        self.iter().nth(index)
    }

    /// Value at `index`, or a [`RangeError`].
    pub fn at(&self, index: usize) -> Result<&T, RangeError> {
        self.get(index).ok_or(RangeError::Index {
            container: "List",
            index,
            len: self.len(),
        })
    }

    fn node_ptr(self: Pin<&mut Self>, index: usize) -> *mut List<T> {
        if index >= self.len() {
            return core::ptr::null_mut();
        }
        // Safety: nodes are linked only to nodes in the same block.
        let mut node: *mut List<T> = unsafe { self.get_unchecked_mut() };
        for _ in 0..index {
            node = unsafe { (*node).next.as_mut_ptr() };
            if node.is_null() {
                break;
            }
        }
        node
    }

    /// Pinned mutable access to the value at `index`. O(index).
    pub fn get_pin_mut(self: Pin<&mut Self>, index: usize) -> Option<Pin<&mut T>> {
        let node = self.node_ptr(index);
        if node.is_null() {
            return None;
        }
        // Safety: the value was carved in the same block and is reachable
        // only through this list.
        unsafe {
            let value = (*node).value.as_mut_ptr();
            value.as_mut().map(|v| Pin::new_unchecked(v))
        }
    }

    /// Pinned mutable access to the value at `index`, or a [`RangeError`].
    pub fn at_mut(self: Pin<&mut Self>, index: usize) -> Result<Pin<&mut T>, RangeError> {
        let len = self.len();
        self.get_pin_mut(index).ok_or(RangeError::Index {
            container: "List",
            index,
            len,
        })
    }

    /// Replaces the list's contents with a carved chain.
    ///
    /// # Panics
    ///
    /// Panics if the list does not live in the block `content` was carved
    /// from.
    pub fn assign(self: Pin<&mut Self>, content: ListContent<'_, T>) {
        // Safety: fields are updated in place.
        let this = unsafe { self.get_unchecked_mut() };
        content.span.check(this as *const Self as *const u8);
        this.size = content.size;
        this.value.store(content.value);
        this.next.store(content.next);
    }

    /// Makes the list empty.
    pub fn clear(self: Pin<&mut Self>) {
        // Safety: fields are updated in place.
        let this = unsafe { self.get_unchecked_mut() };
        this.size = 0;
        this.value.store(core::ptr::null());
        this.next.store(core::ptr::null());
    }

    /// Appends a carved chain at the end of the list.
    ///
    /// An empty list takes the chain over directly; otherwise one new node
    /// is carved to hold the chain's first value. On failure the list is
    /// unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the list, `arena` and `content` are not all from the same
    /// block.
    pub fn append<'a>(
        self: Pin<&mut Self>,
        arena: &mut Arena<'a>,
        content: ListContent<'_, T>,
    ) -> Result<(), CapacityError>
    where
        T: Plain + 'a,
    {
        if content.is_empty() {
            return Ok(());
        }
        if content.span() != arena.span() {
            cross_block_reference()
        }
        if self.is_empty() {
            self.assign(content);
            return Ok(());
        }
        // Safety: fields are updated in place.
        let this = unsafe { self.get_unchecked_mut() };
        arena.span().check(this as *const Self as *const u8);
        let node = arena.create::<List<T>>(1)?.into_raw();
        // Safety: `node` is freshly carved; the existing chain lives in the
        // same block and is reachable only through `this`.
        unsafe {
            let n = &mut *node;
            n.size = content.size;
            n.value.store(content.value);
            n.next.store(content.next);

            let mut tail: *mut List<T> = this;
            loop {
                (*tail).size += content.size;
                let next = (*tail).next.as_mut_ptr();
                if next.is_null() {
                    break;
                }
                tail = next;
            }
            (*tail).next.store(node);
        }
        Ok(())
    }

    /// Appends every value of `values`, in order.
    pub fn append_value<'a>(
        self: Pin<&mut Self>,
        arena: &mut Arena<'a>,
        values: Carved<'_, T>,
    ) -> Result<(), CapacityError>
    where
        T: Plain + 'a,
    {
        if values.len() <= 1 {
            return self.append(arena, ListContent::single(values));
        }
        let count = values.len_u32();
        let span = values.span();
        let first = values.into_raw();
        let mut head: *mut List<T> = core::ptr::null_mut();
        let mut tail: *mut List<T> = core::ptr::null_mut();
        for i in 1..count {
            let node = arena.create::<List<T>>(1)?.into_raw();
            // Safety: `node` is freshly carved; `first` has `count` values.
            unsafe {
                (*node).size = count - i;
                (*node).value.store(first.add(i as usize));
                if tail.is_null() {
                    head = node;
                } else {
                    (*tail).next.store(node);
                }
            }
            tail = node;
        }
        // Safety: the chain was carved above from the same block as `values`.
        let content = unsafe { ListContent::from_raw(count, first, head, span) };
        self.append(arena, content)
    }

    /// Carves one value, sets it to `value`, and appends it.
    pub fn push<'a>(self: Pin<&mut Self>, arena: &mut Arena<'a>, value: T) -> Result<(), CapacityError>
    where
        T: Plain + Unpin + 'a,
    {
        let mut carved = arena.create::<T>(1)?;
        carved.as_mut_slice()[0] = value;
        self.append(arena, ListContent::single(carved))
    }

    /// Grows the list with zeroed values, or truncates it.
    ///
    /// Truncated nodes stay in the arena.
    pub fn resize<'a>(
        self: Pin<&mut Self>,
        arena: &mut Arena<'a>,
        new_size: usize,
    ) -> Result<(), CapacityError>
    where
        T: Plain + 'a,
    {
        let size = self.len();
        if new_size > size {
            let extension = arena.create_list::<T>(new_size - size)?;
            return self.append(arena, extension);
        }
        if new_size == size {
            return Ok(());
        }
        if new_size == 0 {
            self.clear();
            return Ok(());
        }
        // Safety: nodes are updated in place.
        let mut node: *mut List<T> = unsafe { self.get_unchecked_mut() };
        for i in 0..new_size {
            // Safety: the chain holds `size > new_size` nodes.
            unsafe {
                (*node).size = (new_size - i) as u32;
                if i + 1 == new_size {
                    (*node).next.store(core::ptr::null());
                } else {
                    node = (*node).next.as_mut_ptr();
                }
            }
        }
        Ok(())
    }
}

/// Iterator over the values of a [`List`].
pub struct Iter<'a, T> {
    node: Option<&'a List<T>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.node?;
        self.remaining -= 1;
        // Safety: nodes and values are linked only within the block.
        unsafe {
            self.node = node.next.as_ref();
            node.value.as_ref()
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<T> core::ops::Index<usize> for List<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        match self.at(index) {
            Ok(v) => v,
            Err(e) => out_of_range(e),
        }
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq> PartialEq for List<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
