#![doc = crate::doc_macro::make_svgbobdoc!(
//! # `relrec`
//! Relocatable records: structs whose whole state lives in one position-independent block.
//!
//! 1. [Summary](#summary)
//! 1. [Examples](#examples)
//! 1. [Block layout](#block-layout)
//! 1. [Overview of types](#overview-of-types)
//! 1. [Use of Pin](#use-of-pin)
//! 1. [Feature flags](#feature-flags)
//!
//! # Summary
//!
//! A record built with `relrec` keeps its fixed fields, its strings, vectors, lists and maps
//! in a single contiguous byte block. Every internal reference is an [`OffsetPtr`]: a
//! displacement relative to the pointer's own address. The block can therefore be written to
//! a file, memory-mapped, or copied to a different address with a plain byte copy, and it is
//! immediately usable there. There is no serialization step and no pointer fix-up pass.
//!
//! Variable-length storage is carved from an [`Arena`] that sits right after the record's
//! fixed fields. The arena is a bump allocator: storage is never freed individually, and the
//! whole block is released as a unit.
//!
//! # Examples
//!
//! ```
//! use relrec::prelude::*;
//!
//! #[define_record]
//! pub struct Person {
//!     pub age: u32,
//!     pub name: Str,
//!     pub scores: Vector<u32>,
//!     pub friends: List<Str>,
//! }
//! # fn main() {
//! let mut person = RecordBox::<Person>::new(256).unwrap();
//! {
//!     let (arena, mut fields) = person.as_mut().split();
//!     let mut arena = arena.unwrap();
//!     fields.age.set(16);
//!     fields.name.assign(arena.create_string("Harry Potter").unwrap());
//!     let mut scores = arena.create_vector::<u32>(3).unwrap();
//!     scores.as_mut_slice().copy_from_slice(&[7, 8, 9]);
//!     fields.scores.assign(scores);
//!     for friend in ["Ron", "Hermione"] {
//!         let name = arena.create_string(friend).unwrap();
//!         let mut node = arena.create_list::<Str>(1).unwrap();
//!         node.get_mut(0).unwrap().assign(name);
//!         fields.friends.as_mut().append(&mut arena, node).unwrap();
//!     }
//! }
//!
//! // Relocate the block with a byte copy.
//! let moved = unsafe { RecordBox::<Person>::from_bytes(person.as_bytes()) }.unwrap();
//! drop(person);
//! assert_eq!(moved.age, 16);
//! assert_eq!(&*moved.name, "Harry Potter");
//! assert_eq!(moved.scores.as_slice(), &[7, 8, 9]);
//! assert_eq!(moved.friends[1], "Hermione");
//! # }
//! ```
//!
//! # Block layout
//!
//! ```svgbob
//! 0                                struct_size        struct_size + 8
//! |                                |                  |
//! v                                v                  v
//! +-------------+-----------------+------------------+----------------------------+------------+
//! | "header"    | "fixed fields"  | "arena header"   | "strings, vectors, nodes"  | "free"     |
//! +-------------+-----------------+------------------+----------------------------+------------+
//!                 |                                     ^
//!                 '---- "OffsetPtr (relative)" ---------'
//! ```
//!
//! The header records `struct_size` and the displacement of the arena header. The arena
//! header holds two `u32` counts, `capacity` and `used_space`, both including the header's
//! own 8 bytes. [`Record::capacity`] and [`Record::used_space`] add `struct_size` to them.
//!
//! # Overview of types
//!
//! | Name                | Type                                    | Notes                                          |
//! |---------------------|-----------------------------------------|------------------------------------------------|
//! | Relative pointer    | [`OffsetPtr<T>`][crate::OffsetPtr]      | Zero displacement is null                      |
//! | Fixed array         | [`Array<T, N>`][crate::Array]           | Stored inline, no indirection                  |
//! | Vector              | [`Vector<T>`][crate::Vector]            | One contiguous carve, fixed size               |
//! | Linked list         | [`List<T>`][crate::List]                | Grows by appending nodes                       |
//! | Map                 | [`Map<K, V>`][crate::Map]               | Vector of pairs, linear lookup                 |
//! | String              | [`Str`][crate::Str]                     | NUL-terminated UTF-8                           |
//! | Wide string         | [`WStr`][crate::WStr]                   | NUL-terminated UTF-16                          |
//! | Heap-owned block    | [`RecordBox<S>`][crate::RecordBox]      | Released as one unit                           |
//! | Inline block        | [`InlineRecord<S, FREE>`][crate::InlineRecord] | Record and arena in one value          |
//! | Caller-owned buffer | [`placement`][crate::placement]         | Construct or load over `&mut [u8]`             |
//!
//! # Use of `Pin`
//!
//! Containers and offset pointers are `!Unpin`, and mutable access to them is always through
//! [`Pin<&mut T>`][core::pin::Pin]. Moving a single field out of its block would leave it
//! pointing at the wrong bytes, and `Pin` rules that out in safe code. Moving the whole
//! block, on the other hand, is always fine, and is done with byte copies
//! ([`RecordBox::from_bytes`], [`Record::copy_from`]).
//!
//! Element types stored in a block implement [`Plain`]: all zeroes is a valid value, there is
//! no drop glue, and there are no absolute pointers.
//!
//! # Feature flags
//!
//! * `macro` (default). Enables [`#[define_record]`][crate::define_record]. Adds a dependency
//!   on `relrec_macro`, `syn` and `quote`.
//! * `bumpalo`. Enables [`placement::new_in`], for placing a block in a `bumpalo::Bump`.
//! * `doc`. Renders the diagrams in this documentation as SVG.
)]
#![warn(missing_docs)]

extern crate self as relrec;

pub mod arena;
pub mod array;
pub mod carve;
pub mod error;
pub mod inline;
pub mod list;
#[doc(hidden)]
pub mod macro_support;
pub mod map;
pub mod offset_ptr;
pub mod placement;
pub mod prelude;
pub mod rbox;
pub mod record;
pub mod str;
pub mod vector;
pub mod wstr;

mod doc_macro;
#[cfg(test)]
mod test_type;

pub use crate::str::Str;
pub use arena::{Arena, ArenaHeader, BlockSpan, ARENA_HEADER_SIZE};
pub use array::Array;
pub use carve::{Carved, ListContent, StrContent, WStrContent};
pub use error::{BlockError, CapacityError, RangeError};
pub use inline::InlineRecord;
pub use list::List;
pub use map::{Map, Pair};
pub use offset_ptr::OffsetPtr;
pub use rbox::RecordBox;
pub use record::{Record, RecordHeader};
#[cfg(feature = "macro")]
pub use relrec_macro::define_record;
pub use vector::Vector;
pub use wstr::WStr;

use core::pin::Pin;

/// Alignment of every record block.
///
/// Arena allocations are padded to their type's natural alignment relative to the absolute
/// address. Because every block starts on a multiple of this value, the padding is the same
/// wherever the block is relocated to. Types aligned above it cannot be stored in a block.
pub const BLOCK_ALIGN: usize = 16;

/// Types that can live inside a record block.
///
/// # Safety
///
/// Implementors must be valid when all zeroes, must not own resources that need dropping, and
/// must not contain absolute pointers. Indirection is only allowed through [`OffsetPtr`].
/// Types without indirection must be valid for every bit pattern. Types with it (the
/// containers, strings and records) are valid only while each of their pointers targets the
/// block they live in, so reinterpreting arbitrary bytes as one is unsafe
/// ([`Record::find`]).
///
/// # Examples
///
/// ```
/// use relrec::prelude::*;
///
/// #[repr(C)]
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// pub struct Point {
///     pub x: f32,
///     pub y: f32,
/// }
///
/// unsafe impl Plain for Point {}
///
/// #[define_record]
/// pub struct Path {
///     pub points: Vector<Point>,
/// }
/// # fn main() {
/// let mut path = RecordBox::<Path>::new(128).unwrap();
/// let (arena, fields) = path.as_mut().split();
/// let mut points = arena.unwrap().create_vector::<Point>(2).unwrap();
/// points.as_mut_slice()[1] = Point { x: 1.0, y: 2.0 };
/// fields.points.assign(points);
/// assert_eq!(path.points[0], Point { x: 0.0, y: 0.0 });
/// assert_eq!(path.points[1].y, 2.0);
/// # }
/// ```
pub unsafe trait Plain: Sized {
    /// Turns a freshly zero-filled value into a ready one.
    ///
    /// Called by [`Arena::create`] on every carved value. Does nothing by default; records
    /// use it to fill in their [`RecordHeader`].
    #[inline]
    fn init_zeroed(self: Pin<&mut Self>) {}
}

macro_rules! impl_plain {
    ($($t:ty),*) => {
        $( unsafe impl Plain for $t {} )*
    };
}

impl_plain!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

unsafe impl<T: Plain, const N: usize> Plain for [T; N] {
    fn init_zeroed(self: Pin<&mut Self>) {
        // Safety: elements are projected in place and never moved.
        let this = unsafe { self.get_unchecked_mut() };
        for elem in this.iter_mut() {
            T::init_zeroed(unsafe { Pin::new_unchecked(elem) });
        }
    }
}
