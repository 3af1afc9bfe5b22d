//! A map stored as a vector of key/value pairs, searched linearly.
//!
//! Lookups are O(n). Maps are meant to be small; there is no hashing and no
//! ordering requirement on keys. Duplicate keys are allowed, and lookups
//! find the first match.
//!
//! # Examples
//!
//! ```
//! use relrec::prelude::*;
//!
//! #[define_record]
//! pub struct Inventory {
//!     pub stock: Map<Str, u32>,
//! }
//! # fn main() {
//! let mut rec = RecordBox::<Inventory>::new(128).unwrap();
//! let (arena, fields) = rec.as_mut().split();
//! let mut arena = arena.unwrap();
//! let mut stock = arena.create_map::<Str, u32>(2).unwrap();
//! for (i, (name, count)) in [("apple", 3), ("pear", 5)].into_iter().enumerate() {
//!     let (key, mut value) = stock.get_mut(i).unwrap().project();
//!     key.assign(arena.create_string(name).unwrap());
//!     value.set(count);
//! }
//! fields.stock.assign(stock);
//!
//! assert_eq!(rec.stock["pear"], 5);
//! assert_eq!(rec.stock.get("apple"), Some(&3));
//! assert!(rec.stock.find("plum").is_none());
//! assert!(rec.stock.at("plum").is_err());
//! # }
//! ```

use crate::carve::Carved;
use crate::error::{out_of_range, RangeError};
use crate::vector::Vector;
use crate::Plain;
use core::fmt;
use core::pin::Pin;

/// One entry of a [`Map`].
#[repr(C)]
#[derive(PartialEq)]
pub struct Pair<K, V> {
    /// The key.
    pub key: K,
    /// The value.
    pub value: V,
}

unsafe impl<K: Plain, V: Plain> Plain for Pair<K, V> {
    fn init_zeroed(self: Pin<&mut Self>) {
        let (key, value) = self.project();
        key.init_zeroed();
        value.init_zeroed();
    }
}

impl<K, V> Pair<K, V> {
    /// Pinned mutable access to the key and the value.
    pub fn project(self: Pin<&mut Self>) -> (Pin<&mut K>, Pin<&mut V>) {
        // Safety: structural projection; neither field is moved.
        unsafe {
            let this = self.get_unchecked_mut();
            (Pin::new_unchecked(&mut this.key), Pin::new_unchecked(&mut this.value))
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Pair<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {:?}", self.key, self.value)
    }
}

/// A linear map from `K` to `V`.
#[repr(transparent)]
pub struct Map<K, V> {
    entries: Vector<Pair<K, V>>,
}

unsafe impl<K: Plain, V: Plain> Plain for Map<K, V> {}

impl<K, V> Map<K, V> {
    fn entries_mut(self: Pin<&mut Self>) -> Pin<&mut Vector<Pair<K, V>>> {
        // Safety: projection to the only field.
        unsafe { self.map_unchecked_mut(|m| &mut m.entries) }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries, in storage order.
    pub fn as_slice(&self) -> &[Pair<K, V>] {
        self.entries.as_slice()
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> core::slice::Iter<'_, Pair<K, V>> {
        self.entries.iter()
    }

    /// Position of the first entry whose key equals `key`.
    pub fn position<Q: ?Sized>(&self, key: &Q) -> Option<usize>
    where
        K: PartialEq<Q>,
    {
        self.iter().position(|p| p.key == *key)
    }

    /// The first entry whose key equals `key`.
    pub fn find<Q: ?Sized>(&self, key: &Q) -> Option<&Pair<K, V>>
    where
        K: PartialEq<Q>,
    {
        self.iter().find(|p| p.key == *key)
    }

    /// The value for `key`.
    pub fn get<Q: ?Sized>(&self, key: &Q) -> Option<&V>
    where
        K: PartialEq<Q>,
    {
        self.find(key).map(|p| &p.value)
    }

    /// Whether some entry has key `key`.
    pub fn contains_key<Q: ?Sized>(&self, key: &Q) -> bool
    where
        K: PartialEq<Q>,
    {
        self.position(key).is_some()
    }

    /// The value for `key`, or [`RangeError::MissingKey`].
    pub fn at<Q: ?Sized>(&self, key: &Q) -> Result<&V, RangeError>
    where
        K: PartialEq<Q>,
    {
        self.get(key).ok_or(RangeError::MissingKey)
    }

    /// Pinned mutable access to the value for `key`.
    pub fn get_pin_mut<Q: ?Sized>(self: Pin<&mut Self>, key: &Q) -> Option<Pin<&mut V>>
    where
        K: PartialEq<Q>,
    {
        let index = self.position(key)?;
        let pair = self.entries_mut().get_pin_mut(index)?;
        Some(pair.project().1)
    }

    /// Pinned mutable access to the entry at `index`.
    pub fn entry_mut(self: Pin<&mut Self>, index: usize) -> Option<Pin<&mut Pair<K, V>>> {
        self.entries_mut().get_pin_mut(index)
    }

    /// Commits carved pairs as this map's contents.
    ///
    /// # Panics
    ///
    /// Panics if the map does not live in the block `content` was carved
    /// from.
    pub fn assign(self: Pin<&mut Self>, content: Carved<'_, Pair<K, V>>) {
        self.entries_mut().assign(content)
    }

    /// Removes every entry.
    pub fn clear(self: Pin<&mut Self>) {
        self.entries_mut().clear()
    }
}

impl<K: PartialEq<Q>, V, Q: ?Sized> core::ops::Index<&Q> for Map<K, V> {
    type Output = V;

    #[inline]
    fn index(&self, key: &Q) -> &V {
        match self.at(key) {
            Ok(v) => v,
            Err(e) => out_of_range(e),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a Map<K, V> {
    type Item = &'a Pair<K, V>;
    type IntoIter = core::slice::Iter<'a, Pair<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for Map<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Map<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|p| (&p.key, &p.value)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_type::Sample;
    use crate::{RangeError, RecordBox};

    fn squares() -> RecordBox<Sample> {
        let mut rec = RecordBox::<Sample>::new(Sample::SIZE + 128).unwrap();
        let (arena, fields) = Sample::split(rec.as_mut());
        let mut pairs = arena.unwrap().create_map::<u16, u64>(4).unwrap();
        for i in 0..4 {
            let (mut k, mut v) = pairs.get_mut(i).unwrap().project();
            k.set(i as u16 + 1);
            v.set((i as u64 + 1) * (i as u64 + 1));
        }
        fields.squares.assign(pairs);
        rec
    }

    #[test]
    fn lookup() {
        let rec = squares();
        assert_eq!(rec.squares.len(), 4);
        assert_eq!(rec.squares[&3u16], 9);
        assert_eq!(rec.squares.position(&4u16), Some(3));
        assert!(rec.squares.contains_key(&1u16));
        assert_eq!(rec.squares.find(&2u16).map(|p| p.value), Some(4));
        assert!(rec.squares.find(&7u16).is_none());
        assert_eq!(rec.squares.at(&7u16), Err(RangeError::MissingKey));
    }

    #[test]
    #[should_panic(expected = "nonexistent key in Map")]
    fn missing_key_panics() {
        let rec = squares();
        let _ = rec.squares[&0u16];
    }

    #[test]
    fn update_value() {
        let mut rec = squares();
        *Sample::muts(rec.as_mut()).squares.get_pin_mut(&2u16).unwrap() = 40;
        assert_eq!(rec.squares.get(&2u16), Some(&40));
        assert_eq!(format!("{:?}", rec.squares), "{1: 1, 2: 40, 3: 9, 4: 16}");
    }
}
