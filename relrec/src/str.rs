//! A NUL-terminated UTF-8 string stored in the arena.
//!
//! A null [`Str`] reads as the empty string; none of its accessors return a
//! null pointer. It still compares unequal to every non-null string,
//! including a carved `""`.
//!
//! # Examples
//!
//! ```
//! use relrec::prelude::*;
//!
//! #[define_record]
//! pub struct Word {
//!     pub text: Str,
//! }
//! # fn main() {
//! let mut rec = RecordBox::<Word>::new(std::mem::size_of::<Word>() + 100).unwrap();
//! assert!(rec.text.is_empty());
//! assert_eq!(rec.text.as_c_str().to_bytes(), b"");
//!
//! let (arena, fields) = rec.as_mut().split();
//! fields.text.assign(arena.unwrap().create_string("gong").unwrap());
//! assert_eq!(rec.text, "gong");
//! assert_eq!(rec.text.len(), 4);
//! assert!(!rec.text.is_empty());
//! # }
//! ```

use crate::carve::StrContent;
use crate::offset_ptr::OffsetPtr;
use crate::Plain;
use core::ffi::{c_char, CStr};
use core::fmt;
use core::pin::Pin;

/// A string field.
#[repr(C)]
pub struct Str {
    data: OffsetPtr<u8>,
}

unsafe impl Plain for Str {}

impl Str {
    /// Whether nothing was ever assigned, or the string was cleared.
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// The string as a C string. Never null.
    pub fn as_c_str(&self) -> &CStr {
        let ptr = self.data.as_ptr();
        if ptr.is_null() {
            return Default::default();
        }
        // Safety: assigned only from `Arena::create_string`, which writes a
        // terminator.
        unsafe { CStr::from_ptr(ptr as *const c_char) }
    }

    /// The string contents, up to the first NUL.
    pub fn as_str(&self) -> &str {
        // Safety: `create_string` copies from a `&str`; truncating at a NUL
        // byte keeps it valid UTF-8.
        unsafe { core::str::from_utf8_unchecked(self.as_c_str().to_bytes()) }
    }

    /// Commits a carved string.
    ///
    /// # Panics
    ///
    /// Panics if this field does not live in the block `content` was carved
    /// from.
    pub fn assign(self: Pin<&mut Self>, content: StrContent<'_>) {
        // Safety: the pointer is updated in place.
        let this = unsafe { self.get_unchecked_mut() };
        this.data.store_in(content.span(), content.as_ptr());
    }

    /// Makes the string empty.
    pub fn clear(self: Pin<&mut Self>) {
        // Safety: the pointer is updated in place.
        unsafe { self.get_unchecked_mut() }.data.store(core::ptr::null());
    }
}

impl core::ops::Deref for Str {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

/// Strings are equal when they share storage, or when neither is null and
/// they have the same bytes.
impl PartialEq for Str {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data || (!self.is_null() && !other.is_null() && self.as_str() == other.as_str())
    }
}

impl Eq for Str {}

/// A null string equals no `str`, not even `""`.
impl PartialEq<str> for Str {
    fn eq(&self, other: &str) -> bool {
        !self.is_null() && self.as_str() == other
    }
}

impl PartialEq<&str> for Str {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl fmt::Debug for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
