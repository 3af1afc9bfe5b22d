//! A NUL-terminated UTF-16 string stored in the arena.
//!
//! Code units are `u16` on every platform, so blocks holding wide strings
//! can be exchanged between platforms whose native wide character differs.

use crate::carve::WStrContent;
use crate::offset_ptr::OffsetPtr;
use crate::Plain;
use core::fmt;
use core::pin::Pin;

/// Reads code units up to (not including) the terminator.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated run of `u16`.
pub(crate) unsafe fn units_from_ptr<'a>(ptr: *const u16) -> &'a [u16] {
    if ptr.is_null() {
        return &[];
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    core::slice::from_raw_parts(ptr, len)
}

/// A wide string field.
///
/// # Examples
///
/// ```
/// use relrec::prelude::*;
///
/// #[define_record]
/// pub struct Label {
///     pub text: WStr,
/// }
/// # fn main() {
/// let mut rec = RecordBox::<Label>::new(64).unwrap();
/// let (arena, fields) = rec.as_mut().split();
/// fields.text.assign(arena.unwrap().create_wstring("héllo").unwrap());
/// assert_eq!(rec.text.len(), 5);
/// assert_eq!(rec.text, *"héllo");
/// assert_eq!(rec.text.to_string(), "héllo");
/// # }
/// ```
#[repr(C)]
pub struct WStr {
    data: OffsetPtr<u16>,
}

unsafe impl Plain for WStr {}

impl WStr {
    /// Whether nothing was ever assigned, or the string was cleared.
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// The UTF-16 code units, without the terminator.
    pub fn as_units(&self) -> &[u16] {
        // Safety: assigned only from `Arena::create_wstring`, which writes a
        // terminator.
        unsafe { units_from_ptr(self.data.as_ptr()) }
    }

    /// Number of code units.
    pub fn len(&self) -> usize {
        self.as_units().len()
    }

    /// Whether there are no code units.
    pub fn is_empty(&self) -> bool {
        self.as_units().is_empty()
    }

    /// Decodes the string, replacing unpaired surrogates.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        char::decode_utf16(self.as_units().iter().copied())
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    /// Decodes the string into a [`String`].
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_units())
    }

    /// Commits a carved wide string.
    ///
    /// # Panics
    ///
    /// Panics if this field does not live in the block `content` was carved
    /// from.
    pub fn assign(self: Pin<&mut Self>, content: WStrContent<'_>) {
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

/// Null compares equal only to null, as for [`Str`](crate::Str).
impl PartialEq for WStr {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
            || (!self.is_null() && !other.is_null() && self.as_units() == other.as_units())
    }
}

impl Eq for WStr {}

impl PartialEq<str> for WStr {
    fn eq(&self, other: &str) -> bool {
        !self.is_null() && self.as_units().iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for WStr {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl fmt::Debug for WStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

impl fmt::Display for WStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write;
        self.chars().try_for_each(|c| f.write_char(c))
    }
}
