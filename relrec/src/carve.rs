//! Carve results: storage reserved in an arena but not yet committed into a
//! field.
//!
//! A carve result borrows nothing from the record's fields, so it can be
//! filled in while the fields are borrowed too. Committing consumes it
//! (`Vector::assign`, `List::assign`, `Str::assign` and so on), after which
//! the storage is reachable only through the field.

use crate::arena::BlockSpan;
use crate::list::List;
use core::marker::PhantomData;
use core::pin::Pin;
use core::ptr::NonNull;

/// A run of `len` initialized values carved from an arena.
pub struct Carved<'a, T> {
    ptr: Option<NonNull<T>>,
    len: u32,
    span: BlockSpan,
    _storage: PhantomData<&'a mut [T]>,
}

impl<'a, T> Carved<'a, T> {
    pub(crate) fn empty(span: BlockSpan) -> Self {
        Carved {
            ptr: None,
            len: 0,
            span,
            _storage: PhantomData,
        }
    }

    /// # Safety
    ///
    /// `ptr` must address `len` initialized values inside `span`, exclusively
    /// owned for `'a`.
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>, len: u32, span: BlockSpan) -> Self {
        Carved {
            ptr: Some(ptr),
            len,
            span,
            _storage: PhantomData,
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether nothing was carved.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn len_u32(&self) -> u32 {
        self.len
    }

    /// The block the storage was carved from.
    pub fn span(&self) -> BlockSpan {
        self.span
    }

    /// Address of the first value, or null when empty.
    pub fn as_ptr(&self) -> *const T {
        match self.ptr {
            Some(ptr) => ptr.as_ptr(),
            None => core::ptr::null(),
        }
    }

    pub(crate) fn into_raw(self) -> *mut T {
        match self.ptr {
            Some(ptr) => ptr.as_ptr(),
            None => core::ptr::null_mut(),
        }
    }

    /// The carved values.
    pub fn as_slice(&self) -> &[T] {
        match self.ptr {
            // Safety: see from_raw.
            Some(ptr) => unsafe { core::slice::from_raw_parts(ptr.as_ptr(), self.len()) },
            None => &[],
        }
    }

    /// Pinned mutable access to one value.
    pub fn get_mut(&mut self, index: usize) -> Option<Pin<&mut T>> {
        if index >= self.len() {
            return None;
        }
        let ptr = self.ptr?;
        // Safety: in bounds, and the values never move out of the block.
        unsafe { Some(Pin::new_unchecked(&mut *ptr.as_ptr().add(index))) }
    }
}

impl<'a, T: Unpin> Carved<'a, T> {
    /// Mutable access to all values.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self.ptr {
            // Safety: see from_raw.
            Some(ptr) => unsafe { core::slice::from_raw_parts_mut(ptr.as_ptr(), self.len()) },
            None => &mut [],
        }
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for Carved<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

/// A chain of list nodes carved from an arena, ready to become the contents
/// of a [`List<T>`].
///
/// The first value is held directly; the remaining `len() - 1` values hang
/// off a chain of nodes whose sizes count down to 1.
pub struct ListContent<'a, T> {
    pub(crate) size: u32,
    pub(crate) value: *mut T,
    pub(crate) next: *mut List<T>,
    pub(crate) span: BlockSpan,
    _storage: PhantomData<&'a mut List<T>>,
}

impl<'a, T> ListContent<'a, T> {
    pub(crate) fn empty(span: BlockSpan) -> Self {
        ListContent {
            size: 0,
            value: core::ptr::null_mut(),
            next: core::ptr::null_mut(),
            span,
            _storage: PhantomData,
        }
    }

    /// # Safety
    ///
    /// `value` and the chain starting at `next` must be carved from `span`
    /// and hold `size` values in total.
    pub(crate) unsafe fn from_raw(size: u32, value: *mut T, next: *mut List<T>, span: BlockSpan) -> Self {
        ListContent {
            size,
            value,
            next,
            span,
            _storage: PhantomData,
        }
    }

    /// Wraps a single carved value.
    pub(crate) fn single(value: Carved<'a, T>) -> Self {
        let span = value.span();
        let size = value.len_u32().min(1);
        let value = value.into_raw();
        // Safety: one value carved from `span`, no chain.
        unsafe { ListContent::from_raw(size, value, core::ptr::null_mut(), span) }
    }

    /// Number of values in the chain.
    pub fn len(&self) -> usize {
        self.size as usize
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The block the chain was carved from.
    pub fn span(&self) -> BlockSpan {
        self.span
    }

    fn value_ptr(&self, index: usize) -> Option<*mut T> {
        if index >= self.len() {
            return None;
        }
        if index == 0 {
            return Some(self.value);
        }
        let mut node = self.next;
        for _ in 1..index {
            // Safety: the chain holds `size - 1` nodes.
            node = unsafe { (*node).next.as_mut_ptr() };
        }
        // Safety: as above.
        Some(unsafe { (*node).value.as_mut_ptr() })
    }

    /// Reads one value.
    pub fn get(&self, index: usize) -> Option<&T> {
        // Safety: values are initialized and owned by this content.
        self.value_ptr(index).map(|p| unsafe { &*p })
    }

    /// Pinned mutable access to one value.
    pub fn get_mut(&mut self, index: usize) -> Option<Pin<&mut T>> {
        // Safety: as in get, with exclusive access through `&mut self`.
        self.value_ptr(index)
            .map(|p| unsafe { Pin::new_unchecked(&mut *p) })
    }

    #[cfg(test)]
    pub(crate) fn node_sizes(&self) -> impl Iterator<Item = u32> + '_ {
        let mut node = self.next;
        let head = if self.size > 0 { Some(self.size) } else { None };
        head.into_iter().chain(core::iter::from_fn(move || {
            if node.is_null() {
                return None;
            }
            // Safety: the chain is carved and initialized.
            let n = unsafe { &mut *node };
            node = n.next.as_mut_ptr();
            Some(n.size)
        }))
    }
}

/// A NUL-terminated byte string carved from an arena.
pub struct StrContent<'a> {
    ptr: NonNull<u8>,
    span: BlockSpan,
    _storage: PhantomData<&'a mut [u8]>,
}

impl<'a> StrContent<'a> {
    /// # Safety
    ///
    /// `ptr` must address a NUL-terminated UTF-8 string carved from `span`.
    pub(crate) unsafe fn from_raw(ptr: NonNull<u8>, span: BlockSpan) -> Self {
        StrContent {
            ptr,
            span,
            _storage: PhantomData,
        }
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// The block the string was carved from.
    pub fn span(&self) -> BlockSpan {
        self.span
    }

    /// The string, up to its terminator.
    pub fn as_str(&self) -> &str {
        // Safety: written from a `&str` by `Arena::create_string`.
        unsafe {
            let c = core::ffi::CStr::from_ptr(self.ptr.as_ptr() as *const core::ffi::c_char);
            core::str::from_utf8_unchecked(c.to_bytes())
        }
    }
}

/// A NUL-terminated UTF-16 string carved from an arena.
pub struct WStrContent<'a> {
    ptr: NonNull<u16>,
    span: BlockSpan,
    _storage: PhantomData<&'a mut [u16]>,
}

impl<'a> WStrContent<'a> {
    /// # Safety
    ///
    /// `ptr` must address NUL-terminated UTF-16 carved from `span`.
    pub(crate) unsafe fn from_raw(ptr: NonNull<u16>, span: BlockSpan) -> Self {
        WStrContent {
            ptr,
            span,
            _storage: PhantomData,
        }
    }

    pub(crate) fn as_ptr(&self) -> *const u16 {
        self.ptr.as_ptr()
    }

    /// The block the string was carved from.
    pub fn span(&self) -> BlockSpan {
        self.span
    }

    /// The code units, without the terminator.
    pub fn units(&self) -> &[u16] {
        // Safety: NUL-terminated, see from_raw.
        unsafe { crate::wstr::units_from_ptr(self.ptr.as_ptr()) }
    }
}
