//! Single module with almost all `relrec` exports
//!
//! # Examples
//!
//! Import all into current scope:
//!
//! ```
//! use relrec::prelude::*;
//! ```
//!
//! Import all, named:
//!
//! ```
//! use relrec::prelude as rr;
//! ```

pub use crate::arena::{Arena, ArenaHeader};
pub use crate::array::Array;
pub use crate::carve::{Carved, ListContent, StrContent, WStrContent};
#[cfg(feature = "macro")]
pub use crate::define_record;
pub use crate::error::{BlockError, CapacityError, RangeError};
pub use crate::inline::InlineRecord;
pub use crate::list::List;
pub use crate::map::{Map, Pair};
pub use crate::offset_ptr::OffsetPtr;
pub use crate::rbox::RecordBox;
pub use crate::record::{Record, RecordHeader};
pub use crate::str::Str;
pub use crate::vector::Vector;
pub use crate::wstr::WStr;
pub use crate::Plain;
