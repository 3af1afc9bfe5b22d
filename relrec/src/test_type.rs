//! A record written out by hand, in the shape `#[define_record]` generates,
//! for the unit tests of this crate.

use crate::macro_support::{arena_of, init_header};
use crate::{Arena, List, Map, Plain, Record, RecordHeader, Str, Vector};
use core::pin::Pin;

#[repr(C)]
pub struct Sample {
    __record_header: RecordHeader,
    pub id: u64,
    pub name: Str,
    pub values: Vector<u32>,
    pub tags: List<u16>,
    pub squares: Map<u16, u64>,
}

unsafe impl Plain for Sample {
    fn init_zeroed(self: Pin<&mut Self>) {
        unsafe {
            let this = self.get_unchecked_mut();
            init_header::<Self>(Pin::new_unchecked(&mut this.__record_header));
            Plain::init_zeroed(Pin::new_unchecked(&mut this.name));
            Plain::init_zeroed(Pin::new_unchecked(&mut this.values));
            Plain::init_zeroed(Pin::new_unchecked(&mut this.tags));
            Plain::init_zeroed(Pin::new_unchecked(&mut this.squares));
        }
    }
}

unsafe impl Record for Sample {}

impl core::fmt::Debug for Sample {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sample")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("values", &self.values)
            .field("tags", &self.tags)
            .field("squares", &self.squares)
            .finish()
    }
}

pub struct SampleMuts<'a> {
    pub id: Pin<&'a mut u64>,
    pub name: Pin<&'a mut Str>,
    pub values: Pin<&'a mut Vector<u32>>,
    pub tags: Pin<&'a mut List<u16>>,
    pub squares: Pin<&'a mut Map<u16, u64>>,
}

impl Sample {
    pub const SIZE: usize = core::mem::size_of::<Sample>();

    unsafe fn muts_of<'a>(base: *mut Self) -> SampleMuts<'a> {
        SampleMuts {
            id: Pin::new_unchecked(&mut (*base).id),
            name: Pin::new_unchecked(&mut (*base).name),
            values: Pin::new_unchecked(&mut (*base).values),
            tags: Pin::new_unchecked(&mut (*base).tags),
            squares: Pin::new_unchecked(&mut (*base).squares),
        }
    }

    pub fn muts<'a>(self: Pin<&'a mut Self>) -> SampleMuts<'a> {
        unsafe { Self::muts_of(self.get_unchecked_mut()) }
    }

    pub fn split<'a>(self: Pin<&'a mut Self>) -> (Option<Arena<'a>>, SampleMuts<'a>) {
        unsafe {
            let base: *mut Self = self.get_unchecked_mut();
            (arena_of::<Self>(base), Self::muts_of(base))
        }
    }
}

#[test]
fn layout() {
    assert_eq!(Sample::SIZE, 48);
    assert_eq!(core::mem::size_of::<RecordHeader>(), 8);
    assert_eq!(core::mem::size_of::<List<u16>>(), 12);
    assert_eq!(core::mem::size_of::<Vector<u32>>(), 8);
}

#[test]
fn debug_lists_fields() {
    let rec = crate::RecordBox::<Sample>::new(Sample::SIZE).unwrap();
    assert_eq!(
        format!("{:?}", *rec),
        "Sample { id: 0, name: \"\", values: [], tags: [], squares: {} }"
    );
}
