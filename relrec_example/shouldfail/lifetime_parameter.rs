use core::marker::PhantomData;
use relrec::define_record;

#[define_record]
pub struct Borrowing<'a> {
    pub marker: PhantomData<&'a u8>,
}

fn main() {}
