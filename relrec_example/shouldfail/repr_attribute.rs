use relrec::define_record;

#[define_record]
#[repr(packed)]
pub struct Packed {
    pub value: u32,
}

fn main() {}
