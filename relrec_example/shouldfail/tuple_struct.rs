use relrec::define_record;

#[define_record]
pub struct Tuple(pub u32);

fn main() {}
