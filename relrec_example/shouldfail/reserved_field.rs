use relrec::define_record;

#[define_record]
pub struct Shadowing {
    pub __record_header: u32,
}

fn main() {}
