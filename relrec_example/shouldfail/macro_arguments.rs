use relrec::define_record;

#[define_record(packed)]
pub struct WithArguments {
    pub value: u32,
}

fn main() {}
