use relrec::define_record;

#[define_record]
pub enum Choice {
    Left,
    Right,
}

fn main() {}
