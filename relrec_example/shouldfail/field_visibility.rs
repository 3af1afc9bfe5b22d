mod inner {
    use relrec::define_record;

    #[define_record]
    pub struct Restricted {
        pub(in crate::inner) value: u32,
    }
}

fn main() {}
