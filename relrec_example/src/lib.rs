//! Example records built with `#[define_record]`, and the cross-module tests
//! of the `relrec` crate.
//!
//! [`PersonData`] is an ordinary owned value; [`write_person`] and
//! [`read_person`] convert between it and a [`Person`] record.

use core::pin::Pin;
use relrec::prelude::*;
use thiserror::Error;

#[define_record]
/// A pet, stored inline in its owner's `pets` vector.
pub struct Pet {
    /// Free-form species code.
    pub species: u8,
    /// The pet's name.
    pub name: Str,
}

#[define_record]
/// A person, with one field of every container kind.
pub struct Person {
    /// Unique id.
    pub id: u64,
    /// Age in years.
    pub age: u32,
    /// Four lucky numbers.
    pub lucky: Array<u8, 4>,
    /// Full name.
    pub name: Str,
    /// Display name, stored as UTF-16.
    pub nickname: WStr,
    /// Email addresses, in order of preference.
    pub emails: List<Str>,
    /// Score per subject.
    pub scores: Map<Str, u32>,
    pub numbers: Vector<u32>,
    pub pets: Vector<Pet>,
}

#[define_record]
/// A named group of people, each stored inline in the team's block.
pub struct Team {
    pub name: Str,
    pub members: Vector<Person>,
}

/// The owned, heap-allocated counterpart of [`Person`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersonData {
    pub id: u64,
    pub age: u32,
    pub lucky: [u8; 4],
    pub name: String,
    pub nickname: String,
    pub emails: Vec<String>,
    pub scores: Vec<(String, u32)>,
    pub numbers: Vec<u32>,
    pub pets: Vec<(u8, String)>,
}

/// Failure to build a record from owned data.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error("record has no arena")]
    NoArena,
}

/// Carves everything `data` needs from `arena` and commits it into the
/// fields `f`.
///
/// `f` may belong to a nested record, as long as it lives in the block
/// `arena` belongs to. Storage carved before a failure stays in the arena.
pub fn fill_person(
    arena: &mut Arena<'_>,
    f: person::Muts<'_>,
    data: &PersonData,
) -> Result<(), CapacityError> {
    let person::Muts {
        mut id,
        mut age,
        lucky,
        name,
        nickname,
        emails,
        scores,
        numbers,
        pets,
    } = f;
    id.set(data.id);
    age.set(data.age);
    lucky.as_mut_slice().copy_from_slice(&data.lucky);
    name.assign(arena.create_string(&data.name)?);
    nickname.assign(arena.create_wstring(&data.nickname)?);

    let mut list = arena.create_list::<Str>(data.emails.len())?;
    for (i, email) in data.emails.iter().enumerate() {
        let s = arena.create_string(email)?;
        if let Some(slot) = list.get_mut(i) {
            slot.assign(s);
        }
    }
    emails.assign(list);

    let mut map = arena.create_map::<Str, u32>(data.scores.len())?;
    for (i, (subject, score)) in data.scores.iter().enumerate() {
        let key = arena.create_string(subject)?;
        if let Some(pair) = map.get_mut(i) {
            let (k, mut v) = pair.project();
            k.assign(key);
            v.set(*score);
        }
    }
    scores.assign(map);

    let mut values = arena.create_vector::<u32>(data.numbers.len())?;
    values.as_mut_slice().copy_from_slice(&data.numbers);
    numbers.assign(values);

    let mut animals = arena.create_vector::<Pet>(data.pets.len())?;
    for (i, (code, pet_name)) in data.pets.iter().enumerate() {
        let s = arena.create_string(pet_name)?;
        if let Some(slot) = animals.get_mut(i) {
            let pet::Muts { mut species, name } = slot.muts();
            species.set(*code);
            name.assign(s);
        }
    }
    pets.assign(animals);
    Ok(())
}

/// Writes `data` into `person`, carving from the person's own arena.
pub fn write_person(person: Pin<&mut Person>, data: &PersonData) -> Result<(), BuildError> {
    let (arena, fields) = person.split();
    let mut arena = arena.ok_or(BuildError::NoArena)?;
    fill_person(&mut arena, fields, data)?;
    Ok(())
}

/// Copies every field of `person` out into owned values.
///
/// A block written by an older definition of [`Person`] lacks the later
/// fields; those are left at their defaults without being read.
pub fn read_person(person: &Person) -> PersonData {
    macro_rules! present {
        ($field:ident) => {
            person.has_member(core::ptr::addr_of!(person.$field))
        };
    }
    let mut data = PersonData::default();
    if present!(id) {
        data.id = person.id;
    }
    if present!(age) {
        data.age = person.age;
    }
    if present!(lucky) {
        data.lucky.copy_from_slice(person.lucky.as_slice());
    }
    if present!(name) {
        data.name = person.name.to_string();
    }
    if present!(nickname) {
        data.nickname = person.nickname.to_string_lossy();
    }
    if present!(emails) {
        data.emails = person.emails.iter().map(|e| e.to_string()).collect();
    }
    if present!(scores) {
        data.scores = person
            .scores
            .iter()
            .map(|pair| (pair.key.to_string(), pair.value))
            .collect();
    }
    if present!(numbers) {
        data.numbers = person.numbers.as_slice().to_vec();
    }
    if present!(pets) {
        data.pets = person
            .pets
            .iter()
            .map(|pet| (pet.species, pet.name.to_string()))
            .collect();
    }
    data
}

/// Builds a person in a heap block of `capacity` bytes.
pub fn build_person(capacity: usize, data: &PersonData) -> Result<RecordBox<Person>, BuildError> {
    let mut rec = RecordBox::<Person>::new(capacity)?;
    write_person(rec.as_mut(), data)?;
    Ok(rec)
}

/// Builds a person in a block with no free space left over.
///
/// Tries doubling capacities until `data` fits, then copies the result into
/// a block of exactly its used size.
pub fn build_person_fitted(data: &PersonData) -> Result<RecordBox<Person>, BuildError> {
    let mut capacity = core::mem::size_of::<Person>() + 256;
    loop {
        match build_person(capacity, data) {
            Ok(rec) => return Ok(RecordBox::new_copy(&rec)?),
            Err(BuildError::Capacity(err)) => {
                tracing::debug!(capacity, %err, "person does not fit, doubling block");
                capacity = capacity.checked_mul(2).ok_or(BlockError::TooLarge(usize::MAX))?;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Builds a team whose members live inline in its `members` vector.
pub fn build_team(
    capacity: usize,
    name: &str,
    members: &[PersonData],
) -> Result<RecordBox<Team>, BuildError> {
    let mut rec = RecordBox::<Team>::new(capacity)?;
    {
        let (arena, fields) = rec.as_mut().split();
        let mut arena = arena.ok_or(BuildError::NoArena)?;
        fields.name.assign(arena.create_string(name)?);
        let mut carved = arena.create_vector::<Person>(members.len())?;
        for (i, data) in members.iter().enumerate() {
            if let Some(slot) = carved.get_mut(i) {
                fill_person(&mut arena, slot.muts(), data)?;
            }
        }
        fields.members.assign(carved);
    }
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoffset::offset_of;
    use proptest::prelude::*;
    use relrec::placement;
    use std::io::Write;
    use std::mem::size_of;

    fn harry() -> PersonData {
        PersonData {
            id: 7,
            age: 16,
            lucky: [3, 7, 9, 42],
            name: "Harry Potter".to_string(),
            nickname: "Hárry ⚡".to_string(),
            emails: vec!["harry@example.com".to_string(), "hp@example.com".to_string()],
            scores: vec![("potions".to_string(), 61), ("flying".to_string(), 98)],
            numbers: vec![4, 8, 15, 16, 23, 42],
            pets: vec![(1, "Hedwig".to_string())],
        }
    }

    #[repr(C, align(16))]
    struct Buf([u8; 4096]);

    #[define_record]
    struct Word {
        pad: u32,
        text: Str,
    }

    #[define_record]
    struct Numbers {
        values: Vector<i32>,
    }

    #[define_record]
    struct Log {
        entries: List<u16>,
    }

    #[define_record]
    struct Lookup {
        lookup: Map<u16, u32>,
    }

    #[define_record]
    struct PersonV1 {
        id: u64,
        age: u32,
    }

    #[test]
    fn test_layout() {
        assert_eq!(size_of::<Word>(), 16);
        assert_eq!(offset_of!(Word, pad), 8);
        assert_eq!(offset_of!(Word, text), 12);

        assert_eq!(size_of::<Pet>(), 16);
        assert_eq!(offset_of!(Pet, name), 12);

        assert_eq!(offset_of!(Person, id), 8);
        assert_eq!(offset_of!(Person, age), 16);
        assert_eq!(offset_of!(Person, lucky), 20);
        assert_eq!(offset_of!(Person, name), 24);
        assert_eq!(offset_of!(Person, nickname), 28);
        assert_eq!(offset_of!(Person, emails), 32);
        assert_eq!(offset_of!(Person, scores), 44);
        assert_eq!(offset_of!(Person, numbers), 52);
        assert_eq!(offset_of!(Person, pets), 60);
        assert_eq!(size_of::<Person>(), 72);
    }

    #[test]
    fn string_in_hundred_byte_arena() {
        let mut rec = RecordBox::<Word>::new(16 + 100).unwrap();
        assert_eq!(rec.struct_size(), 16);
        let (arena, fields) = rec.as_mut().split();
        fields.text.assign(arena.unwrap().create_string("gong").unwrap());
        assert_eq!(rec.text.as_c_str().to_bytes(), b"gong");
        assert_eq!(rec.text.len(), 4);
        assert!(!rec.text.is_empty());
    }

    #[test]
    fn vector_of_five() {
        let mut rec = RecordBox::<Numbers>::new(128).unwrap();
        let (arena, fields) = rec.as_mut().split();
        let mut values = arena.unwrap().create_vector::<i32>(5).unwrap();
        for (i, v) in values.as_mut_slice().iter_mut().enumerate() {
            *v = i as i32;
        }
        fields.values.assign(values);
        assert_eq!(
            rec.values.at(5).unwrap_err(),
            RangeError::Index {
                container: "Vector",
                index: 5,
                len: 5
            }
        );
        assert_eq!(rec.values.at(4), Ok(&4));
        assert_eq!(rec.values[4], 4);
    }

    #[test]
    #[should_panic(expected = "Vector index 5 out of range for length 5")]
    fn vector_index_past_end_panics() {
        let mut rec = RecordBox::<Numbers>::new(128).unwrap();
        let (arena, fields) = rec.as_mut().split();
        fields.values.assign(arena.unwrap().create_vector::<i32>(5).unwrap());
        let _ = rec.values[5];
    }

    #[test]
    fn write_and_read_back() {
        let data = harry();
        let rec = build_person(1024, &data).unwrap();
        assert_eq!(read_person(&rec), data);
        assert_eq!(rec.scores["flying"], 98);
        assert_eq!(rec.emails[0], "harry@example.com");
        assert_eq!(rec.nickname, "Hárry ⚡");
        assert_eq!(rec.pets[0].name, "Hedwig");
    }

    #[test]
    fn relocation_by_byte_copy() {
        let data = harry();
        let rec = build_person(1024, &data).unwrap();
        let bytes = rec.as_bytes();

        // Two different places in the same buffer.
        let mut buf = Box::new(Buf([0; 4096]));
        for start in [0, 1024 + 48] {
            let end = start + 2048;
            buf.0[start..start + bytes.len()].copy_from_slice(bytes);
            let moved = unsafe { placement::from_bytes_mut::<Person>(&mut buf.0[start..end]) }.unwrap();
            assert_eq!(moved.capacity(), 2048);
            assert_eq!(read_person(&moved), data);
        }

        drop(rec);
        let data2 = PersonData {
            age: 17,
            ..harry()
        };
        let mut again = unsafe { RecordBox::<Person>::from_bytes(&buf.0[1072..1072 + 2048]) }.unwrap();
        again.as_mut().muts().age.set(17);
        assert_eq!(read_person(&again), data2);
    }

    #[test]
    fn fitted_block_is_full() {
        let data = harry();
        let mut rec = build_person_fitted(&data).unwrap();
        assert_eq!(rec.capacity(), rec.used_space());
        assert_eq!(read_person(&rec), data);
        let mut arena = rec.as_mut().arena().unwrap();
        assert_eq!(arena.available(), 0);
        assert!(arena.create_string("more").is_err());
    }

    #[test]
    fn copies_are_independent() {
        let data = harry();
        let src = build_person(1024, &data).unwrap();
        let mut dst = RecordBox::<Person>::new(2048).unwrap();
        dst.copy_from(&src).unwrap();
        drop(src);
        assert_eq!(dst.capacity(), 2048);
        assert_eq!(read_person(&dst), data);

        let mut copy = RecordBox::new_copy(&dst).unwrap();
        {
            let (arena, fields) = dst.as_mut().split();
            let mut arena = arena.unwrap();
            fields.name.assign(arena.create_string("Harry James Potter").unwrap());
            let extra = arena.create_string("harry@hogwarts.edu").unwrap();
            let mut node = arena.create_list::<Str>(1).unwrap();
            node.get_mut(0).unwrap().assign(extra);
            fields.emails.append(&mut arena, node).unwrap();
        }
        assert_eq!(dst.name, "Harry James Potter");
        assert_eq!(dst.emails.len(), 3);
        assert_eq!(read_person(&copy), data);

        copy.as_mut().muts().numbers.clear();
        assert_eq!(copy.numbers.len(), 0);
        assert_eq!(dst.numbers.len(), 6);
    }

    #[test]
    fn copy_into_small_block_is_rejected() {
        let src = build_person(1024, &harry()).unwrap();
        let mut dst = RecordBox::<Person>::new(size_of::<Person>() + 16).unwrap();
        let err = dst.copy_from(&src).unwrap_err();
        assert_eq!(err.required, src.used_space());
        assert_eq!(err.available, size_of::<Person>() + 16);
        assert_eq!(read_person(&dst), PersonData::default());
    }

    #[test]
    fn persist_and_reload() {
        let data = harry();
        let rec = build_person(1024, &data).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(rec.as_bytes()).unwrap();
        file.flush().unwrap();
        drop(rec);

        let bytes = std::fs::read(file.path()).unwrap();
        let mut loaded =
            unsafe { RecordBox::<Person>::from_bytes_with_capacity(&bytes, bytes.len() + 256) }
                .unwrap();
        assert_eq!(loaded.capacity(), bytes.len() + 256);
        assert_eq!(read_person(&loaded), data);

        let (arena, fields) = loaded.as_mut().split();
        let mut arena = arena.unwrap();
        let mut extra = arena.create_vector::<u32>(2).unwrap();
        extra.as_mut_slice().copy_from_slice(&[100, 200]);
        fields.numbers.assign(extra);
        assert_eq!(loaded.numbers.as_slice(), &[100, 200]);
    }

    #[test]
    fn person_in_bump_arena() {
        let bump = bumpalo::Bump::new();
        let data = harry();
        let mut rec = placement::new_in::<Person>(1024, &bump).unwrap();
        write_person(rec.as_mut(), &data).unwrap();
        assert_eq!(rec.capacity(), 1024);
        assert_eq!(read_person(&rec), data);
    }

    #[test]
    fn inline_record_moves_before_pinning() {
        let rec = InlineRecord::<Person, 512>::new();
        let mut rec = Box::pin(rec);
        write_person(rec.as_mut().record_mut(), &harry()).unwrap();
        let copy = unsafe { RecordBox::<Person>::from_bytes(rec.as_bytes()) }.unwrap();
        assert_eq!(read_person(&copy), harry());
        assert_eq!(rec.capacity(), size_of::<Person>() + 512);
    }

    #[test]
    fn no_arena_is_reported() {
        let mut rec = RecordBox::<Person>::new(size_of::<Person>()).unwrap();
        assert!(matches!(
            write_person(rec.as_mut(), &harry()),
            Err(BuildError::NoArena)
        ));
    }

    #[test]
    fn older_block_lacks_newer_members() {
        let mut old = RecordBox::<PersonV1>::new(64).unwrap();
        {
            let mut m = old.as_mut().muts();
            m.id.set(11);
            m.age.set(40);
        }
        let bytes = old.as_bytes().to_vec();
        let loaded = unsafe { RecordBox::<Person>::from_bytes(&bytes) }.unwrap();
        let new: &Person = &loaded;
        assert_eq!(new.struct_size(), size_of::<PersonV1>());
        assert!(new.has_member(std::ptr::addr_of!(new.id)));
        assert!(new.has_member(std::ptr::addr_of!(new.age)));
        assert!(!new.has_member(std::ptr::addr_of!(new.name)));
        assert!(!new.has_member(std::ptr::addr_of!(new.pets)));
        assert_eq!(new.id, 11);
        assert_eq!(new.age, 40);
        assert_eq!(
            read_person(new),
            PersonData {
                id: 11,
                age: 40,
                ..PersonData::default()
            }
        );
    }

    #[test]
    fn find_by_offset() {
        let rec = build_person(512, &harry()).unwrap();
        // Safety: scalars, and a vector read from where it was built.
        unsafe {
            assert_eq!(rec.find::<u64>(offset_of!(Person, id)), Some(&7));
            assert_eq!(rec.find::<u32>(offset_of!(Person, age)), Some(&16));
            assert!(rec.find::<u64>(9).is_none());
            assert!(rec.find::<u64>(rec.capacity()).is_none());
            assert!(rec.find::<u8>(rec.capacity() - 1).is_some());
            let numbers = rec.find::<Vector<u32>>(offset_of!(Person, numbers)).unwrap();
            assert_eq!(numbers.as_slice(), &[4, 8, 15, 16, 23, 42]);
        }
    }

    #[test]
    fn concurrent_readers() {
        let data = harry();
        let rec = build_person(1024, &data).unwrap();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..100 {
                        assert_eq!(read_person(&rec), data);
                        assert_eq!(rec.scores.get("potions"), Some(&61));
                    }
                });
            }
        });
    }

    #[test]
    fn team_members_are_nested_records() {
        let ron = PersonData {
            id: 8,
            name: "Ron Weasley".to_string(),
            pets: vec![(2, "Scabbers".to_string())],
            ..PersonData::default()
        };
        let team = build_team(4096, "Gryffindor", &[harry(), ron.clone()]).unwrap();
        assert_eq!(team.name, "Gryffindor");
        assert_eq!(team.members.len(), 2);
        assert_eq!(read_person(&team.members[0]), harry());
        assert_eq!(read_person(&team.members[1]), ron);
        // Nested records share the outer block's arena.
        assert_eq!(team.members[1].struct_size(), size_of::<Person>());
        assert!(team.members[1].header().arena().is_none());

        let moved = RecordBox::new_copy(&team).unwrap();
        assert_eq!(read_person(&moved.members[1]), ron);
    }

    #[test]
    fn team_member_moves_out_by_value() {
        let team = build_team(4096, "Gryffindor", &[harry()]).unwrap();
        let member = read_person(&team.members[0]);
        let mut own = RecordBox::<Person>::new(1024).unwrap();
        write_person(own.as_mut(), &member).unwrap();
        drop(team);
        assert_eq!(read_person(&own), harry());
        assert!(own.span().contains(own.numbers.as_slice().as_ptr() as *const u8));
        assert!(own.span().contains(own.name.as_c_str().as_ptr() as *const u8));
    }

    #[cfg(not(miri))]
    #[test]
    fn macro_errors_are_reported() {
        let t = trybuild::TestCases::new();
        t.compile_fail("shouldfail/*.rs");
    }

    #[test]
    #[should_panic(expected = "different block")]
    fn carving_from_another_block_panics() {
        let mut a = RecordBox::<Person>::new(256).unwrap();
        let mut b = RecordBox::<Person>::new(256).unwrap();
        let s = a.as_mut().arena().unwrap().create_string("stray").unwrap();
        b.as_mut().muts().name.assign(s);
    }

    #[test]
    fn list_append_value_adds_each_element() {
        let mut rec = RecordBox::<Log>::new(512).unwrap();
        let (arena, fields) = rec.as_mut().split();
        let mut arena = arena.unwrap();
        let mut entries = fields.entries;
        entries.as_mut().push(&mut arena, 1).unwrap();
        let mut more = arena.create::<u16>(3).unwrap();
        more.as_mut_slice().copy_from_slice(&[2, 3, 4]);
        entries.as_mut().append_value(&mut arena, more).unwrap();
        assert_eq!(entries.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(entries.len(), 4);
    }

    #[derive(Clone, Debug)]
    enum ListOp {
        Push(u16),
        Resize(usize),
        Clear,
    }

    fn arb_list_op() -> impl Strategy<Value = ListOp> {
        prop_oneof![
            4 => any::<u16>().prop_map(ListOp::Push),
            2 => (0usize..20).prop_map(ListOp::Resize),
            1 => Just(ListOp::Clear),
        ]
    }

    prop_compose! {
        fn arb_person()(
            id in any::<u64>(),
            age in 0u32..130,
            lucky in any::<[u8; 4]>(),
            name in "[a-zA-Z ]{0,16}",
            nickname in "\\PC{0,8}",
            emails in proptest::collection::vec("[a-z]{1,8}@[a-z]{1,8}\\.org", 0..5),
            scores in proptest::collection::vec(("[a-z]{1,6}", any::<u32>()), 0..5),
            numbers in proptest::collection::vec(any::<u32>(), 0..10),
            pets in proptest::collection::vec((any::<u8>(), "[a-z]{0,6}"), 0..3),
        ) -> PersonData {
            PersonData { id, age, lucky, name, nickname, emails, scores, numbers, pets }
        }
    }

    proptest! {
        #[test]
        fn list_tracks_a_vec(ops in proptest::collection::vec(arb_list_op(), 0..30)) {
            let mut rec = RecordBox::<Log>::new(1 << 16).unwrap();
            let mut model: Vec<u16> = Vec::new();
            {
                let (arena, fields) = rec.as_mut().split();
                let mut arena = arena.unwrap();
                let mut entries = fields.entries;
                for op in ops {
                    match op {
                        ListOp::Push(v) => {
                            entries.as_mut().push(&mut arena, v).unwrap();
                            model.push(v);
                        }
                        ListOp::Resize(n) => {
                            entries.as_mut().resize(&mut arena, n).unwrap();
                            model.resize(n, 0);
                        }
                        ListOp::Clear => {
                            entries.as_mut().clear();
                            model.clear();
                        }
                    }
                    prop_assert_eq!(entries.len(), model.len());
                }
            }
            prop_assert_eq!(rec.entries.iter().copied().collect::<Vec<_>>(), model);
        }

        #[test]
        fn map_agrees_with_first_match(
            pairs in proptest::collection::vec((0u16..20, any::<u32>()), 0..16),
        ) {
            let mut rec = RecordBox::<Lookup>::new(1024).unwrap();
            {
                let (arena, fields) = rec.as_mut().split();
                let mut carved = arena.unwrap().create_map::<u16, u32>(pairs.len()).unwrap();
                for (i, (k, v)) in pairs.iter().enumerate() {
                    let (mut key, mut value) = carved.get_mut(i).unwrap().project();
                    key.set(*k);
                    value.set(*v);
                }
                fields.lookup.assign(carved);
            }
            prop_assert_eq!(rec.lookup.len(), pairs.len());
            for k in 0u16..25 {
                let expected = pairs.iter().find(|(pk, _)| *pk == k).map(|(_, v)| v);
                prop_assert_eq!(rec.lookup.get(&k), expected);
                prop_assert_eq!(rec.lookup.contains_key(&k), expected.is_some());
                prop_assert_eq!(rec.lookup.at(&k).ok(), expected);
            }
        }

        #[test]
        fn relocation_preserves_every_field(data in arb_person(), shift in 0usize..8) {
            let rec = build_person_fitted(&data).unwrap();
            let bytes = rec.as_bytes();
            prop_assert!(bytes.len() <= 2048);
            let start = shift * 16;
            let mut buf = Box::new(Buf([0xa5; 4096]));
            buf.0[start..start + bytes.len()].copy_from_slice(bytes);
            drop(rec);
            let moved = unsafe { placement::from_bytes::<Person>(&buf.0[start..start + 2048]) }.unwrap();
            prop_assert_eq!(read_person(moved), data);
        }
    }
}
