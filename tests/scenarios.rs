//! End-to-end scenarios with literal values, mirroring spec.md §8.

use tabulae::alloc::HeapAllocator;
use tabulae::group::Group;
use tabulae::query::QueryBuilder;
use tabulae::table::{ColumnType, Table};

#[test]
fn s1_basic_int_column() {
    let mut alloc = HeapAllocator::new();
    let mut table = Table::create(&mut alloc).unwrap();
    table.register_column(&mut alloc, ColumnType::Int, "x").unwrap();

    for v in [0i64, 1, -1, 1000, -1000, 1i64 << 40] {
        table.add_empty_row(&mut alloc).unwrap();
        let row = table.size(&alloc) - 1;
        table.set_int(&mut alloc, 0, row, v).unwrap();
    }

    assert_eq!(table.size(&alloc), 6);

    let values: Vec<i64> = (0..table.size(&alloc)).map(|row| table.get_int(&alloc, 0, row)).collect();
    assert_eq!(values.iter().position(|&v| v == -1000), Some(4));
    assert_eq!(values.iter().map(|&v| v as i128).sum::<i128>(), (1i64 << 40) as i128 + 999);
}

#[test]
fn s2_string_promotion() {
    let mut alloc = HeapAllocator::new();
    let mut table = Table::create(&mut alloc).unwrap();
    table.register_column(&mut alloc, ColumnType::String, "s").unwrap();

    let thirty = vec![b'x'; 30];
    let three_hundred = vec![b'y'; 300];
    for v in [&b"a"[..], &b"bc"[..], &thirty[..], &three_hundred[..]] {
        table.add_empty_row(&mut alloc).unwrap();
        let row = table.size(&alloc) - 1;
        table.set_string(&mut alloc, 0, row, v).unwrap();
    }

    assert_eq!(table.size(&alloc), 4);
    assert_eq!(table.get_string(&alloc, 0, 0), b"a");
    assert_eq!(table.get_string(&alloc, 0, 1), b"bc");
    assert_eq!(table.get_string(&alloc, 0, 2), thirty);
    assert_eq!(table.get_string(&alloc, 0, 3), three_hundred);
}

#[test]
fn s3_btree_split() {
    let mut alloc = HeapAllocator::new();
    let mut table = Table::create(&mut alloc).unwrap();
    table.register_column(&mut alloc, ColumnType::Int, "n").unwrap();

    for i in 0..10_000i64 {
        table.add_empty_row(&mut alloc).unwrap();
        table.set_int(&mut alloc, 0, i as usize, i).unwrap();
    }

    assert_eq!(table.size(&alloc), 10_000);
    for i in 0..10_000i64 {
        assert_eq!(table.get_int(&alloc, 0, i as usize), i);
    }
}

#[test]
fn s4_subtable_query() {
    let mut alloc = HeapAllocator::new();
    let mut parent = Table::create(&mut alloc).unwrap();
    parent.register_column(&mut alloc, ColumnType::Int, "id").unwrap();
    parent.register_column(&mut alloc, ColumnType::Subtable, "child").unwrap();

    for id in 1..=5i64 {
        parent.add_empty_row(&mut alloc).unwrap();
        let row = parent.size(&alloc) - 1;
        parent.set_int(&mut alloc, 0, row, id).unwrap();
    }

    let mut child = parent.get_subtable(&mut alloc, 1, 2).unwrap();
    child.register_column(&mut alloc, ColumnType::Int, "v").unwrap();
    for v in [10i64, 20, 30] {
        child.add_empty_row(&mut alloc).unwrap();
        let row = child.size(&alloc) - 1;
        child.set_int(&mut alloc, 0, row, v).unwrap();
    }
    parent.set_subtable(&mut alloc, 1, 2, &child).unwrap();

    let mut builder = QueryBuilder::new(&alloc, &parent);
    builder
        .int_gt(&alloc, "id", 0)
        .unwrap()
        .subtable(&alloc, "child")
        .unwrap()
        .int_gt(&alloc, "v", 25)
        .unwrap()
        .parent()
        .unwrap();
    let query = builder.build().unwrap();

    assert_eq!(query.find_all(&alloc, &parent), vec![2]);
}

#[test]
fn s5_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("a.tdb");
    let path_b = dir.path().join("b.tdb");

    {
        let mut group: Group<{ 1 << 24 }> = Group::new().unwrap();
        let mut table = group.get_or_create_table("data").unwrap();
        table.register_column(group.allocator_mut(), ColumnType::Int, "x").unwrap();
        for v in [0i64, 1, -1, 1000, -1000, 1i64 << 40] {
            table.add_empty_row(group.allocator_mut()).unwrap();
            let row = table.size(group.allocator()) - 1;
            table.set_int(group.allocator_mut(), 0, row, v).unwrap();
        }
        group.save_table("data", &table).unwrap();
        group.write(&path_a).unwrap();
    }

    let reopened: Group<{ 1 << 24 }> = Group::open(&path_a).unwrap();
    let table = reopened.get_table("data").unwrap();
    assert_eq!(table.size(reopened.allocator()), 6);
    for (row, v) in [0i64, 1, -1, 1000, -1000, 1i64 << 40].into_iter().enumerate() {
        assert_eq!(table.get_int(reopened.allocator(), 0, row), v);
    }

    let mut writer: Group<{ 1 << 24 }> = Group::open(&path_a).unwrap();
    let mut table = writer.get_or_create_table("data").unwrap();
    table.add_empty_row(writer.allocator_mut()).unwrap();
    writer.save_table("data", &table).unwrap();
    writer.write(&path_b).unwrap();

    let reopened_b: Group<{ 1 << 24 }> = Group::open(&path_b).unwrap();
    let table_b = reopened_b.get_table("data").unwrap();
    assert_eq!(table_b.size(reopened_b.allocator()), 7);
}

#[test]
fn s6_copy_on_write_isolation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cow.tdb");

    {
        let mut group: Group<{ 1 << 24 }> = Group::new().unwrap();
        let mut table = group.get_or_create_table("data").unwrap();
        table.register_column(group.allocator_mut(), ColumnType::Int, "x").unwrap();
        table.add_empty_row(group.allocator_mut()).unwrap();
        table.set_int(group.allocator_mut(), 0, 0, 7).unwrap();
        group.save_table("data", &table).unwrap();
        group.write(&path).unwrap();
    }

    let reader: Group<{ 1 << 24 }> = Group::open(&path).unwrap();
    let reader_table = reader.get_table("data").unwrap();
    let before = reader_table.get_int(reader.allocator(), 0, 0);

    let mut writer: Group<{ 1 << 24 }> = Group::open(&path).unwrap();
    let mut writer_table = writer.get_or_create_table("data").unwrap();
    writer_table.set_int(writer.allocator_mut(), 0, 0, 42).unwrap();
    writer.save_table("data", &writer_table).unwrap();

    let after_writer = writer_table.get_int(writer.allocator(), 0, 0);
    let still_before = reader_table.get_int(reader.allocator(), 0, 0);

    assert_eq!(before, 7);
    assert_eq!(after_writer, 42);
    assert_eq!(still_before, 7);
}
