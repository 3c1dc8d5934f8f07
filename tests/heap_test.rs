mod test_utils;

use minnow_db::{
    storage::field::Cell, storage::tuple::Tuple, BufferPool, Database, Transaction,
};

use crate::test_utils::{new_empty_heap_table, setup};

#[test]
fn test_insert_delete_roundtrip() {
    setup();

    let path = "data/test_heap_roundtrip.db";
    let table = new_empty_heap_table(path, 2);

    // insert three rows and commit
    let tx = Transaction::new();
    for (a, b) in [(1, 10), (2, 20), (3, 30)] {
        let tuple = Tuple::new(&[Cell::Int64(a), Cell::Int64(b)]);
        table.insert_tuple(&tx, &tuple).unwrap();
    }
    tx.commit().unwrap();

    // delete the middle row and commit
    let tx = Transaction::new();
    let victim = table
        .iter(&tx)
        .find(|t| t.get_cell(0) == Cell::Int64(2))
        .unwrap();
    table.delete_tuple(&tx, &victim).unwrap();
    tx.commit().unwrap();

    // exactly the two survivors remain
    let tx = Transaction::new();
    let rows: Vec<(i64, i64)> = table
        .iter(&tx)
        .map(|t| {
            (
                t.get_cell(0).get_int64().unwrap(),
                t.get_cell(1).get_int64().unwrap(),
            )
        })
        .collect();
    tx.commit().unwrap();
    assert_eq!(rows, vec![(1, 10), (3, 30)]);

    // the file stays a whole number of pages
    let len = std::fs::metadata(path).unwrap().len();
    assert_eq!(len % BufferPool::get_page_size() as u64, 0);
}

#[test]
fn test_record_ids_are_stable() {
    setup();

    let table = new_empty_heap_table("data/test_heap_rids.db", 2);

    let tx = Transaction::new();
    for i in 0..10 {
        table
            .insert_tuple(&tx, &Tuple::new_int_tuple(i, 2))
            .unwrap();
    }
    tx.commit().unwrap();

    let tx = Transaction::new();
    let before: Vec<_> = table.iter(&tx).collect();
    let victim = before[4].clone();
    table.delete_tuple(&tx, &victim).unwrap();
    tx.commit().unwrap();

    // every surviving tuple keeps its page and slot
    let tx = Transaction::new();
    for survivor in table.iter(&tx) {
        let original = before
            .iter()
            .find(|t| t.get_cell(0) == survivor.get_cell(0))
            .unwrap();
        assert_eq!(original.get_pid(), survivor.get_pid());
        assert_eq!(original.get_slot_index(), survivor.get_slot_index());
    }
    tx.commit().unwrap();

    // deleting the same record twice is refused
    let tx = Transaction::new();
    assert!(table.delete_tuple(&tx, &victim).is_err());
    tx.commit().unwrap();
}

#[test]
fn test_file_grows_page_by_page() {
    setup();

    let path = "data/test_heap_growth.db";
    let table = new_empty_heap_table(path, 2);

    // enough rows for three pages
    let rows = 600;
    let tx = Transaction::new();
    for i in 0..rows {
        table
            .insert_tuple(&tx, &Tuple::new_int_tuple(i, 2))
            .unwrap();
    }
    tx.commit().unwrap();

    assert!(table.pages_count().unwrap() >= 2);
    let len = std::fs::metadata(path).unwrap().len();
    assert_eq!(len % BufferPool::get_page_size() as u64, 0);

    let tx = Transaction::new();
    assert_eq!(table.iter(&tx).count(), rows as usize);
    tx.commit().unwrap();
}

#[test]
fn test_full_probe_pages_are_released() {
    setup();

    let table = new_empty_heap_table("data/test_heap_probe.db", 2);

    // fill page 0 completely
    let tx = Transaction::new();
    let mut first_pid = None;
    loop {
        let tuple = Tuple::new_int_tuple(0, 2);
        table.insert_tuple(&tx, &tuple).unwrap();
        let last = table.iter(&tx).last().unwrap();
        if last.get_pid().page_index > 0 {
            break;
        }
        first_pid = Some(last.get_pid());
    }
    tx.commit().unwrap();

    // a fresh insert probes the full page 0, gives its lock back, and
    // lands on page 1
    let tx = Transaction::new();
    table
        .insert_tuple(&tx, &Tuple::new_int_tuple(7, 2))
        .unwrap();

    let first_pid = first_pid.unwrap();
    let status = Database::concurrent_status();
    assert!(!status.holds_lock(&tx, &first_pid));
    drop(status);

    tx.commit().unwrap();
}
