mod test_utils;

use minnow_db::{
    btree::{BTreeTableIterator, BTreeTableSearchIterator},
    execution::{Op, Predicate},
    storage::field::Cell,
    Transaction,
};

use crate::test_utils::{new_random_btree_table, setup};

#[test]
fn test_full_scan_is_sorted() {
    setup();

    let (table, keys) = new_random_btree_table("data/test_btree_scan.db", 2, 800, 0);

    let tx = Transaction::new();
    let mut iter = BTreeTableIterator::new(&tx, &table);

    let scanned: Vec<i64> = iter
        .by_ref()
        .map(|t| t.get_cell(0).get_int64().unwrap())
        .collect();
    assert_eq!(scanned, keys);

    // a rewound iterator replays from the first key
    iter.rewind();
    let first = iter.next().unwrap();
    assert_eq!(first.get_cell(0), Cell::Int64(keys[0]));

    tx.commit().unwrap();
}

#[test]
fn test_range_scans() {
    setup();

    let (table, keys) = new_random_btree_table("data/test_btree_range.db", 2, 500, 0);
    let pivot = keys[keys.len() / 2];

    let tx = Transaction::new();

    let count_with = |op: Op| {
        let predicate = Predicate::new(table.key_field, op, &Cell::Int64(pivot));
        BTreeTableSearchIterator::new(&tx, &table, &predicate).count()
    };

    let expected_gt = keys.iter().filter(|k| **k > pivot).count();
    let expected_ge = keys.iter().filter(|k| **k >= pivot).count();
    let expected_lt = keys.iter().filter(|k| **k < pivot).count();
    let expected_le = keys.iter().filter(|k| **k <= pivot).count();
    let expected_ne = keys.iter().filter(|k| **k != pivot).count();

    assert_eq!(count_with(Op::GreaterThan), expected_gt);
    assert_eq!(count_with(Op::GreaterThanOrEq), expected_ge);
    assert_eq!(count_with(Op::LessThan), expected_lt);
    assert_eq!(count_with(Op::LessThanOrEq), expected_le);
    assert_eq!(count_with(Op::NotEquals), expected_ne);
    assert_eq!(count_with(Op::Equals), 1);

    tx.commit().unwrap();
}
