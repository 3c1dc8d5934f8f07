mod test_utils;

use minnow_db::{
    btree::BTreeTableSearchIterator, execution::Op, execution::Predicate,
    storage::field::Cell, BTreeTable, Transaction,
};

use crate::test_utils::{new_random_btree_table, search_key, setup};

/// Delete one row carrying `key`, driving the whole rebalancing path.
fn delete_key(table: &BTreeTable, tx: &Transaction, key: i64) {
    let predicate = Predicate::new(table.key_field, Op::Equals, &Cell::Int64(key));
    let victim = BTreeTableSearchIterator::new(tx, table, &predicate)
        .next()
        .unwrap_or_else(|| panic!("key {} not found", key));
    table.delete_tuple(tx, &victim).unwrap();
}

#[test]
fn test_deletes_redistribute_and_merge() {
    setup();

    let rows = 1000;
    let (table, keys) = new_random_btree_table("data/test_btree_delete.db", 2, rows, 0);

    // chew through the low end of the key space; leaves on the left edge
    // repeatedly fall below half and steal or merge
    let delete_count = 800;
    for chunk in keys[..delete_count].chunks(100) {
        let tx = Transaction::new();
        for key in chunk {
            delete_key(&table, &tx, *key);
        }
        tx.commit().unwrap();

        table.check_integrity(true).unwrap();
    }

    assert_eq!(table.tuples_count(), rows - delete_count);

    // the survivors are intact and in order
    let tx = Transaction::new();
    let scanned: Vec<i64> = table
        .iter(&tx)
        .map(|t| t.get_cell(0).get_int64().unwrap())
        .collect();
    tx.commit().unwrap();
    assert_eq!(scanned, keys[delete_count..].to_vec());
}

#[test]
fn test_tree_collapses_to_a_single_leaf() {
    setup();

    let rows = 700;
    let (table, keys) = new_random_btree_table("data/test_btree_collapse.db", 2, rows, 0);
    assert!(table.pages_count().unwrap() > 1);

    // drain from the high end until nothing is left
    for chunk in keys.iter().rev().collect::<Vec<_>>().chunks(100) {
        let tx = Transaction::new();
        for key in chunk {
            delete_key(&table, &tx, **key);
        }
        tx.commit().unwrap();
        table.check_integrity(true).unwrap();
    }

    assert_eq!(table.tuples_count(), 0);

    // the emptied tree is still a working tree
    let tx = Transaction::new();
    assert_eq!(search_key(&table, &tx, keys[0]), 0);
    tx.commit().unwrap();

    let tx = Transaction::new();
    let tuple = minnow_db::storage::tuple::Tuple::new_int_tuple(5, 2);
    table.insert_tuple(&tx, &tuple).unwrap();
    tx.commit().unwrap();
    assert_eq!(table.tuples_count(), 1);
    table.check_integrity(true).unwrap();
}

#[test]
fn test_freed_pages_are_reused() {
    setup();

    let rows = 900;
    let (table, keys) = new_random_btree_table("data/test_btree_reuse.db", 2, rows, 0);

    let pages_before = table.pages_count().unwrap();

    // empty most of the tree, merging pages back into the free list
    let tx = Transaction::new();
    for key in &keys[..800] {
        delete_key(&table, &tx, *key);
    }
    tx.commit().unwrap();
    table.check_integrity(true).unwrap();

    // refill; reclaimed pages are handed out again instead of growing
    // the file
    let tx = Transaction::new();
    for key in &keys[..800] {
        crate::test_utils::insert_row(&table, &tx, *key);
    }
    tx.commit().unwrap();
    table.check_integrity(true).unwrap();

    let pages_after = table.pages_count().unwrap();
    assert!(
        pages_after <= pages_before + 2,
        "file grew from {} to {} pages despite the free list",
        pages_before,
        pages_after
    );
    assert_eq!(table.tuples_count(), rows);
}
