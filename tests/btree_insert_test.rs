mod test_utils;

use minnow_db::{storage::field::Cell, Transaction};

use crate::test_utils::{
    insert_row, new_empty_btree_table, new_random_btree_table, search_key, setup,
};

#[test]
fn test_insert_keeps_key_order() {
    setup();

    let (table, keys) =
        new_random_btree_table("data/test_btree_insert_order.db", 2, 1000, 0);

    table.check_integrity(true).unwrap();

    let tx = Transaction::new();
    let scanned: Vec<i64> = table
        .iter(&tx)
        .map(|t| t.get_cell(0).get_int64().unwrap())
        .collect();
    tx.commit().unwrap();

    assert_eq!(scanned, keys);
}

#[test]
fn test_leaf_splits_grow_the_tree() {
    setup();

    let table = new_empty_btree_table("data/test_btree_split.db", 2, 0);

    // pour in enough ascending keys to force leaf and internal splits
    let rows = 1200i64;
    let tx = Transaction::new();
    for key in 0..rows {
        insert_row(&table, &tx, key);
    }
    tx.commit().unwrap();

    assert!(table.pages_count().unwrap() >= 4);
    table.check_integrity(true).unwrap();

    // every key is reachable through a point lookup
    let tx = Transaction::new();
    for key in [0, 1, 599, 600, 1198, 1199] {
        assert_eq!(search_key(&table, &tx, key), 1, "key {} missing", key);
    }
    assert_eq!(search_key(&table, &tx, rows), 0);
    tx.commit().unwrap();
}

#[test]
fn test_duplicate_keys_span_pages() {
    setup();

    let table = new_empty_btree_table("data/test_btree_dups.db", 2, 0);

    let copies = 400;
    let tx = Transaction::new();
    for _ in 0..copies {
        insert_row(&table, &tx, 42);
    }
    for key in [1i64, 99] {
        insert_row(&table, &tx, key);
    }
    tx.commit().unwrap();

    table.check_integrity(true).unwrap();

    // the equal-key scan crosses leaf boundaries and finds every copy
    let tx = Transaction::new();
    assert_eq!(search_key(&table, &tx, 42), copies);
    assert_eq!(search_key(&table, &tx, 1), 1);
    assert_eq!(search_key(&table, &tx, 99), 1);
    tx.commit().unwrap();
}

#[test]
fn test_search_lands_on_leftmost_candidate() {
    setup();

    let (table, _) = new_random_btree_table("data/test_btree_leftmost.db", 2, 600, 0);

    // a key between two existing ones: present → found, absent → zero
    let tx = Transaction::new();
    assert_eq!(search_key(&table, &tx, 8), 1); // 8 = 1 + 7
    assert_eq!(search_key(&table, &tx, 9), 0);
    tx.commit().unwrap();

    // non-key columns do not confuse the search
    let tx = Transaction::new();
    let found = table
        .iter(&tx)
        .find(|t| t.get_cell(0) == Cell::Int64(8))
        .unwrap();
    assert_eq!(found.get_cell(1), Cell::Int64(8));
    tx.commit().unwrap();
}
