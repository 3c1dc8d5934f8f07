#![allow(dead_code)]

use std::sync::Arc;

use rand::prelude::*;

use minnow_db::{
    btree::BTreeTableSearchIterator,
    execution::{Op, Predicate},
    small_int_schema,
    storage::field::Cell,
    storage::tuple::Tuple,
    BTreeTable, Database, HeapTable, Transaction,
};

/// Logging setup shared by every test.
pub fn setup() {
    minnow_db::utils::init_log();
}

/// A fresh heap table at `path`, registered with the catalog.
pub fn new_empty_heap_table(path: &str, columns: usize) -> Arc<HeapTable> {
    let _ = std::fs::remove_file(path);
    let schema = small_int_schema(columns, "c");
    let table = Arc::new(HeapTable::new(path, &schema));
    Database::mut_catalog().add_table(table.clone(), path);
    table
}

/// A fresh B+ tree table at `path`, keyed on `key_field`, registered with
/// the catalog.
pub fn new_empty_btree_table(path: &str, columns: usize, key_field: usize) -> Arc<BTreeTable> {
    let _ = std::fs::remove_file(path);
    let schema = small_int_schema(columns, "c");
    let table = Arc::new(BTreeTable::new(path, key_field, &schema));
    Database::mut_catalog().add_table(table.clone(), path);
    table
}

/// A B+ tree table filled with `rows` distinct keys inserted in random
/// order under one committed transaction. Returns the table and the keys
/// in ascending order.
pub fn new_random_btree_table(
    path: &str,
    columns: usize,
    rows: usize,
    key_field: usize,
) -> (Arc<BTreeTable>, Vec<i64>) {
    let table = new_empty_btree_table(path, columns, key_field);

    let mut keys: Vec<i64> = (0..rows as i64).map(|i| i * 7 + 1).collect();
    let mut rng = rand::thread_rng();
    keys.shuffle(&mut rng);

    let tx = Transaction::new();
    for key in &keys {
        insert_row(&table, &tx, *key);
    }
    tx.commit().unwrap();

    keys.sort_unstable();
    (table, keys)
}

/// Insert a row whose every column carries `key`.
pub fn insert_row(table: &BTreeTable, tx: &Transaction, key: i64) {
    let tuple = Tuple::new_int_tuple(key, table.schema.fields_count());
    table.insert_tuple(tx, &tuple).unwrap();
}

/// How many rows of the table carry `key` in the key column.
pub fn search_key(table: &BTreeTable, tx: &Transaction, key: i64) -> usize {
    let predicate = Predicate::new(table.key_field, Op::Equals, &Cell::Int64(key));
    BTreeTableSearchIterator::new(tx, table, &predicate).count()
}

/// Pretend the process died: drop every cache and replay the log.
pub fn crash_and_recover() {
    Database::recover();
}
