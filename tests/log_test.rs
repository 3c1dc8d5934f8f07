mod test_utils;

use minnow_db::{Database, Transaction};

use crate::test_utils::{
    crash_and_recover, insert_row, new_empty_btree_table, search_key, setup,
};

/// The log scenarios build on each other (and on one shared log file), so
/// they run as one sequential test: committed work survives, aborted work
/// disappears, and both stay true across a crash and a checkpoint.
#[test]
fn test_transaction_log_roundtrip() {
    setup();
    Database::mut_log_manager().reset();

    let table = new_empty_btree_table("data/test_log_btree.db", 2, 1);

    // ---- commit makes rows durable and logged ----

    let records_before = Database::log_manager().records_count();

    let tx = Transaction::new();
    insert_row(&table, &tx, 1);
    insert_row(&table, &tx, 2);
    tx.commit().unwrap();

    // START, one UPDATE per dirtied page, COMMIT
    assert!(Database::log_manager().records_count() >= records_before + 3);

    let tx = Transaction::new();
    assert_eq!(search_key(&table, &tx, 1), 1);
    assert_eq!(search_key(&table, &tx, 2), 1);
    tx.commit().unwrap();

    // ---- abort rolls uncommitted rows back ----

    let tx = Transaction::new();
    insert_row(&table, &tx, 3);
    insert_row(&table, &tx, 4);

    // the transaction sees its own writes
    assert_eq!(search_key(&table, &tx, 3), 1);
    assert_eq!(search_key(&table, &tx, 4), 1);

    tx.abort().unwrap();

    let tx = Transaction::new();
    assert_eq!(search_key(&table, &tx, 1), 1);
    assert_eq!(search_key(&table, &tx, 2), 1);
    assert_eq!(search_key(&table, &tx, 3), 0);
    assert_eq!(search_key(&table, &tx, 4), 0);
    tx.commit().unwrap();

    // ---- a crash after commit loses nothing ----

    let tx = Transaction::new();
    insert_row(&table, &tx, 5);
    tx.commit().unwrap();

    crash_and_recover();

    let tx = Transaction::new();
    assert_eq!(search_key(&table, &tx, 1), 1);
    assert_eq!(search_key(&table, &tx, 2), 1);
    assert_eq!(search_key(&table, &tx, 3), 0);
    assert_eq!(search_key(&table, &tx, 5), 1);
    tx.commit().unwrap();

    // ---- interleaved commit and abort around a checkpoint ----

    let other = new_empty_btree_table("data/test_log_btree_2.db", 2, 1);

    let tx_keep = Transaction::new();
    insert_row(&other, &tx_keep, 21);

    Database::mut_log_manager().log_checkpoint().unwrap();

    let tx_drop = Transaction::new();
    insert_row(&table, &tx_drop, 6);

    insert_row(&other, &tx_keep, 22);
    tx_keep.commit().unwrap();
    tx_drop.abort().unwrap();

    crash_and_recover();

    let tx = Transaction::new();
    assert_eq!(search_key(&other, &tx, 21), 1);
    assert_eq!(search_key(&other, &tx, 22), 1);
    assert_eq!(search_key(&table, &tx, 6), 0);
    assert_eq!(search_key(&table, &tx, 5), 1);
    tx.commit().unwrap();

    Database::mut_log_manager().show_log_contents();
}
