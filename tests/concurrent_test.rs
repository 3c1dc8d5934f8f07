mod test_utils;

use std::{sync::Arc, thread};

use minnow_db::{
    btree::BTreeTableSearchIterator,
    execution::{Op, Predicate},
    storage::field::Cell,
    storage::page_id::{PageCategory, PageId},
    storage::tuple::Tuple,
    BTreeTable, BufferPool, ConcurrentStatus, DbFile, Permission, Transaction,
};

use crate::test_utils::{new_empty_btree_table, new_empty_heap_table, setup};

fn insert_with_retry(table: &BTreeTable, key: i64) {
    loop {
        let tx = Transaction::new();
        let tuple = Tuple::new_int_tuple(key, 2);
        match table.insert_tuple(&tx, &tuple) {
            Ok(()) => {
                tx.commit().unwrap();
                return;
            }
            Err(_) => {
                // lock give-up: roll back and try again
                tx.abort().unwrap();
            }
        }
    }
}

fn delete_with_retry(table: &BTreeTable, key: i64) {
    loop {
        let tx = Transaction::new();
        let predicate = Predicate::new(table.key_field, Op::Equals, &Cell::Int64(key));
        let mut iter = BTreeTableSearchIterator::new(&tx, &table, &predicate);

        match iter.next_up() {
            Ok(Some(victim)) => match table.delete_tuple(&tx, &victim) {
                Ok(()) => {
                    tx.commit().unwrap();
                    return;
                }
                Err(_) => tx.abort().unwrap(),
            },
            Ok(None) => panic!("key {} vanished", key),
            Err(_) => tx.abort().unwrap(),
        }
    }
}

/// The locking scenarios share the global retry knobs, so they run as one
/// sequential test.
#[test]
fn test_locking_and_concurrent_access() {
    setup();

    // ---- a writer excludes readers, and the blocked reader gives up ----

    ConcurrentStatus::set_retry_limit(2);
    ConcurrentStatus::set_retry_interval_ms(10);

    let heap = new_empty_heap_table("data/test_concurrent_heap.db", 2);
    let writer_tx = Transaction::new();
    heap.insert_tuple(&writer_tx, &Tuple::new_int_tuple(1, 2))
        .unwrap();

    let pid = PageId::new(PageCategory::Heap, heap.get_id(), 0);
    let held = BufferPool::get_heap_page(&writer_tx, Permission::ReadWrite, &pid);
    assert!(held.is_ok());

    let reader_result = thread::spawn(move || {
        let reader_tx = Transaction::new();
        let result = BufferPool::get_heap_page(&reader_tx, Permission::ReadOnly, &pid);
        reader_tx.abort().unwrap();
        result.map(|_| ())
    })
    .join()
    .unwrap();

    let err = reader_result.unwrap_err();
    assert!(err.is_abort());

    writer_tx.commit().unwrap();

    // ---- after commit the page is free again, and a sole reader can
    // upgrade to a writer ----

    let reader_tx = Transaction::new();
    assert!(BufferPool::get_heap_page(&reader_tx, Permission::ReadOnly, &pid).is_ok());
    assert!(BufferPool::get_heap_page(&reader_tx, Permission::ReadWrite, &pid).is_ok());
    reader_tx.commit().unwrap();

    // ---- concurrent inserts and deletes keep the tree consistent ----

    ConcurrentStatus::set_retry_limit(300);
    ConcurrentStatus::set_retry_interval_ms(10);

    let table = new_empty_btree_table("data/test_concurrent_btree.db", 2, 0);

    let workers = 8;
    let rows_per_worker = 5i64;

    let mut handles = Vec::new();
    for w in 0..workers {
        let local_table = Arc::clone(&table);
        handles.push(thread::spawn(move || {
            for i in 0..rows_per_worker {
                insert_with_retry(&local_table, w as i64 * 1000 + i);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let inserted = workers as usize * rows_per_worker as usize;
    assert_eq!(table.tuples_count(), inserted);
    table.check_integrity(true).unwrap();

    // a second wave: half the threads insert fresh keys and hand them to
    // deleters over a channel, so the count ends where it started
    let (sender, receiver) = crossbeam::channel::unbounded::<i64>();

    let mut handles = Vec::new();
    for w in 0..4 {
        let local_table = Arc::clone(&table);
        let local_sender = sender.clone();
        handles.push(thread::spawn(move || {
            for i in 0..rows_per_worker {
                let key = 100_000 + w as i64 * 1000 + i;
                insert_with_retry(&local_table, key);
                local_sender.send(key).unwrap();
            }
        }));
    }
    drop(sender);

    for _ in 0..4 {
        let local_table = Arc::clone(&table);
        let local_receiver = receiver.clone();
        handles.push(thread::spawn(move || {
            for key in local_receiver.iter() {
                delete_with_retry(&local_table, key);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(table.tuples_count(), inserted);
    table.check_integrity(true).unwrap();

    // restore the default retry discipline for whoever runs next
    ConcurrentStatus::set_retry_limit(3);
    ConcurrentStatus::set_retry_interval_ms(200);
}
