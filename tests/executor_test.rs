mod test_utils;

use std::collections::HashMap;

use minnow_db::{
    execution::{
        Aggregate, AggregateOp, Delete, Filter, Insert, Join, JoinPredicate, Op, OpIterator,
        Predicate, SeqScan,
    },
    optimizer::{JoinOptimizer, LogicalJoinNode, TableStats},
    storage::field::Cell,
    storage::tuple::Tuple,
    DbFile, HeapTable, Transaction,
};

use crate::test_utils::{new_empty_heap_table, setup};

fn fill(table: &HeapTable, rows: &[(i64, i64)]) {
    let tx = Transaction::new();
    for (a, b) in rows {
        let tuple = Tuple::new(&[Cell::Int64(*a), Cell::Int64(*b)]);
        table.insert_tuple(&tx, &tuple).unwrap();
    }
    tx.commit().unwrap();
}

#[test]
fn test_scan_filter_pipeline() {
    setup();

    let table = new_empty_heap_table("data/test_exec_filter.db", 2);
    fill(&table, &[(1, 10), (2, 20), (3, 30), (4, 40)]);

    let tx = Transaction::new();
    let scan = SeqScan::new(&tx, &table);
    let mut filter = Filter::new(
        Predicate::new(1, Op::GreaterThan, &Cell::Int64(15)),
        Box::new(scan),
    );

    filter.open().unwrap();
    let mut seen = Vec::new();
    while let Some(t) = filter.next().unwrap() {
        seen.push(t.get_cell(0).get_int64().unwrap());
    }
    assert_eq!(seen, vec![2, 3, 4]);

    // rewinding replays the filtered stream
    filter.rewind().unwrap();
    assert!(filter.next().unwrap().is_some());
    filter.close();

    tx.commit().unwrap();
}

#[test]
fn test_nested_loop_join() {
    setup();

    let left = new_empty_heap_table("data/test_exec_join_left.db", 2);
    let right = new_empty_heap_table("data/test_exec_join_right.db", 2);
    fill(&left, &[(1, 100), (2, 200), (3, 300)]);
    fill(&right, &[(2, 7), (3, 8), (5, 9)]);

    let tx = Transaction::new();
    let mut join = Join::new(
        JoinPredicate::new(0, Op::Equals, 0),
        Box::new(SeqScan::new(&tx, &left)),
        Box::new(SeqScan::new(&tx, &right)),
    );

    assert_eq!(join.get_schema().fields_count(), 4);

    join.open().unwrap();
    let mut rows = Vec::new();
    while let Some(t) = join.next().unwrap() {
        rows.push((
            t.get_cell(0).get_int64().unwrap(),
            t.get_cell(1).get_int64().unwrap(),
            t.get_cell(3).get_int64().unwrap(),
        ));
    }
    join.close();
    tx.commit().unwrap();

    rows.sort();
    assert_eq!(rows, vec![(2, 200, 7), (3, 300, 8)]);
}

#[test]
fn test_insert_and_delete_operators() {
    setup();

    let source = new_empty_heap_table("data/test_exec_source.db", 2);
    let target = new_empty_heap_table("data/test_exec_target.db", 2);
    fill(&source, &[(1, 1), (2, 2), (3, 3)]);

    // pump the source into the target; the operator reports the count
    // once and then runs dry
    let tx = Transaction::new();
    let mut insert = Insert::new(
        &tx,
        target.get_id(),
        Box::new(SeqScan::new(&tx, &source)),
    );
    insert.open().unwrap();
    let report = insert.next().unwrap().unwrap();
    assert_eq!(report.get_cell(0), Cell::Int64(3));
    assert!(insert.next().unwrap().is_none());
    insert.close();
    tx.commit().unwrap();

    let tx = Transaction::new();
    assert_eq!(target.iter(&tx).count(), 3);
    tx.commit().unwrap();

    // delete through a filter, counting the removed rows
    let tx = Transaction::new();
    let scan = SeqScan::new(&tx, &target);
    let filtered = Filter::new(
        Predicate::new(0, Op::LessThanOrEq, &Cell::Int64(2)),
        Box::new(scan),
    );
    let mut delete = Delete::new(&tx, target.get_id(), Box::new(filtered));
    delete.open().unwrap();
    let report = delete.next().unwrap().unwrap();
    assert_eq!(report.get_cell(0), Cell::Int64(2));
    assert!(delete.next().unwrap().is_none());
    delete.close();
    tx.commit().unwrap();

    let tx = Transaction::new();
    let rows: Vec<i64> = target
        .iter(&tx)
        .map(|t| t.get_cell(0).get_int64().unwrap())
        .collect();
    tx.commit().unwrap();
    assert_eq!(rows, vec![3]);
}

#[test]
fn test_aggregate_over_scan() {
    setup();

    let table = new_empty_heap_table("data/test_exec_agg.db", 2);
    fill(&table, &[(1, 1), (1, 2), (2, 5)]);

    let tx = Transaction::new();
    let mut agg = Aggregate::new(
        Box::new(SeqScan::new(&tx, &table)),
        1,
        Some(0),
        AggregateOp::Sum,
    );
    agg.open().unwrap();

    let mut rows = Vec::new();
    while let Some(t) = agg.next().unwrap() {
        rows.push((
            t.get_cell(0).get_int64().unwrap(),
            t.get_cell(1).get_int64().unwrap(),
        ));
    }
    agg.close();
    tx.commit().unwrap();

    rows.sort();
    assert_eq!(rows, vec![(1, 3), (2, 5)]);
}

#[test]
fn test_join_ordering_prefers_small_outer() {
    setup();

    let small = new_empty_heap_table("data/test_opt_small.db", 2);
    let mid = new_empty_heap_table("data/test_opt_mid.db", 2);
    let big = new_empty_heap_table("data/test_opt_big.db", 2);

    fill(&small, &(0..10).map(|i| (i, i)).collect::<Vec<_>>());
    fill(&mid, &(0..300).map(|i| (i, i)).collect::<Vec<_>>());
    fill(&big, &(0..900).map(|i| (i, i)).collect::<Vec<_>>());

    let stats: HashMap<String, TableStats> = [
        ("small", &small),
        ("mid", &mid),
        ("big", &big),
    ]
    .iter()
    .map(|(name, table)| {
        (
            name.to_string(),
            TableStats::new(table.get_id(), 1000.0).unwrap(),
        )
    })
    .collect();

    let joins = vec![
        LogicalJoinNode::new("big", 0, Op::Equals, "mid", 0),
        LogicalJoinNode::new("mid", 0, Op::Equals, "small", 0),
    ];

    let plan = JoinOptimizer::order_joins(&stats, &HashMap::new(), &joins).unwrap();
    assert_eq!(plan.len(), 2);

    // the cheap pair goes first; the expensive table joins last
    let first_tables = [plan[0].left_table.as_str(), plan[0].right_table.as_str()];
    assert!(first_tables.contains(&"small"));
    assert!(first_tables.contains(&"mid"));
}
