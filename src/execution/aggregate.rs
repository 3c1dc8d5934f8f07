use std::collections::HashMap;

use crate::{
    error::MinnowError,
    execution::operator::OpIterator,
    storage::{
        field::{Cell, Field, Type},
        page_id::{PageCategory, PageId},
        tuple::{Schema, Tuple, WrappedTuple},
    },
    types::MinnowResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl AggregateOp {
    fn name(&self) -> &'static str {
        match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
        }
    }
}

#[derive(Default)]
struct GroupState {
    sum: i64,
    count: i64,
    min: Option<i64>,
    max: Option<i64>,
}

impl GroupState {
    fn absorb(&mut self, op: AggregateOp, cell: &Cell) -> MinnowResult {
        self.count += 1;

        // COUNT works on any column type; the arithmetic aggregates only
        // on integers
        if op == AggregateOp::Count {
            return Ok(());
        }

        let value = cell.get_int64()?;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        Ok(())
    }

    fn result(&self, op: AggregateOp) -> i64 {
        match op {
            AggregateOp::Min => self.min.unwrap_or(0),
            AggregateOp::Max => self.max.unwrap_or(0),
            AggregateOp::Sum => self.sum,
            // integer average, truncated
            AggregateOp::Avg => self.sum / self.count,
            AggregateOp::Count => self.count,
        }
    }
}

/// Grouped (or whole-input) aggregation. The child is consumed on `open`;
/// with no grouping field all tuples funnel through one group and a single
/// row comes out.
pub struct Aggregate<'a> {
    child: Box<dyn OpIterator + 'a>,
    agg_field: usize,
    group_field: Option<usize>,
    op: AggregateOp,
    schema: Schema,

    results: Vec<Tuple>,
    cursor: usize,
}

impl<'a> Aggregate<'a> {
    pub fn new(
        child: Box<dyn OpIterator + 'a>,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> Self {
        let child_schema = child.get_schema();
        let agg_name = format!(
            "{}({})",
            op.name(),
            child_schema.get_field(agg_field).name
        );

        let mut fields = Vec::new();
        if let Some(group_field) = group_field {
            fields.push(child_schema.get_field(group_field).clone());
        }
        fields.push(Field::new(&agg_name, Type::Int64));

        Self {
            child,
            agg_field,
            group_field,
            op,
            schema: Schema::new(fields),
            results: Vec::new(),
            cursor: 0,
        }
    }

    fn compute(&mut self) -> MinnowResult {
        let mut groups: HashMap<Option<Cell>, GroupState> = HashMap::new();
        let mut group_order: Vec<Option<Cell>> = Vec::new();

        while let Some(tuple) = self.child.next()? {
            let group_key = self.group_field.map(|i| tuple.get_cell(i));
            if !groups.contains_key(&group_key) {
                group_order.push(group_key.clone());
            }
            groups
                .entry(group_key)
                .or_insert_with(GroupState::default)
                .absorb(self.op, &tuple.get_cell(self.agg_field))?;
        }

        self.results = group_order
            .into_iter()
            .map(|key| {
                let state = &groups[&key];
                let value = Cell::Int64(state.result(self.op));
                match key {
                    Some(group_value) => Tuple::new(&[group_value, value]),
                    None => Tuple::new(&[value]),
                }
            })
            .collect();

        Ok(())
    }
}

impl OpIterator for Aggregate<'_> {
    fn open(&mut self) -> MinnowResult {
        self.child.open()?;
        self.compute()?;
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.results.clear();
        self.cursor = 0;
    }

    fn rewind(&mut self) -> MinnowResult {
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<WrappedTuple>, MinnowError> {
        if self.cursor >= self.results.len() {
            return Ok(None);
        }

        let tuple = self.results[self.cursor].clone();
        let index = self.cursor;
        self.cursor += 1;

        // aggregate rows are synthesized, the record id is a placeholder
        Ok(Some(WrappedTuple::new(
            &tuple,
            index,
            PageId::new(PageCategory::Heap, 0, 0),
        )))
    }

    fn get_schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::init_log;

    /// A canned child operator for driving the aggregate directly.
    struct Rows {
        schema: Schema,
        rows: Vec<Tuple>,
        cursor: usize,
    }

    impl Rows {
        fn new(schema: Schema, rows: Vec<Tuple>) -> Self {
            Self {
                schema,
                rows,
                cursor: 0,
            }
        }
    }

    impl OpIterator for Rows {
        fn open(&mut self) -> MinnowResult {
            self.cursor = 0;
            Ok(())
        }

        fn close(&mut self) {}

        fn rewind(&mut self) -> MinnowResult {
            self.cursor = 0;
            Ok(())
        }

        fn next(&mut self) -> Result<Option<WrappedTuple>, MinnowError> {
            if self.cursor >= self.rows.len() {
                return Ok(None);
            }
            let tuple = self.rows[self.cursor].clone();
            self.cursor += 1;
            Ok(Some(WrappedTuple::new(
                &tuple,
                0,
                PageId::new(PageCategory::Heap, 0, 0),
            )))
        }

        fn get_schema(&self) -> &Schema {
            &self.schema
        }
    }

    fn sample_rows() -> Rows {
        let schema = Schema::new(vec![
            Field::new("g", Type::Int64),
            Field::new("v", Type::Int64),
        ]);
        let rows = vec![
            Tuple::new(&[Cell::Int64(1), Cell::Int64(1)]),
            Tuple::new(&[Cell::Int64(1), Cell::Int64(2)]),
            Tuple::new(&[Cell::Int64(2), Cell::Int64(5)]),
        ];
        Rows::new(schema, rows)
    }

    fn collect(agg: &mut Aggregate) -> Vec<(i64, i64)> {
        let mut out = Vec::new();
        while let Some(t) = agg.next().unwrap() {
            out.push((
                t.get_cell(0).get_int64().unwrap(),
                t.get_cell(1).get_int64().unwrap(),
            ));
        }
        out.sort();
        out
    }

    #[test]
    fn test_grouped_sum() {
        init_log();

        let mut agg = Aggregate::new(Box::new(sample_rows()), 1, Some(0), AggregateOp::Sum);
        agg.open().unwrap();
        assert_eq!(collect(&mut agg), vec![(1, 3), (2, 5)]);
    }

    #[test]
    fn test_grouped_avg_truncates() {
        init_log();

        let mut agg = Aggregate::new(Box::new(sample_rows()), 1, Some(0), AggregateOp::Avg);
        agg.open().unwrap();
        // 3 / 2 truncates to 1
        assert_eq!(collect(&mut agg), vec![(1, 1), (2, 5)]);
    }

    #[test]
    fn test_grouped_min_max_count() {
        init_log();

        let mut agg = Aggregate::new(Box::new(sample_rows()), 1, Some(0), AggregateOp::Min);
        agg.open().unwrap();
        assert_eq!(collect(&mut agg), vec![(1, 1), (2, 5)]);

        let mut agg = Aggregate::new(Box::new(sample_rows()), 1, Some(0), AggregateOp::Max);
        agg.open().unwrap();
        assert_eq!(collect(&mut agg), vec![(1, 2), (2, 5)]);

        let mut agg = Aggregate::new(Box::new(sample_rows()), 1, Some(0), AggregateOp::Count);
        agg.open().unwrap();
        assert_eq!(collect(&mut agg), vec![(1, 2), (2, 1)]);
    }

    #[test]
    fn test_ungrouped_single_row() {
        init_log();

        let mut agg = Aggregate::new(Box::new(sample_rows()), 1, None, AggregateOp::Sum);
        agg.open().unwrap();

        let row = agg.next().unwrap().unwrap();
        assert_eq!(row.cells_count(), 1);
        assert_eq!(row.get_cell(0), Cell::Int64(8));
        assert!(agg.next().unwrap().is_none());

        // rewind replays the computed result
        agg.rewind().unwrap();
        assert!(agg.next().unwrap().is_some());
    }
}
