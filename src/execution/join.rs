use crate::{
    error::MinnowError,
    execution::{op::JoinPredicate, operator::OpIterator},
    storage::tuple::{Schema, Tuple, WrappedTuple},
    types::MinnowResult,
};

/// Nested-loop join: for every outer tuple the inner child is replayed in
/// full (through `rewind`), and matching pairs come out concatenated.
pub struct Join<'a> {
    predicate: JoinPredicate,
    outer: Box<dyn OpIterator + 'a>,
    inner: Box<dyn OpIterator + 'a>,
    schema: Schema,

    current_outer: Option<WrappedTuple>,
}

impl<'a> Join<'a> {
    pub fn new(
        predicate: JoinPredicate,
        outer: Box<dyn OpIterator + 'a>,
        inner: Box<dyn OpIterator + 'a>,
    ) -> Self {
        let schema = Schema::merge(outer.get_schema(), inner.get_schema());
        Self {
            predicate,
            outer,
            inner,
            schema,
            current_outer: None,
        }
    }
}

impl OpIterator for Join<'_> {
    fn open(&mut self) -> MinnowResult {
        self.outer.open()?;
        self.inner.open()
    }

    fn close(&mut self) {
        self.inner.close();
        self.outer.close();
        self.current_outer = None;
    }

    fn rewind(&mut self) -> MinnowResult {
        self.outer.rewind()?;
        self.inner.rewind()?;
        self.current_outer = None;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<WrappedTuple>, MinnowError> {
        loop {
            if self.current_outer.is_none() {
                match self.outer.next()? {
                    Some(tuple) => self.current_outer = Some(tuple),
                    None => return Ok(None),
                }
            }

            let outer_tuple = self.current_outer.clone().unwrap();
            while let Some(inner_tuple) = self.inner.next()? {
                if self.predicate.matches(&outer_tuple, &inner_tuple) {
                    let merged = Tuple::merge(&outer_tuple, &inner_tuple);
                    return Ok(Some(WrappedTuple::new(
                        &merged,
                        outer_tuple.get_slot_index(),
                        outer_tuple.get_pid(),
                    )));
                }
            }

            // inner exhausted for this outer tuple; replay it for the next
            self.inner.rewind()?;
            self.current_outer = None;
        }
    }

    fn get_schema(&self) -> &Schema {
        &self.schema
    }
}
