use crate::{
    error::MinnowError,
    execution::{op::Predicate, operator::OpIterator},
    storage::tuple::{Schema, WrappedTuple},
    types::MinnowResult,
};

/// Keeps the child's tuples that satisfy the predicate.
pub struct Filter<'a> {
    predicate: Predicate,
    child: Box<dyn OpIterator + 'a>,
    schema: Schema,
}

impl<'a> Filter<'a> {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator + 'a>) -> Self {
        let schema = child.get_schema().clone();
        Self {
            predicate,
            child,
            schema,
        }
    }
}

impl OpIterator for Filter<'_> {
    fn open(&mut self) -> MinnowResult {
        self.child.open()
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn rewind(&mut self) -> MinnowResult {
        self.child.rewind()
    }

    fn next(&mut self) -> Result<Option<WrappedTuple>, MinnowError> {
        while let Some(tuple) = self.child.next()? {
            if self.predicate.matches(&tuple) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn get_schema(&self) -> &Schema {
        &self.schema
    }
}
