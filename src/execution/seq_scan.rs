use crate::{
    error::MinnowError,
    execution::operator::OpIterator,
    storage::{
        heap_table::{HeapTable, HeapTableIterator},
        tuple::{Schema, WrappedTuple},
    },
    transaction::Transaction,
    types::MinnowResult,
};

/// A sequential scan: the thinnest possible wrapper around the heap-file
/// iterator.
pub struct SeqScan<'a> {
    tx: &'a Transaction,
    table: &'a HeapTable,
    schema: Schema,

    iter: Option<HeapTableIterator<'a>>,
}

impl<'a> SeqScan<'a> {
    pub fn new(tx: &'a Transaction, table: &'a HeapTable) -> Self {
        Self {
            tx,
            table,
            schema: table.schema.clone(),
            iter: None,
        }
    }
}

impl OpIterator for SeqScan<'_> {
    fn open(&mut self) -> MinnowResult {
        self.iter = Some(self.table.iter(self.tx));
        Ok(())
    }

    fn close(&mut self) {
        self.iter = None;
    }

    fn rewind(&mut self) -> MinnowResult {
        match self.iter {
            Some(ref mut iter) => {
                iter.rewind();
                Ok(())
            }
            None => Err(MinnowError::db("rewind on a scan that is not open")),
        }
    }

    fn next(&mut self) -> Result<Option<WrappedTuple>, MinnowError> {
        match self.iter {
            Some(ref mut iter) => iter.next_up(),
            None => Err(MinnowError::db("next on a scan that is not open")),
        }
    }

    fn get_schema(&self) -> &Schema {
        &self.schema
    }
}
