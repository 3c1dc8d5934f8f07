use crate::{
    buffer_pool::BufferPool,
    error::MinnowError,
    execution::operator::OpIterator,
    storage::{
        field::{Cell, Field, Type},
        page_id::{PageCategory, PageId},
        tuple::{Schema, Tuple, WrappedTuple},
    },
    transaction::Transaction,
    types::MinnowResult,
};

fn count_schema(name: &str) -> Schema {
    Schema::new(vec![Field::new(name, Type::Int64)])
}

fn count_tuple(count: i64) -> WrappedTuple {
    WrappedTuple::new(
        &Tuple::new(&[Cell::Int64(count)]),
        0,
        PageId::new(PageCategory::Heap, 0, 0),
    )
}

/// Pumps its child into a table. The child is consumed exactly once; the
/// operator's whole output is one tuple carrying the inserted-row count.
pub struct Insert<'a> {
    tx: &'a Transaction,
    table_id: u32,
    child: Box<dyn OpIterator + 'a>,
    schema: Schema,

    done: bool,
}

impl<'a> Insert<'a> {
    pub fn new(tx: &'a Transaction, table_id: u32, child: Box<dyn OpIterator + 'a>) -> Self {
        Self {
            tx,
            table_id,
            child,
            schema: count_schema("inserted"),
            done: false,
        }
    }
}

impl OpIterator for Insert<'_> {
    fn open(&mut self) -> MinnowResult {
        self.child.open()
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn rewind(&mut self) -> MinnowResult {
        self.done = false;
        self.child.rewind()
    }

    fn next(&mut self) -> Result<Option<WrappedTuple>, MinnowError> {
        if self.done {
            return Ok(None);
        }

        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            BufferPool::insert_tuple(self.tx, self.table_id, &tuple)?;
            count += 1;
        }

        self.done = true;
        Ok(Some(count_tuple(count)))
    }

    fn get_schema(&self) -> &Schema {
        &self.schema
    }
}

/// Deletes every tuple its child produces (the child must read from the
/// target table so the record ids are real). Output is one tuple carrying
/// the deleted-row count.
pub struct Delete<'a> {
    tx: &'a Transaction,
    table_id: u32,
    child: Box<dyn OpIterator + 'a>,
    schema: Schema,

    done: bool,
}

impl<'a> Delete<'a> {
    pub fn new(tx: &'a Transaction, table_id: u32, child: Box<dyn OpIterator + 'a>) -> Self {
        Self {
            tx,
            table_id,
            child,
            schema: count_schema("deleted"),
            done: false,
        }
    }
}

impl OpIterator for Delete<'_> {
    fn open(&mut self) -> MinnowResult {
        self.child.open()
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn rewind(&mut self) -> MinnowResult {
        self.done = false;
        self.child.rewind()
    }

    fn next(&mut self) -> Result<Option<WrappedTuple>, MinnowError> {
        if self.done {
            return Ok(None);
        }

        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            BufferPool::delete_tuple(self.tx, self.table_id, &tuple)?;
            count += 1;
        }

        self.done = true;
        Ok(Some(count_tuple(count)))
    }

    fn get_schema(&self) -> &Schema {
        &self.schema
    }
}
