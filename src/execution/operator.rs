use crate::{
    error::MinnowError,
    storage::tuple::{Schema, WrappedTuple},
    types::MinnowResult,
};

/// The pipeline contract every operator speaks: open before use, pull
/// tuples with `next`, rewind to replay (the nested-loop join leans on
/// this), close when done. Errors, above all a lock give-up, bubble up
/// through `next` so the driver can abort the transaction.
///
/// Operators hand tuples around with their record ids attached; operators
/// that manufacture tuples (join, aggregate) attach a synthetic id.
pub trait OpIterator {
    fn open(&mut self) -> MinnowResult;

    fn close(&mut self);

    fn rewind(&mut self) -> MinnowResult;

    fn next(&mut self) -> Result<Option<WrappedTuple>, MinnowError>;

    fn get_schema(&self) -> &Schema;
}
