use std::{collections::HashMap, sync::Arc};

use crate::{
    error::MinnowError,
    storage::{
        page_id::PageId,
        tuple::{Schema, Tuple, WrappedTuple},
    },
    transaction::Transaction,
    types::MinnowResult,
};

/// The operations the engine needs from a table file, whatever its format.
/// The page cache uses the byte-level half to load and flush pages; the
/// executor and the statistics layer use the tuple-level half.
pub trait DbFile: Send + Sync {
    fn get_id(&self) -> u32;

    fn get_schema(&self) -> Schema;

    /// The index column for B+ tree files; heap files report 0 and never
    /// look at it.
    fn key_field(&self) -> usize;

    /// Whether `field` is a key column of this file (the cost estimator
    /// asks to size equality joins).
    fn is_key_field(&self, _field: usize) -> bool {
        false
    }

    fn read_page_bytes(&self, pid: &PageId) -> Result<Vec<u8>, MinnowError>;

    fn write_page_bytes(&self, pid: &PageId, data: &[u8]) -> MinnowResult;

    /// Insert a tuple on behalf of `tx`, leaving every modified page marked
    /// dirty and attributed to the transaction.
    fn insert_tuple(&self, tx: &Transaction, tuple: &Tuple) -> MinnowResult;

    /// Delete the tuple at its record id, with the same dirty-page
    /// contract as `insert_tuple`.
    fn delete_tuple(&self, tx: &Transaction, tuple: &WrappedTuple) -> MinnowResult;

    /// A full scan of the file. Each step is fallible: a lock give-up
    /// mid-scan surfaces as an `Err` item, not a panic, so callers such
    /// as the statistics gatherer can abort their transaction and back
    /// off.
    fn iter_tuples<'a>(
        &'a self,
        tx: &'a Transaction,
    ) -> Box<dyn Iterator<Item = Result<WrappedTuple, MinnowError>> + 'a>;

    /// The number of data pages in the file.
    fn num_pages(&self) -> Result<usize, MinnowError>;
}

/// Resolves table ids to files. The engine assumes registration happens at
/// startup (there is no DDL surface here).
pub struct Catalog {
    tables: HashMap<u32, Arc<dyn DbFile>>,
    names: HashMap<u32, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            names: HashMap::new(),
        }
    }

    pub fn add_table(&mut self, table: Arc<dyn DbFile>, name: &str) {
        let id = table.get_id();
        self.tables.insert(id, table);
        self.names.insert(id, name.to_string());
    }

    pub fn get_table(&self, table_id: &u32) -> Result<Arc<dyn DbFile>, MinnowError> {
        self.tables.get(table_id).cloned().ok_or_else(|| {
            MinnowError::invalid_arg(&format!("table {} not found in the catalog", table_id))
        })
    }

    pub fn get_table_name(&self, table_id: &u32) -> Option<String> {
        self.names.get(table_id).cloned()
    }

    pub fn get_table_id(&self, name: &str) -> Option<u32> {
        self.names
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    pub fn table_ids(&self) -> Vec<u32> {
        self.tables.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.names.clear();
    }
}
