use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    path::Path,
};

use log::debug;

use crate::{
    buffer_pool::BufferPool,
    catalog::DbFile,
    concurrent_status::{ConcurrentStatus, Permission},
    error::MinnowError,
    io::MinnowFile,
    storage::{
        heap_page::HeapPage,
        page_id::{PageCategory, PageId},
        tuple::{Schema, Tuple, WrappedTuple},
    },
    transaction::Transaction,
    types::MinnowResult,
};

/// A heap file: an unordered sequence of fixed-size pages with no header.
/// Tuples go wherever a slot is free.
pub struct HeapTable {
    file_path: String,

    table_id: u32,

    pub schema: Schema,

    file: MinnowFile,
}

impl HeapTable {
    pub fn new(file_path: &str, schema: &Schema) -> Self {
        let file = MinnowFile::open(file_path).unwrap();

        // The id must be stable across process restarts so that log records
        // written before a crash still resolve through the catalog.
        let mut hasher = DefaultHasher::new();
        file_path.hash(&mut hasher);
        let table_id = hasher.finish() as u32;

        Self {
            file_path: file_path.to_string(),
            table_id,
            schema: schema.clone(),
            file,
        }
    }

    pub fn get_file_path(&self) -> &str {
        &self.file_path
    }

    pub fn pages_count(&self) -> Result<usize, MinnowError> {
        let size = self.file.get_size()? as usize;
        Ok(size / BufferPool::get_page_size())
    }

    fn check_pid(&self, pid: &PageId) -> MinnowResult {
        if pid.category != PageCategory::Heap || pid.table_id != self.table_id {
            return Err(MinnowError::invalid_arg(&format!(
                "page {} does not belong to heap table {}",
                pid, self.table_id
            )));
        }
        Ok(())
    }

    /// Insert on behalf of `tx`: probe the existing pages front to back
    /// under read-write permission, and take the first free slot. Probed
    /// pages without room are released right away so the transaction does
    /// not pile up write locks on pages it never touched. When every page
    /// is full the file grows by one empty page, which is then acquired
    /// through the buffer pool like any other page.
    pub fn insert_tuple(
        &self,
        tx: &Transaction,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>, MinnowError> {
        let pages_count = self.pages_count()?;

        for index in 0..pages_count {
            let pid = PageId::new(PageCategory::Heap, self.table_id, index as u32);
            let page_pod = BufferPool::get_heap_page(tx, Permission::ReadWrite, &pid)?;

            let has_room = {
                let page = page_pod.read().unwrap();
                page.empty_slots_count() > 0
            };

            if !has_room {
                // probe failed, give the lock back immediately
                ConcurrentStatus::release_page(tx, &pid);
                continue;
            }

            page_pod.write().unwrap().insert_tuple(tuple)?;
            ConcurrentStatus::set_dirty(tx, &pid);
            return Ok(vec![pid]);
        }

        // every page is full, extend the file
        let new_index = pages_count as u32;
        let pid = PageId::new(PageCategory::Heap, self.table_id, new_index);
        debug!("heap table {} grows to page {}", self.table_id, new_index);
        self.write_page_bytes(&pid, &HeapPage::empty_page_data())?;

        let page_pod = BufferPool::get_heap_page(tx, Permission::ReadWrite, &pid)?;
        page_pod.write().unwrap().insert_tuple(tuple)?;
        ConcurrentStatus::set_dirty(tx, &pid);
        Ok(vec![pid])
    }

    pub fn delete_tuple(&self, tx: &Transaction, tuple: &WrappedTuple) -> MinnowResult {
        let pid = tuple.get_pid();
        self.check_pid(&pid)?;

        let page_pod = BufferPool::get_heap_page(tx, Permission::ReadWrite, &pid)?;
        page_pod.write().unwrap().delete_tuple(tuple.get_slot_index())?;
        ConcurrentStatus::set_dirty(tx, &pid);
        Ok(())
    }

    pub fn iter<'a>(&'a self, tx: &'a Transaction) -> HeapTableIterator<'a> {
        HeapTableIterator::new(tx, self)
    }
}

impl DbFile for HeapTable {
    fn get_id(&self) -> u32 {
        self.table_id
    }

    fn get_schema(&self) -> Schema {
        self.schema.clone()
    }

    fn key_field(&self) -> usize {
        0
    }

    fn read_page_bytes(&self, pid: &PageId) -> Result<Vec<u8>, MinnowError> {
        self.check_pid(pid)?;
        if pid.page_index as usize >= self.pages_count()? {
            return Err(MinnowError::invalid_arg(&format!(
                "page index {} beyond the end of heap table {}",
                pid.page_index, self.table_id
            )));
        }

        let page_size = BufferPool::get_page_size();
        self.file.seek(pid.page_index as u64 * page_size as u64)?;
        self.file.read_bytes(page_size)
    }

    fn write_page_bytes(&self, pid: &PageId, data: &[u8]) -> MinnowResult {
        self.check_pid(pid)?;
        let page_size = BufferPool::get_page_size();
        self.file.seek(pid.page_index as u64 * page_size as u64)?;
        self.file.write_bytes(data)?;
        self.file.flush()
    }

    fn insert_tuple(&self, tx: &Transaction, tuple: &Tuple) -> MinnowResult {
        HeapTable::insert_tuple(self, tx, tuple).map(|_| ())
    }

    fn delete_tuple(&self, tx: &Transaction, tuple: &WrappedTuple) -> MinnowResult {
        HeapTable::delete_tuple(self, tx, tuple)
    }

    fn iter_tuples<'a>(
        &'a self,
        tx: &'a Transaction,
    ) -> Box<dyn Iterator<Item = Result<WrappedTuple, MinnowError>> + 'a> {
        let mut iter = self.iter(tx);
        Box::new(std::iter::from_fn(move || iter.next_up().transpose()))
    }

    fn num_pages(&self) -> Result<usize, MinnowError> {
        self.pages_count()
    }
}

/// A lazy scan of the whole file: page 0 first, each page acquired
/// read-only when the previous one runs out.
pub struct HeapTableIterator<'a> {
    tx: &'a Transaction,
    table: &'a HeapTable,

    pages_count: usize,
    next_page_index: usize,

    current: Vec<WrappedTuple>,
    cursor: usize,
}

impl<'a> HeapTableIterator<'a> {
    pub fn new(tx: &'a Transaction, table: &'a HeapTable) -> Self {
        let pages_count = table.pages_count().unwrap_or(0);
        Self {
            tx,
            table,
            pages_count,
            next_page_index: 0,
            current: Vec::new(),
            cursor: 0,
        }
    }

    pub fn rewind(&mut self) {
        self.next_page_index = 0;
        self.current.clear();
        self.cursor = 0;
    }

    /// The fallible step the executor drives; a lock give-up surfaces here.
    pub fn next_up(&mut self) -> Result<Option<WrappedTuple>, MinnowError> {
        loop {
            if self.cursor < self.current.len() {
                let tuple = self.current[self.cursor].clone();
                self.cursor += 1;
                return Ok(Some(tuple));
            }

            if self.next_page_index >= self.pages_count {
                return Ok(None);
            }

            let pid = PageId::new(
                PageCategory::Heap,
                self.table.table_id,
                self.next_page_index as u32,
            );
            let page_pod = BufferPool::get_heap_page(self.tx, Permission::ReadOnly, &pid)?;
            self.current = page_pod.read().unwrap().tuples();
            self.cursor = 0;
            self.next_page_index += 1;
        }
    }
}

impl Iterator for HeapTableIterator<'_> {
    type Item = WrappedTuple;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_up().unwrap()
    }
}
