use core::fmt;
use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, RwLock,
    },
};

use log::debug;

use crate::{
    buffer_pool::BufferPool,
    catalog::DbFile,
    concurrent_status::{ConcurrentStatus, Permission},
    database::Database,
    error::MinnowError,
    io::MinnowFile,
    storage::{
        field::Cell,
        page::Page,
        page_id::{PageCategory, PageId},
        tuple::{Schema, Tuple, WrappedTuple},
    },
    transaction::Transaction,
    types::{MinnowResult, ResultPod},
    utils::HandyRwLock,
};

use super::{
    iter::BTreeTableIterator,
    page::{
        BTreeHeaderPage, BTreeInternalPage, BTreeLeafPage, BTreePage, BTreeRootPointerPage,
        Entry, ROOT_POINTER_PAGE_SIZE,
    },
};

pub enum SearchFor {
    Key(Cell),
    LeftMost,
    RightMost,
}

/// A B+ tree file keyed on one column. The file starts with the root
/// pointer page; every tree mutation goes through the buffer pool under
/// the caller's transaction, so locking, logging and rollback come along
/// for free.
pub struct BTreeTable {
    file_path: String,

    /// the column the tree is keyed on
    pub key_field: usize,

    pub schema: Schema,

    file: MinnowFile,

    table_id: u32,

    /// the highest page index handed out so far (0 is the root pointer)
    page_index: AtomicU32,
}

impl fmt::Display for BTreeTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<BTreeTable, file: {}, id: {}>", self.file_path, self.table_id)
    }
}

impl BTreeTable {
    pub fn new(file_path: &str, key_field: usize, schema: &Schema) -> Self {
        let file = MinnowFile::open(file_path).unwrap();

        // a fresh file gets its root pointer and an empty leaf at index 1
        let size = file.get_size().unwrap() as usize;
        if size == 0 {
            file.seek(0).unwrap();
            file.write_bytes(&BTreeRootPointerPage::fresh_page_data()).unwrap();
            file.write_bytes(&vec![0; BufferPool::get_page_size()]).unwrap();
            file.flush().unwrap();
        }

        // ids must survive restarts so that log records keep resolving
        let mut hasher = DefaultHasher::new();
        file_path.hash(&mut hasher);
        let table_id = hasher.finish() as u32;

        let size = file.get_size().unwrap() as usize;
        let data_pages = (size - ROOT_POINTER_PAGE_SIZE) / BufferPool::get_page_size();

        Self {
            file_path: file_path.to_string(),
            key_field,
            schema: schema.clone(),
            file,
            table_id,
            page_index: AtomicU32::new(data_pages as u32),
        }
    }

    pub fn get_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_file_path(&self) -> &str {
        &self.file_path
    }

    /// The number of data pages (the root pointer page not included).
    pub fn pages_count(&self) -> Result<usize, MinnowError> {
        let size = self.file.get_size()? as usize;
        Ok((size - ROOT_POINTER_PAGE_SIZE) / BufferPool::get_page_size())
    }

    pub fn iter<'a>(&'a self, tx: &'a Transaction) -> BTreeTableIterator<'a> {
        BTreeTableIterator::new(tx, self)
    }

    /// Count the tuples with a throwaway transaction (shared locks on the
    /// whole file until it commits).
    pub fn tuples_count(&self) -> usize {
        let tx = Transaction::new();
        let count = BTreeTableIterator::new(&tx, self).count();
        tx.commit().unwrap();
        count
    }

    fn byte_offset(page_index: u32) -> u64 {
        if page_index == 0 {
            return 0;
        }
        (ROOT_POINTER_PAGE_SIZE + (page_index as usize - 1) * BufferPool::get_page_size()) as u64
    }

    pub fn root_ptr_pid(&self) -> PageId {
        PageId::new(PageCategory::RootPointer, self.table_id, 0)
    }

    /// The root pointer is always taken read-write: every structural
    /// change funnels through it, which gives tree operations of one table
    /// a single lock order and keeps them deadlock-free against each
    /// other.
    pub fn get_root_ptr_page(&self, tx: &Transaction) -> ResultPod<BTreeRootPointerPage> {
        BufferPool::get_root_ptr_page(tx, Permission::ReadWrite, &self.root_ptr_pid())
    }

    pub fn get_root_pid(&self, tx: &Transaction) -> Result<PageId, MinnowError> {
        let root_ptr_rc = self.get_root_ptr_page(tx)?;
        let root_pid = root_ptr_rc.rl().get_root_pid();
        Ok(root_pid)
    }

    pub fn set_root_pid(&self, tx: &Transaction, root_pid: &PageId) -> MinnowResult {
        let root_ptr_rc = self.get_root_ptr_page(tx)?;
        root_ptr_rc.wl().set_root_pid(root_pid);
        ConcurrentStatus::set_dirty(tx, &self.root_ptr_pid());
        Ok(())
    }

    /// Recursive descent to the left-most leaf that may hold the search
    /// key. Interior pages on the path are taken shared; only the target
    /// leaf gets the caller's permission. Duplicate keys resolve to the
    /// left subtree, so equal-key scans start at the left-most candidate.
    pub fn find_leaf_page(
        &self,
        tx: &Transaction,
        perm: Permission,
        page_id: PageId,
        search: &SearchFor,
    ) -> ResultPod<BTreeLeafPage> {
        match page_id.category {
            PageCategory::Leaf => BufferPool::get_leaf_page(tx, perm, &page_id),
            PageCategory::Internal => {
                let page_rc =
                    BufferPool::get_internal_page(tx, Permission::ReadOnly, &page_id)?;
                let mut child_pid: Option<PageId> = None;

                // hold the internal page
                {
                    let page = page_rc.rl();
                    let mut last_entry: Option<Entry> = None;
                    for e in page.iter() {
                        match search {
                            SearchFor::Key(cell) => {
                                if &e.get_key() >= cell {
                                    child_pid = Some(e.get_left_child());
                                    break;
                                }
                            }
                            SearchFor::LeftMost => {
                                child_pid = Some(e.get_left_child());
                                break;
                            }
                            SearchFor::RightMost => {
                                // keep going; the last entry wins
                            }
                        }
                        last_entry = Some(e);
                    }

                    if child_pid.is_none() {
                        // past the largest key: descend into the right edge
                        match last_entry {
                            Some(e) => child_pid = Some(e.get_right_child()),
                            None => {
                                return Err(MinnowError::db(&format!(
                                    "internal page {} has no entries",
                                    page_id
                                )))
                            }
                        }
                    }
                }
                // release the internal page (the guard, not the lock)

                self.find_leaf_page(tx, perm, child_pid.unwrap(), search)
            }
            _ => Err(MinnowError::invalid_arg(&format!(
                "cannot search into page {}",
                page_id
            ))),
        }
    }

    pub fn get_first_page(&self, tx: &Transaction, perm: Permission) -> ResultPod<BTreeLeafPage> {
        let root_pid = self.get_root_pid(tx)?;
        self.find_leaf_page(tx, perm, root_pid, &SearchFor::LeftMost)
    }

    pub fn get_last_page(&self, tx: &Transaction, perm: Permission) -> ResultPod<BTreeLeafPage> {
        let root_pid = self.get_root_pid(tx)?;
        self.find_leaf_page(tx, perm, root_pid, &SearchFor::RightMost)
    }

    /// Insert a tuple, keeping the leaf level sorted. Splits the target
    /// leaf (and transitively its ancestors) when it is full.
    pub fn insert_tuple(&self, tx: &Transaction, tuple: &Tuple) -> MinnowResult {
        let root_pid = self.get_root_pid(tx)?;
        let key = tuple.get_cell(self.key_field);

        let mut leaf_rc = self.find_leaf_page(
            tx,
            Permission::ReadWrite,
            root_pid,
            &SearchFor::Key(key.clone()),
        )?;

        if leaf_rc.rl().empty_slots_count() == 0 {
            leaf_rc = self.split_leaf_page(tx, leaf_rc, &key)?;
        }

        let leaf_pid = leaf_rc.rl().get_pid();
        leaf_rc.wl().insert_tuple(tuple)?;
        ConcurrentStatus::set_dirty(tx, &leaf_pid);
        Ok(())
    }

    /// Split a full leaf: a new right sibling takes the upper half of the
    /// tuples, the sibling chain is respliced, and the first key of the
    /// new page is copied up into the parent (it stays in the leaf).
    /// Returns the half the pending insert belongs to.
    fn split_leaf_page(
        &self,
        tx: &Transaction,
        page_rc: Arc<RwLock<BTreeLeafPage>>,
        key: &Cell,
    ) -> ResultPod<BTreeLeafPage> {
        let new_sibling_rc = self.get_empty_leaf_page(tx)?;
        let parent_pid: PageId;
        let split_key: Cell;

        // hold the page and its new sibling
        {
            let mut new_sibling = new_sibling_rc.wl();
            let mut page = page_rc.wl();

            let move_count = page.tuples_count() / 2;
            let moved: Vec<WrappedTuple> = page.iter().rev().take(move_count).collect();
            for tuple in &moved {
                new_sibling.insert_tuple(tuple)?;
                page.delete_tuple(tuple.get_slot_index())?;
            }

            split_key = new_sibling
                .iter()
                .next()
                .ok_or_else(|| MinnowError::db("split produced an empty sibling"))?
                .get_cell(self.key_field);

            parent_pid = page.get_parent_pid();
        }
        // release the page and its new sibling

        // the parent may itself split, so it is resolved outside the
        // borrow of the two leaves
        let parent_rc = self.get_parent_with_empty_slots(tx, parent_pid, key)?;

        // hold the parent and both leaves
        {
            let mut parent = parent_rc.wl();
            let mut page = page_rc.wl();
            let mut new_sibling = new_sibling_rc.wl();

            let entry = Entry::new(split_key.clone(), &page.get_pid(), &new_sibling.get_pid());
            parent.insert_entry(&entry)?;

            debug!(
                "leaf {} splits, sibling {}, separator {}",
                page.get_pid(),
                new_sibling.get_pid(),
                split_key
            );

            // splice the new page into the sibling chain
            if let Some(old_right_pid) = page.get_right_pid() {
                let old_right_rc =
                    BufferPool::get_leaf_page(tx, Permission::ReadWrite, &old_right_pid)?;
                old_right_rc.wl().set_left_pid(Some(new_sibling.get_pid()));
                ConcurrentStatus::set_dirty(tx, &old_right_pid);
            }
            new_sibling.set_right_pid(page.get_right_pid());
            new_sibling.set_left_pid(Some(page.get_pid()));
            page.set_right_pid(Some(new_sibling.get_pid()));

            page.set_parent_pid(&parent.get_pid());
            new_sibling.set_parent_pid(&parent.get_pid());

            ConcurrentStatus::set_dirty(tx, &page.get_pid());
            ConcurrentStatus::set_dirty(tx, &new_sibling.get_pid());
            ConcurrentStatus::set_dirty(tx, &parent.get_pid());
        }
        // release the parent and both leaves

        if key > &split_key {
            Ok(new_sibling_rc)
        } else {
            Ok(page_rc)
        }
    }

    /// A parent page with room for one more entry: the existing parent if
    /// it has a free slot, a freshly split parent otherwise, or a brand
    /// new root when the split reaches the root pointer.
    fn get_parent_with_empty_slots(
        &self,
        tx: &Transaction,
        parent_id: PageId,
        key: &Cell,
    ) -> ResultPod<BTreeInternalPage> {
        match parent_id.category {
            PageCategory::RootPointer => {
                let new_parent_rc = self.get_empty_internal_page(tx)?;
                self.set_root_pid(tx, &new_parent_rc.rl().get_pid())?;
                Ok(new_parent_rc)
            }
            PageCategory::Internal => {
                let parent_rc =
                    BufferPool::get_internal_page(tx, Permission::ReadWrite, &parent_id)?;

                let has_room = parent_rc.rl().empty_slots_count() > 0;
                if has_room {
                    Ok(parent_rc)
                } else {
                    self.split_internal_page(tx, parent_rc, key)
                }
            }
            _ => Err(MinnowError::invalid_arg(&format!(
                "page {} cannot be a parent",
                parent_id
            ))),
        }
    }

    /// Split a full internal node. The upper half of the entries moves to
    /// a new right sibling; the middle entry is removed from this level
    /// and pushed up to the parent with the two halves as its children.
    fn split_internal_page(
        &self,
        tx: &Transaction,
        page_rc: Arc<RwLock<BTreeInternalPage>>,
        key: &Cell,
    ) -> ResultPod<BTreeInternalPage> {
        let sibling_rc = self.get_empty_internal_page(tx)?;
        let split_key: Cell;
        let mut parent_pid: PageId;
        let new_entry: Entry;

        // hold the page and its new sibling
        {
            let mut sibling = sibling_rc.wl();
            let mut page = page_rc.wl();

            parent_pid = page.get_parent_pid();
            if parent_pid.category == PageCategory::RootPointer {
                // splitting the root: a new root is created right away so
                // both halves have somewhere to hang
                let parent_rc = self.get_empty_internal_page(tx)?;
                parent_pid = parent_rc.rl().get_pid();
                self.set_root_pid(tx, &parent_pid)?;
            }

            let move_count = page.entries_count() / 2;
            let upper: Vec<Entry> = page.iter().rev().take(move_count + 1).collect();
            let (moved, middle) = upper.split_at(move_count);
            let middle = &middle[0];

            for e in moved {
                sibling.insert_entry(e)?;
                self.set_parent(tx, &e.get_right_child(), &sibling.get_pid())?;
                page.delete_key_and_right_child(e.get_record_id());
            }

            // the middle entry leaves this level entirely
            page.delete_key_and_right_child(middle.get_record_id());
            self.set_parent(tx, &middle.get_right_child(), &sibling.get_pid())?;

            split_key = middle.get_key();
            new_entry = Entry::new(split_key.clone(), &page.get_pid(), &sibling.get_pid());

            ConcurrentStatus::set_dirty(tx, &page.get_pid());
            ConcurrentStatus::set_dirty(tx, &sibling.get_pid());
        }
        // release the page and its new sibling

        let parent_rc = self.get_parent_with_empty_slots(tx, parent_pid, key)?;
        let resolved_parent_pid = parent_rc.rl().get_pid();
        page_rc.wl().set_parent_pid(&resolved_parent_pid);
        sibling_rc.wl().set_parent_pid(&resolved_parent_pid);

        // hold the parent
        {
            let mut parent = parent_rc.wl();
            parent.insert_entry(&new_entry)?;
            ConcurrentStatus::set_dirty(tx, &parent.get_pid());
        }
        // release the parent

        if key > &split_key {
            Ok(sibling_rc)
        } else {
            Ok(page_rc)
        }
    }

    pub(super) fn set_parent(
        &self,
        tx: &Transaction,
        child_pid: &PageId,
        parent_pid: &PageId,
    ) -> MinnowResult {
        match child_pid.category {
            PageCategory::Leaf => {
                let child_rc = BufferPool::get_leaf_page(tx, Permission::ReadWrite, child_pid)?;
                child_rc.wl().set_parent_pid(parent_pid);
            }
            PageCategory::Internal => {
                let child_rc =
                    BufferPool::get_internal_page(tx, Permission::ReadWrite, child_pid)?;
                child_rc.wl().set_parent_pid(parent_pid);
            }
            _ => {
                return Err(MinnowError::invalid_arg(&format!(
                    "page {} cannot have a parent pointer",
                    child_pid
                )))
            }
        }
        ConcurrentStatus::set_dirty(tx, child_pid);
        Ok(())
    }

    // ------------------------------------------------------------------
    // page allocation and reuse
    // ------------------------------------------------------------------

    /// A usable page index: a reclaimed slot from the header chain when
    /// one exists, a fresh index extending the file otherwise.
    pub fn get_empty_page_index(&self, tx: &Transaction) -> Result<u32, MinnowError> {
        let root_ptr_rc = self.get_root_ptr_page(tx)?;
        let mut header_pid = root_ptr_rc.rl().get_header_pid();

        let slots_per_header = BTreeHeaderPage::get_slots_count();
        let mut base = 0usize;

        while let Some(pid) = header_pid {
            let header_rc = BufferPool::get_header_page(tx, Permission::ReadWrite, &pid)?;

            let empty_slot = header_rc.rl().get_empty_slot();
            if let Some(slot) = empty_slot {
                header_rc.wl().mark_slot_status(slot, true);
                ConcurrentStatus::set_dirty(tx, &pid);
                return Ok((base + slot) as u32);
            }

            header_pid = header_rc.rl().get_next_pid();
            base += slots_per_header;
        }

        Ok(self.page_index.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn get_empty_leaf_page(&self, tx: &Transaction) -> ResultPod<BTreeLeafPage> {
        let page_index = self.get_empty_page_index(tx)?;
        let pid = PageId::new(PageCategory::Leaf, self.table_id, page_index);
        let page = BTreeLeafPage::new(
            &pid,
            &vec![0; BufferPool::get_page_size()],
            &self.schema,
            self.key_field,
        );

        self.write_empty_page_to_disk(&pid)?;

        let page_rc = Arc::new(RwLock::new(page));
        Database::mut_buffer_pool().cache_leaf_page(pid, page_rc.clone())?;
        ConcurrentStatus::set_dirty(tx, &pid);
        Ok(page_rc)
    }

    fn get_empty_internal_page(&self, tx: &Transaction) -> ResultPod<BTreeInternalPage> {
        let page_index = self.get_empty_page_index(tx)?;
        let pid = PageId::new(PageCategory::Internal, self.table_id, page_index);
        let page = BTreeInternalPage::new(
            &pid,
            &vec![0; BufferPool::get_page_size()],
            &self.schema,
            self.key_field,
        );

        self.write_empty_page_to_disk(&pid)?;

        let page_rc = Arc::new(RwLock::new(page));
        Database::mut_buffer_pool().cache_internal_page(pid, page_rc.clone())?;
        ConcurrentStatus::set_dirty(tx, &pid);
        Ok(page_rc)
    }

    fn get_empty_header_page(&self, tx: &Transaction) -> ResultPod<BTreeHeaderPage> {
        // header pages always extend the file; routing their allocation
        // through the header chain would chase its own tail
        let page_index = self.page_index.fetch_add(1, Ordering::Relaxed) + 1;
        let pid = PageId::new(PageCategory::Header, self.table_id, page_index);
        let page = BTreeHeaderPage::new_empty(&pid);

        self.write_empty_page_to_disk(&pid)?;

        let page_rc = Arc::new(RwLock::new(page));
        Database::mut_buffer_pool().cache_header_page(pid, page_rc.clone())?;
        ConcurrentStatus::set_dirty(tx, &pid);
        Ok(page_rc)
    }

    /// Give a page back to the file: drop it from the cache and clear its
    /// bit in the covering header page, growing the header chain on
    /// demand.
    pub(super) fn set_empty_page(&self, tx: &Transaction, pid: &PageId) -> MinnowResult {
        Database::mut_buffer_pool().discard_page(pid);

        let root_ptr_rc = self.get_root_ptr_page(tx)?;

        let slots_per_header = BTreeHeaderPage::get_slots_count();
        let target = pid.page_index as usize;

        let first_header_pid = root_ptr_rc.rl().get_header_pid();
        let mut current_rc = match first_header_pid {
            Some(header_pid) => {
                BufferPool::get_header_page(tx, Permission::ReadWrite, &header_pid)?
            }
            None => {
                let header_rc = self.get_empty_header_page(tx)?;
                root_ptr_rc.wl().set_header_pid(&header_rc.rl().get_pid());
                ConcurrentStatus::set_dirty(tx, &self.root_ptr_pid());
                header_rc
            }
        };

        let mut base = 0usize;
        loop {
            if target < base + slots_per_header {
                let header_pid = current_rc.rl().get_pid();
                current_rc.wl().mark_slot_status(target - base, false);
                ConcurrentStatus::set_dirty(tx, &header_pid);
                debug!("page {} reclaimed via header {}", pid, header_pid);
                return Ok(());
            }

            let next = current_rc.rl().get_next_pid();
            let next_rc = match next {
                Some(next_pid) => {
                    BufferPool::get_header_page(tx, Permission::ReadWrite, &next_pid)?
                }
                None => {
                    let new_rc = self.get_empty_header_page(tx)?;
                    let current_pid = current_rc.rl().get_pid();
                    let new_pid = new_rc.rl().get_pid();
                    current_rc.wl().set_next_pid(Some(new_pid));
                    new_rc.wl().set_prev_pid(Some(current_pid));
                    ConcurrentStatus::set_dirty(tx, &current_pid);
                    ConcurrentStatus::set_dirty(tx, &new_pid);
                    new_rc
                }
            };
            current_rc = next_rc;
            base += slots_per_header;
        }
    }

    pub fn write_empty_page_to_disk(&self, pid: &PageId) -> MinnowResult {
        self.write_page_bytes(pid, &vec![0; BufferPool::get_page_size()])
    }

    // ------------------------------------------------------------------
    // integrity checking (test support, mirrors the structural rules)
    // ------------------------------------------------------------------

    pub fn check_integrity(&self, check_occupancy: bool) -> MinnowResult {
        let tx = Transaction::new();
        let result = self.check_integrity_with(&tx, check_occupancy);
        tx.commit().unwrap();
        result
    }

    fn check_integrity_with(&self, tx: &Transaction, check_occupancy: bool) -> MinnowResult {
        let root_ptr_rc = self.get_root_ptr_page(tx)?;
        let root_pid = root_ptr_rc.rl().get_root_pid();
        self.check_sub_tree(
            tx,
            &root_pid,
            &self.root_ptr_pid(),
            &None,
            &None,
            check_occupancy,
            0,
        )
    }

    fn check_sub_tree(
        &self,
        tx: &Transaction,
        pid: &PageId,
        parent_pid: &PageId,
        lower: &Option<Cell>,
        upper: &Option<Cell>,
        check_occupancy: bool,
        depth: usize,
    ) -> MinnowResult {
        match pid.category {
            PageCategory::Leaf => {
                let page_rc = BufferPool::get_leaf_page(tx, Permission::ReadOnly, pid)?;
                let result = page_rc
                    .rl()
                    .check_integrity(parent_pid, lower, upper, check_occupancy, depth);
                result
            }
            PageCategory::Internal => {
                let page_rc = BufferPool::get_internal_page(tx, Permission::ReadOnly, pid)?;
                let page = page_rc.rl();
                page.check_integrity(parent_pid, lower, upper, check_occupancy, depth)?;

                let mut child_lower = lower.clone();
                let mut last_entry: Option<Entry> = None;
                for e in page.iter() {
                    self.check_sub_tree(
                        tx,
                        &e.get_left_child(),
                        pid,
                        &child_lower,
                        &Some(e.get_key()),
                        check_occupancy,
                        depth + 1,
                    )?;
                    child_lower = Some(e.get_key());
                    last_entry = Some(e);
                }

                match last_entry {
                    Some(e) => self.check_sub_tree(
                        tx,
                        &e.get_right_child(),
                        pid,
                        &Some(e.get_key()),
                        upper,
                        check_occupancy,
                        depth + 1,
                    ),
                    None => Err(MinnowError::db(&format!(
                        "internal page {} has no entries",
                        pid
                    ))),
                }
            }
            _ => Err(MinnowError::db(&format!(
                "page {} cannot appear inside the tree",
                pid
            ))),
        }
    }
}

impl DbFile for BTreeTable {
    fn get_id(&self) -> u32 {
        self.table_id
    }

    fn get_schema(&self) -> Schema {
        self.schema.clone()
    }

    fn key_field(&self) -> usize {
        self.key_field
    }

    fn is_key_field(&self, field: usize) -> bool {
        field == self.key_field
    }

    fn read_page_bytes(&self, pid: &PageId) -> Result<Vec<u8>, MinnowError> {
        if pid.table_id != self.table_id {
            return Err(MinnowError::invalid_arg(&format!(
                "page {} does not belong to table {}",
                pid, self.table_id
            )));
        }

        self.file.seek(Self::byte_offset(pid.page_index))?;
        match pid.category {
            PageCategory::RootPointer => self.file.read_bytes(ROOT_POINTER_PAGE_SIZE),
            _ => self.file.read_bytes(BufferPool::get_page_size()),
        }
    }

    fn write_page_bytes(&self, pid: &PageId, data: &[u8]) -> MinnowResult {
        if pid.table_id != self.table_id {
            return Err(MinnowError::invalid_arg(&format!(
                "page {} does not belong to table {}",
                pid, self.table_id
            )));
        }

        self.file.seek(Self::byte_offset(pid.page_index))?;
        self.file.write_bytes(data)?;
        self.file.flush()
    }

    fn insert_tuple(&self, tx: &Transaction, tuple: &Tuple) -> MinnowResult {
        BTreeTable::insert_tuple(self, tx, tuple)
    }

    fn delete_tuple(&self, tx: &Transaction, tuple: &WrappedTuple) -> MinnowResult {
        BTreeTable::delete_tuple(self, tx, tuple)
    }

    fn iter_tuples<'a>(
        &'a self,
        tx: &'a Transaction,
    ) -> Box<dyn Iterator<Item = Result<WrappedTuple, MinnowError>> + 'a> {
        let mut iter = BTreeTableIterator::new(tx, self);
        Box::new(std::iter::from_fn(move || iter.next_up().transpose()))
    }

    fn num_pages(&self) -> Result<usize, MinnowError> {
        self.pages_count()
    }
}
