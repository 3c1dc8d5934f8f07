use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, RwLock,
    },
};

use log::debug;

use crate::{
    btree::page::{
        BTreeHeaderPage, BTreeInternalPage, BTreeLeafPage, BTreeRootPointerPage,
    },
    concurrent_status::{ConcurrentStatus, Permission},
    database::Database,
    error::MinnowError,
    storage::{
        heap_page::HeapPage,
        page::Page,
        page_id::{PageCategory, PageId},
        tuple::{Tuple, WrappedTuple},
    },
    transaction::Transaction,
    tx_log::LogManager,
    types::{MinnowResult, Pod, ResultPod},
};

pub const DEFAULT_PAGE_SIZE: usize = 4096;
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// How many pages the pool keeps in memory by default.
pub const DEFAULT_PAGES: usize = 500;

/// The shared page cache. Every page access goes `lock manager first, then
/// a short exclusive section here`: the blocking wait for a page lock never
/// happens while the pool itself is held, so a stalled transaction cannot
/// wedge the cache for everyone else.
///
/// Eviction policy is NO STEAL: only clean pages leave the pool, so a page
/// carrying uncommitted data can never reach disk. The matching commit
/// policy is FORCE: committing flushes every page the transaction dirtied
/// (after their UPDATE records are safely in the log).
pub struct BufferPool {
    root_pointer_buffer: HashMap<PageId, Pod<BTreeRootPointerPage>>,
    header_buffer: HashMap<PageId, Pod<BTreeHeaderPage>>,
    internal_buffer: HashMap<PageId, Pod<BTreeInternalPage>>,
    leaf_buffer: HashMap<PageId, Pod<BTreeLeafPage>>,
    heap_buffer: HashMap<PageId, Pod<HeapPage>>,

    // least recently used at the front
    access_order: Vec<PageId>,

    capacity: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PAGES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            root_pointer_buffer: HashMap::new(),
            header_buffer: HashMap::new(),
            internal_buffer: HashMap::new(),
            leaf_buffer: HashMap::new(),
            heap_buffer: HashMap::new(),
            access_order: Vec::new(),
            capacity,
        }
    }

    pub fn set_page_size(page_size: usize) {
        PAGE_SIZE.store(page_size, Ordering::Relaxed);
    }

    pub fn get_page_size() -> usize {
        PAGE_SIZE.load(Ordering::Relaxed)
    }

    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    pub fn cached_count(&self) -> usize {
        self.access_order.len()
    }

    pub fn clear(&mut self) {
        self.root_pointer_buffer.clear();
        self.header_buffer.clear();
        self.internal_buffer.clear();
        self.leaf_buffer.clear();
        self.heap_buffer.clear();
        self.access_order.clear();
    }

    // ------------------------------------------------------------------
    // the public page getters: lock, then look up / load
    // ------------------------------------------------------------------

    pub fn get_heap_page(
        tx: &Transaction,
        perm: Permission,
        pid: &PageId,
    ) -> ResultPod<HeapPage> {
        ConcurrentStatus::acquire_lock(tx, &perm.to_lock(), pid)?;
        Database::mut_buffer_pool().load_heap_page(pid)
    }

    pub fn get_leaf_page(
        tx: &Transaction,
        perm: Permission,
        pid: &PageId,
    ) -> ResultPod<BTreeLeafPage> {
        ConcurrentStatus::acquire_lock(tx, &perm.to_lock(), pid)?;
        Database::mut_buffer_pool().load_leaf_page(pid)
    }

    pub fn get_internal_page(
        tx: &Transaction,
        perm: Permission,
        pid: &PageId,
    ) -> ResultPod<BTreeInternalPage> {
        ConcurrentStatus::acquire_lock(tx, &perm.to_lock(), pid)?;
        Database::mut_buffer_pool().load_internal_page(pid)
    }

    pub fn get_header_page(
        tx: &Transaction,
        perm: Permission,
        pid: &PageId,
    ) -> ResultPod<BTreeHeaderPage> {
        ConcurrentStatus::acquire_lock(tx, &perm.to_lock(), pid)?;
        Database::mut_buffer_pool().load_header_page(pid)
    }

    pub fn get_root_ptr_page(
        tx: &Transaction,
        perm: Permission,
        pid: &PageId,
    ) -> ResultPod<BTreeRootPointerPage> {
        ConcurrentStatus::acquire_lock(tx, &perm.to_lock(), pid)?;
        Database::mut_buffer_pool().load_root_ptr_page(pid)
    }

    // ------------------------------------------------------------------
    // cache lookups (no locking; callers hold the page lock already)
    // ------------------------------------------------------------------

    fn read_page<PAGE: Page>(pid: &PageId) -> ResultPod<PAGE> {
        let table = Database::catalog().get_table(&pid.table_id)?;
        let bytes = table.read_page_bytes(pid)?;
        let page = PAGE::new(pid, &bytes, &table.get_schema(), table.key_field());
        Ok(Arc::new(RwLock::new(page)))
    }

    pub fn load_heap_page(&mut self, pid: &PageId) -> ResultPod<HeapPage> {
        if let Some(pod) = self.heap_buffer.get(pid) {
            let pod = pod.clone();
            self.touch(pid);
            return Ok(pod);
        }

        self.make_room()?;
        let pod = Self::read_page::<HeapPage>(pid)?;
        self.heap_buffer.insert(*pid, pod.clone());
        self.touch(pid);
        Ok(pod)
    }

    pub fn load_leaf_page(&mut self, pid: &PageId) -> ResultPod<BTreeLeafPage> {
        if let Some(pod) = self.leaf_buffer.get(pid) {
            let pod = pod.clone();
            self.touch(pid);
            return Ok(pod);
        }

        self.make_room()?;
        let pod = Self::read_page::<BTreeLeafPage>(pid)?;
        self.leaf_buffer.insert(*pid, pod.clone());
        self.touch(pid);
        Ok(pod)
    }

    pub fn load_internal_page(&mut self, pid: &PageId) -> ResultPod<BTreeInternalPage> {
        if let Some(pod) = self.internal_buffer.get(pid) {
            let pod = pod.clone();
            self.touch(pid);
            return Ok(pod);
        }

        self.make_room()?;
        let pod = Self::read_page::<BTreeInternalPage>(pid)?;
        self.internal_buffer.insert(*pid, pod.clone());
        self.touch(pid);
        Ok(pod)
    }

    pub fn load_header_page(&mut self, pid: &PageId) -> ResultPod<BTreeHeaderPage> {
        if let Some(pod) = self.header_buffer.get(pid) {
            let pod = pod.clone();
            self.touch(pid);
            return Ok(pod);
        }

        self.make_room()?;
        let pod = Self::read_page::<BTreeHeaderPage>(pid)?;
        self.header_buffer.insert(*pid, pod.clone());
        self.touch(pid);
        Ok(pod)
    }

    pub fn load_root_ptr_page(&mut self, pid: &PageId) -> ResultPod<BTreeRootPointerPage> {
        if let Some(pod) = self.root_pointer_buffer.get(pid) {
            let pod = pod.clone();
            self.touch(pid);
            return Ok(pod);
        }

        self.make_room()?;
        let pod = Self::read_page::<BTreeRootPointerPage>(pid)?;
        self.root_pointer_buffer.insert(*pid, pod.clone());
        self.touch(pid);
        Ok(pod)
    }

    // ------------------------------------------------------------------
    // cache insertion for pages born in memory (fresh B+ tree pages)
    // ------------------------------------------------------------------

    pub fn cache_leaf_page(&mut self, pid: PageId, pod: Pod<BTreeLeafPage>) -> MinnowResult {
        self.make_room()?;
        self.leaf_buffer.insert(pid, pod);
        self.touch(&pid);
        Ok(())
    }

    pub fn cache_internal_page(
        &mut self,
        pid: PageId,
        pod: Pod<BTreeInternalPage>,
    ) -> MinnowResult {
        self.make_room()?;
        self.internal_buffer.insert(pid, pod);
        self.touch(&pid);
        Ok(())
    }

    pub fn cache_header_page(&mut self, pid: PageId, pod: Pod<BTreeHeaderPage>) -> MinnowResult {
        self.make_room()?;
        self.header_buffer.insert(pid, pod);
        self.touch(&pid);
        Ok(())
    }

    // ------------------------------------------------------------------
    // the access list and eviction
    // ------------------------------------------------------------------

    fn touch(&mut self, pid: &PageId) {
        if let Some(pos) = self.access_order.iter().position(|p| p == pid) {
            self.access_order.remove(pos);
        }
        self.access_order.push(*pid);
    }

    /// Make sure one more page fits. Scans the access list from the least
    /// recently used end for a clean page to drop; dirty pages are passed
    /// over because flushing them would leak uncommitted data to disk.
    fn make_room(&mut self) -> MinnowResult {
        while self.cached_count() >= self.capacity {
            self.evict_page()?;
        }
        Ok(())
    }

    fn evict_page(&mut self) -> MinnowResult {
        let victim = {
            let concurrent_status = Database::concurrent_status();
            self.access_order
                .iter()
                .find(|pid| concurrent_status.dirty_page_tx(pid).is_none())
                .copied()
        };

        match victim {
            Some(pid) => {
                debug!("evicting clean page {}", pid);
                self.discard_page(&pid);
                Ok(())
            }
            None => Err(MinnowError::db(
                "cannot evict: every cached page carries uncommitted data",
            )),
        }
    }

    /// Drop a page without writing it anywhere. Used for eviction, for
    /// abort, and by recovery to get rid of stale copies of rolled-back
    /// pages.
    pub fn discard_page(&mut self, pid: &PageId) {
        match pid.category {
            PageCategory::RootPointer => {
                self.root_pointer_buffer.remove(pid);
            }
            PageCategory::Header => {
                self.header_buffer.remove(pid);
            }
            PageCategory::Internal => {
                self.internal_buffer.remove(pid);
            }
            PageCategory::Leaf => {
                self.leaf_buffer.remove(pid);
            }
            PageCategory::Heap => {
                self.heap_buffer.remove(pid);
            }
        }

        if let Some(pos) = self.access_order.iter().position(|p| p == pid) {
            self.access_order.remove(pos);
        }
    }

    // ------------------------------------------------------------------
    // tuple mutation entry points
    // ------------------------------------------------------------------

    /// Add a tuple to the given table on behalf of `tx`. The file decides
    /// page placement; every page it modifies ends up dirty and attributed
    /// to the transaction.
    pub fn insert_tuple(tx: &Transaction, table_id: u32, tuple: &Tuple) -> MinnowResult {
        let table = Database::catalog().get_table(&table_id)?;
        table.insert_tuple(tx, tuple)
    }

    pub fn delete_tuple(tx: &Transaction, table_id: u32, tuple: &WrappedTuple) -> MinnowResult {
        let table = Database::catalog().get_table(&table_id)?;
        table.delete_tuple(tx, tuple)
    }

    // ------------------------------------------------------------------
    // commit support
    // ------------------------------------------------------------------

    /// FORCE: push every page `tx` dirtied out to disk, logging an UPDATE
    /// record ahead of each page write, and refresh the before-images so a
    /// later transaction rolls back to this commit point.
    pub fn flush_tx_pages(&mut self, tx: &Transaction, log_manager: &mut LogManager) -> MinnowResult {
        let dirty_pids = Database::concurrent_status().get_dirty_pages(tx);

        for pid in dirty_pids {
            match pid.category {
                PageCategory::RootPointer => {
                    let pod = self.root_pointer_buffer.get(&pid).cloned();
                    if let Some(pod) = pod {
                        Self::flush_one(&pod, &pid, tx, log_manager)?;
                    }
                }
                PageCategory::Header => {
                    let pod = self.header_buffer.get(&pid).cloned();
                    if let Some(pod) = pod {
                        Self::flush_one(&pod, &pid, tx, log_manager)?;
                    }
                }
                PageCategory::Internal => {
                    let pod = self.internal_buffer.get(&pid).cloned();
                    if let Some(pod) = pod {
                        Self::flush_one(&pod, &pid, tx, log_manager)?;
                    }
                }
                PageCategory::Leaf => {
                    let pod = self.leaf_buffer.get(&pid).cloned();
                    if let Some(pod) = pod {
                        Self::flush_one(&pod, &pid, tx, log_manager)?;
                    }
                }
                PageCategory::Heap => {
                    let pod = self.heap_buffer.get(&pid).cloned();
                    if let Some(pod) = pod {
                        Self::flush_one(&pod, &pid, tx, log_manager)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn flush_one<PAGE: Page>(
        pod: &Pod<PAGE>,
        pid: &PageId,
        tx: &Transaction,
        log_manager: &mut LogManager,
    ) -> MinnowResult {
        let (before, after) = {
            let page = pod.read().unwrap();
            (page.get_before_image(), page.get_page_data())
        };

        // WAL discipline: the UPDATE record is durable before the page is
        log_manager.log_update(tx, pid, &before, &after)?;

        let table = Database::catalog().get_table(&pid.table_id)?;
        table.write_page_bytes(pid, &after)?;

        pod.write().unwrap().set_before_image();
        debug!("flushed page {} for {}", pid, tx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DbFile;
    use crate::storage::{heap_table::HeapTable, tuple::small_int_schema};
    use crate::utils::init_log;
    use std::sync::Arc;

    fn fixture_table(path: &str) -> (Arc<HeapTable>, u32) {
        let _ = std::fs::remove_file(path);
        let schema = small_int_schema(2, "c");
        let table = Arc::new(HeapTable::new(path, &schema));
        let table_id = table.get_id();
        Database::mut_catalog().add_table(table.clone(), path);
        (table, table_id)
    }

    #[test]
    fn test_eviction_prefers_clean_pages() {
        init_log();

        let (table, table_id) = fixture_table("data/test_eviction.db");

        // three pages on disk
        for i in 0..3u32 {
            let pid = PageId::new(PageCategory::Heap, table_id, i);
            table
                .write_page_bytes(&pid, &crate::storage::heap_page::HeapPage::empty_page_data())
                .unwrap();
        }

        let mut pool = BufferPool::with_capacity(2);
        let pid_a = PageId::new(PageCategory::Heap, table_id, 0);
        let pid_b = PageId::new(PageCategory::Heap, table_id, 1);
        let pid_c = PageId::new(PageCategory::Heap, table_id, 2);

        pool.load_heap_page(&pid_a).unwrap();
        pool.load_heap_page(&pid_b).unwrap();
        assert_eq!(pool.cached_count(), 2);

        // B is dirty; loading C must evict A even though A is older than B
        let tx = Transaction::new();
        ConcurrentStatus::set_dirty(&tx, &pid_b);

        pool.load_heap_page(&pid_c).unwrap();
        assert_eq!(pool.cached_count(), 2);
        assert!(pool.heap_buffer.contains_key(&pid_b));
        assert!(pool.heap_buffer.contains_key(&pid_c));
        assert!(!pool.heap_buffer.contains_key(&pid_a));

        tx.commit().unwrap();
    }

    #[test]
    fn test_eviction_fails_when_everything_is_dirty() {
        init_log();

        let (table, table_id) = fixture_table("data/test_eviction_dirty.db");
        for i in 0..3u32 {
            let pid = PageId::new(PageCategory::Heap, table_id, i);
            table
                .write_page_bytes(&pid, &crate::storage::heap_page::HeapPage::empty_page_data())
                .unwrap();
        }

        let mut pool = BufferPool::with_capacity(2);
        let tx = Transaction::new();
        for i in 0..2u32 {
            let pid = PageId::new(PageCategory::Heap, table_id, i);
            pool.load_heap_page(&pid).unwrap();
            ConcurrentStatus::set_dirty(&tx, &pid);
        }

        let pid_c = PageId::new(PageCategory::Heap, table_id, 2);
        let result = pool.load_heap_page(&pid_c);
        assert!(result.is_err());

        tx.commit().unwrap();
    }
}
