use core::fmt;
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    thread::sleep,
    time::Duration,
};

use log::debug;

use crate::{
    database::Database,
    error::MinnowError,
    storage::page_id::PageId,
    transaction::Transaction,
    types::MinnowResult,
};

/// How many grant attempts a blocked request makes before it gives up and
/// reports that its transaction should abort. The bounded retry is the
/// engine's whole deadlock-avoidance story: there is no waits-for graph.
static RETRY_LIMIT: AtomicUsize = AtomicUsize::new(3);
static RETRY_INTERVAL_MS: AtomicU64 = AtomicU64::new(200);

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Lock {
    SLock,
    XLock,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn to_lock(&self) -> Lock {
        match self {
            Permission::ReadOnly => Lock::SLock,
            Permission::ReadWrite => Lock::XLock,
        }
    }
}

/// The lock table: page-granular reader/writer locks per transaction, plus
/// the dirty-page bookkeeping the buffer pool consults for eviction and
/// commit/abort.
///
/// The struct itself is plain maps; concurrency control comes from the
/// `Database` singleton's `RwLock` around it, held only for the duration of
/// a single grant attempt or release.
pub struct ConcurrentStatus {
    s_lock_map: HashMap<PageId, HashSet<Transaction>>,
    x_lock_map: HashMap<PageId, Transaction>,

    hold_pages: HashMap<Transaction, HashSet<PageId>>,

    dirty_pages: HashMap<Transaction, HashSet<PageId>>,
}

impl ConcurrentStatus {
    pub fn new() -> Self {
        Self {
            s_lock_map: HashMap::new(),
            x_lock_map: HashMap::new(),
            hold_pages: HashMap::new(),
            dirty_pages: HashMap::new(),
        }
    }

    pub fn set_retry_limit(limit: usize) {
        RETRY_LIMIT.store(limit, Ordering::Relaxed);
    }

    pub fn set_retry_interval_ms(interval: u64) {
        RETRY_INTERVAL_MS.store(interval, Ordering::Relaxed);
    }

    /// Acquire `lock` on `page_id` on behalf of `tx`, blocking while other
    /// holders conflict. After the retry bound is exhausted the caller gets
    /// a `TransactionAborted` error and must unwind.
    pub fn acquire_lock(tx: &Transaction, lock: &Lock, page_id: &PageId) -> MinnowResult {
        let limit = RETRY_LIMIT.load(Ordering::Relaxed);
        let interval = RETRY_INTERVAL_MS.load(Ordering::Relaxed);

        for attempt in 0..limit {
            // The guard is held only for this one grant attempt.
            {
                let mut concurrent_status = Database::mut_concurrent_status();
                if concurrent_status.try_acquire(tx, lock, page_id) {
                    return Ok(());
                }
            }

            debug!(
                "lock not granted (attempt {}/{}), tx: {}, lock: {:?}, page: {}",
                attempt + 1,
                limit,
                tx,
                lock,
                page_id
            );
            sleep(Duration::from_millis(interval));
        }

        debug!(
            "giving up on lock, tx: {}, lock: {:?}, page: {}, lock table: {}",
            tx,
            lock,
            page_id,
            Database::concurrent_status()
        );
        Err(MinnowError::abort())
    }

    /// One grant attempt. Returns whether the lock is now held.
    ///
    /// The rules:
    /// - a holder of the exclusive lock is granted anything on that page;
    /// - shared requests are granted unless another transaction holds the
    ///   exclusive lock; re-granting a held shared lock is a no-op;
    /// - exclusive requests are granted only when no other transaction
    ///   holds any lock on the page; the sole shared holder upgrades
    ///   atomically.
    pub fn try_acquire(&mut self, tx: &Transaction, lock: &Lock, page_id: &PageId) -> bool {
        if let Some(holder) = self.x_lock_map.get(page_id) {
            if holder != tx {
                return false;
            }
            // Already exclusive; any request is satisfied.
            self.record_hold(tx, page_id);
            return true;
        }

        match lock {
            Lock::SLock => {
                self.s_lock_map
                    .entry(*page_id)
                    .or_insert_with(HashSet::new)
                    .insert(*tx);
            }
            Lock::XLock => {
                if let Some(holders) = self.s_lock_map.get(page_id) {
                    if holders.iter().any(|holder| holder != tx) {
                        return false;
                    }
                }

                // Either nobody holds the page or `tx` is the sole shared
                // holder; the upgrade happens in the same attempt.
                if let Some(holders) = self.s_lock_map.get_mut(page_id) {
                    holders.remove(tx);
                    if holders.is_empty() {
                        self.s_lock_map.remove(page_id);
                    }
                }
                self.x_lock_map.insert(*page_id, *tx);
            }
        }

        self.record_hold(tx, page_id);
        true
    }

    fn record_hold(&mut self, tx: &Transaction, page_id: &PageId) {
        self.hold_pages
            .entry(*tx)
            .or_insert_with(HashSet::new)
            .insert(*page_id);
    }

    pub fn holds_lock(&self, tx: &Transaction, page_id: &PageId) -> bool {
        if self.x_lock_map.get(page_id) == Some(tx) {
            return true;
        }
        self.s_lock_map
            .get(page_id)
            .map_or(false, |holders| holders.contains(tx))
    }

    /// Release a single page early. This is the documented escape from
    /// strict two-phase locking, used by the heap-file insert probe for
    /// pages it inspected but did not modify.
    pub fn release_page(tx: &Transaction, page_id: &PageId) {
        let mut concurrent_status = Database::mut_concurrent_status();
        concurrent_status.release_lock(tx, page_id);
        if let Some(pages) = concurrent_status.hold_pages.get_mut(tx) {
            pages.remove(page_id);
        }
    }

    fn release_lock(&mut self, tx: &Transaction, page_id: &PageId) {
        if let Some(holders) = self.s_lock_map.get_mut(page_id) {
            holders.remove(tx);
            if holders.is_empty() {
                self.s_lock_map.remove(page_id);
            }
        }

        if self.x_lock_map.get(page_id) == Some(tx) {
            self.x_lock_map.remove(page_id);
        }
    }

    /// Drop everything the transaction holds: locks and dirty-page marks.
    /// Called at commit and abort.
    pub fn remove_relation(&mut self, tx: &Transaction) {
        if let Some(pages) = self.hold_pages.remove(tx) {
            for page_id in pages {
                self.release_lock(tx, &page_id);
            }
        }
        self.dirty_pages.remove(tx);
    }

    /// Mark a page as dirtied by `tx`. Shorthand that goes through the
    /// singleton so mutation sites can call it without plumbing guards.
    pub fn set_dirty(tx: &Transaction, page_id: &PageId) {
        Database::mut_concurrent_status().set_dirty_page(tx, page_id);
    }

    pub fn set_dirty_page(&mut self, tx: &Transaction, page_id: &PageId) {
        self.dirty_pages
            .entry(*tx)
            .or_insert_with(HashSet::new)
            .insert(*page_id);
    }

    pub fn get_dirty_pages(&self, tx: &Transaction) -> HashSet<PageId> {
        self.dirty_pages.get(tx).cloned().unwrap_or_default()
    }

    /// The transaction that dirtied the page, or `None` when the page
    /// matches its on-disk image.
    pub fn dirty_page_tx(&self, page_id: &PageId) -> Option<Transaction> {
        for (tx, pages) in self.dirty_pages.iter() {
            if pages.contains(page_id) {
                return Some(*tx);
            }
        }
        None
    }

    pub fn clear(&mut self) {
        self.s_lock_map.clear();
        self.x_lock_map.clear();
        self.hold_pages.clear();
        self.dirty_pages.clear();
    }
}

impl fmt::Display for ConcurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut depiction = "\n".to_string();

        depiction.push_str("s_lock_map: {");
        for (k, v) in self.s_lock_map.iter() {
            depiction.push_str(&format!("\n\t{} -> {:?}", k.get_short_repr(), v));
        }
        depiction.push_str("\n}\n");

        depiction.push_str("x_lock_map: {");
        for (k, v) in self.x_lock_map.iter() {
            depiction.push_str(&format!("\n\t{} -> {:?}", k.get_short_repr(), v));
        }
        depiction.push_str("\n}\n");

        depiction.push_str("dirty_pages: {");
        for (k, v) in self.dirty_pages.iter() {
            let pages: Vec<String> = v.iter().map(|p| p.get_short_repr()).collect();
            depiction.push_str(&format!("\n\t{:?} -> [{}]", k, pages.join(", ")));
        }
        depiction.push_str("\n}\n");

        write!(f, "{}", depiction)
    }
}

impl fmt::Debug for ConcurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page_id::PageCategory;
    use crate::utils::init_log;

    fn pid(index: u32) -> PageId {
        PageId::new(PageCategory::Heap, 7001, index)
    }

    #[test]
    fn test_shared_holders_coexist() {
        init_log();

        let mut status = ConcurrentStatus::new();
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        assert!(status.try_acquire(&t1, &Lock::SLock, &pid(0)));
        assert!(status.try_acquire(&t2, &Lock::SLock, &pid(0)));
        assert!(status.holds_lock(&t1, &pid(0)));
        assert!(status.holds_lock(&t2, &pid(0)));

        // A writer is shut out while readers remain.
        assert!(!status.try_acquire(&t1, &Lock::XLock, &pid(0)));
    }

    #[test]
    fn test_exclusive_excludes_everyone() {
        init_log();

        let mut status = ConcurrentStatus::new();
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        assert!(status.try_acquire(&t1, &Lock::XLock, &pid(1)));
        assert!(!status.try_acquire(&t2, &Lock::SLock, &pid(1)));
        assert!(!status.try_acquire(&t2, &Lock::XLock, &pid(1)));

        // The holder itself is satisfied by any further request.
        assert!(status.try_acquire(&t1, &Lock::SLock, &pid(1)));
        assert!(status.try_acquire(&t1, &Lock::XLock, &pid(1)));
    }

    #[test]
    fn test_sole_shared_holder_upgrades() {
        init_log();

        let mut status = ConcurrentStatus::new();
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        assert!(status.try_acquire(&t1, &Lock::SLock, &pid(2)));
        assert!(status.try_acquire(&t1, &Lock::XLock, &pid(2)));

        assert!(!status.try_acquire(&t2, &Lock::SLock, &pid(2)));
    }

    #[test]
    fn test_release_unblocks_writer() {
        init_log();

        let mut status = ConcurrentStatus::new();
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        assert!(status.try_acquire(&t1, &Lock::SLock, &pid(3)));
        assert!(status.try_acquire(&t2, &Lock::SLock, &pid(3)));
        assert!(!status.try_acquire(&t2, &Lock::XLock, &pid(3)));

        status.remove_relation(&t1);
        assert!(status.try_acquire(&t2, &Lock::XLock, &pid(3)));
    }
}
