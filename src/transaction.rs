use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{database::Database, types::MinnowResult};

static TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// A transaction handle. Creating one writes its START record to the log;
/// the handle is then passed to every page access made on its behalf.
///
/// Locks taken by a transaction are held until `commit` or `abort`
/// (strict two-phase locking).
#[derive(Eq, Hash, PartialEq, Clone, Copy)]
pub struct Transaction {
    // increases monotonically by 1
    id: u64,
}

impl Transaction {
    pub fn new() -> Self {
        let instance = Self {
            id: TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
        };
        instance.start().unwrap();
        instance
    }

    fn start(&self) -> MinnowResult {
        Database::mut_log_manager().log_start(self)
    }

    /// Commit: write UPDATE records and force every page this transaction
    /// dirtied to disk, append the COMMIT record, then release all locks.
    pub fn commit(&self) -> MinnowResult {
        {
            let mut log_manager = Database::mut_log_manager();
            let mut buffer_pool = Database::mut_buffer_pool();

            buffer_pool.flush_tx_pages(self, &mut log_manager)?;
            log_manager.log_commit(self)?;
        }

        Database::mut_concurrent_status().remove_relation(self);
        Ok(())
    }

    /// Abort: append the ABORT record, roll the on-disk state back to the
    /// pre-transaction images, drop this transaction's cached pages, then
    /// release all locks.
    pub fn abort(&self) -> MinnowResult {
        {
            let mut log_manager = Database::mut_log_manager();
            let mut buffer_pool = Database::mut_buffer_pool();

            log_manager.log_abort(self, &mut buffer_pool)?;

            let dirty_pids = Database::concurrent_status().get_dirty_pages(self);
            for pid in dirty_pids {
                buffer_pool.discard_page(&pid);
            }
        }

        Database::mut_concurrent_status().remove_relation(self);
        Ok(())
    }

    pub fn get_id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.id)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
