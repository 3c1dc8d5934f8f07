use std::{
    path::PathBuf,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use once_cell::sync::Lazy;

use crate::{
    buffer_pool::BufferPool,
    catalog::Catalog,
    concurrent_status::ConcurrentStatus,
    tx_log::LogManager,
    types::Pod,
    utils::HandyRwLock,
};

static SINGLETON: Lazy<Database> = Lazy::new(Database::new);

/// All process-wide state lives here: the catalog, the buffer pool, the
/// lock table and the log manager, each behind its own `RwLock` so the
/// components can be locked independently (and so a transaction blocked on
/// a page lock never pins the others).
pub struct Database {
    path: PathBuf,

    catalog: Pod<Catalog>,
    buffer_pool: Pod<BufferPool>,
    concurrent_status: Pod<ConcurrentStatus>,
    log_manager: Pod<LogManager>,
}

impl Database {
    fn new() -> Self {
        let db_path = PathBuf::from("data").join("minnow");
        if !db_path.exists() {
            std::fs::create_dir_all(&db_path).unwrap();
        }

        let log_path = db_path.join("wal.log");

        Self {
            path: db_path,

            catalog: Arc::new(RwLock::new(Catalog::new())),
            buffer_pool: Arc::new(RwLock::new(BufferPool::new())),
            concurrent_status: Arc::new(RwLock::new(ConcurrentStatus::new())),
            log_manager: Arc::new(RwLock::new(LogManager::new(log_path))),
        }
    }

    pub fn global() -> &'static Self {
        &*SINGLETON
    }

    pub fn catalog() -> RwLockReadGuard<'static, Catalog> {
        Self::global().catalog.rl()
    }

    pub fn mut_catalog() -> RwLockWriteGuard<'static, Catalog> {
        Self::global().catalog.wl()
    }

    pub fn mut_buffer_pool() -> RwLockWriteGuard<'static, BufferPool> {
        Self::global().buffer_pool.wl()
    }

    pub fn concurrent_status() -> RwLockReadGuard<'static, ConcurrentStatus> {
        Self::global().concurrent_status.rl()
    }

    pub fn mut_concurrent_status() -> RwLockWriteGuard<'static, ConcurrentStatus> {
        Self::global().concurrent_status.wl()
    }

    pub fn log_manager() -> RwLockReadGuard<'static, LogManager> {
        Self::global().log_manager.rl()
    }

    pub fn mut_log_manager() -> RwLockWriteGuard<'static, LogManager> {
        Self::global().log_manager.wl()
    }

    /// Drop all cached state and replay the log, as a fresh process would
    /// after a crash. Registered tables stay in the catalog (registration
    /// is the host's job, not the log's).
    pub fn recover() {
        {
            Self::mut_concurrent_status().clear();
        }

        let mut log_manager = Self::mut_log_manager();
        let mut buffer_pool = Self::mut_buffer_pool();
        buffer_pool.clear();
        log_manager.recover(&mut buffer_pool).unwrap();
    }

    pub fn get_path(&self) -> PathBuf {
        self.path.clone()
    }
}
