use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
};

use log::debug;

use crate::{
    buffer_pool::BufferPool,
    database::Database,
    error::MinnowError,
    io::MinnowFile,
    storage::page_id::PageId,
    transaction::Transaction,
    types::MinnowResult,
};

// record type tags
const RECORD_ABORT: u8 = 0;
const RECORD_COMMIT: u8 = 1;
const RECORD_UPDATE: u8 = 2;
const RECORD_START: u8 = 3;
const RECORD_CHECKPOINT: u8 = 4;

// the 8-byte slot at the head of the file pointing at the last checkpoint
const NO_CHECKPOINT: u64 = 0;
const LOG_HEAD_SIZE: u64 = 8;

enum LogRecord {
    Start {
        tid: u64,
    },
    Commit {
        tid: u64,
    },
    Abort {
        tid: u64,
    },
    Update {
        tid: u64,
        pid: PageId,
        before: Vec<u8>,
        after: Vec<u8>,
    },
    Checkpoint {
        live: Vec<(u64, u64)>,
    },
}

/// The write-ahead log.
///
/// Layout: an 8-byte last-checkpoint pointer, then a sequence of records
/// framed as `[type u8] [tid u64] [payload] [record start offset u64]`.
/// The trailing self-offset lets a scan step backwards from the end.
///
/// Appends are serialized by the exclusive guard the `Database` singleton
/// hands out; an UPDATE record is flushed before its page may be written
/// (the WAL discipline).
pub struct LogManager {
    file: MinnowFile,
    file_path: PathBuf,

    /// Offset of the first record of every live transaction.
    tx_start_position: HashMap<Transaction, u64>,

    /// Where the next record goes (the append point).
    current_offset: u64,

    total_records: usize,
}

impl LogManager {
    pub fn new(file_path: PathBuf) -> Self {
        let file = MinnowFile::open(&file_path).unwrap();

        let size = file.get_size().unwrap();
        let current_offset = if size < LOG_HEAD_SIZE {
            file.seek(0).unwrap();
            file.write(&NO_CHECKPOINT).unwrap();
            LOG_HEAD_SIZE
        } else {
            size
        };

        Self {
            file,
            file_path,
            tx_start_position: HashMap::new(),
            current_offset,
            total_records: 0,
        }
    }

    /// Throw the log away and start over. Test scaffolding; a real
    /// deployment only ever appends and recovers.
    pub fn reset(&mut self) {
        self.file.set_len(0).unwrap();
        self.file.seek(0).unwrap();
        self.file.write(&NO_CHECKPOINT).unwrap();
        self.tx_start_position.clear();
        self.current_offset = LOG_HEAD_SIZE;
        self.total_records = 0;
    }

    pub fn records_count(&self) -> usize {
        self.total_records
    }

    pub fn get_file_path(&self) -> PathBuf {
        self.file_path.clone()
    }

    fn pre_append(&mut self) -> MinnowResult {
        self.file.seek(self.current_offset)?;
        self.total_records += 1;
        Ok(())
    }

    fn seal_record(&mut self, record_start: u64) -> MinnowResult {
        self.file.write(&record_start)?;
        self.current_offset = self.file.get_current_position()?;
        Ok(())
    }

    pub fn log_start(&mut self, tx: &Transaction) -> MinnowResult {
        self.pre_append()?;
        let record_start = self.current_offset;

        self.file.write(&RECORD_START)?;
        self.file.write(&tx.get_id())?;
        self.seal_record(record_start)?;

        self.tx_start_position.insert(*tx, record_start);
        Ok(())
    }

    /// Append an UPDATE record carrying both page images and force it to
    /// disk, so the page write that follows never beats its log record.
    pub fn log_update(
        &mut self,
        tx: &Transaction,
        pid: &PageId,
        before: &[u8],
        after: &[u8],
    ) -> MinnowResult {
        self.pre_append()?;
        let record_start = self.current_offset;

        self.file.write(&RECORD_UPDATE)?;
        self.file.write(&tx.get_id())?;
        self.file.write(pid)?;
        self.file.write_blob(before)?;
        self.file.write_blob(after)?;
        self.seal_record(record_start)?;

        self.file.flush()?;
        Ok(())
    }

    pub fn log_commit(&mut self, tx: &Transaction) -> MinnowResult {
        self.pre_append()?;
        let record_start = self.current_offset;

        self.file.write(&RECORD_COMMIT)?;
        self.file.write(&tx.get_id())?;
        self.seal_record(record_start)?;

        self.file.flush()?;
        self.tx_start_position.remove(tx);
        Ok(())
    }

    /// Append the ABORT record and restore every page the transaction
    /// touched to its first-touch image.
    pub fn log_abort(&mut self, tx: &Transaction, buffer_pool: &mut BufferPool) -> MinnowResult {
        self.rollback(tx, buffer_pool)?;

        self.pre_append()?;
        let record_start = self.current_offset;

        self.file.write(&RECORD_ABORT)?;
        self.file.write(&tx.get_id())?;
        self.seal_record(record_start)?;

        self.file.flush()?;
        self.tx_start_position.remove(tx);
        Ok(())
    }

    /// Snapshot the live-transaction table into a CHECKPOINT record and
    /// point the log head at it. Data pages are not flushed here: under
    /// NO STEAL they may carry uncommitted data, and commit-time FORCE
    /// plus the redo pass already cover durability.
    pub fn log_checkpoint(&mut self) -> MinnowResult {
        self.pre_append()?;
        let record_start = self.current_offset;

        self.file.write(&RECORD_CHECKPOINT)?;
        // no transaction owns a checkpoint; keep the frame uniform
        self.file.write(&0u64)?;

        self.file.write(&(self.tx_start_position.len() as u64))?;
        for (tx, start_position) in &self.tx_start_position {
            self.file.write(&tx.get_id())?;
            self.file.write(start_position)?;
        }
        self.seal_record(record_start)?;
        self.file.flush()?;

        self.file.seek(0)?;
        self.file.write(&record_start)?;
        self.file.flush()?;

        Ok(())
    }

    fn read_record(&self) -> Result<LogRecord, MinnowError> {
        let record_type = self.file.read::<u8>()?;
        match record_type {
            RECORD_START => {
                let tid = self.file.read::<u64>()?;
                let _start = self.file.read::<u64>()?;
                Ok(LogRecord::Start { tid })
            }
            RECORD_COMMIT => {
                let tid = self.file.read::<u64>()?;
                let _start = self.file.read::<u64>()?;
                Ok(LogRecord::Commit { tid })
            }
            RECORD_ABORT => {
                let tid = self.file.read::<u64>()?;
                let _start = self.file.read::<u64>()?;
                Ok(LogRecord::Abort { tid })
            }
            RECORD_UPDATE => {
                let tid = self.file.read::<u64>()?;
                let pid = self.file.read::<PageId>()?;
                let before = self.file.read_blob()?;
                let after = self.file.read_blob()?;
                let _start = self.file.read::<u64>()?;
                Ok(LogRecord::Update {
                    tid,
                    pid,
                    before,
                    after,
                })
            }
            RECORD_CHECKPOINT => {
                let _tid = self.file.read::<u64>()?;
                let count = self.file.read::<u64>()?;
                let mut live = Vec::new();
                for _ in 0..count {
                    let tid = self.file.read::<u64>()?;
                    let start = self.file.read::<u64>()?;
                    live.push((tid, start));
                }
                let _start = self.file.read::<u64>()?;
                Ok(LogRecord::Checkpoint { live })
            }
            other => Err(MinnowError::db(&format!(
                "corrupted log: unknown record type {}",
                other
            ))),
        }
    }

    /// Write a page image straight into its table file, bypassing the
    /// cache, then drop any cached copy so nobody keeps reading stale
    /// bytes. Unknown tables are skipped: the host may not have
    /// re-registered every file.
    fn restore_page(
        &self,
        pid: &PageId,
        image: &[u8],
        buffer_pool: &mut BufferPool,
    ) -> MinnowResult {
        let table = match Database::catalog().get_table(&pid.table_id) {
            Ok(table) => table,
            Err(_) => {
                debug!("skipping page {} of an unregistered table", pid);
                return Ok(());
            }
        };

        table.write_page_bytes(pid, image)?;
        buffer_pool.discard_page(pid);
        Ok(())
    }

    /// Undo one live transaction: scan forward from its first record and
    /// keep the first before-image per page. Writing those restores each
    /// page to the state it had immediately before the transaction first
    /// touched it, which is exactly what a backward scan would produce,
    /// minus the intermediate writes.
    fn rollback(&mut self, tx: &Transaction, buffer_pool: &mut BufferPool) -> MinnowResult {
        let start = match self.tx_start_position.get(tx) {
            Some(start) => *start,
            None => return Ok(()),
        };

        let mut first_images: Vec<(PageId, Vec<u8>)> = Vec::new();

        self.file.seek(start)?;
        let mut position = start;
        while position < self.current_offset {
            let record = self.read_record()?;
            if let LogRecord::Update {
                tid, pid, before, ..
            } = record
            {
                if tid == tx.get_id() && !first_images.iter().any(|(p, _)| p == &pid) {
                    first_images.push((pid, before));
                }
            }
            position = self.file.get_current_position()?;
        }

        for (pid, image) in first_images {
            debug!("rolling back page {} for {}", pid, tx);
            self.restore_page(&pid, &image, buffer_pool)?;
        }

        Ok(())
    }

    /// Recover after a crash: find the last checkpoint, scan forward from
    /// the earliest live transaction, redo the winners' after-images in
    /// log order and undo the losers with their first-touch before-images.
    pub fn recover(&mut self, buffer_pool: &mut BufferPool) -> MinnowResult {
        self.tx_start_position.clear();

        let size = self.file.get_size()?;
        if size < LOG_HEAD_SIZE {
            self.reset();
            return Ok(());
        }
        self.current_offset = size;

        self.file.seek(0)?;
        let last_checkpoint = self.file.read::<u64>()?;

        let mut scan_start = LOG_HEAD_SIZE;
        if last_checkpoint != NO_CHECKPOINT {
            self.file.seek(last_checkpoint)?;
            match self.read_record()? {
                LogRecord::Checkpoint { live } => {
                    let checkpoint_end = self.file.get_current_position()?;
                    scan_start = live
                        .iter()
                        .map(|(_, start)| *start)
                        .min()
                        .unwrap_or(checkpoint_end);
                }
                _ => {
                    return Err(MinnowError::db(
                        "corrupted log: the head does not point at a checkpoint",
                    ))
                }
            }
        }

        // one forward pass collects everything the two phases need
        let mut updates: Vec<(u64, PageId, Vec<u8>, Vec<u8>)> = Vec::new();
        let mut committed: HashSet<u64> = HashSet::new();
        let mut aborted: HashSet<u64> = HashSet::new();

        self.file.seek(scan_start)?;
        let mut position = scan_start;
        while position < size {
            match self.read_record()? {
                LogRecord::Start { .. } | LogRecord::Checkpoint { .. } => {}
                LogRecord::Commit { tid } => {
                    committed.insert(tid);
                }
                LogRecord::Abort { tid } => {
                    aborted.insert(tid);
                }
                LogRecord::Update {
                    tid,
                    pid,
                    before,
                    after,
                } => {
                    updates.push((tid, pid, before, after));
                }
            }
            position = self.file.get_current_position()?;
        }

        // redo pass: winners' after-images, in log order
        for (tid, pid, _, after) in &updates {
            if committed.contains(tid) {
                debug!("redo page {} of tx_{}", pid, tid);
                self.restore_page(pid, after, buffer_pool)?;
            }
        }

        // undo pass: losers' first-touch before-images. Transactions that
        // logged their own ABORT already rolled back before the crash.
        let mut restored: HashSet<(u64, PageId)> = HashSet::new();
        for (tid, pid, before, _) in &updates {
            if committed.contains(tid) || aborted.contains(tid) {
                continue;
            }
            if restored.insert((*tid, *pid)) {
                debug!("undo page {} of tx_{}", pid, tid);
                self.restore_page(pid, before, buffer_pool)?;
            }
        }

        // checkpoint the recovered state so the next recovery starts here
        self.log_checkpoint()?;
        Ok(())
    }

    /// Dump the log structure at debug level.
    pub fn show_log_contents(&self) {
        let mut depiction = String::new();

        if self.file.seek(0).is_err() {
            return;
        }
        let last_checkpoint = self.file.read::<u64>().unwrap_or(NO_CHECKPOINT);
        depiction.push_str(&format!("last checkpoint: {}\n", last_checkpoint));

        let mut position = LOG_HEAD_SIZE;
        let mut record_id = 0;
        while position < self.current_offset {
            if self.file.seek(position).is_err() {
                break;
            }
            let line = match self.read_record() {
                Ok(LogRecord::Start { tid }) => format!("START tx_{}", tid),
                Ok(LogRecord::Commit { tid }) => format!("COMMIT tx_{}", tid),
                Ok(LogRecord::Abort { tid }) => format!("ABORT tx_{}", tid),
                Ok(LogRecord::Update { tid, pid, .. }) => {
                    format!("UPDATE tx_{} page {}", tid, pid)
                }
                Ok(LogRecord::Checkpoint { live }) => {
                    format!("CHECKPOINT live: {:?}", live)
                }
                Err(_) => break,
            };
            depiction.push_str(&format!(
                "[record {} at {}] {}\n",
                record_id, position, line
            ));
            position = match self.file.get_current_position() {
                Ok(p) => p,
                Err(_) => break,
            };
            record_id += 1;
        }

        debug!("log contents:\n{}", depiction);
    }
}
