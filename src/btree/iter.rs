use crate::{
    buffer_pool::BufferPool,
    concurrent_status::Permission,
    error::MinnowError,
    execution::op::{Op, Predicate},
    storage::{page_id::PageId, tuple::WrappedTuple},
    transaction::Transaction,
    utils::HandyRwLock,
};

use super::table::{BTreeTable, SearchFor};

/// A key-ordered scan of the whole tree: descend to the left-most leaf,
/// then follow the sibling chain. Pages are taken read-only, one leaf at a
/// time.
pub struct BTreeTableIterator<'a> {
    tx: &'a Transaction,
    table: &'a BTreeTable,

    started: bool,
    current: Vec<WrappedTuple>,
    cursor: usize,
    next_leaf: Option<PageId>,
}

impl<'a> BTreeTableIterator<'a> {
    pub fn new(tx: &'a Transaction, table: &'a BTreeTable) -> Self {
        Self {
            tx,
            table,
            started: false,
            current: Vec::new(),
            cursor: 0,
            next_leaf: None,
        }
    }

    pub fn rewind(&mut self) {
        self.started = false;
        self.current.clear();
        self.cursor = 0;
        self.next_leaf = None;
    }

    fn load_leaf(&mut self, pid: &PageId) -> Result<(), MinnowError> {
        let leaf_rc = BufferPool::get_leaf_page(self.tx, Permission::ReadOnly, pid)?;
        let leaf = leaf_rc.rl();
        self.current = leaf.iter().collect();
        self.cursor = 0;
        self.next_leaf = leaf.get_right_pid();
        Ok(())
    }

    pub fn next_up(&mut self) -> Result<Option<WrappedTuple>, MinnowError> {
        if !self.started {
            self.started = true;
            let root_pid = self.table.get_root_pid(self.tx)?;
            let leaf_rc = self.table.find_leaf_page(
                self.tx,
                Permission::ReadOnly,
                root_pid,
                &SearchFor::LeftMost,
            )?;
            let leaf = leaf_rc.rl();
            self.current = leaf.iter().collect();
            self.cursor = 0;
            self.next_leaf = leaf.get_right_pid();
        }

        loop {
            if self.cursor < self.current.len() {
                let tuple = self.current[self.cursor].clone();
                self.cursor += 1;
                return Ok(Some(tuple));
            }

            match self.next_leaf {
                Some(pid) => self.load_leaf(&pid)?,
                None => return Ok(None),
            }
        }
    }
}

impl Iterator for BTreeTableIterator<'_> {
    type Item = WrappedTuple;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_up().unwrap()
    }
}

/// An index scan driven by a predicate on the key column. Point and
/// range-from-below lookups start at the left-most candidate leaf;
/// everything else starts at the left edge. The scan stops as soon as the
/// key order proves nothing further can match.
pub struct BTreeTableSearchIterator<'a> {
    tx: &'a Transaction,
    table: &'a BTreeTable,
    predicate: Predicate,

    started: bool,
    current: Vec<WrappedTuple>,
    cursor: usize,
    next_leaf: Option<PageId>,
    exhausted: bool,
}

impl<'a> BTreeTableSearchIterator<'a> {
    pub fn new(tx: &'a Transaction, table: &'a BTreeTable, predicate: &Predicate) -> Self {
        Self {
            tx,
            table,
            predicate: predicate.clone(),
            started: false,
            current: Vec::new(),
            cursor: 0,
            next_leaf: None,
            exhausted: false,
        }
    }

    fn start_search(&self) -> SearchFor {
        match self.predicate.op {
            Op::Equals | Op::GreaterThan | Op::GreaterThanOrEq => {
                SearchFor::Key(self.predicate.cell.clone())
            }
            _ => SearchFor::LeftMost,
        }
    }

    pub fn next_up(&mut self) -> Result<Option<WrappedTuple>, MinnowError> {
        if self.exhausted {
            return Ok(None);
        }

        if !self.started {
            self.started = true;
            let root_pid = self.table.get_root_pid(self.tx)?;
            let leaf_rc = self.table.find_leaf_page(
                self.tx,
                Permission::ReadOnly,
                root_pid,
                &self.start_search(),
            )?;
            let leaf = leaf_rc.rl();
            self.current = leaf.iter().collect();
            self.cursor = 0;
            self.next_leaf = leaf.get_right_pid();
        }

        loop {
            while self.cursor < self.current.len() {
                let tuple = self.current[self.cursor].clone();
                self.cursor += 1;

                let key = tuple.get_cell(self.table.key_field);
                let target = &self.predicate.cell;
                match self.predicate.op {
                    Op::Equals => {
                        if &key == target {
                            return Ok(Some(tuple));
                        }
                        if &key > target {
                            self.exhausted = true;
                            return Ok(None);
                        }
                    }
                    Op::GreaterThan => {
                        if &key > target {
                            return Ok(Some(tuple));
                        }
                    }
                    Op::GreaterThanOrEq => {
                        if &key >= target {
                            return Ok(Some(tuple));
                        }
                    }
                    Op::LessThan => {
                        if &key < target {
                            return Ok(Some(tuple));
                        }
                        self.exhausted = true;
                        return Ok(None);
                    }
                    Op::LessThanOrEq => {
                        if &key <= target {
                            return Ok(Some(tuple));
                        }
                        self.exhausted = true;
                        return Ok(None);
                    }
                    Op::NotEquals => {
                        if &key != target {
                            return Ok(Some(tuple));
                        }
                    }
                }
            }

            match self.next_leaf {
                Some(pid) => {
                    let leaf_rc =
                        BufferPool::get_leaf_page(self.tx, Permission::ReadOnly, &pid)?;
                    let leaf = leaf_rc.rl();
                    self.current = leaf.iter().collect();
                    self.cursor = 0;
                    self.next_leaf = leaf.get_right_pid();
                }
                None => return Ok(None),
            }
        }
    }
}

impl Iterator for BTreeTableSearchIterator<'_> {
    type Item = WrappedTuple;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_up().unwrap()
    }
}
