use std::io::Cursor;

use bit_vec::BitVec;
use log::debug;

use crate::{
    buffer_pool::BufferPool,
    error::MinnowError,
    io::MinnowWriter,
    storage::{
        field::Cell,
        page::Page,
        page_id::{PageCategory, PageId, EMPTY_PAGE_INDEX},
        tuple::{Schema, Tuple, WrappedTuple},
    },
    types::MinnowResult,
    utils::ceil_div,
};

use super::base_page::BTreeBasePage;

// bytes for the parent, left-sibling and right-sibling pointers
const POINTER_BYTES: usize = 3 * 4;

/// A leaf page: tuples kept in key order, threaded into the doubly linked
/// sibling chain of its level.
pub struct BTreeLeafPage {
    base: BTreeBasePage,

    slot_count: usize,

    // slot status: true means occupied
    header: BitVec,

    // all tuple bodies, including the empty slots
    tuples: Vec<Tuple>,

    schema: Schema,
    key_field: usize,

    left_sibling_index: u32,
    right_sibling_index: u32,
}

impl std::ops::Deref for BTreeLeafPage {
    type Target = BTreeBasePage;
    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl std::ops::DerefMut for BTreeLeafPage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

impl BTreeLeafPage {
    /// The maximum number of tuples this page can hold; each tuple costs
    /// its body plus one header bit, and the page carries three pointers
    /// on top.
    pub fn calculate_slots_count(schema: &Schema) -> usize {
        let bits_per_tuple = schema.get_size() * 8 + 1;
        (BufferPool::get_page_size() * 8 - POINTER_BYTES * 8) / bits_per_tuple
    }

    pub fn get_slots_count(&self) -> usize {
        self.slot_count
    }

    pub fn empty_slots_count(&self) -> usize {
        (0..self.slot_count).filter(|i| !self.is_slot_used(*i)).count()
    }

    pub fn tuples_count(&self) -> usize {
        self.slot_count - self.empty_slots_count()
    }

    /// A non-root leaf is stable while it stays at least half full.
    pub fn stable(&self) -> bool {
        if self.get_parent_pid().category == PageCategory::RootPointer {
            return true;
        }

        let max_empty_slots = self.slot_count - ceil_div(self.slot_count, 2);
        self.empty_slots_count() <= max_empty_slots
    }

    pub fn is_slot_used(&self, slot_index: usize) -> bool {
        self.header[slot_index]
    }

    fn mark_slot_status(&mut self, slot_index: usize, used: bool) {
        self.header.set(slot_index, used);
    }

    pub fn get_left_pid(&self) -> Option<PageId> {
        if self.left_sibling_index == EMPTY_PAGE_INDEX {
            return None;
        }
        Some(PageId::new(
            PageCategory::Leaf,
            self.get_pid().table_id,
            self.left_sibling_index,
        ))
    }

    pub fn set_left_pid(&mut self, pid: Option<PageId>) {
        self.left_sibling_index = pid.map_or(EMPTY_PAGE_INDEX, |p| p.page_index);
    }

    pub fn get_right_pid(&self) -> Option<PageId> {
        if self.right_sibling_index == EMPTY_PAGE_INDEX {
            return None;
        }
        Some(PageId::new(
            PageCategory::Leaf,
            self.get_pid().table_id,
            self.right_sibling_index,
        ))
    }

    pub fn set_right_pid(&mut self, pid: Option<PageId>) {
        self.right_sibling_index = pid.map_or(EMPTY_PAGE_INDEX, |p| p.page_index);
    }

    pub fn key(&self, slot_index: usize) -> Cell {
        self.tuples[slot_index].get_cell(self.key_field)
    }

    /// Add the tuple so that the page stays sorted on the key field.
    ///
    /// The page keeps a free slot as a hole and bubbles it to the tuple's
    /// sorted position: any greater neighbour below the hole is pulled up
    /// over it, any smaller neighbour above is pulled down. The page is
    /// sorted to begin with, so at most one of the two directions ever
    /// applies.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> MinnowResult {
        let mut hole = match (0..self.slot_count).find(|s| !self.is_slot_used(*s)) {
            Some(slot) => slot,
            None => {
                return Err(MinnowError::db(&format!(
                    "no empty slot on leaf page {}",
                    self.get_pid()
                )))
            }
        };

        let key = tuple.get_cell(self.key_field);

        loop {
            if let Some(below) = self.last_used_before(hole) {
                if self.key(below) > key {
                    self.relocate(below, hole);
                    hole = below;
                    continue;
                }
            }
            if let Some(above) = self.first_used_after(hole) {
                if self.key(above) < key {
                    self.relocate(above, hole);
                    hole = above;
                    continue;
                }
            }
            break;
        }

        self.tuples[hole] = tuple.clone();
        self.mark_slot_status(hole, true);

        debug!("leaf {} takes key {} at slot {}", self.get_pid(), key, hole);
        Ok(())
    }

    fn last_used_before(&self, slot: usize) -> Option<usize> {
        (0..slot).rev().find(|s| self.is_slot_used(*s))
    }

    fn first_used_after(&self, slot: usize) -> Option<usize> {
        ((slot + 1)..self.slot_count).find(|s| self.is_slot_used(*s))
    }

    // move a tuple into a free slot, leaving its old slot free
    fn relocate(&mut self, from: usize, to: usize) {
        self.tuples[to] = self.tuples[from].clone();
        self.mark_slot_status(to, true);
        self.mark_slot_status(from, false);
    }

    pub fn delete_tuple(&mut self, slot_index: usize) -> MinnowResult {
        if slot_index >= self.slot_count || !self.is_slot_used(slot_index) {
            return Err(MinnowError::db(&format!(
                "slot {} on leaf page {} is empty",
                slot_index,
                self.get_pid()
            )));
        }
        self.mark_slot_status(slot_index, false);
        Ok(())
    }

    pub fn get_tuple(&self, slot_index: usize) -> Option<Tuple> {
        if self.is_slot_used(slot_index) {
            return Some(self.tuples[slot_index].clone());
        }
        None
    }

    pub fn iter(&self) -> BTreeLeafPageIterator<'_> {
        BTreeLeafPageIterator::new(self)
    }

    pub fn check_integrity(
        &self,
        parent_pid: &PageId,
        lower_bound: &Option<Cell>,
        upper_bound: &Option<Cell>,
        check_occupancy: bool,
        depth: usize,
    ) -> MinnowResult {
        if self.get_pid().category != PageCategory::Leaf {
            return Err(MinnowError::db("page category is not leaf"));
        }
        if &self.get_parent_pid() != parent_pid {
            return Err(MinnowError::db(&format!(
                "parent pointer of {} is {}, expected {}",
                self.get_pid(),
                self.get_parent_pid(),
                parent_pid
            )));
        }

        let mut previous = lower_bound.clone();
        for tuple in self.iter() {
            let key = tuple.get_cell(self.key_field);
            if let Some(ref previous) = previous {
                if previous > &key {
                    return Err(MinnowError::db(&format!(
                        "leaf {} is out of order: {} > {}",
                        self.get_pid(),
                        previous,
                        key
                    )));
                }
            }
            previous = Some(key);
        }

        if let (Some(upper), Some(last)) = (upper_bound, &previous) {
            if last > upper {
                return Err(MinnowError::db(&format!(
                    "leaf {} exceeds its upper bound: {} > {}",
                    self.get_pid(),
                    last,
                    upper
                )));
            }
        }

        if check_occupancy && depth > 0 && self.tuples_count() < ceil_div(self.slot_count, 2) {
            return Err(MinnowError::db(&format!(
                "leaf {} is below half occupancy: {}/{}",
                self.get_pid(),
                self.tuples_count(),
                self.slot_count
            )));
        }

        Ok(())
    }
}

impl Page for BTreeLeafPage {
    fn new(pid: &PageId, bytes: &[u8], schema: &Schema, key_field: usize) -> Self {
        let slot_count = Self::calculate_slots_count(schema);
        let header_size = ceil_div(slot_count, 8);

        let mut reader = Cursor::new(bytes);
        let parent_index = crate::io::read_into::<u32, _>(&mut reader);
        let left_index = crate::io::read_into::<u32, _>(&mut reader);
        let right_index = crate::io::read_into::<u32, _>(&mut reader);

        let header = BitVec::from_bytes(&crate::io::read_exact(&mut reader, header_size));

        let mut tuples = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            tuples.push(Tuple::read_from(&mut reader, schema));
        }

        let mut base = BTreeBasePage::new(pid);
        base.set_parent_page_index(parent_index);

        let mut page = Self {
            base,
            slot_count,
            header,
            tuples,
            schema: schema.clone(),
            key_field,
            left_sibling_index: left_index,
            right_sibling_index: right_index,
        };
        page.base.store_before_image(bytes.to_vec());
        page
    }

    fn get_pid(&self) -> PageId {
        self.base.get_pid()
    }

    fn get_page_data(&self) -> Vec<u8> {
        let mut writer = MinnowWriter::new();
        writer.write(&self.base.get_parent_page_index());
        writer.write(&self.left_sibling_index);
        writer.write(&self.right_sibling_index);
        writer.write_bytes(&self.header.to_bytes());

        let tuple_size = self.schema.get_size();
        for i in 0..self.slot_count {
            if self.is_slot_used(i) {
                self.tuples[i].write_to(&mut writer, &self.schema);
            } else {
                writer.write_bytes(&vec![0; tuple_size]);
            }
        }

        writer.to_padded_bytes(BufferPool::get_page_size())
    }

    fn set_before_image(&mut self) {
        let data = self.get_page_data();
        self.base.store_before_image(data);
    }

    fn get_before_image(&self) -> Vec<u8> {
        self.base.before_image()
    }
}

impl super::BTreePage for BTreeLeafPage {
    fn get_parent_pid(&self) -> PageId {
        self.base.get_parent_pid()
    }

    fn set_parent_pid(&mut self, pid: &PageId) {
        self.base.set_parent_pid(pid);
    }
}

pub struct BTreeLeafPageIterator<'page> {
    page: &'page BTreeLeafPage,
    cursor: i64,
    reverse_cursor: i64,
}

impl<'page> BTreeLeafPageIterator<'page> {
    pub fn new(page: &'page BTreeLeafPage) -> Self {
        Self {
            page,
            cursor: -1,
            reverse_cursor: page.slot_count as i64,
        }
    }
}

impl Iterator for BTreeLeafPageIterator<'_> {
    type Item = WrappedTuple;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.cursor += 1;
            if self.cursor >= self.reverse_cursor || self.cursor >= self.page.slot_count as i64 {
                return None;
            }

            let cursor = self.cursor as usize;
            if self.page.is_slot_used(cursor) {
                return Some(WrappedTuple::new(
                    &self.page.tuples[cursor],
                    cursor,
                    self.page.get_pid(),
                ));
            }
        }
    }
}

impl DoubleEndedIterator for BTreeLeafPageIterator<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            self.reverse_cursor -= 1;
            if self.reverse_cursor <= self.cursor {
                return None;
            }

            let cursor = self.reverse_cursor as usize;
            if self.page.is_slot_used(cursor) {
                return Some(WrappedTuple::new(
                    &self.page.tuples[cursor],
                    cursor,
                    self.page.get_pid(),
                ));
            }
        }
    }
}
