use std::{fmt, io::Cursor};

use bit_vec::BitVec;

use crate::{
    buffer_pool::BufferPool,
    error::MinnowError,
    io::{read_exact, read_into, MinnowWriter},
    storage::{
        field::{Cell, Type},
        page::Page,
        page_id::{PageCategory, PageId},
        tuple::Schema,
    },
    types::MinnowResult,
    utils::ceil_div,
};

use super::base_page::BTreeBasePage;

// bytes per child pointer
const INDEX_SIZE: usize = 4;

/// An internal node. A node with m keys has m + 1 children: slot 0 carries
/// only a child pointer, slots 1.. carry (key, right-child) pairs. The
/// left child of the entry in slot i is the child of the nearest used slot
/// below i, so holes left by deletions do not break the pairing.
pub struct BTreeInternalPage {
    base: BTreeBasePage,

    pub keys: Vec<Cell>,
    pub children: Vec<PageId>,

    // the kind of page the children are (one level is homogeneous)
    child_category: PageCategory,

    slot_count: usize,

    header: BitVec,

    key_type: Type,
}

impl std::ops::Deref for BTreeInternalPage {
    type Target = BTreeBasePage;
    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl std::ops::DerefMut for BTreeInternalPage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

impl BTreeInternalPage {
    /// The maximum number of entries (keys) a node can hold. Beyond the
    /// per-entry key + child pointer + header bit, the page pays for the
    /// parent pointer, the extra child pointer, the child category tag and
    /// a byte of bitmap rounding.
    pub fn get_max_entries(key_size: usize) -> usize {
        let bits_per_entry = key_size * 8 + INDEX_SIZE * 8 + 1;
        let extra_bits = 3 * INDEX_SIZE * 8 + 8;
        (BufferPool::get_page_size() * 8 - extra_bits) / bits_per_entry
    }

    pub fn max_entries(&self) -> usize {
        self.slot_count - 1
    }

    pub fn get_children_capacity(&self) -> usize {
        self.slot_count
    }

    pub fn empty_slots_count(&self) -> usize {
        // slot 0 holds no key, start from 1
        (1..self.slot_count).filter(|i| !self.is_slot_used(*i)).count()
    }

    pub fn entries_count(&self) -> usize {
        self.slot_count - 1 - self.empty_slots_count()
    }

    pub fn children_count(&self) -> usize {
        self.entries_count() + 1
    }

    /// A non-root node is stable while it keeps at least half of its
    /// capacity in use.
    pub fn stable(&self) -> bool {
        if self.get_parent_pid().category == PageCategory::RootPointer {
            return true;
        }

        let max_empty = self.max_entries() - ceil_div(self.max_entries(), 2);
        self.empty_slots_count() <= max_empty
    }

    pub fn is_slot_used(&self, slot_index: usize) -> bool {
        self.header[slot_index]
    }

    fn mark_slot_status(&mut self, slot_index: usize, used: bool) {
        self.header.set(slot_index, used);
    }

    pub fn get_child_category(&self) -> PageCategory {
        self.child_category
    }

    pub fn get_entry(&self, slot_index: usize) -> Option<Entry> {
        if slot_index == 0 || !self.is_slot_used(slot_index) {
            return None;
        }

        let mut left = 0;
        for i in (0..slot_index).rev() {
            if self.is_slot_used(i) {
                left = i;
                break;
            }
        }

        let mut entry = Entry::new(
            self.keys[slot_index].clone(),
            &self.children[left],
            &self.children[slot_index],
        );
        entry.set_record_id(slot_index);
        Some(entry)
    }

    /// The entry whose children are exactly the two given pages, if any.
    pub fn get_entry_by_children(&self, left_pid: &PageId, right_pid: &PageId) -> Option<Entry> {
        self.iter()
            .find(|e| &e.get_left_child() == left_pid && &e.get_right_child() == right_pid)
    }

    pub fn get_first_child_pid(&self) -> PageId {
        let mut it = self.iter();
        it.next().unwrap().get_left_child()
    }

    pub fn get_last_child_pid(&self) -> PageId {
        let mut it = self.iter();
        it.next_back().unwrap().get_right_child()
    }

    pub fn insert_entry(&mut self, e: &Entry) -> MinnowResult {
        if !self.is_slot_used(0) {
            // blank page: the first entry brings both of its children
            self.children[0] = e.get_left_child();
            self.children[1] = e.get_right_child();
            self.keys[1] = e.get_key();
            self.child_category = e.get_left_child().category;
            self.mark_slot_status(0, true);
            self.mark_slot_status(1, true);
            return Ok(());
        }

        let free = match (1..self.slot_count).find(|s| !self.is_slot_used(*s)) {
            Some(slot) => slot,
            None => {
                return Err(MinnowError::db(&format!(
                    "no empty slot on internal page {}",
                    self.get_pid()
                )))
            }
        };

        // An arriving entry always shares one child with the page: a
        // split hands over (existing child, fresh sibling), a rotation an
        // adopted child on one side. Find the used slot it attaches to.
        let mut attach = None;
        let mut carried_child = e.get_right_child();
        for slot in 0..self.slot_count {
            if !self.is_slot_used(slot) {
                continue;
            }

            if self.children[slot] == e.get_left_child() {
                // the entry sits directly after this slot
                attach = Some(slot);
                break;
            }

            if self.children[slot] == e.get_right_child() {
                // the entry slides in front of this slot's child: that
                // child becomes the entry's payload and the slot adopts
                // the entry's left child
                carried_child = self.children[slot];
                self.children[slot] = e.get_left_child();
                attach = Some(slot);
                break;
            }
        }

        let attach = match attach {
            Some(slot) => slot,
            None => {
                return Err(MinnowError::db(&format!(
                    "no adjoining child found for entry {} on page {}, entries: {}",
                    e,
                    self.get_pid(),
                    self.entries_count()
                )))
            }
        };

        let hole = self.make_room_after(attach, free);
        self.keys[hole] = e.get_key();
        self.children[hole] = carried_child;
        self.mark_slot_status(hole, true);
        Ok(())
    }

    /// Clear the slot directly after `attach` in used order by rolling
    /// everything between it and the free slot one step aside, and return
    /// it. Interior holes swallow a step of the roll and stay holes.
    fn make_room_after(&mut self, attach: usize, free: usize) -> usize {
        if free > attach {
            for slot in ((attach + 1)..free).rev() {
                self.shift_entry(slot, slot + 1);
            }
            attach + 1
        } else {
            for slot in (free + 1)..=attach {
                self.shift_entry(slot, slot - 1);
            }
            attach
        }
    }

    fn shift_entry(&mut self, from: usize, to: usize) {
        if !self.is_slot_used(from) || self.is_slot_used(to) {
            return;
        }

        // the key rides with its right child; the left-child association
        // follows from slot adjacency and needs no fixup
        self.keys[to] = self.keys[from].clone();
        self.children[to] = self.children[from];
        self.mark_slot_status(from, false);
        self.mark_slot_status(to, true);
    }

    /// Delete the entry at `record_id` along with its right child pointer.
    pub fn delete_key_and_right_child(&mut self, record_id: usize) {
        self.mark_slot_status(record_id, false);
    }

    /// Delete the entry at `record_id` along with its left child pointer;
    /// the right child takes over the nearest used slot below.
    pub fn delete_key_and_left_child(&mut self, record_id: usize) {
        for i in (0..record_id).rev() {
            if self.is_slot_used(i) {
                self.children[i] = self.children[record_id];
                self.mark_slot_status(record_id, false);
                return;
            }
        }
    }

    pub fn update_entry(&mut self, entry: &Entry) {
        let record_id = entry.get_record_id();

        for i in (0..record_id).rev() {
            if self.is_slot_used(i) {
                self.children[i] = entry.get_left_child();
                break;
            }
        }

        self.children[record_id] = entry.get_right_child();
        self.keys[record_id] = entry.get_key();
    }

    pub fn iter(&self) -> BTreeInternalPageIterator<'_> {
        BTreeInternalPageIterator::new(self)
    }

    pub fn check_integrity(
        &self,
        parent_pid: &PageId,
        lower_bound: &Option<Cell>,
        upper_bound: &Option<Cell>,
        check_occupancy: bool,
        depth: usize,
    ) -> MinnowResult {
        if self.get_pid().category != PageCategory::Internal {
            return Err(MinnowError::db("page category is not internal"));
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
        for e in self.iter() {
            if let Some(ref previous) = previous {
                if previous > &e.get_key() {
                    return Err(MinnowError::db(&format!(
                        "internal page {} is out of order: {} > {}",
                        self.get_pid(),
                        previous,
                        e
                    )));
                }
            }
            previous = Some(e.get_key());
        }

        if let (Some(upper), Some(last)) = (upper_bound, &previous) {
            if last > upper {
                return Err(MinnowError::db(&format!(
                    "internal page {} exceeds its upper bound: {} > {}",
                    self.get_pid(),
                    last,
                    upper
                )));
            }
        }

        if check_occupancy && depth > 0 {
            // one below the usual floor is fine: pushing the middle entry
            // up during a split leaves the left half exactly one short
            let minimal = self.max_entries() / 2 - 1;
            if self.entries_count() < minimal {
                return Err(MinnowError::db(&format!(
                    "internal page {} is below half occupancy: {}/{}",
                    self.get_pid(),
                    self.entries_count(),
                    self.max_entries()
                )));
            }
        }

        Ok(())
    }
}

impl Page for BTreeInternalPage {
    fn new(pid: &PageId, bytes: &[u8], schema: &Schema, key_field: usize) -> Self {
        let key_type = schema.get_field(key_field).field_type;
        let key_size = key_type.get_size();
        let slot_count = Self::get_max_entries(key_size) + 1;
        let header_size = ceil_div(slot_count, 8);

        let mut reader = Cursor::new(bytes);
        let parent_index = read_into::<u32, _>(&mut reader);
        let child_category = read_into::<PageCategory, _>(&mut reader);

        let header = BitVec::from_bytes(&read_exact(&mut reader, header_size));

        let mut keys = Vec::with_capacity(slot_count);
        keys.push(Cell::Int64(0));
        for _ in 1..slot_count {
            keys.push(Cell::decode_from(&mut reader, &key_type));
        }

        let mut children = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            let index = read_into::<u32, _>(&mut reader);
            children.push(PageId::new(child_category, pid.table_id, index));
        }

        let mut base = BTreeBasePage::new(pid);
        base.set_parent_page_index(parent_index);

        let mut page = Self {
            base,
            keys,
            children,
            child_category,
            slot_count,
            header,
            key_type,
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
        writer.write(&self.child_category);
        writer.write_bytes(&self.header.to_bytes());

        let key_size = self.key_type.get_size();
        for i in 1..self.slot_count {
            if self.is_slot_used(i) {
                writer.write_bytes(&self.keys[i].encode(&self.key_type));
            } else {
                writer.write_bytes(&vec![0; key_size]);
            }
        }

        for child in &self.children {
            writer.write(&child.page_index);
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

impl super::BTreePage for BTreeInternalPage {
    fn get_parent_pid(&self) -> PageId {
        self.base.get_parent_pid()
    }

    fn set_parent_pid(&mut self, pid: &PageId) {
        self.base.set_parent_pid(pid);
    }
}

/// One (key, left child, right child) triple of an internal node. All keys
/// under the left child sort at or below the key, all keys under the right
/// child at or above it.
#[derive(Clone)]
pub struct Entry {
    key: Cell,
    left: PageId,
    right: PageId,

    // the slot the entry came from
    record_id: usize,
}

impl Entry {
    pub fn new(key: Cell, left: &PageId, right: &PageId) -> Self {
        Self {
            key,
            left: *left,
            right: *right,
            record_id: 0,
        }
    }

    pub fn set_record_id(&mut self, record_id: usize) {
        self.record_id = record_id;
    }

    pub fn get_record_id(&self) -> usize {
        self.record_id
    }

    pub fn get_key(&self) -> Cell {
        self.key.clone()
    }

    pub fn set_key(&mut self, key: Cell) {
        self.key = key;
    }

    pub fn get_left_child(&self) -> PageId {
        self.left
    }

    pub fn get_right_child(&self) -> PageId {
        self.right
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.key, self.left, self.right)
    }
}

/// Walks the entries of one node in key order. `get_entry` resolves each
/// slot's left child, so the cursor pair carries no child bookkeeping of
/// its own.
pub struct BTreeInternalPageIterator<'page> {
    page: &'page BTreeInternalPage,

    // the next slot each end will inspect; they meet in the middle
    front: usize,
    back: usize,
}

impl<'page> BTreeInternalPageIterator<'page> {
    pub fn new(page: &'page BTreeInternalPage) -> Self {
        Self {
            page,
            front: 1,
            back: page.slot_count,
        }
    }
}

impl Iterator for BTreeInternalPageIterator<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Self::Item> {
        while self.front < self.back {
            let slot = self.front;
            self.front += 1;
            if let Some(entry) = self.page.get_entry(slot) {
                return Some(entry);
            }
        }
        None
    }
}

impl DoubleEndedIterator for BTreeInternalPageIterator<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        while self.back > self.front {
            self.back -= 1;
            if let Some(entry) = self.page.get_entry(self.back) {
                return Some(entry);
            }
        }
        None
    }
}
