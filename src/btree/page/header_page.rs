use std::io::Cursor;

use bit_vec::BitVec;

use crate::{
    buffer_pool::BufferPool,
    io::{read_exact, read_into, MinnowWriter},
    storage::{
        page::Page,
        page_id::{PageCategory, PageId, EMPTY_PAGE_INDEX},
        tuple::Schema,
    },
};

use super::base_page::BTreeBasePage;

// bytes for the previous- and next-header pointers
const POINTER_BYTES: usize = 2 * 4;

/// A header page tracks which page slots of the file are reclaimable: bit
/// set means the page is in use, clear means it can be handed out again.
/// Header pages form a doubly linked list headed from the root pointer;
/// the n-th header page covers page indexes `n * slots .. (n + 1) * slots`.
pub struct BTreeHeaderPage {
    base: BTreeBasePage,

    // true means the covered page is in use
    header: BitVec,

    slot_count: usize,

    prev_header_index: u32,
    next_header_index: u32,
}

impl std::ops::Deref for BTreeHeaderPage {
    type Target = BTreeBasePage;
    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl std::ops::DerefMut for BTreeHeaderPage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

impl BTreeHeaderPage {
    pub fn get_slots_count() -> usize {
        (BufferPool::get_page_size() - POINTER_BYTES) * 8
    }

    /// A freshly created header page reports every covered page as in use;
    /// slots open up only when pages are explicitly reclaimed.
    pub fn new_empty(pid: &PageId) -> Self {
        let slot_count = Self::get_slots_count();
        let header = BitVec::from_elem(slot_count, true);

        let mut page = Self {
            base: BTreeBasePage::new(pid),
            header,
            slot_count,
            prev_header_index: EMPTY_PAGE_INDEX,
            next_header_index: EMPTY_PAGE_INDEX,
        };
        // on disk the page starts out zeroed
        page.base
            .store_before_image(vec![0; BufferPool::get_page_size()]);
        page
    }

    pub fn mark_slot_status(&mut self, slot_index: usize, used: bool) {
        self.header.set(slot_index, used);
    }

    pub fn is_slot_used(&self, slot_index: usize) -> bool {
        self.header[slot_index]
    }

    /// The first reclaimable slot on this page, if any.
    pub fn get_empty_slot(&self) -> Option<usize> {
        (0..self.slot_count).find(|i| !self.header[*i])
    }

    pub fn get_prev_pid(&self) -> Option<PageId> {
        if self.prev_header_index == EMPTY_PAGE_INDEX {
            return None;
        }
        Some(PageId::new(
            PageCategory::Header,
            self.get_pid().table_id,
            self.prev_header_index,
        ))
    }

    pub fn set_prev_pid(&mut self, pid: Option<PageId>) {
        self.prev_header_index = pid.map_or(EMPTY_PAGE_INDEX, |p| p.page_index);
    }

    pub fn get_next_pid(&self) -> Option<PageId> {
        if self.next_header_index == EMPTY_PAGE_INDEX {
            return None;
        }
        Some(PageId::new(
            PageCategory::Header,
            self.get_pid().table_id,
            self.next_header_index,
        ))
    }

    pub fn set_next_pid(&mut self, pid: Option<PageId>) {
        self.next_header_index = pid.map_or(EMPTY_PAGE_INDEX, |p| p.page_index);
    }
}

impl Page for BTreeHeaderPage {
    fn new(pid: &PageId, bytes: &[u8], _schema: &Schema, _key_field: usize) -> Self {
        let slot_count = Self::get_slots_count();

        let mut reader = Cursor::new(bytes);
        let prev_header_index = read_into::<u32, _>(&mut reader);
        let next_header_index = read_into::<u32, _>(&mut reader);
        let header = BitVec::from_bytes(&read_exact(&mut reader, slot_count / 8));

        let mut page = Self {
            base: BTreeBasePage::new(pid),
            header,
            slot_count,
            prev_header_index,
            next_header_index,
        };
        page.base.store_before_image(bytes.to_vec());
        page
    }

    fn get_pid(&self) -> PageId {
        self.base.get_pid()
    }

    fn get_page_data(&self) -> Vec<u8> {
        let mut writer = MinnowWriter::new();
        writer.write(&self.prev_header_index);
        writer.write(&self.next_header_index);
        writer.write_bytes(&self.header.to_bytes());
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
