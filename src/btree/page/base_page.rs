use crate::storage::page_id::{PageCategory, PageId, EMPTY_PAGE_INDEX};

/// State every B+ tree page shares: its identity, the parent pointer, and
/// the before-image snapshot the log wants. Concrete pages embed this and
/// deref to it.
pub struct BTreeBasePage {
    pid: PageId,

    // 0 means the parent is the root pointer page
    parent_page_index: u32,

    before_image: Vec<u8>,
}

impl BTreeBasePage {
    pub fn new(pid: &PageId) -> Self {
        Self {
            pid: *pid,
            parent_page_index: EMPTY_PAGE_INDEX,
            before_image: Vec::new(),
        }
    }

    pub fn get_pid(&self) -> PageId {
        self.pid
    }

    pub fn get_parent_pid(&self) -> PageId {
        let category = if self.parent_page_index == EMPTY_PAGE_INDEX {
            PageCategory::RootPointer
        } else {
            PageCategory::Internal
        };
        PageId::new(category, self.pid.table_id, self.parent_page_index)
    }

    pub fn set_parent_pid(&mut self, pid: &PageId) {
        self.parent_page_index = pid.page_index;
    }

    pub fn get_parent_page_index(&self) -> u32 {
        self.parent_page_index
    }

    pub fn set_parent_page_index(&mut self, index: u32) {
        self.parent_page_index = index;
    }

    pub fn store_before_image(&mut self, data: Vec<u8>) {
        self.before_image = data;
    }

    pub fn before_image(&self) -> Vec<u8> {
        self.before_image.clone()
    }
}
