use std::io::Cursor;

use crate::{
    io::{read_into, MinnowWriter},
    storage::{
        page::Page,
        page_id::{PageCategory, PageId, EMPTY_PAGE_INDEX},
        tuple::Schema,
    },
};

use super::base_page::BTreeBasePage;

/// The root pointer page is smaller than a data page; data page i lives at
/// byte offset `ROOT_POINTER_PAGE_SIZE + (i - 1) * page_size`.
pub const ROOT_POINTER_PAGE_SIZE: usize = 16;

/// The singleton first page of a B+ tree file: it records where the root
/// currently is, what kind of page the root is, and the head of the
/// header-page chain used for page reuse.
pub struct BTreeRootPointerPage {
    base: BTreeBasePage,

    root_page_index: u32,
    root_category: PageCategory,

    header_page_index: u32,
}

impl std::ops::Deref for BTreeRootPointerPage {
    type Target = BTreeBasePage;
    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl std::ops::DerefMut for BTreeRootPointerPage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

impl BTreeRootPointerPage {
    /// The on-disk image of a fresh file: the root is the (empty) leaf at
    /// page index 1 and there are no header pages yet.
    pub fn fresh_page_data() -> Vec<u8> {
        let mut writer = MinnowWriter::new();
        writer.write(&1u32);
        writer.write(&PageCategory::Leaf);
        writer.write(&EMPTY_PAGE_INDEX);
        writer.to_padded_bytes(ROOT_POINTER_PAGE_SIZE)
    }

    pub fn get_root_pid(&self) -> PageId {
        PageId::new(
            self.root_category,
            self.get_pid().table_id,
            self.root_page_index,
        )
    }

    pub fn set_root_pid(&mut self, pid: &PageId) {
        self.root_page_index = pid.page_index;
        self.root_category = pid.category;
    }

    /// The first header page, if the file has any.
    pub fn get_header_pid(&self) -> Option<PageId> {
        if self.header_page_index == EMPTY_PAGE_INDEX {
            return None;
        }
        Some(PageId::new(
            PageCategory::Header,
            self.get_pid().table_id,
            self.header_page_index,
        ))
    }

    pub fn set_header_pid(&mut self, pid: &PageId) {
        self.header_page_index = pid.page_index;
    }
}

impl Page for BTreeRootPointerPage {
    fn new(pid: &PageId, bytes: &[u8], _schema: &Schema, _key_field: usize) -> Self {
        let mut reader = Cursor::new(bytes);
        let root_page_index = read_into::<u32, _>(&mut reader);
        let root_category = read_into::<PageCategory, _>(&mut reader);
        let header_page_index = read_into::<u32, _>(&mut reader);

        let mut page = Self {
            base: BTreeBasePage::new(pid),
            root_page_index,
            root_category,
            header_page_index,
        };
        page.base.store_before_image(bytes.to_vec());
        page
    }

    fn get_pid(&self) -> PageId {
        self.base.get_pid()
    }

    fn get_page_data(&self) -> Vec<u8> {
        let mut writer = MinnowWriter::new();
        writer.write(&self.root_page_index);
        writer.write(&self.root_category);
        writer.write(&self.header_page_index);
        writer.to_padded_bytes(ROOT_POINTER_PAGE_SIZE)
    }

    fn set_before_image(&mut self) {
        let data = self.get_page_data();
        self.base.store_before_image(data);
    }

    fn get_before_image(&self) -> Vec<u8> {
        self.base.before_image()
    }
}
