use std::{fmt, io::Read};

use crate::io::{read_exact, Decodeable, Encodeable};

/// Sentinel page index meaning "no page", used by sibling, parent and
/// header pointers inside B+ tree files. Index 0 is the root pointer page
/// there, so it can never be a pointer target, and a zero-filled fresh page
/// conveniently decodes as "no neighbours".
pub const EMPTY_PAGE_INDEX: u32 = 0;

#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum PageCategory {
    RootPointer,
    Internal,
    Leaf,
    Header,
    Heap,
}

const ROOT_POINTER: [u8; 4] = [0, 0, 0, 0];
const INTERNAL: [u8; 4] = [0, 0, 0, 1];
const LEAF: [u8; 4] = [0, 0, 0, 2];
const HEADER: [u8; 4] = [0, 0, 0, 3];
const HEAP: [u8; 4] = [0, 0, 0, 4];

impl Encodeable for PageCategory {
    fn encode(&self) -> Vec<u8> {
        let tag = match self {
            PageCategory::RootPointer => ROOT_POINTER,
            PageCategory::Internal => INTERNAL,
            PageCategory::Leaf => LEAF,
            PageCategory::Header => HEADER,
            PageCategory::Heap => HEAP,
        };
        tag.to_vec()
    }
}

impl Decodeable for PageCategory {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let buffer: [u8; 4] = read_exact(reader, 4).try_into().unwrap();
        match buffer {
            ROOT_POINTER => PageCategory::RootPointer,
            INTERNAL => PageCategory::Internal,
            LEAF => PageCategory::Leaf,
            HEADER => PageCategory::Header,
            HEAP => PageCategory::Heap,
            _ => panic!("invalid page category: {:?}", buffer),
        }
    }
}

/// The identity of a page: which file it belongs to, its position inside
/// the file, and what kind of page lives there. The unit of locking, I/O
/// and cache residency.
#[derive(PartialEq, Eq, Copy, Clone, Hash)]
pub struct PageId {
    pub category: PageCategory,
    pub table_id: u32,
    pub page_index: u32,
}

impl PageId {
    pub fn new(category: PageCategory, table_id: u32, page_index: u32) -> Self {
        Self {
            category,
            table_id,
            page_index,
        }
    }

    pub fn get_table_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_short_repr(&self) -> String {
        format!("{:?}_{}", self.category, self.page_index)
    }
}

impl Encodeable for PageId {
    fn encode(&self) -> Vec<u8> {
        let mut buf = self.category.encode();
        buf.extend_from_slice(&self.table_id.to_le_bytes());
        buf.extend_from_slice(&self.page_index.to_le_bytes());
        buf
    }
}

impl Decodeable for PageId {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let category = PageCategory::decode_from(reader);
        let table_id = u32::decode_from(reader);
        let page_index = u32::decode_from(reader);
        Self {
            category,
            table_id,
            page_index,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<pid: {:?}/{}/{}>",
            self.category, self.table_id, self.page_index
        )
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
