use crate::storage::{page_id::PageId, tuple::Schema};

/// The contract every cached page satisfies: construction from its on-disk
/// image, serialization back to bytes, and the before-image snapshot the
/// write-ahead log records alongside mutations.
///
/// `key_field` is only meaningful for B+ tree pages; heap and header pages
/// ignore it, as they ignore the schema where it does not apply.
pub trait Page: Send + Sync {
    fn new(pid: &PageId, bytes: &[u8], schema: &Schema, key_field: usize) -> Self
    where
        Self: Sized;

    fn get_pid(&self) -> PageId;

    /// Serialize the page to its fixed-size on-disk image.
    fn get_page_data(&self) -> Vec<u8>;

    /// Snapshot the current content as the before-image for subsequent
    /// UPDATE log records. Called when a page is loaded and again when a
    /// transaction commits.
    fn set_before_image(&mut self);

    fn get_before_image(&self) -> Vec<u8>;
}
