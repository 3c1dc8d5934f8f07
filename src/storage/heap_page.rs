use std::io::Cursor;

use bit_vec::BitVec;

use crate::{
    buffer_pool::BufferPool,
    error::MinnowError,
    io::MinnowWriter,
    storage::{
        page::Page,
        page_id::PageId,
        tuple::{Schema, Tuple, WrappedTuple},
    },
    types::MinnowResult,
    utils::ceil_div,
};

/// A heap-file page: a slot-status bitmap followed by fixed-width tuple
/// bodies. Slots are allocated first-free and never compacted, so record
/// ids stay put for the lifetime of a tuple.
pub struct HeapPage {
    pid: PageId,

    slot_count: usize,

    // slot status: true means occupied
    header: BitVec,

    // all tuple bodies, including the empty slots
    tuples: Vec<Tuple>,

    schema: Schema,

    before_image: Vec<u8>,
}

impl HeapPage {
    /// How many tuples a page can hold: each slot costs its body plus one
    /// header bit.
    pub fn calculate_slots_count(schema: &Schema) -> usize {
        let bits_per_tuple = schema.get_size() * 8 + 1;
        BufferPool::get_page_size() * 8 / bits_per_tuple
    }

    pub fn header_size(slot_count: usize) -> usize {
        ceil_div(slot_count, 8)
    }

    pub fn empty_page_data() -> Vec<u8> {
        vec![0; BufferPool::get_page_size()]
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

    pub fn is_slot_used(&self, slot_index: usize) -> bool {
        self.header[slot_index]
    }

    fn mark_slot_status(&mut self, slot_index: usize, used: bool) {
        self.header.set(slot_index, used);
    }

    /// Put the tuple into the first free slot and return that slot index.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Result<usize, MinnowError> {
        for i in 0..self.slot_count {
            if !self.is_slot_used(i) {
                self.tuples[i] = tuple.clone();
                self.mark_slot_status(i, true);
                return Ok(i);
            }
        }

        Err(MinnowError::db(&format!(
            "no empty slot on page {}",
            self.pid
        )))
    }

    pub fn delete_tuple(&mut self, slot_index: usize) -> MinnowResult {
        if slot_index >= self.slot_count {
            return Err(MinnowError::invalid_arg(&format!(
                "slot {} out of range on page {}",
                slot_index, self.pid
            )));
        }
        if !self.is_slot_used(slot_index) {
            return Err(MinnowError::db(&format!(
                "slot {} on page {} is already empty",
                slot_index, self.pid
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

    /// All occupied slots, in slot order.
    pub fn tuples(&self) -> Vec<WrappedTuple> {
        (0..self.slot_count)
            .filter(|i| self.is_slot_used(*i))
            .map(|i| WrappedTuple::new(&self.tuples[i], i, self.pid))
            .collect()
    }
}

impl Page for HeapPage {
    fn new(pid: &PageId, bytes: &[u8], schema: &Schema, _key_field: usize) -> Self {
        let slot_count = Self::calculate_slots_count(schema);
        let header_size = Self::header_size(slot_count);

        let header = BitVec::from_bytes(&bytes[..header_size]);

        let tuple_size = schema.get_size();
        let mut tuples = Vec::with_capacity(slot_count);
        for i in 0..slot_count {
            let start = header_size + i * tuple_size;
            let mut reader = Cursor::new(&bytes[start..start + tuple_size]);
            tuples.push(Tuple::read_from(&mut reader, schema));
        }

        Self {
            pid: *pid,
            slot_count,
            header,
            tuples,
            schema: schema.clone(),
            before_image: bytes.to_vec(),
        }
    }

    fn get_pid(&self) -> PageId {
        self.pid
    }

    fn get_page_data(&self) -> Vec<u8> {
        let mut writer = MinnowWriter::new();
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
        self.before_image = self.get_page_data();
    }

    fn get_before_image(&self) -> Vec<u8> {
        self.before_image.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{field::Cell, page_id::PageCategory, tuple::small_int_schema};
    use crate::utils::init_log;

    #[test]
    fn test_slot_allocation_and_codec() {
        init_log();

        let schema = small_int_schema(2, "f");
        let pid = PageId::new(PageCategory::Heap, 9001, 0);
        let mut page = HeapPage::new(&pid, &HeapPage::empty_page_data(), &schema, 0);

        assert_eq!(page.tuples_count(), 0);

        let t1 = Tuple::new(&[Cell::Int64(1), Cell::Int64(10)]);
        let t2 = Tuple::new(&[Cell::Int64(2), Cell::Int64(20)]);
        assert_eq!(page.insert_tuple(&t1).unwrap(), 0);
        assert_eq!(page.insert_tuple(&t2).unwrap(), 1);

        // deleting frees the slot, and the next insert reuses it
        page.delete_tuple(0).unwrap();
        assert!(page.delete_tuple(0).is_err());
        let t3 = Tuple::new(&[Cell::Int64(3), Cell::Int64(30)]);
        assert_eq!(page.insert_tuple(&t3).unwrap(), 0);

        // the serialized image reproduces the page
        let data = page.get_page_data();
        assert_eq!(data.len(), BufferPool::get_page_size());
        let reloaded = HeapPage::new(&pid, &data, &schema, 0);
        assert_eq!(reloaded.tuples_count(), 2);
        assert_eq!(reloaded.get_tuple(0).unwrap(), t3);
        assert_eq!(reloaded.get_tuple(1).unwrap(), t2);
    }

    #[test]
    fn test_page_fills_up() {
        init_log();

        let schema = small_int_schema(4, "f");
        let pid = PageId::new(PageCategory::Heap, 9002, 0);
        let mut page = HeapPage::new(&pid, &HeapPage::empty_page_data(), &schema, 0);

        let capacity = page.get_slots_count();
        for i in 0..capacity {
            page.insert_tuple(&Tuple::new_int_tuple(i as i64, 4)).unwrap();
        }
        assert!(page.insert_tuple(&Tuple::new_int_tuple(-1, 4)).is_err());
    }
}
