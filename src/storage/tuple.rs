use std::{fmt, io::Read, ops::Deref};

use crate::{
    io::MinnowWriter,
    storage::{
        field::{Cell, Field, Type},
        page_id::PageId,
    },
};

/// An ordered list of named, typed columns. The fixed tuple width follows
/// from the column types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn get_fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get_field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn fields_count(&self) -> usize {
        self.fields.len()
    }

    /// Tuple width in bytes.
    pub fn get_size(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.get_size()).sum()
    }

    /// The concatenation of two schemas, used for join output.
    pub fn merge(left: &Schema, right: &Schema) -> Schema {
        let mut fields = left.fields.clone();
        fields.extend(right.fields.iter().cloned());
        Schema::new(fields)
    }
}

/// A schema of `width` int64 columns, handy for tests and tooling.
pub fn small_int_schema(width: usize, name_prefix: &str) -> Schema {
    let fields = (0..width)
        .map(|i| Field::new(&format!("{}{}", name_prefix, i), Type::Int64))
        .collect();
    Schema::new(fields)
}

/// A row: one cell per schema column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    cells: Vec<Cell>,
}

impl Tuple {
    pub fn new(cells: &[Cell]) -> Self {
        Self {
            cells: cells.to_vec(),
        }
    }

    /// A tuple of `width` copies of the integer `value`.
    pub fn new_int_tuple(value: i64, width: usize) -> Self {
        Self {
            cells: vec![Cell::Int64(value); width],
        }
    }

    pub fn get_cell(&self, i: usize) -> Cell {
        self.cells[i].clone()
    }

    pub fn set_cell(&mut self, i: usize, cell: Cell) {
        self.cells[i] = cell;
    }

    pub fn cells_count(&self) -> usize {
        self.cells.len()
    }

    /// The concatenation of two tuples, used for join output.
    pub fn merge(left: &Tuple, right: &Tuple) -> Tuple {
        let mut cells = left.cells.clone();
        cells.extend(right.cells.iter().cloned());
        Tuple { cells }
    }

    pub fn read_from<R: Read>(reader: &mut R, schema: &Schema) -> Self {
        let cells = schema
            .get_fields()
            .iter()
            .map(|f| Cell::decode_from(reader, &f.field_type))
            .collect();
        Self { cells }
    }

    pub fn write_to(&self, writer: &mut MinnowWriter, schema: &Schema) {
        for (cell, field) in self.cells.iter().zip(schema.get_fields()) {
            writer.write_bytes(&cell.encode(&field.field_type));
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let content: Vec<String> = self.cells.iter().map(|c| c.to_string()).collect();
        write!(f, "{{{}}}", content.join(", "))
    }
}

/// A tuple decorated with its record id (the page that holds it and the
/// slot inside that page). Record ids are stable until the tuple is
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedTuple {
    internal: Tuple,
    slot_index: usize,
    pid: PageId,
}

impl WrappedTuple {
    pub fn new(internal: &Tuple, slot_index: usize, pid: PageId) -> Self {
        Self {
            internal: internal.clone(),
            slot_index,
            pid,
        }
    }

    pub fn get_pid(&self) -> PageId {
        self.pid
    }

    pub fn get_slot_index(&self) -> usize {
        self.slot_index
    }

    pub fn into_tuple(self) -> Tuple {
        self.internal
    }
}

impl Deref for WrappedTuple {
    type Target = Tuple;

    fn deref(&self) -> &Self::Target {
        &self.internal
    }
}

impl fmt::Display for WrappedTuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}:{}", self.internal, self.pid, self.slot_index)
    }
}
