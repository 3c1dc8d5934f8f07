use std::{cmp::Ordering, fmt, io::Read};

use crate::{error::MinnowError, io::read_exact};

/// The type of a single column. Both variants are fixed-width on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    /// 8-byte big-endian signed integer.
    Int64,

    /// A byte string padded with zeros up to the declared width.
    Bytes(usize),
}

impl Type {
    pub fn get_size(&self) -> usize {
        match self {
            Type::Int64 => 8,
            Type::Bytes(len) => *len,
        }
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cell {
    Int64(i64),
    Bytes(Vec<u8>),
}

impl Cell {
    pub fn get_int64(&self) -> Result<i64, MinnowError> {
        match self {
            Cell::Int64(v) => Ok(*v),
            _ => Err(MinnowError::invalid_arg(&format!(
                "expected an integer cell, got {:?}",
                self
            ))),
        }
    }

    pub fn get_bytes(&self) -> Result<Vec<u8>, MinnowError> {
        match self {
            Cell::Bytes(v) => Ok(v.clone()),
            _ => Err(MinnowError::invalid_arg(&format!(
                "expected a byte-string cell, got {:?}",
                self
            ))),
        }
    }

    /// Serialize the cell at the fixed width of `t`.
    pub fn encode(&self, t: &Type) -> Vec<u8> {
        match (self, t) {
            (Cell::Int64(v), Type::Int64) => v.to_be_bytes().to_vec(),
            (Cell::Bytes(v), Type::Bytes(len)) => {
                let mut buf = v.clone();
                buf.truncate(*len);
                buf.resize(*len, 0);
                buf
            }
            _ => panic!("cell {:?} does not match type {:?}", self, t),
        }
    }

    /// Read a cell of type `t`. Byte strings come back with their padding
    /// stripped.
    pub fn decode_from<R: Read>(reader: &mut R, t: &Type) -> Self {
        match t {
            Type::Int64 => {
                let bytes = read_exact(reader, 8);
                Cell::Int64(i64::from_be_bytes(bytes.try_into().unwrap()))
            }
            Type::Bytes(len) => {
                let mut bytes = read_exact(reader, *len);
                while bytes.last() == Some(&0) {
                    bytes.pop();
                }
                Cell::Bytes(bytes)
            }
        }
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Cell::Int64(a), Cell::Int64(b)) => a.cmp(b),
            (Cell::Bytes(a), Cell::Bytes(b)) => a.cmp(b),
            (Cell::Int64(_), Cell::Bytes(_)) => Ordering::Less,
            (Cell::Bytes(_), Cell::Int64(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cell::Int64(v) => write!(f, "{}", v),
            Cell::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
        }
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub field_type: Type,
}

impl Field {
    pub fn new(name: &str, field_type: Type) -> Self {
        Self {
            name: name.to_string(),
            field_type,
        }
    }
}
