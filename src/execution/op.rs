use std::fmt;

use crate::storage::{field::Cell, tuple::Tuple};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    NotEquals,
}

impl Op {
    pub fn compare(&self, left: &Cell, right: &Cell) -> bool {
        match self {
            Op::Equals => left == right,
            Op::GreaterThan => left > right,
            Op::GreaterThanOrEq => left >= right,
            Op::LessThan => left < right,
            Op::LessThanOrEq => left <= right,
            Op::NotEquals => left != right,
        }
    }
}

/// field-against-constant comparison
#[derive(Clone)]
pub struct Predicate {
    pub field_index: usize,
    pub op: Op,
    pub cell: Cell,
}

impl Predicate {
    pub fn new(field_index: usize, op: Op, cell: &Cell) -> Self {
        Self {
            field_index,
            op,
            cell: cell.clone(),
        }
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        self.op.compare(&tuple.get_cell(self.field_index), &self.cell)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "field {} {:?} {}",
            self.field_index, self.op, self.cell
        )
    }
}

/// field-against-field comparison across two tuples
#[derive(Clone)]
pub struct JoinPredicate {
    pub field_index1: usize,
    pub op: Op,
    pub field_index2: usize,
}

impl JoinPredicate {
    pub fn new(field_index1: usize, op: Op, field_index2: usize) -> Self {
        Self {
            field_index1,
            op,
            field_index2,
        }
    }

    pub fn matches(&self, left: &Tuple, right: &Tuple) -> bool {
        self.op.compare(
            &left.get_cell(self.field_index1),
            &right.get_cell(self.field_index2),
        )
    }
}
