//! On-media layout of a persistent singly-linked list.
//!
//! The region starts with a `ListHeader` at `LIST_HEADER_ADDR`. Node
//! storage follows immediately at `NODE_AREA_START`, which is the base
//! that every node `Offset` is relative to. Nodes are placed by the
//! caller; the list never allocates.
//!
//! ```text
//! 0          16                                           region end
//! +----------+---------------------------------------------+
//! | head|tail| node storage (caller-managed, Offset 0 ...) |
//! +----------+---------------------------------------------+
//! ```

use crate::pmem::pmcopy_t::PmSafe;
use core::fmt;
use core::mem::{offset_of, size_of};

/// A position in node storage, relative to the runtime's base. Links are
/// always stored as offsets so that a region can be mapped at a
/// different address by every process that opens it.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, PmSafe)]
pub struct Offset {
    raw: u64,
}

impl Offset {
    /// The "no node" sentinel that terminates every chain. It is the
    /// largest representable offset, which can never be the start of a
    /// node since at least one byte of node storage must follow it.
    pub const INVALID: Offset = Offset { raw: u64::MAX };

    pub const fn new(raw: u64) -> Self {
        Self { raw }
    }

    pub const fn get(self) -> u64 {
        self.raw
    }

    pub const fn is_valid(self) -> bool {
        self.raw != u64::MAX
    }
}

impl fmt::Debug for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Offset({})", self.raw)
        } else {
            write!(f, "Offset::INVALID")
        }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.raw)
        } else {
            write!(f, "invalid")
        }
    }
}

impl From<u64> for Offset {
    fn from(raw: u64) -> Self {
        Self::new(raw)
    }
}

/// Root record of a list. `head` and `tail` are both `Offset::INVALID`
/// exactly when the list is empty.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PmSafe)]
pub struct ListHeader {
    pub head: Offset,
    pub tail: Offset,
}

impl ListHeader {
    pub const EMPTY: ListHeader = ListHeader {
        head: Offset::INVALID,
        tail: Offset::INVALID,
    };

    pub const HEAD_FIELD_ADDR: u64 = LIST_HEADER_ADDR + offset_of!(ListHeader, head) as u64;
    pub const TAIL_FIELD_ADDR: u64 = LIST_HEADER_ADDR + offset_of!(ListHeader, tail) as u64;

    pub fn is_empty(&self) -> bool {
        !self.head.is_valid()
    }
}

pub const LIST_HEADER_ADDR: u64 = 0;
pub const LIST_HEADER_SIZE: u64 = size_of::<ListHeader>() as u64;
pub const NODE_AREA_START: u64 = LIST_HEADER_ADDR + LIST_HEADER_SIZE;
