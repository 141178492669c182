//! A crash-consistent singly-linked list stored in a persistent memory
//! region.
//!
//! `slistimpl.rs` holds the mutation protocols, `recover.rs` the repair
//! that must run after an unclean shutdown, `iter.rs` traversal and
//! `check.rs` the header/chain agreement check.

pub mod check;
pub mod err;
pub mod iter;
pub mod layout;
pub mod node;
pub mod recover;
pub mod runtime;
pub mod slistimpl;

#[cfg(test)]
mod slist_proptest;

pub use check::check_region_consistency;
pub use err::SlistError;
pub use iter::SlistIter;
pub use layout::{ListHeader, Offset, LIST_HEADER_ADDR, LIST_HEADER_SIZE, NODE_AREA_START};
pub use node::ListNode;
pub use runtime::SlistRuntime;
pub use slistimpl::SinglyLinkedList;
