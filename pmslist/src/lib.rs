//! `pmslist` is a crash-consistent singly-linked list that lives inside a
//! persistent memory region.
//!
//! - `pmem` abstracts the region (`PersistentMemoryRegion`) and provides a
//!   memory-mapped file implementation, a volatile mock and a recording
//!   region that enumerates crash states.
//! - `slist` is the list: layout, node contract, mutations, recovery,
//!   traversal and the consistency check.
//! - `fixture` generates reproducible random workloads.

pub mod fixture;
pub mod pmem;
pub mod slist;
