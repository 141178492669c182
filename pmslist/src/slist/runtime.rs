//! `SlistRuntime` binds a persistent memory region to the list layout:
//! it translates node offsets into region addresses and exposes the
//! three durability primitives the list protocols are built from.
//!
//! The runtime is process-local and is never persisted. It owns no node
//! content, only the ordering of what gets published.

use crate::pmem::pmcopy_t::PmCopy;
use crate::pmem::pmemspec_t::{check_access, PersistentMemoryRegion};
use crate::slist::err::SlistError;
use crate::slist::layout::{ListHeader, Offset, LIST_HEADER_ADDR, LIST_HEADER_SIZE, NODE_AREA_START};
use crate::slist::node::ListNode;
use core::mem::size_of;

pub struct SlistRuntime<PM> {
    pm: PM,
    base: u64,
}

impl<PM: PersistentMemoryRegion> SlistRuntime<PM> {
    /// Binds `pm` using the standard layout, with node storage starting
    /// right after the header.
    pub fn new(pm: PM) -> Result<Self, SlistError> {
        let region_size = pm.get_region_size();
        if region_size < NODE_AREA_START {
            return Err(SlistError::RegionTooSmall { region_size });
        }
        Ok(Self {
            pm,
            base: NODE_AREA_START,
        })
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn region(&self) -> &PM {
        &self.pm
    }

    pub fn into_region(self) -> PM {
        self.pm
    }

    /// Number of distinct offsets at which an `N` fits in node storage.
    /// No acyclic chain of `N`s can be longer than this.
    pub fn max_nodes<N: PmCopy>(&self) -> u64 {
        (self.pm.get_region_size() - self.base + 1).saturating_sub(N::size_of())
    }

    /// Translates a node offset into a region address, checking that the
    /// whole node lies inside the region.
    pub fn node_addr<N: PmCopy>(&self, offset: Offset) -> Result<u64, SlistError> {
        if !offset.is_valid() {
            return Err(SlistError::InvalidNodeOffset { offset });
        }
        let addr = self
            .base
            .checked_add(offset.get())
            .ok_or(SlistError::InvalidNodeOffset { offset })?;
        check_access(addr, N::size_of(), self.pm.get_region_size())
            .map_err(|_| SlistError::InvalidNodeOffset { offset })?;
        Ok(addr)
    }

    pub fn read_node<N: PmCopy>(&self, offset: Offset) -> Result<N, SlistError> {
        let addr = self.node_addr::<N>(offset)?;
        Ok(self.pm.read_aligned::<N>(addr)?)
    }

    pub fn write_node<N: PmCopy>(&mut self, offset: Offset, node: &N) -> Result<(), SlistError> {
        let addr = self.node_addr::<N>(offset)?;
        Ok(self.pm.serialize_and_write(addr, node)?)
    }

    pub fn read_next<N: ListNode>(&self, offset: Offset) -> Result<Offset, SlistError> {
        let addr = self.node_addr::<N>(offset)?;
        Ok(self.pm.read_aligned::<Offset>(addr + N::NEXT_FIELD_OFFSET)?)
    }

    pub fn write_next<N: ListNode>(&mut self, offset: Offset, next: Offset) -> Result<(), SlistError> {
        let addr = self.node_addr::<N>(offset)?;
        Ok(self
            .pm
            .serialize_and_write(addr + N::NEXT_FIELD_OFFSET, &next)?)
    }

    pub fn read_header(&self) -> Result<ListHeader, SlistError> {
        Ok(self.pm.read_aligned::<ListHeader>(LIST_HEADER_ADDR)?)
    }

    pub fn write_header(&mut self, header: &ListHeader) -> Result<(), SlistError> {
        Ok(self.pm.serialize_and_write(LIST_HEADER_ADDR, header)?)
    }

    pub fn write_head(&mut self, head: Offset) -> Result<(), SlistError> {
        Ok(self.pm.serialize_and_write(ListHeader::HEAD_FIELD_ADDR, &head)?)
    }

    pub fn write_tail(&mut self, tail: Offset) -> Result<(), SlistError> {
        Ok(self.pm.serialize_and_write(ListHeader::TAIL_FIELD_ADDR, &tail)?)
    }

    pub fn flush(&mut self, addr: u64, num_bytes: u64) {
        self.pm.flush(addr, num_bytes)
    }

    pub fn drain(&mut self) {
        self.pm.drain()
    }

    pub fn persist(&mut self, addr: u64, num_bytes: u64) {
        self.pm.persist(addr, num_bytes)
    }

    pub fn persist_node<N: PmCopy>(&mut self, offset: Offset) -> Result<(), SlistError> {
        let addr = self.node_addr::<N>(offset)?;
        self.persist(addr, N::size_of());
        Ok(())
    }

    pub fn persist_header(&mut self) {
        self.persist(LIST_HEADER_ADDR, LIST_HEADER_SIZE)
    }
}

// Keeps the header the size the layout assumes.
const _: () = assert!(size_of::<ListHeader>() as u64 == LIST_HEADER_SIZE);
