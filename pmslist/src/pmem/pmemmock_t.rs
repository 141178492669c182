//! This file contains the trusted implementation for
//! `VolatileMemoryMockingPersistentMemoryRegion`, a volatile memory
//! region that mocks a persistent memory region by implementing trait
//! `PersistentMemoryRegion`.
//!
//! THIS IS ONLY INTENDED FOR USE IN TESTING! In practice, one should
//! use actually persistent memory to implement persistent memory!

use crate::pmem::pmemspec_t::{check_access, PersistentMemoryRegion, PmemError};

// Writes are applied to `contents` immediately and flushes do nothing,
// so the mock behaves like a region that never crashes.
#[derive(Clone, Debug)]
pub struct VolatileMemoryMockingPersistentMemoryRegion {
    contents: Vec<u8>,
}

impl VolatileMemoryMockingPersistentMemoryRegion {
    pub fn new(region_size: u64) -> Self {
        Self {
            contents: vec![0; region_size as usize],
        }
    }

    /// Builds a region whose contents are a previously captured image,
    /// for instance one of the crash images of a `CrashRecordingRegion`.
    pub fn from_image(image: Vec<u8>) -> Self {
        Self { contents: image }
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}

impl PersistentMemoryRegion for VolatileMemoryMockingPersistentMemoryRegion {
    fn get_region_size(&self) -> u64 {
        self.contents.len() as u64
    }

    fn read(&self, addr: u64, num_bytes: u64) -> Result<Vec<u8>, PmemError> {
        check_access(addr, num_bytes, self.get_region_size())?;
        let addr_usize = addr as usize;
        Ok(self.contents[addr_usize..addr_usize + num_bytes as usize].to_vec())
    }

    fn write(&mut self, addr: u64, bytes: &[u8]) -> Result<(), PmemError> {
        check_access(addr, bytes.len() as u64, self.get_region_size())?;
        let addr_usize = addr as usize;
        self.contents[addr_usize..addr_usize + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self, _addr: u64, _num_bytes: u64) {}

    fn drain(&mut self) {}
}
