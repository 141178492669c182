//! This file contains the trusted specification for how a persistent
//! memory region (implementing trait `PersistentMemoryRegion`)
//! behaves.
//!
//! A region is a flat range of bytes addressed from 0. Writes land in
//! the read state immediately, but they are only guaranteed to survive
//! a crash once they have been flushed and the flush has been drained:
//!
//! - `flush(addr, len)` starts writing back the given range. It does not
//!   wait for the write-back to complete.
//! - `drain()` waits until every range flushed so far is durable.
//! - `persist(addr, len)` is a flush followed by a drain, and is the
//!   only barrier that callers should build protocols on.
//!
//! On a crash, some subset of the outstanding writes is made durable
//! and the rest is discarded. Each 8-byte-aligned 8-byte chunk either
//! has all of its outstanding writes made durable or none of them;
//! `PM_STORE_UNIT` names that granularity.
//!
//! Flushing and draining are not allowed to fail. Implementations that
//! sit on top of fallible system calls report the failure and carry on,
//! since a durability failure is indistinguishable from a crash.

use crate::pmem::pmcopy_t::PmCopy;
use thiserror::Error;

/// Size in bytes of the largest write that persistent memory performs
/// atomically with respect to crashes.
pub const PM_STORE_UNIT: u64 = 8;

#[derive(Debug, Eq, PartialEq, Clone, Copy, Error)]
pub enum PmemError {
    #[error("invalid file name")]
    InvalidFileName,
    #[error("cannot open persistent memory file")]
    CannotOpenPmFile,
    #[error("access of {num_bytes} bytes at {addr} is outside a region of {region_size} bytes")]
    AccessOutOfRange {
        addr: u64,
        num_bytes: u64,
        region_size: u64,
    },
    #[error("region has {actual} bytes but {expected} were requested")]
    RegionSizeMismatch { expected: u64, actual: u64 },
    #[error("expected {expected} bytes to decode a value but got {actual}")]
    BufferSizeMismatch { expected: u64, actual: u64 },
}

// Checks that `num_bytes` bytes starting at `addr` lie within a region of
// `region_size` bytes, without overflowing.
pub fn check_access(addr: u64, num_bytes: u64, region_size: u64) -> Result<(), PmemError> {
    match addr.checked_add(num_bytes) {
        Some(end) if end <= region_size => Ok(()),
        _ => Err(PmemError::AccessOutOfRange {
            addr,
            num_bytes,
            region_size,
        }),
    }
}

pub trait PersistentMemoryRegion {
    fn get_region_size(&self) -> u64;

    fn read(&self, addr: u64, num_bytes: u64) -> Result<Vec<u8>, PmemError>;

    fn write(&mut self, addr: u64, bytes: &[u8]) -> Result<(), PmemError>;

    fn flush(&mut self, addr: u64, num_bytes: u64);

    fn drain(&mut self);

    fn persist(&mut self, addr: u64, num_bytes: u64) {
        self.flush(addr, num_bytes);
        self.drain();
    }

    fn read_aligned<S>(&self, addr: u64) -> Result<S, PmemError>
    where
        S: PmCopy,
    {
        let bytes = self.read(addr, S::size_of())?;
        S::from_bytes(&bytes)
    }

    fn serialize_and_write<S>(&mut self, addr: u64, to_write: &S) -> Result<(), PmemError>
    where
        S: PmCopy,
    {
        self.write(addr, to_write.as_bytes())
    }
}

// Lets a caller lend a region to a list (or anything else generic over
// `PersistentMemoryRegion`) and keep using it afterwards.
impl<PM: PersistentMemoryRegion> PersistentMemoryRegion for &mut PM {
    fn get_region_size(&self) -> u64 {
        (**self).get_region_size()
    }

    fn read(&self, addr: u64, num_bytes: u64) -> Result<Vec<u8>, PmemError> {
        (**self).read(addr, num_bytes)
    }

    fn write(&mut self, addr: u64, bytes: &[u8]) -> Result<(), PmemError> {
        (**self).write(addr, bytes)
    }

    fn flush(&mut self, addr: u64, num_bytes: u64) {
        (**self).flush(addr, num_bytes)
    }

    fn drain(&mut self) {
        (**self).drain()
    }

    fn persist(&mut self, addr: u64, num_bytes: u64) {
        (**self).persist(addr, num_bytes)
    }
}
