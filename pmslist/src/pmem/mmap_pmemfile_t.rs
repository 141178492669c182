//! This file contains the trusted implementation of
//! `FileBackedPersistentMemoryRegion`, a persistent memory region backed
//! by a memory-mapped file.
//!
//! On a DAX-mounted file system the mapping is real persistent memory;
//! on any other file system the same code gives page-cache durability,
//! which is enough for development and for staging crash tests.

use crate::pmem::pmemspec_t::{check_access, PersistentMemoryRegion, PmemError};
use memmap::MmapMut;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, error};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileOpenBehavior {
    CreateNew,
    OpenExisting,
}

struct MemoryMappedFile {
    mmap: MmapMut,
}

impl MemoryMappedFile {
    fn from_file(
        file_to_map: &Path,
        size: u64,
        file_open_behavior: FileOpenBehavior,
    ) -> Result<Self, PmemError> {
        if file_to_map.as_os_str().is_empty() {
            return Err(PmemError::InvalidFileName);
        }

        let file = match file_open_behavior {
            FileOpenBehavior::CreateNew => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(file_to_map)
                    .map_err(|e| {
                        error!(path = %file_to_map.display(), "open: {:?}", e);
                        PmemError::CannotOpenPmFile
                    })?;

                file.set_len(size).map_err(|e| {
                    error!(path = %file_to_map.display(), "set_len: {:?}", e);
                    PmemError::CannotOpenPmFile
                })?;
                file
            }
            FileOpenBehavior::OpenExisting => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(file_to_map)
                    .map_err(|e| {
                        error!(path = %file_to_map.display(), "open: {:?}", e);
                        PmemError::CannotOpenPmFile
                    })?;

                let actual = file
                    .metadata()
                    .map_err(|e| {
                        error!(path = %file_to_map.display(), "metadata: {:?}", e);
                        PmemError::CannotOpenPmFile
                    })?
                    .len();
                if actual != size {
                    return Err(PmemError::RegionSizeMismatch {
                        expected: size,
                        actual,
                    });
                }
                file
            }
        };

        // SAFETY: the mapping is only reached through this struct. Other
        // processes mapping the same file concurrently are excluded by the
        // single-writer discipline of everything built on top of it.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|e| {
            error!(path = %file_to_map.display(), "mmap: {:?}", e);
            PmemError::CannotOpenPmFile
        })?;

        debug!(path = %file_to_map.display(), size, ?file_open_behavior, "mapped file");
        Ok(Self { mmap })
    }
}

pub struct FileBackedPersistentMemoryRegion {
    mmf: MemoryMappedFile,
}

impl FileBackedPersistentMemoryRegion {
    /// Creates (or truncates) the file at `path`, sizes it to
    /// `region_size` zero bytes and maps it.
    pub fn new(path: impl AsRef<Path>, region_size: u64) -> Result<Self, PmemError> {
        Self::new_internal(path.as_ref(), region_size, FileOpenBehavior::CreateNew)
    }

    /// Maps an existing file, which must be exactly `region_size` bytes.
    pub fn restore(path: impl AsRef<Path>, region_size: u64) -> Result<Self, PmemError> {
        Self::new_internal(path.as_ref(), region_size, FileOpenBehavior::OpenExisting)
    }

    fn new_internal(
        path: &Path,
        region_size: u64,
        open_behavior: FileOpenBehavior,
    ) -> Result<Self, PmemError> {
        let mmf = MemoryMappedFile::from_file(path, region_size, open_behavior)?;
        Ok(Self { mmf })
    }
}

impl PersistentMemoryRegion for FileBackedPersistentMemoryRegion {
    fn get_region_size(&self) -> u64 {
        self.mmf.mmap.len() as u64
    }

    fn read(&self, addr: u64, num_bytes: u64) -> Result<Vec<u8>, PmemError> {
        check_access(addr, num_bytes, self.get_region_size())?;
        let addr_usize = addr as usize;
        Ok(self.mmf.mmap[addr_usize..addr_usize + num_bytes as usize].to_vec())
    }

    fn write(&mut self, addr: u64, bytes: &[u8]) -> Result<(), PmemError> {
        check_access(addr, bytes.len() as u64, self.get_region_size())?;
        let addr_usize = addr as usize;
        self.mmf.mmap[addr_usize..addr_usize + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self, addr: u64, num_bytes: u64) {
        if let Err(e) = self
            .mmf
            .mmap
            .flush_async_range(addr as usize, num_bytes as usize)
        {
            error!(addr, num_bytes, "flush: {:?}", e);
        }
    }

    fn drain(&mut self) {
        if let Err(e) = self.mmf.mmap.flush() {
            error!("drain: {:?}", e);
        }
    }
}
