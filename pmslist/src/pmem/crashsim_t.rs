//! This file contains `CrashRecordingRegion`, a volatile persistent
//! memory region that records every store and every ordering fence so
//! that tests can reconstruct each state the media could be left in by a
//! crash.
//!
//! Every write is split into store units (8-byte-aligned chunks, see
//! `PM_STORE_UNIT`). A unit is the granularity at which the cache writes
//! back, so the recorded value of a unit is its full content right after
//! the store. `flush` marks the outstanding units it overlaps, and
//! `drain` is a fence: flushed units become durable there, unflushed ones
//! stay outstanding and may still reach the media later (or never).
//!
//! A crash between two fences leaves the media holding everything made
//! durable by earlier fences plus an arbitrary subset of the units that
//! are outstanding at that point. `crash_images` replays the history and
//! yields exactly those states, fence by fence. The outstanding set at a
//! fence contains every store issued since the previous fence, so the
//! subsets taken at the fence also cover crashes in the middle of the
//! epoch.

use crate::pmem::pmemspec_t::{check_access, PersistentMemoryRegion, PmemError, PM_STORE_UNIT};
use rand::Rng;
use std::collections::VecDeque;

/// Above this many outstanding units, a fence's subsets are sampled
/// instead of enumerated.
pub const MAX_EXHAUSTIVE_UNITS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
enum PmEvent {
    Store { addr: u64, bytes: Vec<u8> },
    Flush { addr: u64, num_bytes: u64 },
    Drain,
}

#[derive(Clone, Debug)]
struct OutstandingStore {
    addr: u64,
    bytes: Vec<u8>,
    flushed: bool,
}

impl OutstandingStore {
    fn overlaps(&self, addr: u64, num_bytes: u64) -> bool {
        let end = addr.saturating_add(num_bytes);
        self.addr < end && addr < self.addr + self.bytes.len() as u64
    }

    fn apply(&self, image: &mut [u8]) {
        let start = self.addr as usize;
        image[start..start + self.bytes.len()].copy_from_slice(&self.bytes);
    }
}

/// One possible post-crash state of the media.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrashImage {
    /// Number of fences that completed before the crash.
    pub fence: usize,
    /// Which outstanding units made it to the media, in issue order.
    pub survivors: Vec<bool>,
    pub image: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct CrashRecordingRegion {
    initial: Vec<u8>,
    contents: Vec<u8>,
    events: Vec<PmEvent>,
}

impl CrashRecordingRegion {
    pub fn new(region_size: u64) -> Self {
        Self::from_image(vec![0; region_size as usize])
    }

    /// Starts recording on top of `image`, which is taken to be durable.
    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            initial: image.clone(),
            contents: image,
            events: Vec::new(),
        }
    }

    /// Treats the current contents as durable and forgets the history,
    /// so that crash images only cover what happens from now on.
    pub fn reset_history(&mut self) {
        self.initial = self.contents.clone();
        self.events.clear();
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn num_stores(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, PmEvent::Store { .. }))
            .count()
    }

    pub fn num_fences(&self) -> usize {
        self.events.iter().filter(|e| **e == PmEvent::Drain).count()
    }

    /// Returns the state the media would be in if the machine crashed
    /// right now and none of the outstanding units had been written back.
    pub fn durable_image(&self) -> Vec<u8> {
        let mut replay = Replay::new(&self.initial);
        for event in &self.events {
            replay.step(event);
        }
        replay.durable
    }

    /// Iterates over every crash image of the recorded history. At a fence
    /// with at most `MAX_EXHAUSTIVE_UNITS` outstanding units every subset
    /// is produced; otherwise the empty set, the full set and
    /// `max_sampled_per_fence` subsets drawn from `rng` are produced.
    pub fn crash_images<'a, R: Rng>(
        &'a self,
        max_sampled_per_fence: usize,
        rng: &'a mut R,
    ) -> CrashImages<'a, R> {
        CrashImages {
            events: &self.events,
            next_event: 0,
            replay: Replay::new(&self.initial),
            fence: 0,
            finished: false,
            pending: VecDeque::new(),
            max_sampled_per_fence,
            rng,
        }
    }

    fn record_store(&mut self, addr: u64, num_bytes: u64) {
        let region_size = self.contents.len() as u64;
        let end = addr + num_bytes;
        let mut unit = addr - addr % PM_STORE_UNIT;
        while unit < end {
            let unit_end = (unit + PM_STORE_UNIT).min(region_size);
            self.events.push(PmEvent::Store {
                addr: unit,
                bytes: self.contents[unit as usize..unit_end as usize].to_vec(),
            });
            unit += PM_STORE_UNIT;
        }
    }
}

impl PersistentMemoryRegion for CrashRecordingRegion {
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
        self.record_store(addr, bytes.len() as u64);
        Ok(())
    }

    fn flush(&mut self, addr: u64, num_bytes: u64) {
        self.events.push(PmEvent::Flush { addr, num_bytes });
    }

    fn drain(&mut self) {
        self.events.push(PmEvent::Drain);
    }
}

struct Replay {
    durable: Vec<u8>,
    outstanding: Vec<OutstandingStore>,
}

impl Replay {
    fn new(initial: &[u8]) -> Self {
        Self {
            durable: initial.to_vec(),
            outstanding: Vec::new(),
        }
    }

    fn step(&mut self, event: &PmEvent) {
        match event {
            PmEvent::Store { addr, bytes } => self.outstanding.push(OutstandingStore {
                addr: *addr,
                bytes: bytes.clone(),
                flushed: false,
            }),
            PmEvent::Flush { addr, num_bytes } => {
                for store in self.outstanding.iter_mut() {
                    if store.overlaps(*addr, *num_bytes) {
                        store.flushed = true;
                    }
                }
            }
            PmEvent::Drain => {
                let (flushed, unflushed): (Vec<_>, Vec<_>) =
                    self.outstanding.drain(..).partition(|s| s.flushed);
                for store in &flushed {
                    store.apply(&mut self.durable);
                }
                self.outstanding = unflushed;
            }
        }
    }

    fn image_with(&self, survivors: &[bool]) -> Vec<u8> {
        let mut image = self.durable.clone();
        for (store, survived) in self.outstanding.iter().zip(survivors) {
            if *survived {
                store.apply(&mut image);
            }
        }
        image
    }
}

pub struct CrashImages<'a, R: Rng> {
    events: &'a [PmEvent],
    next_event: usize,
    replay: Replay,
    fence: usize,
    finished: bool,
    pending: VecDeque<CrashImage>,
    max_sampled_per_fence: usize,
    rng: &'a mut R,
}

impl<'a, R: Rng> CrashImages<'a, R> {
    // Queues the crash images for the current outstanding set.
    fn enqueue_crash_point(&mut self) {
        let n = self.replay.outstanding.len();
        let survivor_sets: Vec<Vec<bool>> = if n <= MAX_EXHAUSTIVE_UNITS {
            (0..1u32 << n)
                .map(|mask| (0..n).map(|i| mask & (1 << i) != 0).collect())
                .collect()
        } else {
            let mut sets = vec![vec![false; n], vec![true; n]];
            for _ in 0..self.max_sampled_per_fence {
                sets.push((0..n).map(|_| self.rng.gen::<bool>()).collect());
            }
            sets
        };
        for survivors in survivor_sets {
            let image = self.replay.image_with(&survivors);
            self.pending.push_back(CrashImage {
                fence: self.fence,
                survivors,
                image,
            });
        }
    }
}

impl<'a, R: Rng> Iterator for CrashImages<'a, R> {
    type Item = CrashImage;

    fn next(&mut self) -> Option<CrashImage> {
        loop {
            if let Some(image) = self.pending.pop_front() {
                return Some(image);
            }
            if self.finished {
                return None;
            }
            let events = self.events;
            match events.get(self.next_event) {
                Some(event) => {
                    self.next_event += 1;
                    if *event == PmEvent::Drain {
                        self.enqueue_crash_point();
                        self.fence += 1;
                    }
                    self.replay.step(event);
                }
                None => {
                    // Crash after the last recorded fence.
                    self.enqueue_crash_point();
                    self.finished = true;
                }
            }
        }
    }
}
