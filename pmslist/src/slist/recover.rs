//! Opening a list on a region that may not have been closed cleanly.
//!
//! Of the three mutations only `insert_tail` can leave the header
//! behind the chain: a crash after the old tail was linked to the new
//! node but before `tail` was published leaves `tail` naming the
//! second-to-last node. Head inserts and removals publish both header
//! fields under the same barrier, and any partial header write they leave
//! is again only wrong in `tail`. The `next` chain itself is always
//! acyclic and terminated, so recovery walks it from `head` and rewrites
//! `tail` from what it finds.

use crate::pmem::pmemspec_t::PersistentMemoryRegion;
use crate::slist::err::SlistError;
use crate::slist::layout::Offset;
use crate::slist::node::ListNode;
use crate::slist::runtime::SlistRuntime;
use crate::slist::slistimpl::SinglyLinkedList;
use core::marker::PhantomData;
use tracing::{info, warn};

impl<PM, N> SinglyLinkedList<PM, N>
where
    PM: PersistentMemoryRegion,
    N: ListNode,
{
    /// Opens an existing list and repairs its header. Must be called
    /// before the first mutation on any region that was not initialized
    /// by this process.
    pub fn recover(pm: PM) -> Result<Self, SlistError> {
        let mut list = Self::open_without_recovery(pm)?;
        list.recover_tail()?;
        Ok(list)
    }

    /// Opens an existing list as it is on the media. The list can be
    /// traversed, but mutations fail with `SlistError::NotRecovered` until
    /// `recover_tail` has run.
    pub fn open_without_recovery(pm: PM) -> Result<Self, SlistError> {
        let runtime = SlistRuntime::new(pm)?;
        Ok(Self {
            runtime,
            recovered: false,
            _node: PhantomData,
        })
    }

    /// Re-derives `tail` from the chain reachable from `head` and persists
    /// it. Running it on a consistent list rewrites the same value.
    pub fn recover_tail(&mut self) -> Result<Offset, SlistError> {
        let mut tail = Offset::INVALID;
        for offset in self.iter() {
            tail = offset?;
        }

        let recorded = self.runtime.read_header()?.tail;
        if recorded != tail {
            warn!(%recorded, recovered = %tail, "list tail was stale");
        }

        self.runtime.write_tail(tail)?;
        self.runtime.persist_header();
        self.recovered = true;
        info!(%tail, "recovered list");
        Ok(tail)
    }
}
