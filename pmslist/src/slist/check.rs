//! The consistency property every recovered list satisfies: the last
//! node reached by traversal is the node the header records as `tail`.

use crate::pmem::pmemspec_t::PersistentMemoryRegion;
use crate::slist::err::SlistError;
use crate::slist::node::ListNode;
use crate::slist::slistimpl::SinglyLinkedList;
use tracing::error;

impl<PM, N> SinglyLinkedList<PM, N>
where
    PM: PersistentMemoryRegion,
    N: ListNode,
{
    pub fn check_consistency(&self) -> Result<(), SlistError> {
        let last = self.last()?;
        let tail = self.tail()?;
        if last != tail {
            error!(%last, %tail, "list header disagrees with chain");
            return Err(SlistError::TailMismatch { last, tail });
        }
        Ok(())
    }
}

/// Opens the list stored in `pm`, recovers it if `with_recovery` is set,
/// and checks that traversal ends at the recorded tail.
pub fn check_region_consistency<PM, N>(pm: PM, with_recovery: bool) -> Result<(), SlistError>
where
    PM: PersistentMemoryRegion,
    N: ListNode,
{
    let list = if with_recovery {
        SinglyLinkedList::<PM, N>::recover(pm)?
    } else {
        SinglyLinkedList::<PM, N>::open_without_recovery(pm)?
    };
    list.check_consistency()
}
