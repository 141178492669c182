//! Mutation protocols of the persistent singly-linked list.
//!
//! Every mutation is a short sequence of stores separated by `persist`
//! barriers. The chain of `next` links is always durable before anything
//! that points into it is published, so a crash at any point leaves a
//! chain that is acyclic and correctly terminated. The only field a crash
//! can leave stale is `tail`, which recovery re-derives (see recover.rs).
//!
//! A single mutator is assumed. Mutations take `&mut self`, which rules
//! out concurrent mutation through one handle; coordinating several
//! processes that map the same region is up to the caller.

use crate::pmem::pmemspec_t::PersistentMemoryRegion;
use crate::slist::err::SlistError;
use crate::slist::layout::{ListHeader, Offset};
use crate::slist::node::ListNode;
use crate::slist::runtime::SlistRuntime;
use core::marker::PhantomData;
use tracing::{debug, info};

pub struct SinglyLinkedList<PM, N> {
    pub(super) runtime: SlistRuntime<PM>,
    pub(super) recovered: bool,
    pub(super) _node: PhantomData<N>,
}

impl<PM, N> SinglyLinkedList<PM, N>
where
    PM: PersistentMemoryRegion,
    N: ListNode,
{
    /// Lays out an empty list on a freshly created region. This must only
    /// be called once per region; on a region that may hold a list, use
    /// `recover` instead.
    pub fn init(pm: PM) -> Result<Self, SlistError> {
        let mut runtime = SlistRuntime::new(pm)?;
        runtime.write_header(&ListHeader::EMPTY)?;
        runtime.persist_header();
        info!(base = runtime.base(), "initialized empty list");
        Ok(Self {
            runtime,
            recovered: true,
            _node: PhantomData,
        })
    }

    /// Links the node at `offset` in front of the current head. The node
    /// must already hold its payload and must not be linked anywhere.
    pub fn insert_head(&mut self, offset: Offset) -> Result<(), SlistError> {
        self.check_mutable()?;
        self.runtime.node_addr::<N>(offset)?;
        let header = self.runtime.read_header()?;
        check_unlinked(&header, offset)?;

        debug!(%offset, old_head = %header.head, "insert head");
        self.runtime.write_next::<N>(offset, header.head)?;
        // From here on the node is self-consistent whatever happens to
        // the header.
        self.runtime.persist_node::<N>(offset)?;

        self.runtime.write_head(offset)?;
        if !header.tail.is_valid() {
            self.runtime.write_tail(offset)?;
        }
        self.runtime.persist_header();
        Ok(())
    }

    /// Links the node at `offset` after the current tail. The node must
    /// already hold its payload and must not be linked anywhere.
    pub fn insert_tail(&mut self, offset: Offset) -> Result<(), SlistError> {
        self.check_mutable()?;
        self.runtime.node_addr::<N>(offset)?;
        let header = self.runtime.read_header()?;
        check_unlinked(&header, offset)?;

        debug!(%offset, old_tail = %header.tail, "insert tail");
        self.runtime.write_next::<N>(offset, Offset::INVALID)?;
        self.runtime.persist_node::<N>(offset)?;

        if header.is_empty() {
            self.runtime.write_head(offset)?;
        } else {
            // The chain must reach the new node before the header names it
            // as the tail. A crash in between leaves a stale tail, which
            // recovery repairs.
            self.runtime.write_next::<N>(header.tail, offset)?;
            self.runtime.persist_node::<N>(header.tail)?;
        }

        self.runtime.write_tail(offset)?;
        self.runtime.persist_header();
        Ok(())
    }

    /// Unlinks the head node and returns its offset, or `None` if the list
    /// is empty. The removed node's content is left untouched and its
    /// storage is handed back to the caller.
    pub fn remove_head(&mut self) -> Result<Option<Offset>, SlistError> {
        self.check_mutable()?;
        let header = self.runtime.read_header()?;
        if header.is_empty() {
            debug!("remove head on empty list");
            return Ok(None);
        }

        let new_head = self.runtime.read_next::<N>(header.head)?;
        debug!(removed = %header.head, %new_head, "remove head");
        self.runtime.write_head(new_head)?;
        if header.head == header.tail {
            self.runtime.write_tail(Offset::INVALID)?;
        }
        self.runtime.persist_header();
        Ok(Some(header.head))
    }

    pub fn header(&self) -> Result<ListHeader, SlistError> {
        self.runtime.read_header()
    }

    pub fn head(&self) -> Result<Offset, SlistError> {
        Ok(self.runtime.read_header()?.head)
    }

    pub fn tail(&self) -> Result<Offset, SlistError> {
        Ok(self.runtime.read_header()?.tail)
    }

    pub fn is_empty(&self) -> Result<bool, SlistError> {
        Ok(self.runtime.read_header()?.is_empty())
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    pub fn read_node(&self, offset: Offset) -> Result<N, SlistError> {
        self.runtime.read_node::<N>(offset)
    }

    /// Writes a node's content without persisting it. Inserting the node
    /// persists it before it becomes reachable.
    pub fn write_node(&mut self, offset: Offset, node: &N) -> Result<(), SlistError> {
        self.runtime.write_node(offset, node)
    }

    pub fn runtime(&self) -> &SlistRuntime<PM> {
        &self.runtime
    }

    pub fn into_region(self) -> PM {
        self.runtime.into_region()
    }

    fn check_mutable(&self) -> Result<(), SlistError> {
        if self.recovered {
            Ok(())
        } else {
            Err(SlistError::NotRecovered)
        }
    }
}

// Relinking the head or tail would persist a cycle or orphan the rest of
// the chain. Nodes in the middle of the chain are not detected.
fn check_unlinked(header: &ListHeader, offset: Offset) -> Result<(), SlistError> {
    if !header.is_empty() && (offset == header.head || offset == header.tail) {
        return Err(SlistError::AlreadyLinked { offset });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmem::pmcopy_t::PmSafe;
    use crate::pmem::pmemmock_t::VolatileMemoryMockingPersistentMemoryRegion;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, PmSafe, ListNode)]
    struct Item {
        value: u64,
        #[list_next]
        next: Offset,
    }

    const ITEM: u64 = 16;

    type List = SinglyLinkedList<VolatileMemoryMockingPersistentMemoryRegion, Item>;

    fn new_list() -> List {
        List::init(VolatileMemoryMockingPersistentMemoryRegion::new(16 + 16 * ITEM)).unwrap()
    }

    fn at(i: u64) -> Offset {
        Offset::new(i * ITEM)
    }

    fn offsets(list: &List) -> Vec<Offset> {
        list.offsets().unwrap()
    }

    #[test]
    fn init_yields_empty_list() {
        let list = new_list();
        assert_eq!(list.header().unwrap(), ListHeader::EMPTY);
        assert!(list.is_empty().unwrap());
        assert!(offsets(&list).is_empty());
    }

    #[test]
    fn head_inserts_reverse_order() {
        let mut list = new_list();
        for i in 0..4 {
            list.insert_head(at(i)).unwrap();
        }
        assert_eq!(offsets(&list), vec![at(3), at(2), at(1), at(0)]);
        assert_eq!(list.head().unwrap(), at(3));
        assert_eq!(list.tail().unwrap(), at(0));
    }

    #[test]
    fn tail_inserts_append() {
        let mut list = new_list();
        for i in 0..4 {
            list.insert_tail(at(i)).unwrap();
        }
        assert_eq!(offsets(&list), vec![at(0), at(1), at(2), at(3)]);
        assert_eq!(list.tail().unwrap(), at(3));
    }

    #[test]
    fn mixed_inserts_scenario() {
        let (a, b, c) = (at(0), at(1), at(2));
        let mut list = new_list();
        list.insert_tail(a).unwrap();
        list.insert_tail(b).unwrap();
        list.insert_head(c).unwrap();
        assert_eq!(offsets(&list), vec![c, a, b]);
        assert_eq!(list.tail().unwrap(), b);
    }

    #[test]
    fn payload_survives_linking() {
        let mut list = new_list();
        list.write_node(at(5), &Item { value: 55, next: Offset::new(0xDEAD) })
            .unwrap();
        list.insert_tail(at(5)).unwrap();
        assert_eq!(
            list.read_node(at(5)).unwrap(),
            Item {
                value: 55,
                next: Offset::INVALID
            }
        );
    }

    #[test]
    fn removing_sole_element_empties_list() {
        let mut list = new_list();
        list.insert_tail(at(1)).unwrap();
        assert_eq!(list.remove_head().unwrap(), Some(at(1)));
        assert_eq!(list.header().unwrap(), ListHeader::EMPTY);
    }

    #[test]
    fn removing_head_preserves_tail() {
        let mut list = new_list();
        list.insert_tail(at(1)).unwrap();
        list.insert_tail(at(2)).unwrap();
        list.insert_tail(at(3)).unwrap();
        assert_eq!(list.remove_head().unwrap(), Some(at(1)));
        assert_eq!(list.head().unwrap(), at(2));
        assert_eq!(list.tail().unwrap(), at(3));
        assert_eq!(offsets(&list), vec![at(2), at(3)]);
    }

    #[test]
    fn remove_head_on_empty_list_is_a_no_op() {
        let mut list = new_list();
        assert_eq!(list.remove_head().unwrap(), None);
        assert_eq!(list.header().unwrap(), ListHeader::EMPTY);
    }

    #[test]
    fn removed_node_is_not_erased() {
        let mut list = new_list();
        list.write_node(at(0), &Item { value: 7, next: Offset::INVALID })
            .unwrap();
        list.insert_tail(at(0)).unwrap();
        list.insert_tail(at(1)).unwrap();
        list.remove_head().unwrap();
        let removed = list.read_node(at(0)).unwrap();
        assert_eq!(removed.value, 7);
        assert_eq!(removed.next, at(1));
    }

    #[test]
    fn relinking_after_drain_to_empty() {
        let mut list = new_list();
        list.insert_head(at(0)).unwrap();
        list.remove_head().unwrap();
        list.insert_head(at(1)).unwrap();
        assert_eq!(list.header().unwrap(), ListHeader { head: at(1), tail: at(1) });
        list.insert_tail(at(2)).unwrap();
        assert_eq!(offsets(&list), vec![at(1), at(2)]);
    }

    #[test]
    fn invalid_offsets_are_rejected_before_any_store() {
        let mut list = new_list();
        assert_eq!(
            list.insert_head(Offset::INVALID),
            Err(SlistError::InvalidNodeOffset {
                offset: Offset::INVALID
            })
        );
        assert!(list.insert_tail(at(16)).is_err());
        assert_eq!(list.header().unwrap(), ListHeader::EMPTY);
    }

    #[test]
    fn relinking_head_or_tail_is_rejected() {
        let (a, b) = (at(0), at(1));
        let mut list = new_list();
        list.insert_tail(a).unwrap();
        list.insert_tail(b).unwrap();
        let before = list.header().unwrap();

        for offset in [a, b] {
            assert_eq!(list.insert_tail(offset), Err(SlistError::AlreadyLinked { offset }));
            assert_eq!(list.insert_head(offset), Err(SlistError::AlreadyLinked { offset }));
        }
        assert_eq!(list.header().unwrap(), before);
        assert_eq!(list.read_node(b).unwrap().next, Offset::INVALID);
        assert_eq!(offsets(&list), vec![a, b]);

        let pm = list.into_region();
        let list = List::recover(pm).unwrap();
        assert_eq!(offsets(&list), vec![a, b]);
    }
}
