use crate::pmem::pmemspec_t::PersistentMemoryRegion;
use crate::slist::err::SlistError;
use crate::slist::layout::Offset;
use crate::slist::node::ListNode;
use crate::slist::runtime::SlistRuntime;
use crate::slist::slistimpl::SinglyLinkedList;
use core::marker::PhantomData;

/// Forward iterator over the node offsets of a list, from `head` to the
/// terminal node. It reads only the `next` links, so it is safe to use on
/// a list that has not been recovered yet.
///
/// A chain that leaves the region or is longer than the number of
/// distinct node positions (which only a corrupted region can produce)
/// yields one error and then stops.
pub struct SlistIter<'a, PM, N> {
    runtime: &'a SlistRuntime<PM>,
    head: Offset,
    current: Offset,
    remaining: u64,
    done: bool,
    header_error: Option<SlistError>,
    _node: PhantomData<N>,
}

impl<'a, PM, N> Iterator for SlistIter<'a, PM, N>
where
    PM: PersistentMemoryRegion,
    N: ListNode,
{
    type Item = Result<Offset, SlistError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.header_error.take() {
            self.done = true;
            return Some(Err(e));
        }
        if self.done || !self.current.is_valid() {
            return None;
        }
        if self.remaining == 0 {
            self.done = true;
            return Some(Err(SlistError::CorruptChain {
                head: self.head,
                max_nodes: self.runtime.max_nodes::<N>(),
            }));
        }
        self.remaining -= 1;

        match self.runtime.read_next::<N>(self.current) {
            Ok(next) => {
                let here = self.current;
                self.current = next;
                Some(Ok(here))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<PM, N> SinglyLinkedList<PM, N>
where
    PM: PersistentMemoryRegion,
    N: ListNode,
{
    /// Starts a fresh traversal from the current head.
    pub fn iter(&self) -> SlistIter<'_, PM, N> {
        let (head, header_error) = match self.runtime.read_header() {
            Ok(header) => (header.head, None),
            Err(e) => (Offset::INVALID, Some(e)),
        };
        SlistIter {
            runtime: &self.runtime,
            head,
            current: head,
            remaining: self.runtime.max_nodes::<N>(),
            done: false,
            header_error,
            _node: PhantomData,
        }
    }

    pub fn offsets(&self) -> Result<Vec<Offset>, SlistError> {
        self.iter().collect()
    }

    /// Offset of the last node reached by traversal, or `Offset::INVALID`
    /// for an empty list.
    pub fn last(&self) -> Result<Offset, SlistError> {
        let mut last = Offset::INVALID;
        for offset in self.iter() {
            last = offset?;
        }
        Ok(last)
    }
}

impl<'a, PM, N> IntoIterator for &'a SinglyLinkedList<PM, N>
where
    PM: PersistentMemoryRegion,
    N: ListNode,
{
    type Item = Result<Offset, SlistError>;
    type IntoIter = SlistIter<'a, PM, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmem::pmcopy_t::PmSafe;
    use crate::pmem::pmemmock_t::VolatileMemoryMockingPersistentMemoryRegion;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PmSafe, ListNode)]
    struct Link {
        #[list_next]
        next: Offset,
    }

    type List = SinglyLinkedList<VolatileMemoryMockingPersistentMemoryRegion, Link>;

    #[test]
    fn iteration_is_restartable() {
        let mut list = List::init(VolatileMemoryMockingPersistentMemoryRegion::new(64)).unwrap();
        list.insert_tail(Offset::new(0)).unwrap();
        list.insert_tail(Offset::new(8)).unwrap();

        let mut first = list.iter();
        assert_eq!(first.next(), Some(Ok(Offset::new(0))));
        let all: Vec<Offset> = (&list).into_iter().map(Result::unwrap).collect();
        assert_eq!(all, vec![Offset::new(0), Offset::new(8)]);
        assert_eq!(first.next(), Some(Ok(Offset::new(8))));
        assert_eq!(first.next(), None);
        assert_eq!(list.last().unwrap(), Offset::new(8));
    }

    #[test]
    fn cyclic_chain_is_reported() {
        let mut list = List::init(VolatileMemoryMockingPersistentMemoryRegion::new(64)).unwrap();
        list.insert_tail(Offset::new(0)).unwrap();
        list.insert_tail(Offset::new(8)).unwrap();
        // Corrupt the chain behind the list's back.
        list.runtime
            .write_next::<Link>(Offset::new(8), Offset::new(0))
            .unwrap();

        let results: Vec<_> = list.iter().collect();
        assert_eq!(results.len() as u64, list.runtime.max_nodes::<Link>() + 1);
        assert_eq!(
            results.last(),
            Some(&Err(SlistError::CorruptChain {
                head: Offset::new(0),
                max_nodes: 41
            }))
        );
    }

    #[test]
    fn link_out_of_region_is_reported() {
        let mut list = List::init(VolatileMemoryMockingPersistentMemoryRegion::new(64)).unwrap();
        list.insert_tail(Offset::new(0)).unwrap();
        list.runtime
            .write_next::<Link>(Offset::new(0), Offset::new(1000))
            .unwrap();
        assert_eq!(
            list.offsets(),
            Err(SlistError::InvalidNodeOffset {
                offset: Offset::new(1000)
            })
        );
    }
}
