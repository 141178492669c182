//! The contract a persisted record has to satisfy to be linked into a
//! `SinglyLinkedList`.

use crate::pmem::pmcopy_t::PmCopy;
use crate::slist::layout::Offset;

pub use pmsafe::ListNode;

/// A record that can be linked into a persistent singly-linked list.
///
/// The list only ever touches the link: it overwrites the
/// `size_of::<Offset>()` bytes at `NEXT_FIELD_OFFSET` and then persists
/// the whole node. Everything else in the node belongs to the caller.
///
/// Usually derived:
///
/// ```
/// use pmslist::pmem::pmcopy_t::PmSafe;
/// use pmslist::slist::{ListNode, Offset};
///
/// #[repr(C)]
/// #[derive(Clone, Copy, PmSafe, ListNode)]
/// struct Entry {
///     key: u64,
///     #[list_next]
///     next: Offset,
/// }
///
/// assert_eq!(Entry::NEXT_FIELD_OFFSET, 8);
/// ```
pub trait ListNode: PmCopy {
    /// Byte position of the next field from the start of the node.
    const NEXT_FIELD_OFFSET: u64;

    fn next(&self) -> Offset;

    fn set_next(&mut self, next: Offset);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmem::pmcopy_t::PmSafe;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PmSafe, ListNode)]
    struct TwoLinks {
        prev_generation: u64,
        payload: [u8; 16],
        #[list_next]
        next: Offset,
        spare: Offset,
    }

    #[test]
    fn derived_next_field_is_located_by_offset() {
        assert_eq!(TwoLinks::NEXT_FIELD_OFFSET, 24);
        assert_eq!(TwoLinks::size_of(), 40);

        let mut node = TwoLinks {
            prev_generation: 1,
            payload: [0; 16],
            next: Offset::INVALID,
            spare: Offset::new(3),
        };
        node.set_next(Offset::new(80));
        assert_eq!(node.next(), Offset::new(80));
        assert_eq!(node.spare, Offset::new(3));

        let bytes = node.as_bytes();
        let start = TwoLinks::NEXT_FIELD_OFFSET as usize;
        assert_eq!(&bytes[start..start + 8], &80u64.to_ne_bytes());
    }
}
