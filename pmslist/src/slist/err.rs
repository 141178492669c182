use crate::pmem::pmemspec_t::PmemError;
use crate::slist::layout::Offset;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SlistError {
    #[error(transparent)]
    Pmem(#[from] PmemError),
    #[error("region of {region_size} bytes cannot hold a list header and a node")]
    RegionTooSmall { region_size: u64 },
    #[error("offset {offset} does not identify a node inside the region")]
    InvalidNodeOffset { offset: Offset },
    #[error("node {offset} is already the head or tail of the list")]
    AlreadyLinked { offset: Offset },
    #[error("chain starting at {head} does not terminate within {max_nodes} nodes")]
    CorruptChain { head: Offset, max_nodes: u64 },
    #[error("list must be recovered before it is mutated")]
    NotRecovered,
    #[error("last node reached by traversal is {last} but the header's tail is {tail}")]
    TailMismatch { last: Offset, tail: Offset },
}
