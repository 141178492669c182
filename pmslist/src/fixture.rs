//! Randomized workloads for exercising a list: a node type, a random
//! command sequence and a shuffled set of node offsets. The random
//! source is always passed in so that a run can be reproduced from its
//! seed.

use crate::pmem::pmcopy_t::{PmCopy, PmSafe};
use crate::pmem::pmemspec_t::PersistentMemoryRegion;
use crate::slist::{ListNode, Offset, SinglyLinkedList, SlistError, NODE_AREA_START};
use rand::seq::SliceRandom;
use rand::Rng;

/// Node used by the integrity workloads. Its only field is the link;
/// a node that was never linked carries a recognizable garbage value.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PmSafe, ListNode)]
pub struct FixtureNode {
    #[list_next]
    pub next: Offset,
}

impl Default for FixtureNode {
    fn default() -> Self {
        Self {
            next: Offset::new(0xDEAD),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    InsertHead,
    InsertTail,
    RemoveHead,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::InsertHead, Command::InsertTail, Command::RemoveHead];

    /// Applies the command. `offset` is the node to link for inserts and
    /// is ignored by `RemoveHead`.
    pub fn apply<PM, N>(
        self,
        list: &mut SinglyLinkedList<PM, N>,
        offset: Offset,
    ) -> Result<(), SlistError>
    where
        PM: PersistentMemoryRegion,
        N: ListNode,
    {
        match self {
            Command::InsertHead => list.insert_head(offset),
            Command::InsertTail => list.insert_tail(offset),
            Command::RemoveHead => list.remove_head().map(|_| ()),
        }
    }
}

pub fn generate_commands<R: Rng + ?Sized>(number_of_commands: usize, rng: &mut R) -> Vec<Command> {
    (0..number_of_commands)
        .map(|_| Command::ALL[rng.gen_range(0..Command::ALL.len())])
        .collect()
}

/// Returns `number_of_values` distinct, non-overlapping node offsets
/// packed from offset 0, in random order.
pub fn generate_offsets<N: PmCopy, R: Rng + ?Sized>(
    number_of_values: usize,
    rng: &mut R,
) -> Vec<Offset> {
    let mut offsets: Vec<Offset> = (0..number_of_values as u64)
        .map(|i| Offset::new(i * N::size_of()))
        .collect();
    offsets.shuffle(rng);
    offsets
}

/// Size of a region that holds a list header and `number_of_nodes` nodes.
pub fn region_size_for<N: PmCopy>(number_of_nodes: u64) -> u64 {
    NODE_AREA_START + number_of_nodes * N::size_of()
}

/// Runs `commands` against `list`, pairing the i-th command with the
/// i-th offset.
pub fn run_commands<PM, N>(
    list: &mut SinglyLinkedList<PM, N>,
    commands: &[Command],
    offsets: &[Offset],
) -> Result<(), SlistError>
where
    PM: PersistentMemoryRegion,
    N: ListNode,
{
    for (command, offset) in commands.iter().zip(offsets) {
        command.apply(list, *offset)?;
    }
    Ok(())
}
