#[cfg(test)]
extern crate proptest;
use crate::fixture::{generate_offsets, region_size_for, Command, FixtureNode};
use crate::pmem::pmemmock_t::VolatileMemoryMockingPersistentMemoryRegion;
use crate::slist::{Offset, SinglyLinkedList};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;

type Pm = VolatileMemoryMockingPersistentMemoryRegion;

fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::InsertHead),
        Just(Command::InsertTail),
        Just(Command::RemoveHead),
    ]
}

// Mirrors a command on a volatile deque of offsets.
fn apply_to_model(model: &mut VecDeque<Offset>, command: Command, offset: Offset) {
    match command {
        Command::InsertHead => model.push_front(offset),
        Command::InsertTail => model.push_back(offset),
        Command::RemoveHead => {
            model.pop_front();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Runs a random command sequence against both the persistent list and a
    /// deque, and checks after every step that traversal order, head and tail
    /// agree with the deque.
    #[test]
    fn list_matches_deque_model(commands in prop::collection::vec(command_strategy(), 0..64),
                                seed in any::<u64>()) {
        let offsets = generate_offsets::<FixtureNode, _>(commands.len(), &mut StdRng::seed_from_u64(seed));
        let pm = Pm::new(region_size_for::<FixtureNode>(commands.len() as u64));
        let mut list = SinglyLinkedList::<Pm, FixtureNode>::init(pm).unwrap();
        let mut model = VecDeque::new();

        for (command, offset) in commands.iter().zip(&offsets) {
            let removed_expected = model.front().copied();
            apply_to_model(&mut model, *command, *offset);
            if *command == Command::RemoveHead {
                prop_assert_eq!(list.remove_head().unwrap(), removed_expected);
            } else {
                command.apply(&mut list, *offset).unwrap();
            }

            let expected: Vec<Offset> = model.iter().copied().collect();
            prop_assert_eq!(list.offsets().unwrap(), expected);
            prop_assert_eq!(list.head().unwrap(), model.front().copied().unwrap_or(Offset::INVALID));
            prop_assert_eq!(list.tail().unwrap(), model.back().copied().unwrap_or(Offset::INVALID));
            prop_assert!(list.check_consistency().is_ok());
        }
    }

    /// Recovery rewrites the same tail no matter how many times it runs.
    #[test]
    fn recovery_is_idempotent(commands in prop::collection::vec(command_strategy(), 0..32),
                              seed in any::<u64>(),
                              stale_tail in any::<u64>()) {
        let offsets = generate_offsets::<FixtureNode, _>(commands.len(), &mut StdRng::seed_from_u64(seed));
        let mut pm = Pm::new(region_size_for::<FixtureNode>(commands.len() as u64));
        {
            let mut list = SinglyLinkedList::<&mut Pm, FixtureNode>::init(&mut pm).unwrap();
            for (command, offset) in commands.iter().zip(&offsets) {
                command.apply(&mut list, *offset).unwrap();
            }
            // Recovery must not depend on what the tail says.
            list.runtime.write_tail(Offset::new(stale_tail)).unwrap();
        }

        let mut list = SinglyLinkedList::<Pm, FixtureNode>::recover(pm).unwrap();
        let once = list.header().unwrap();
        let again = list.recover_tail().unwrap();
        prop_assert_eq!(once.tail, again);
        prop_assert_eq!(list.header().unwrap(), once);
        prop_assert_eq!(list.last().unwrap(), once.tail);
    }
}
