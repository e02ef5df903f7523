#![cfg(test)]

// Property tests for SharedPtr/WeakPtr kept inside the crate so they can
// observe the per-thread live-block count.

use crate::control_block::live_blocks;
use crate::{make_shared, SharedPtr, WeakPtr};
use proptest::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

// Object that records its own destruction.
struct Tracked {
    id: usize,
    drops: Rc<Vec<Cell<u32>>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        let c = &self.drops[self.id];
        c.set(c.get() + 1);
    }
}

// Slot-indexed operations: indices are reduced modulo the current pool
// length so shrinking stays meaningful.
#[derive(Clone, Debug)]
enum Op {
    MakeShared,
    FromBox,
    Clone(usize),
    CloneFrom(usize, usize),
    Take(usize),
    Reset(usize),
    Drop(usize),
    Downgrade(usize),
    WeakClone(usize),
    WeakAssignShared(usize, usize),
    WeakReset(usize),
    WeakDrop(usize),
    Lock(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::MakeShared),
        Just(Op::FromBox),
        any::<usize>().prop_map(Op::Clone),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::CloneFrom(a, b)),
        any::<usize>().prop_map(Op::Take),
        any::<usize>().prop_map(Op::Reset),
        any::<usize>().prop_map(Op::Drop),
        any::<usize>().prop_map(Op::Downgrade),
        any::<usize>().prop_map(Op::WeakClone),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::WeakAssignShared(a, b)),
        any::<usize>().prop_map(Op::WeakReset),
        any::<usize>().prop_map(Op::WeakDrop),
        any::<usize>().prop_map(Op::Lock),
    ]
}

const MAX_OBJECTS: usize = 16;

// Which object a pointer refers to, if any.
fn id_of(p: &SharedPtr<Tracked>) -> Option<usize> {
    p.get().map(|t| t.id)
}

// Property: counts and destruction match a model of outstanding handles.
// Invariants checked after every step:
// - use_count() on any shared pointer equals the number of live shared
//   pointers to its object; weak_count() likewise for weak pointers.
// - An object has been dropped exactly once iff no shared pointer to it
//   remains, and never more than once.
// - A weak pointer is expired iff its object has no shared pointers.
// - The number of live blocks equals the number of objects that still have
//   a shared or a weak pointer.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_counts_match_model(ops in proptest::collection::vec(arb_op(), 1..80)) {
        let blocks_at_start = live_blocks::count();
        let drops: Rc<Vec<Cell<u32>>> = Rc::new((0..MAX_OBJECTS).map(|_| Cell::new(0)).collect());
        let mut next_id = 0usize;
        let mut shared: Vec<SharedPtr<Tracked>> = Vec::new();
        // Weak pointers remember which object they were attached to.
        let mut weak: Vec<(WeakPtr<Tracked>, Option<usize>)> = Vec::new();

        for op in ops {
            match op {
                Op::MakeShared | Op::FromBox => {
                    if next_id < MAX_OBJECTS {
                        let t = Tracked { id: next_id, drops: drops.clone() };
                        next_id += 1;
                        let p = if matches!(op, Op::MakeShared) {
                            make_shared(t)
                        } else {
                            SharedPtr::from_box(Box::new(t))
                        };
                        shared.push(p);
                    }
                }
                Op::Clone(i) => {
                    if !shared.is_empty() {
                        let c = shared[i % shared.len()].clone();
                        shared.push(c);
                    }
                }
                Op::CloneFrom(i, j) => {
                    if !shared.is_empty() {
                        let n = shared.len();
                        let src = shared[j % n].clone();
                        shared[i % n].clone_from(&src);
                    }
                }
                Op::Take(i) => {
                    if !shared.is_empty() {
                        let n = shared.len();
                        let moved = shared[i % n].take();
                        prop_assert!(shared[i % n].is_empty());
                        shared.push(moved);
                    }
                }
                Op::Reset(i) => {
                    if !shared.is_empty() {
                        let n = shared.len();
                        shared[i % n].reset();
                    }
                }
                Op::Drop(i) => {
                    if !shared.is_empty() {
                        let n = shared.len();
                        drop(shared.swap_remove(i % n));
                    }
                }
                Op::Downgrade(i) => {
                    if !shared.is_empty() {
                        let p = &shared[i % shared.len()];
                        weak.push((p.downgrade(), id_of(p)));
                    }
                }
                Op::WeakClone(i) => {
                    if !weak.is_empty() {
                        let (w, id) = &weak[i % weak.len()];
                        let c = (w.clone(), *id);
                        weak.push(c);
                    }
                }
                Op::WeakAssignShared(i, j) => {
                    if !weak.is_empty() && !shared.is_empty() {
                        let wi = i % weak.len();
                        let p = &shared[j % shared.len()];
                        weak[wi].0.assign_shared(p);
                        weak[wi].1 = id_of(p);
                    }
                }
                Op::WeakReset(i) => {
                    if !weak.is_empty() {
                        let wi = i % weak.len();
                        weak[wi].0.reset();
                        weak[wi].1 = None;
                    }
                }
                Op::WeakDrop(i) => {
                    if !weak.is_empty() {
                        let wi = i % weak.len();
                        drop(weak.swap_remove(wi));
                    }
                }
                Op::Lock(i) => {
                    if !weak.is_empty() {
                        let (w, id) = &weak[i % weak.len()];
                        let before = w.use_count();
                        let p = w.lock();
                        if before > 0 {
                            prop_assert_eq!(p.use_count(), before + 1);
                            prop_assert_eq!(id_of(&p), *id);
                        } else {
                            prop_assert!(p.is_empty());
                        }
                        shared.push(p);
                    }
                }
            }

            // Model the outstanding handles per object.
            let mut strong = vec![0usize; MAX_OBJECTS];
            let mut observers = vec![0usize; MAX_OBJECTS];
            for p in &shared {
                if let Some(id) = id_of(p) {
                    strong[id] += 1;
                }
            }
            for (_, id) in &weak {
                if let Some(id) = id {
                    observers[*id] += 1;
                }
            }

            for p in &shared {
                match id_of(p) {
                    Some(id) => {
                        prop_assert_eq!(p.use_count(), strong[id]);
                        prop_assert_eq!(p.weak_count(), observers[id]);
                    }
                    None => prop_assert_eq!(p.use_count(), 0),
                }
            }
            for (w, id) in &weak {
                match id {
                    Some(id) => {
                        prop_assert_eq!(w.use_count(), strong[*id]);
                        prop_assert_eq!(w.expired(), strong[*id] == 0);
                        prop_assert_eq!(w.weak_count(), observers[*id]);
                    }
                    None => prop_assert!(w.expired()),
                }
            }
            let mut live = 0isize;
            for id in 0..next_id {
                let expected_drops = if strong[id] == 0 { 1 } else { 0 };
                prop_assert_eq!(drops[id].get(), expected_drops);
                if strong[id] + observers[id] > 0 {
                    live += 1;
                }
            }
            prop_assert_eq!(live_blocks::count() - blocks_at_start, live);
        }

        drop(shared);
        drop(weak);
        for id in 0..next_id {
            prop_assert_eq!(drops[id].get(), 1);
        }
        prop_assert_eq!(live_blocks::count(), blocks_at_start);
    }
}
