// SharedPtr behavior through the public API.
//
// Each test states the scenario and the invariant it pins down:
// - use_count equals the number of live SharedPtrs on the block.
// - The object is destroyed exactly once, by the last strong release.
// - Moves transfer ownership without touching counts.
// - Empty pointers never dereference silently.
use shared_ptr::{make_shared, make_shared_with, try_make_shared, PtrError, SharedPtr};
use std::cell::Cell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

const INITIAL_VALUE: i32 = 5;

struct A {
    drops: Rc<Cell<u32>>,
}

impl A {
    fn method(&self) -> &'static str {
        "A::method"
    }
}

impl Drop for A {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

// Test: dereference of a freshly owned object.
#[test]
fn dereferences_owned_object() {
    let p = SharedPtr::from_box(Box::new(INITIAL_VALUE));
    assert_eq!(*p, INITIAL_VALUE);
    assert_eq!(p.get(), Some(&INITIAL_VALUE));
    assert!(!p.is_empty());
}

// Test: copies share the object and bump use_count.
#[test]
fn copies_share_object() {
    let p = SharedPtr::from_box(Box::new(INITIAL_VALUE));
    let p2 = p.clone();
    let p3 = p.clone();
    assert_eq!(*p, *p2);
    assert_eq!(*p, *p3);
    assert_eq!(p.use_count(), 3);
    assert!(SharedPtr::ptr_eq(&p, &p3));
}

// Test: moves transfer ownership and leave the source empty.
#[test]
fn moves_transfer_ownership() {
    let mut p = SharedPtr::from_box(Box::new(INITIAL_VALUE));
    let mut p2 = p.take();
    assert!(p.is_empty());
    assert_eq!(p.use_count(), 0);
    assert_eq!(*p2, INITIAL_VALUE);

    let p3 = std::mem::take(&mut p2);
    assert!(p2.is_empty());
    assert_eq!(*p3, INITIAL_VALUE);
    assert_eq!(p3.use_count(), 1);
}

// Scenario: p1 = make_shared(5); p2 = p1; self-move of p1; drop p2.
// Verifies: counts at every step; the self-move leaves p1 unchanged.
#[test]
fn copy_self_move_and_drop_scenario() {
    let mut p1 = make_shared(5);
    assert_eq!(p1.use_count(), 1);

    let p2 = p1.clone();
    assert_eq!(p1.use_count(), 2);
    assert_eq!(p2.use_count(), 2);

    p1 = p1.take();
    assert_eq!(*p1, 5);
    assert_eq!(p1.use_count(), 2);

    drop(p2);
    assert_eq!(p1.use_count(), 1);
}

// Test: move-assign releases whatever the target owned first.
#[test]
fn move_assign_releases_previous_object() {
    let drops = Rc::new(Cell::new(0));
    let mut target = make_shared(A { drops: drops.clone() });
    let mut source = SharedPtr::from_box(Box::new(A { drops: drops.clone() }));
    let source_addr = source.as_ptr();
    assert_eq!(target.use_count(), 1);

    target = source.take();
    assert_eq!(drops.get(), 1, "old target object must be destroyed");
    assert_eq!(target.as_ptr(), source_addr);
    assert_eq!(target.use_count(), 1);
    assert!(source.is_empty());

    drop(target);
    assert_eq!(drops.get(), 2);
}

// Test: self copy-assign is a no-op.
#[test]
fn self_copy_assign_is_noop() {
    let mut p = make_shared(INITIAL_VALUE);
    let alias = p.clone();
    p.clone_from(&alias);
    assert_eq!(p.use_count(), 2);
    drop(alias);
    assert_eq!(p.use_count(), 1);
}

// Scenario: p = make_shared(A{}); p->method(); drop p.
// Verifies: method call through combined storage; A destroyed exactly once.
#[test]
fn make_shared_object_is_destroyed_once() {
    let drops = Rc::new(Cell::new(0));
    let p = make_shared(A { drops: drops.clone() });
    assert_eq!(p.method(), "A::method");
    let q = p.clone();
    drop(p);
    assert_eq!(drops.get(), 0);
    drop(q);
    assert_eq!(drops.get(), 1);
}

// Test: a custom destroyer replaces the default drop and runs once.
#[test]
fn custom_destroyer_runs_once() {
    let calls = Rc::new(Cell::new(0));
    let seen = Rc::new(Cell::new(0));
    let (c, s) = (calls.clone(), seen.clone());
    let p = SharedPtr::from_box_with_destroyer(Box::new(INITIAL_VALUE), move |b| {
        c.set(c.get() + 1);
        s.set(*b);
    });
    let p2 = p.clone();
    let w = p.downgrade();
    drop(p);
    drop(p2);
    assert_eq!(calls.get(), 1);
    assert_eq!(seen.get(), INITIAL_VALUE);
    drop(w);
    assert_eq!(calls.get(), 1);
}

// Test: reset releases exactly like a drop and can adopt a new object.
#[test]
fn reset_and_reset_with() {
    let drops = Rc::new(Cell::new(0));
    let mut p = SharedPtr::from_box(Box::new(A { drops: drops.clone() }));
    let keep = p.clone();
    p.reset();
    assert!(p.is_empty());
    assert_eq!(keep.use_count(), 1);
    assert_eq!(drops.get(), 0);

    p.reset_with(Box::new(A { drops: drops.clone() }));
    assert_eq!(p.use_count(), 1);
    assert!(!SharedPtr::ptr_eq(&p, &keep));

    drop(keep);
    assert_eq!(drops.get(), 1);
    p.reset();
    assert_eq!(drops.get(), 2);
}

// Test: empty pointers are false-y and refuse to dereference.
#[test]
fn empty_pointer_dereference_fails() {
    let p: SharedPtr<String> = SharedPtr::empty();
    assert!(p.is_empty());
    assert_eq!(p.try_deref().unwrap_err(), PtrError::NullDereference);
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| p.len()));
    assert!(res.is_err());
}

// Test: make_shared_with builds the value inside the allocation.
#[test]
fn make_shared_with_constructs_value() {
    let p = make_shared_with(|| vec![INITIAL_VALUE; 3]);
    assert_eq!(p.as_slice(), &[5, 5, 5]);
    let q = try_make_shared(String::from("ok")).expect("allocation succeeds");
    assert_eq!(q.as_str(), "ok");
}

// Test: equality and hashing follow object identity.
#[test]
fn equality_and_hash_follow_identity() {
    let a = make_shared(1);
    let a2 = a.clone();
    let b = make_shared(1);
    assert!(a == a2);
    assert!(a != b);

    let mut h1 = DefaultHasher::new();
    a.hash(&mut h1);
    let mut h2 = DefaultHasher::new();
    a2.hash(&mut h2);
    assert_eq!(h1.finish(), h2.finish());
}

// Test: zero-sized objects share one address, but separate owners stay
// distinct; identity is the control block.
#[test]
fn zero_sized_owners_are_distinct() {
    let a = SharedPtr::from_box(Box::new(()));
    let b = SharedPtr::from_box(Box::new(()));
    assert_eq!(a.use_count(), 1);
    assert_eq!(b.use_count(), 1);
    assert!(!SharedPtr::ptr_eq(&a, &b));
    assert!(a != b);

    let a2 = a.clone();
    assert!(SharedPtr::ptr_eq(&a, &a2));
    assert!(a == a2);

    let set: HashSet<SharedPtr<()>> = [a.clone(), b.clone(), a2].into_iter().collect();
    assert_eq!(set.len(), 2);
    assert!(set.contains(&a));
    assert!(set.contains(&b));
}
