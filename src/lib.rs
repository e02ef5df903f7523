//! shared-ptr: single-threaded shared and weak pointers built on an
//! explicit two-count control block, plus a combined-allocation factory.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: reproduce the shared/weak pointer lifecycle with the two
//!   destruction points kept apart and each decided exactly once.
//! - Layers:
//!   - `tokens`: `Counter<Strong>` / `Counter<Weak>` mint linear tokens;
//!     every attached pointer owns exactly one token and detaching is the
//!     only way to hand it back.
//!   - `control_block`: the header with both counters and a small vtable
//!     (destroy object, release block). Two concrete layouts: a separate
//!     block for `Box`ed objects and a combined block for `make_shared`.
//!   - `SharedPtr<T>` / `WeakPtr<T>`: public handles; each is either empty
//!     or holds `(object, block, token)`.
//!
//! Lifecycle
//! - The object is live iff the strong count is non-zero. It is destroyed by
//!   whichever strong release observes the count reach zero, and by no one
//!   else.
//! - The block is allocated iff either count is non-zero. It is freed by
//!   whichever release observes both counts at zero, after the object is
//!   gone. The weak side never destroys the object.
//! - While the object is being destroyed the block holds one transient weak
//!   unit, so a pointee that owns weak pointers into its own block cannot
//!   free the block under the destroyer.
//! - Promotion (`WeakPtr::lock`, `SharedPtr::from_weak`) increments the
//!   existing block's strong count and refuses once it reached zero; it
//!   never creates a second block for the same object.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (no atomics, no fences).
//! - Counter overflow aborts, matching `Rc`. Underflow and leaked tokens
//!   panic; neither is reachable through the public API.
//! - Dereferencing an empty `SharedPtr` panics with
//!   `PtrError::NullDereference`; `try_deref` returns it instead.
//! - Allocation failure is fatal on the plain constructors and reported as
//!   `PtrError::AllocationFailed` by the `try_` forms.
//!
//! Debug checks
//! - Each block carries a debug-only release guard that panics if the
//!   destroyer is re-entered or run twice, or if the block is released while
//!   its object is alive. Release builds compile it away.
//!
//! Logging
//! - Block allocation, object destruction and block release are reported at
//!   `trace` level through the `log` facade. The crate installs no logger.
//!
//! Notes and non-goals
//! - No atomic variant, no custom allocators, no intrusive counts.
//! - Pointees are `Sized`; a destroyer is a stored `FnOnce(Box<T>)`, not a
//!   type-erased deleter hierarchy.
//! - Equality and hashing of `SharedPtr` follow control block identity.

mod control_block;
pub mod error;
mod make_shared;
mod release_guard;
mod shared_ptr;
mod shared_ptr_proptest;
pub mod tokens;
mod weak_ptr;

// Public surface
pub use error::PtrError;
pub use make_shared::{make_shared, make_shared_with, try_make_shared};
pub use release_guard::{DebugReleaseGuard, DestroyGuard};
pub use shared_ptr::SharedPtr;
pub use weak_ptr::WeakPtr;
