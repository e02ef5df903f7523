//! Debug-only destroy-once tracker for control blocks.
//!
//! Tracks the lifecycle of one managed object: alive, being destroyed,
//! destroyed. In debug builds, re-entering the destroyer, destroying twice,
//! or releasing block storage while the object is still alive panics. In
//! release builds, this compiles to a zero-cost no-op.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

#[cfg(debug_assertions)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Alive,
    Destroying,
    Destroyed,
}

/// Per-block lifecycle tracker. Embedded in every control block header.
#[derive(Debug)]
pub struct DebugReleaseGuard {
    #[cfg(debug_assertions)]
    phase: Cell<Phase>,
    // Keep !Send + !Sync in line with single-threaded design.
    _nosend: PhantomData<*mut ()>,
}

impl DebugReleaseGuard {
    /// Create a tracker for a live object. Const so it can be a field default.
    pub const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            phase: Cell::new(Phase::Alive),
            _nosend: PhantomData,
        }
    }

    /// Enter the destroy section. In debug builds, panics unless the object
    /// is still alive and nobody else is destroying it.
    #[inline]
    pub fn enter_destroy(&self) -> DestroyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            let p = self.phase.get();
            assert!(
                p == Phase::Alive,
                "double release: managed object destroyed more than once"
            );
            self.phase.set(Phase::Destroying);
            return DestroyGuard { owner: self };
        }

        #[cfg(not(debug_assertions))]
        {
            return DestroyGuard { _z: PhantomData };
        }
    }

    /// Check that block storage may be released: the object must be gone.
    #[inline]
    pub fn check_release(&self) {
        #[cfg(debug_assertions)]
        assert!(
            self.phase.get() == Phase::Destroyed,
            "control block released while its object is not destroyed"
        );
    }
}

impl Default for DebugReleaseGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `DebugReleaseGuard::enter_destroy`. Marks the
/// object destroyed when the destroyer returns (or unwinds).
pub struct DestroyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReleaseGuard,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl<'a> Drop for DestroyGuard<'a> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            debug_assert!(self.owner.phase.get() == Phase::Destroying);
            self.owner.phase.set(Phase::Destroyed);
        }
    }
}
