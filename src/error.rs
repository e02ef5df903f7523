use std::alloc::Layout;
use thiserror::Error;

/// Failures surfaced by the pointer types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PtrError {
    /// An empty `SharedPtr` was dereferenced.
    #[error("null dereference: the shared pointer is empty")]
    NullDereference,

    /// The global allocator could not provide storage for an object or its
    /// control block.
    #[error("allocation of {} bytes (align {}) failed", .layout.size(), .layout.align())]
    AllocationFailed { layout: Layout },
}

impl PtrError {
    #[cold]
    pub(crate) fn allocation_failed(layout: Layout) -> Self {
        PtrError::AllocationFailed { layout }
    }
}
