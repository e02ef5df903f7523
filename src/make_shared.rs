//! Combined allocation: the object and its control block in one region.

use crate::control_block::{
    alloc_uninit, try_alloc_uninit, Attached, BlockKind, BlockVTable, ControlBlock,
};
use crate::error::PtrError;
use crate::shared_ptr::SharedPtr;
use core::mem::{self, ManuallyDrop};
use core::ptr::{self, NonNull};
use log::trace;
use std::alloc::{self, Layout};

#[repr(C)]
struct CombinedBlock<T> {
    header: ControlBlock,
    value: ManuallyDrop<T>,
}

impl<T> CombinedBlock<T> {
    const VTABLE: &'static BlockVTable = &BlockVTable {
        destroy_object: Self::destroy_object,
        release_block: Self::release_block,
        kind: BlockKind::Combined,
    };

    /// Construct the value directly into `slot`, then the header.
    ///
    /// # Safety
    /// `slot` must be fresh, uninitialized storage for `Self` from the global
    /// allocator.
    unsafe fn construct<F>(slot: NonNull<Self>, make: F) -> SharedPtr<T>
    where
        F: FnOnce() -> T,
    {
        let raw = slot.as_ptr();
        // Nothing in the slot is initialized while `make` runs.
        let guard = FreeOnUnwind { slot };
        ptr::addr_of_mut!((*raw).value).write(ManuallyDrop::new(make()));
        mem::forget(guard);
        ptr::addr_of_mut!((*raw).header).write(ControlBlock::new(Self::VTABLE));

        let block = slot.cast::<ControlBlock>();
        trace!("allocated Combined block {:p}", block.as_ptr());
        #[cfg(test)]
        crate::control_block::live_blocks::add(1);
        let object = NonNull::new_unchecked(ptr::addr_of_mut!((*raw).value)).cast::<T>();
        let token = block.as_ref().adopt_initial();
        SharedPtr::from_attached(Attached {
            object,
            block,
            token,
        })
    }

    unsafe fn destroy_object(block: NonNull<ControlBlock>) {
        let this = block.cast::<Self>().as_ptr();
        ManuallyDrop::drop(&mut (*this).value);
    }

    unsafe fn release_block(block: NonNull<ControlBlock>) {
        // One deallocation for both parts; the value was dropped in place.
        drop(Box::from_raw(block.cast::<Self>().as_ptr()));
    }
}

struct FreeOnUnwind<T> {
    slot: NonNull<CombinedBlock<T>>,
}

impl<T> Drop for FreeOnUnwind<T> {
    fn drop(&mut self) {
        unsafe {
            alloc::dealloc(
                self.slot.as_ptr() as *mut u8,
                Layout::new::<CombinedBlock<T>>(),
            )
        };
    }
}

/// Allocate `value` and its control block together and return the first
/// strong reference to it. Allocation failure is fatal.
pub fn make_shared<T>(value: T) -> SharedPtr<T> {
    make_shared_with(move || value)
}

/// Like [`make_shared`], but builds the value with `make` after the storage
/// exists, writing it straight into the combined allocation. If `make`
/// panics the storage is freed and the panic propagates.
pub fn make_shared_with<T, F>(make: F) -> SharedPtr<T>
where
    F: FnOnce() -> T,
{
    let slot = alloc_uninit::<CombinedBlock<T>>();
    unsafe { CombinedBlock::construct(slot, make) }
}

/// Fallible form of [`make_shared`]. On exhaustion `value` is dropped and
/// [`PtrError::AllocationFailed`] returned.
pub fn try_make_shared<T>(value: T) -> Result<SharedPtr<T>, PtrError> {
    let slot = try_alloc_uninit::<CombinedBlock<T>>()?;
    Ok(unsafe { CombinedBlock::construct(slot, move || value) })
}
