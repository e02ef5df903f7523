//! ControlBlock: strong/weak counters plus a type-erased destruction strategy.
//!
//! A block is always the first field of a `#[repr(C)]` concrete layout, so a
//! `NonNull<ControlBlock>` can be cast back to the concrete block by the
//! functions in its vtable. Pointers only ever hold the erased header pointer
//! and reach the concrete layout through those functions.

use crate::error::PtrError;
use crate::release_guard::DebugReleaseGuard;
use crate::tokens::{Count, Counter, Strong, Token, Weak};
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ptr::NonNull;
use log::trace;
use std::alloc::{self, Layout};

pub(crate) type StrongToken = Token<'static, Counter<Strong>>;
pub(crate) type WeakToken = Token<'static, Counter<Weak>>;

/// Which construction path produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockKind {
    /// Object and block live in two allocations (`SharedPtr::from_box`).
    Separate,
    /// Object and block share one allocation (`make_shared`).
    Combined,
}

pub(crate) struct BlockVTable {
    /// Destroy the managed object. Called at most once, when the strong
    /// count reaches zero.
    pub(crate) destroy_object: unsafe fn(NonNull<ControlBlock>),
    /// Free the block storage. Called once, after `destroy_object`, when
    /// both counts are zero.
    pub(crate) release_block: unsafe fn(NonNull<ControlBlock>),
    pub(crate) kind: BlockKind,
}

pub(crate) struct ControlBlock {
    strong: Counter<Strong>,
    weak: Counter<Weak>,
    vtable: &'static BlockVTable,
    release: DebugReleaseGuard,
}

impl ControlBlock {
    /// A fresh block owned by exactly one strong reference.
    pub(crate) fn new(vtable: &'static BlockVTable) -> Self {
        Self {
            strong: Counter::new(1),
            weak: Counter::new(0),
            vtable,
            release: DebugReleaseGuard::new(),
        }
    }

    pub(crate) fn strong(&self) -> &Counter<Strong> {
        &self.strong
    }

    pub(crate) fn weak(&self) -> &Counter<Weak> {
        &self.weak
    }

    pub(crate) fn strong_count(&self) -> usize {
        self.strong.count()
    }

    pub(crate) fn weak_count(&self) -> usize {
        self.weak.count()
    }

    /// Token for the unit `new` starts the strong count at.
    ///
    /// # Safety
    /// Must be called exactly once per block, right after construction.
    pub(crate) unsafe fn adopt_initial(&self) -> StrongToken {
        self.strong.adopt()
    }
}

/// One pointer's attachment to a block: where the object is, which block
/// counts it, and the token proving this pointer holds one unit of kind `K`.
pub(crate) struct Attached<T, K> {
    pub(crate) object: NonNull<T>,
    pub(crate) block: NonNull<ControlBlock>,
    pub(crate) token: Token<'static, Counter<K>>,
}

impl<T, K> Attached<T, K> {
    /// Any attachment keeps the block allocated, so the header is readable
    /// for as long as `self` exists.
    #[inline]
    pub(crate) fn header(&self) -> &ControlBlock {
        unsafe { self.block.as_ref() }
    }

    #[inline]
    pub(crate) fn same_block<K2>(&self, other: &Attached<T, K2>) -> bool {
        self.block == other.block
    }
}

/// Return a strong unit. When it was the last one, the managed object is
/// destroyed; the block itself goes away only if no weak unit remains.
///
/// # Safety
/// `block` must be live and `token` minted by its strong counter.
pub(crate) unsafe fn release_strong(block: NonNull<ControlBlock>, token: StrongToken) {
    let header = block.as_ref();
    if !header.strong.put(token) {
        return;
    }
    // The object may own weak pointers into its own block; pin the block
    // so their detaching cannot free it under the destroyer.
    let pin = header.weak.get();
    {
        let _destroying = header.release.enter_destroy();
        trace!(
            "destroying object of {:?} block {:p}",
            header.vtable.kind,
            block.as_ptr()
        );
        (header.vtable.destroy_object)(block);
    }
    release_weak(block, pin);
}

/// Return a weak unit. Frees the block when this was the last unit of
/// either kind. Never touches the managed object.
///
/// # Safety
/// `block` must be live and `token` minted by its weak counter.
pub(crate) unsafe fn release_weak(block: NonNull<ControlBlock>, token: WeakToken) {
    let header = block.as_ref();
    if header.weak.put(token) && header.strong.count() == 0 {
        header.release.check_release();
        let vtable = header.vtable;
        trace!("releasing {:?} block {:p}", vtable.kind, block.as_ptr());
        (vtable.release_block)(block);
        #[cfg(test)]
        live_blocks::add(-1);
    }
}


/// Allocate uninitialized storage for `B`, reporting exhaustion.
pub(crate) fn try_alloc_uninit<B>() -> Result<NonNull<B>, PtrError> {
    let layout = Layout::new::<B>();
    // Every block embeds a header, so the layout is never zero-sized.
    debug_assert!(layout.size() > 0);
    let raw = unsafe { alloc::alloc(layout) } as *mut B;
    NonNull::new(raw).ok_or_else(|| PtrError::allocation_failed(layout))
}

/// Allocate uninitialized storage for `B`; exhaustion is fatal.
pub(crate) fn alloc_uninit<B>() -> NonNull<B> {
    match try_alloc_uninit::<B>() {
        Ok(slot) => slot,
        Err(_) => alloc::handle_alloc_error(Layout::new::<B>()),
    }
}

/// How a separately allocated object is disposed of.
pub(crate) trait Destroy<T> {
    fn destroy(self, object: Box<T>);
}

/// Drops the `Box`.
pub(crate) struct DropBox;

impl<T> Destroy<T> for DropBox {
    fn destroy(self, object: Box<T>) {
        drop(object);
    }
}

/// A caller-supplied destroyer callable.
pub(crate) struct FnDestroyer<F>(pub(crate) F);

impl<T, F> Destroy<T> for FnDestroyer<F>
where
    F: FnOnce(Box<T>),
{
    fn destroy(self, object: Box<T>) {
        (self.0)(object)
    }
}

/// Block for an object that already lives in its own `Box`.
#[repr(C)]
pub(crate) struct SeparateBlock<T, D> {
    header: ControlBlock,
    object: NonNull<T>,
    destroyer: ManuallyDrop<D>,
    _owns: PhantomData<Box<T>>,
}

impl<T, D> SeparateBlock<T, D>
where
    D: Destroy<T>,
{
    const VTABLE: &'static BlockVTable = &BlockVTable {
        destroy_object: Self::destroy_object,
        release_block: Self::release_block,
        kind: BlockKind::Separate,
    };

    /// Allocate a block for `object`; exhaustion is fatal.
    pub(crate) fn attach(object: Box<T>, destroyer: D) -> Attached<T, Strong> {
        let slot = alloc_uninit::<Self>();
        unsafe { Self::init(slot, object, destroyer) }
    }

    /// Allocate a block for `object`. On exhaustion the object is handed to
    /// its destroyer before the error is returned.
    pub(crate) fn try_attach(object: Box<T>, destroyer: D) -> Result<Attached<T, Strong>, PtrError> {
        match try_alloc_uninit::<Self>() {
            Ok(slot) => Ok(unsafe { Self::init(slot, object, destroyer) }),
            Err(e) => {
                destroyer.destroy(object);
                Err(e)
            }
        }
    }

    unsafe fn init(slot: NonNull<Self>, object: Box<T>, destroyer: D) -> Attached<T, Strong> {
        let object = NonNull::new_unchecked(Box::into_raw(object));
        slot.as_ptr().write(Self {
            header: ControlBlock::new(Self::VTABLE),
            object,
            destroyer: ManuallyDrop::new(destroyer),
            _owns: PhantomData,
        });
        let block = slot.cast::<ControlBlock>();
        trace!("allocated Separate block {:p}", block.as_ptr());
        #[cfg(test)]
        live_blocks::add(1);
        let token = block.as_ref().adopt_initial();
        Attached {
            object,
            block,
            token,
        }
    }

    unsafe fn destroy_object(block: NonNull<ControlBlock>) {
        let this = block.cast::<Self>().as_ptr();
        let destroyer = ManuallyDrop::take(&mut (*this).destroyer);
        let object = Box::from_raw((*this).object.as_ptr());
        destroyer.destroy(object);
    }

    unsafe fn release_block(block: NonNull<ControlBlock>) {
        // The destroyer was taken by destroy_object; nothing else drops.
        drop(Box::from_raw(block.cast::<Self>().as_ptr()));
    }
}
