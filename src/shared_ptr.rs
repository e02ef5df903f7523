//! SharedPtr: the strong, co-owning handle.

use crate::control_block::{release_strong, Attached, DropBox, FnDestroyer, SeparateBlock};
use crate::error::PtrError;
use crate::make_shared::make_shared;
use crate::tokens::{Count, Strong};
use crate::weak_ptr::WeakPtr;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr;

/// A single-threaded shared-ownership pointer.
///
/// Every non-empty `SharedPtr` holds one strong unit of its object's control
/// block. The object is destroyed when the last strong unit is returned; the
/// block outlives it for as long as a [`WeakPtr`] observes it.
///
/// Equality and hashing follow control block identity, not the pointee's
/// value.
pub struct SharedPtr<T> {
    pub(crate) link: Option<Attached<T, Strong>>,
    // Owns a T for drop check; also keeps the type !Send + !Sync.
    _owns: PhantomData<T>,
}

impl<T> SharedPtr<T> {
    /// A pointer that owns nothing. `use_count()` is 0.
    pub const fn empty() -> Self {
        Self {
            link: None,
            _owns: PhantomData,
        }
    }

    /// Move `value` into a combined allocation. Same as [`make_shared`].
    pub fn new(value: T) -> Self {
        make_shared(value)
    }

    pub(crate) fn from_attached(link: Attached<T, Strong>) -> Self {
        Self {
            link: Some(link),
            _owns: PhantomData,
        }
    }

    /// Take ownership of a heap object, allocating a separate control block
    /// for it. The object is dropped with its `Box` when the last strong
    /// reference goes away.
    pub fn from_box(object: Box<T>) -> Self {
        Self::from_attached(SeparateBlock::attach(object, DropBox))
    }

    /// Like [`from_box`](Self::from_box), but the object is handed to
    /// `destroyer` instead of being dropped. The destroyer runs exactly once.
    pub fn from_box_with_destroyer<D>(object: Box<T>, destroyer: D) -> Self
    where
        D: FnOnce(Box<T>) + 'static,
    {
        Self::from_attached(SeparateBlock::attach(object, FnDestroyer(destroyer)))
    }

    /// Fallible form of [`from_box`](Self::from_box). If the control block
    /// cannot be allocated the object is dropped and the error returned.
    pub fn try_from_box(object: Box<T>) -> Result<Self, PtrError> {
        SeparateBlock::try_attach(object, DropBox).map(Self::from_attached)
    }

    /// Fallible form of [`from_box_with_destroyer`](Self::from_box_with_destroyer).
    /// On failure the destroyer has already consumed the object.
    pub fn try_from_box_with_destroyer<D>(object: Box<T>, destroyer: D) -> Result<Self, PtrError>
    where
        D: FnOnce(Box<T>) + 'static,
    {
        SeparateBlock::try_attach(object, FnDestroyer(destroyer)).map(Self::from_attached)
    }

    /// Promote a weak pointer. Shares the block the weak pointer observes;
    /// an expired or empty weak pointer yields an empty `SharedPtr`.
    pub fn from_weak(weak: &WeakPtr<T>) -> Self {
        weak.lock()
    }

    /// A new weak observer of this pointer's block.
    pub fn downgrade(&self) -> WeakPtr<T> {
        WeakPtr::from(self)
    }

    /// The managed object, or `None` when empty.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // A strong unit keeps the object alive.
        self.link.as_ref().map(|l| unsafe { l.object.as_ref() })
    }

    /// Raw address of the managed object; null when empty.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.link
            .as_ref()
            .map_or(ptr::null(), |l| l.object.as_ptr() as *const T)
    }

    /// Mutable access when this is the only strong owner and nothing
    /// observes the block.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        let link = self.link.as_mut()?;
        let header = link.header();
        if header.strong_count() == 1 && header.weak_count() == 0 {
            Some(unsafe { link.object.as_mut() })
        } else {
            None
        }
    }

    /// Dereference without panicking.
    pub fn try_deref(&self) -> Result<&T, PtrError> {
        self.get().ok_or(PtrError::NullDereference)
    }

    /// Number of strong owners of the block, or 0 when empty.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.link.as_ref().map_or(0, |l| l.header().strong_count())
    }

    /// Number of weak observers of the block, or 0 when empty.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.link.as_ref().map_or(0, |l| l.header().weak_count())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.link.is_none()
    }

    /// Move the ownership out, leaving `self` empty. Counts are unchanged.
    #[inline]
    pub fn take(&mut self) -> Self {
        Self {
            link: self.link.take(),
            _owns: PhantomData,
        }
    }

    /// Release the current object (if any) and become empty.
    pub fn reset(&mut self) {
        if let Some(Attached { block, token, .. }) = self.link.take() {
            unsafe { release_strong(block, token) };
        }
    }

    /// Release the current object, then take ownership of `object` with a
    /// fresh control block.
    pub fn reset_with(&mut self, object: Box<T>) {
        self.reset();
        self.link = Some(SeparateBlock::attach(object, DropBox));
    }

    /// Release the current object, then take ownership of `object` with a
    /// fresh control block and custom destroyer.
    pub fn reset_with_destroyer<D>(&mut self, object: Box<T>, destroyer: D)
    where
        D: FnOnce(Box<T>) + 'static,
    {
        self.reset();
        self.link = Some(SeparateBlock::attach(object, FnDestroyer(destroyer)));
    }

    /// True when both pointers share one control block (or both are empty).
    ///
    /// Zero-sized objects all live at the same dangling address, so identity
    /// is the block, not the object address.
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.same_block(other)
    }

    fn same_block(&self, other: &Self) -> bool {
        match (&self.link, &other.link) {
            (Some(a), Some(b)) => a.same_block(b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Address of the control block; 0 when empty.
    fn block_addr(&self) -> usize {
        self.link
            .as_ref()
            .map_or(0, |l| l.block.as_ptr() as usize)
    }
}

impl<T> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        match &self.link {
            None => Self::empty(),
            Some(l) => Self::from_attached(Attached {
                object: l.object,
                block: l.block,
                token: l.header().strong().get(),
            }),
        }
    }

    /// Copy-assign. Assigning from a pointer that already shares this block
    /// (including itself) leaves the counts untouched.
    fn clone_from(&mut self, source: &Self) {
        if self.same_block(source) {
            return;
        }
        *self = source.clone();
    }
}

impl<T> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> Default for SharedPtr<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Deref for SharedPtr<T> {
    type Target = T;

    /// # Panics
    /// Panics with [`PtrError::NullDereference`] when the pointer is empty.
    /// Use [`try_deref`](SharedPtr::try_deref) to get the error instead.
    fn deref(&self) -> &T {
        match self.try_deref() {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }
}

impl<T> From<Box<T>> for SharedPtr<T> {
    fn from(object: Box<T>) -> Self {
        Self::from_box(object)
    }
}

impl<T> From<&WeakPtr<T>> for SharedPtr<T> {
    fn from(weak: &WeakPtr<T>) -> Self {
        Self::from_weak(weak)
    }
}

impl<T> PartialEq for SharedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T> Eq for SharedPtr<T> {}

impl<T> Hash for SharedPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.block_addr().hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f
                .debug_struct("SharedPtr")
                .field("value", v)
                .field("use_count", &self.use_count())
                .finish(),
            None => f.write_str("SharedPtr(empty)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn empty_pointer_reports_nothing() {
        let p: SharedPtr<i32> = SharedPtr::empty();
        assert!(p.is_empty());
        assert_eq!(p.use_count(), 0);
        assert_eq!(p.weak_count(), 0);
        assert!(p.get().is_none());
        assert!(p.as_ptr().is_null());
        assert_eq!(p.try_deref(), Err(PtrError::NullDereference));
    }

    #[test]
    fn deref_of_empty_panics_with_null_dereference() {
        let p: SharedPtr<i32> = SharedPtr::default();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| *p));
        let err = res.expect_err("empty deref must panic");
        let msg = err
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert!(msg.contains("null dereference"), "unexpected panic: {msg}");
    }

    #[test]
    fn clone_from_same_block_is_noop() {
        let mut a = SharedPtr::from_box(Box::new(1));
        let b = a.clone();
        assert_eq!(a.use_count(), 2);
        a.clone_from(&b);
        assert_eq!(a.use_count(), 2);
        assert!(SharedPtr::ptr_eq(&a, &b));
    }

    #[test]
    fn clone_from_other_block_releases_old() {
        let drops = Rc::new(Cell::new(0));
        let d = drops.clone();
        let mut a = SharedPtr::from_box_with_destroyer(Box::new(1), move |_| d.set(d.get() + 1));
        let b = SharedPtr::from_box(Box::new(2));
        a.clone_from(&b);
        assert_eq!(drops.get(), 1);
        assert_eq!(*a, 2);
        assert_eq!(b.use_count(), 2);
    }

    #[test]
    fn reset_with_replaces_object() {
        let drops = Rc::new(Cell::new(0));
        let d = drops.clone();
        let mut p = SharedPtr::from_box_with_destroyer(Box::new(10), move |_| d.set(d.get() + 1));
        p.reset_with(Box::new(20));
        assert_eq!(drops.get(), 1);
        assert_eq!(*p, 20);
        assert_eq!(p.use_count(), 1);
        p.reset();
        assert!(p.is_empty());
    }

    #[test]
    fn get_mut_requires_unique_ownership() {
        let mut p = SharedPtr::from_box(Box::new(5));
        *p.get_mut().expect("unique") += 1;
        let w = p.downgrade();
        assert!(p.get_mut().is_none());
        drop(w);
        let q = p.clone();
        assert!(p.get_mut().is_none());
        drop(q);
        assert_eq!(p.get_mut().copied(), Some(6));
    }

    #[test]
    fn debug_shows_value_and_count() {
        let p = SharedPtr::from_box(Box::new(3));
        let _q = p.clone();
        assert_eq!(format!("{p:?}"), "SharedPtr { value: 3, use_count: 2 }");
        let e: SharedPtr<i32> = SharedPtr::empty();
        assert_eq!(format!("{e:?}"), "SharedPtr(empty)");
    }
}
