//! WeakPtr: the non-owning observer handle.

use crate::control_block::{release_weak, Attached};
use crate::shared_ptr::SharedPtr;
use crate::tokens::{Count, Weak};
use core::fmt;
use core::marker::PhantomData;

/// A non-owning observer of a [`SharedPtr`]'s object.
///
/// A `WeakPtr` holds one weak unit of the control block. It keeps the block
/// readable after the object is gone, so [`expired`](WeakPtr::expired) stays
/// answerable, but it never keeps the object alive and never destroys it.
pub struct WeakPtr<T> {
    link: Option<Attached<T, Weak>>,
    _marker: PhantomData<T>,
}

impl<T> WeakPtr<T> {
    /// An observer of nothing. Always expired.
    pub const fn new() -> Self {
        Self {
            link: None,
            _marker: PhantomData,
        }
    }

    /// Number of strong owners of the observed object; 0 when expired or
    /// empty.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.link.as_ref().map_or(0, |l| l.header().strong_count())
    }

    /// Number of weak observers of the block, including this one; 0 when
    /// empty.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.link.as_ref().map_or(0, |l| l.header().weak_count())
    }

    #[inline]
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Try to obtain a strong reference. The result shares this pointer's
    /// block; it is empty when the object has already been destroyed.
    pub fn lock(&self) -> SharedPtr<T> {
        let Some(l) = &self.link else {
            return SharedPtr::empty();
        };
        match l.header().strong().get_if_live() {
            Some(token) => SharedPtr::from_attached(Attached {
                object: l.object,
                block: l.block,
                token,
            }),
            None => SharedPtr::empty(),
        }
    }

    /// Stop observing. Frees the block if this was the last reference of
    /// either kind.
    pub fn reset(&mut self) {
        if let Some(Attached { block, token, .. }) = self.link.take() {
            unsafe { release_weak(block, token) };
        }
    }

    /// Move the observation out, leaving `self` empty. Counts are unchanged.
    #[inline]
    pub fn take(&mut self) -> Self {
        Self {
            link: self.link.take(),
            _marker: PhantomData,
        }
    }

    /// Copy-assign from a shared pointer: observe its block instead of the
    /// current one.
    pub fn assign_shared(&mut self, shared: &SharedPtr<T>) {
        // Attach before detaching so observing the same block never frees it.
        let fresh = Self::from(shared);
        *self = fresh;
    }

    /// True when both observe the same block (or both are empty).
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (&this.link, &other.link) {
            (Some(a), Some(b)) => a.same_block(b),
            (None, None) => true,
            _ => false,
        }
    }

    fn attach<K>(source: &Attached<T, K>) -> Self {
        Self {
            link: Some(Attached {
                object: source.object,
                block: source.block,
                token: source.header().weak().get(),
            }),
            _marker: PhantomData,
        }
    }
}

impl<T> From<&SharedPtr<T>> for WeakPtr<T> {
    fn from(shared: &SharedPtr<T>) -> Self {
        match &shared.link {
            Some(l) => Self::attach(l),
            None => Self::new(),
        }
    }
}

impl<T> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        match &self.link {
            Some(l) => Self::attach(l),
            None => Self::new(),
        }
    }

    /// Copy-assign. Assigning from an observer of the same block (including
    /// itself) leaves the counts untouched.
    fn clone_from(&mut self, source: &Self) {
        if Self::ptr_eq(self, source) {
            return;
        }
        *self = source.clone();
    }
}

impl<T> Drop for WeakPtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> Default for WeakPtr<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.link.is_none() {
            f.write_str("WeakPtr(empty)")
        } else if self.expired() {
            f.write_str("WeakPtr(expired)")
        } else {
            f.debug_struct("WeakPtr")
                .field("use_count", &self.use_count())
                .field("weak_count", &self.weak_count())
                .finish()
        }
    }
}
