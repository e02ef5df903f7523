//! Lifetime-tied linear tokens and the strong/weak counters that mint them.
//!
//! Every attached pointer owns exactly one token from the counter it was
//! attached to. Dropping a token panics; the only valid way to dispose of it
//! is to hand it back to the originating counter via `Count::put`, which is
//! what detaching a pointer does.

use core::cell::Cell;
use core::marker::PhantomData;

/// Zero-sized, linear token tied to its originating counter via lifetime.
pub struct Token<'a, C: ?Sized> {
    _lt: PhantomData<&'a ()>,
    _ctr: PhantomData<*const C>,
}

impl<'a, C: ?Sized> Token<'a, C> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            _lt: PhantomData,
            _ctr: PhantomData,
        }
    }
}

impl<'a, C: ?Sized> Drop for Token<'a, C> {
    fn drop(&mut self) {
        // Fail fast: a token must be consumed by Count::put. While unwinding
        // (e.g. a destroyer panicked) the unit is leaked instead.
        if !std::thread::panicking() {
            panic!("Token dropped without Count::put");
        }
    }
}

impl<'a, C: ?Sized> core::fmt::Debug for Token<'a, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Token")
    }
}

/// A source of counted references, enforced by linear Token flow.
pub trait Count {
    /// The token type minted by this counter.
    ///
    /// Tokens carry a 'static lifetime parameter so pointers can store them;
    /// they stay branded to this counter by their type parameter.
    type Token: Sized;

    /// Acquire one counted reference and return a linear token for it.
    fn get(&self) -> Self::Token;

    /// Return (consume) a previously acquired token.
    /// Returns true if the count is now zero.
    fn put(&self, t: Self::Token) -> bool;

    /// Current number of outstanding tokens.
    fn count(&self) -> usize;
}

/// Marker for counters of owning references.
#[derive(Debug)]
pub enum Strong {}

/// Marker for counters of observing references.
#[derive(Debug)]
pub enum Weak {}

/// Single-threaded reference counter. The kind parameter keeps strong and
/// weak tokens from being returned to the wrong counter.
pub struct Counter<K> {
    count: Cell<usize>,
    _kind: PhantomData<K>,
}

impl<K> Counter<K> {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Cell::new(initial),
            _kind: PhantomData,
        }
    }

    /// Mint a token for a unit that is already reflected in the count, such
    /// as the initial unit of a counter created with `new(1)`.
    ///
    /// # Safety
    /// The caller must not mint more adopted tokens than the count includes
    /// units that no other token represents.
    #[inline]
    pub(crate) unsafe fn adopt(&self) -> Token<'static, Self> {
        debug_assert!(self.count.get() > 0, "adopting a token from an empty counter");
        Token::new()
    }
}

impl Counter<Strong> {
    /// Acquire a strong unit only while the count is non-zero. A strong count
    /// that reached zero never comes back.
    #[inline]
    pub fn get_if_live(&self) -> Option<Token<'static, Self>> {
        if self.count.get() == 0 {
            None
        } else {
            Some(self.get())
        }
    }
}

impl<K> core::fmt::Debug for Counter<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Counter").field(&self.count.get()).finish()
    }
}

impl<K> Count for Counter<K> {
    type Token = Token<'static, Self>;

    #[inline]
    fn get(&self) -> Self::Token {
        let c = self.count.get();
        let n = c.wrapping_add(1);
        self.count.set(n);
        if n == 0 {
            // Follow Rc semantics: abort on overflow rather than continue unsafely.
            std::process::abort();
        }
        Token::<'static, Self>::new()
    }

    #[inline]
    fn put(&self, t: Self::Token) -> bool {
        core::mem::forget(t);
        let c = self.count.get();
        assert!(c > 0, "Counter underflow");
        let n = c - 1;
        self.count.set(n);
        n == 0
    }

    #[inline]
    fn count(&self) -> usize {
        self.count.get()
    }
}
