use std::fmt::{self, Display};
use std::sync::atomic::{AtomicU64, Ordering};

// Process-wide sequence.  Never reset, never torn down.  Holds the
// last value handed out, so the first allocation returns 1.
static PREV_KEY: AtomicU64 = AtomicU64::new(0);

/// Identifier attached to a [`Thunk`] for diagnostics
///
/// Keys are allocated from a single process-wide counter, so every
/// key is unique and each new key is greater than all keys allocated
/// before it.  This makes it possible to see which thunks are queued
/// or running, and in which order they were dispatched.  The value
/// carries no other meaning.
///
/// [`ActionKey::NULL`] (zero) means "no key", and is never returned
/// by [`ActionKey::allocate`].
///
/// In the unlikely event that a program allocates 2^64 keys, the
/// counter wraps around and uniqueness is lost.  This is not guarded
/// against.
///
/// [`ActionKey::NULL`]: struct.ActionKey.html#associatedconstant.NULL
/// [`ActionKey::allocate`]: struct.ActionKey.html#method.allocate
/// [`Thunk`]: struct.Thunk.html
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct ActionKey(u64);

impl ActionKey {
    /// The "no key" value
    pub const NULL: ActionKey = ActionKey(0);

    /// Allocate a new key.  Safe to call from any thread at any time.
    /// Never blocks.
    #[inline]
    pub fn allocate() -> Self {
        // `fetch_add` hands each caller a distinct previous value, so
        // no two callers can see the same key
        Self(PREV_KEY.fetch_add(1, Ordering::Relaxed).wrapping_add(1))
    }

    /// Get the raw value of the key, for logging
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Test whether this is [`ActionKey::NULL`]
    ///
    /// [`ActionKey::NULL`]: struct.ActionKey.html#associatedconstant.NULL
    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocate a new [`ActionKey`].  Same as [`ActionKey::allocate`].
///
/// [`ActionKey::allocate`]: struct.ActionKey.html#method.allocate
/// [`ActionKey`]: struct.ActionKey.html
#[inline]
pub fn allocate() -> ActionKey {
    ActionKey::allocate()
}
