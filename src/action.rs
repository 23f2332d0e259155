/// Work to be carried out on the loop thread
///
/// Any type implementing this trait can be wrapped in a [`Thunk`] and
/// called synchronously from another thread.  The value is moved to
/// the loop thread, where [`Action::run`] is called exactly once.
/// Whatever it returns, `Ok` or `Err`, is moved back to the waiting
/// thread unchanged.
///
/// For one-off calls, a closure can be used instead via
/// [`Thunk::from_fn`] or [`FnAction`].
///
/// [`Action::run`]: trait.Action.html#tymethod.run
/// [`FnAction`]: struct.FnAction.html
/// [`Thunk::from_fn`]: struct.Thunk.html#method.from_fn
/// [`Thunk`]: struct.Thunk.html
pub trait Action: Send + 'static {
    /// Value returned to the caller on success
    type Output: Send + 'static;

    /// Error returned to the caller on failure
    type Error: Send + 'static;

    /// Carry out the work.  Called on the loop thread.
    fn run(self) -> Result<Self::Output, Self::Error>;
}

/// [`Action`] wrapper for a closure
///
/// [`Action`]: trait.Action.html
pub struct FnAction<F>(pub F);

impl<F, T, E> Action for FnAction<F>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = T;
    type Error = E;

    #[inline]
    fn run(self) -> Result<T, E> {
        (self.0)()
    }
}
