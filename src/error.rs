use std::error::Error;
use std::fmt::{self, Display};

/// Misuse of the dispatch contract, detected before anything is
/// queued
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ContextError {
    /// Dispatch was attempted from the loop thread itself.  Waiting
    /// there for the loop thread would deadlock.
    ThreadContextViolation,

    /// The calling thread has no executor registered
    NoExecutorBound,
}

impl Error for ContextError {}

impl Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadContextViolation => "dispatch attempted from the executor thread".fmt(f),
            Self::NoExecutorBound => "no executor bound to the calling thread".fmt(f),
        }
    }
}

/// Failure of a synchronous call through a [`Thunk`]
///
/// `Action` carries the error returned by the action itself, exactly
/// as it was returned on the loop thread.  All the other variants
/// describe what happened to the call rather than to the work, so
/// the caller can tell "the action ran and failed" apart from "the
/// action may not have run" or "it ran but I stopped waiting".
///
/// [`Thunk`]: struct.Thunk.html
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ThunkError<E> {
    /// The action ran on the loop thread and returned this error
    Action(E),

    /// Dispatch was attempted from the loop thread.  Nothing was
    /// queued.
    ThreadContextViolation,

    /// The calling thread has no executor registered.  Nothing was
    /// queued.
    NoExecutorBound,

    /// The wait was interrupted before the action signalled
    /// completion.  The action is still queued or running, and will
    /// complete on the loop thread regardless.
    InterruptedWait,

    /// The executor shut down and discarded the queued action
    /// without running it
    Abandoned,
}

impl<E> ThunkError<E> {
    /// Test whether this is an error returned by the action
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action(_))
    }

    /// Get the error returned by the action, if that is what this
    /// is
    pub fn into_action(self) -> Option<E> {
        match self {
            Self::Action(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<ContextError> for ThunkError<E> {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::ThreadContextViolation => Self::ThreadContextViolation,
            ContextError::NoExecutorBound => Self::NoExecutorBound,
        }
    }
}

impl<E: Display> Display for ThunkError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Transported as is, so display as is
            Self::Action(e) => e.fmt(f),
            Self::ThreadContextViolation => ContextError::ThreadContextViolation.fmt(f),
            Self::NoExecutorBound => ContextError::NoExecutorBound.fmt(f),
            Self::InterruptedWait => "interrupted whilst waiting for the executor".fmt(f),
            Self::Abandoned => "action discarded by executor shutdown".fmt(f),
        }
    }
}

impl<E: Error + 'static> Error for ThunkError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Action(e) => Some(e),
            _ => None,
        }
    }
}
