//! **Thunker** lets code running on any thread make synchronous calls
//! that are carried out on one designated loop thread.
//!
//! This suits systems where a single thread owns all access to some
//! mutable state, for example a set of devices, and must serialize
//! every change to it, whilst application logic runs in other threads
//! that want ordinary call/return semantics rather than
//! fire-and-forget messages.  The caller wraps its work in a
//! [`Thunk`] and calls [`Thunk::invoke`].  This queues the work to the
//! loop thread and blocks until it has been done.  Then the result is
//! returned, or the failure is passed back, just as if the call had
//! been made directly.
//!
//! - [Overview of types](#overview-of-types)
//! - [Failures](#failures)
//! - [Cargo features](#cargo-features)
//! - [Example](#example)
//!
//! # Overview of types
//!
//! [`Action`] is the work to be done.  Implement it for a type, or
//! wrap a closure with [`Thunk::from_fn`].
//!
//! [`Thunk`] is the call envelope.  [`Thunk::invoke`] dispatches and
//! waits.  [`Thunk::dispatch`] only dispatches, returning a
//! [`Pending`] which can be waited on later.
//!
//! [`ActionKey`] is a process-unique, increasing identifier.  Each
//! dispatch attaches a new one to the thunk, which allows diagnostics
//! to see which thunks are in flight.
//!
//! [`Executor`] is the interface to the loop thread's queue.
//! [`Thunker`] is the provided implementation, which is owned by the
//! loop thread and driven from its event loop.  [`Submitter`] is the
//! handle that other threads use to reach it.  [`LoopThread`] runs a
//! [`Thunker`] in a dedicated thread.
//!
//! [`ThreadContext`] records which executor each caller thread uses,
//! and which threads are loop threads.  A thunk can never be
//! dispatched from a loop thread, since the loop thread would then be
//! waiting on itself.
//!
//! [`Interrupt`] allows another thread to make a blocked caller stop
//! waiting.
//!
//! # Failures
//!
//! - An `Err` returned by the action is passed back unchanged as
//! [`ThunkError::Action`].
//!
//! - A panic in the action is caught on the loop thread, which
//! carries on with its queue, and then the panic is resumed in the
//! calling thread with the original payload.
//!
//! - Misuse is reported before anything is queued:
//! [`ThunkError::ThreadContextViolation`] when dispatching from a loop
//! thread, [`ThunkError::NoExecutorBound`] when the calling thread
//! has not been registered.
//!
//! - [`ThunkError::InterruptedWait`] means the caller stopped waiting.
//! The action still runs.  [`ThunkError::Abandoned`] means the
//! executor was shut down before the action could run.
//!
//! # Cargo features
//!
//! - **logger**: Enables [`Thunker::set_logger`].  The [`Thunker`]
//! then reports each thunk performed as a span keyed by its action
//! key, along with any failures.  Formatting and output are left to
//! the logger provided.
//!
//! # Example
//!
//! ```
//! use thunker::{LoopThread, Thunk, ThunkError};
//!
//! #[derive(Debug, PartialEq)]
//! enum MathError {
//!     DivideByZero,
//! }
//!
//! let lt = LoopThread::spawn(|_| ());
//! let _guard = lt.register_caller();
//!
//! let div = |a: i32, b: i32| {
//!     Thunk::from_fn(move || {
//!         if b == 0 {
//!             Err(MathError::DivideByZero)
//!         } else {
//!             Ok(a / b)
//!         }
//!     })
//! };
//! assert_eq!(div(84, 2).invoke(), Ok(42));
//! assert_eq!(div(1, 0).invoke(), Err(ThunkError::Action(MathError::DivideByZero)));
//! ```
//!
//! [`Action`]: trait.Action.html
//! [`ActionKey`]: struct.ActionKey.html
//! [`Executor`]: trait.Executor.html
//! [`Interrupt`]: struct.Interrupt.html
//! [`LoopThread`]: struct.LoopThread.html
//! [`Pending`]: struct.Pending.html
//! [`Submitter`]: struct.Submitter.html
//! [`ThreadContext`]: struct.ThreadContext.html
//! [`Thunk::dispatch`]: struct.Thunk.html#method.dispatch
//! [`Thunk::from_fn`]: struct.Thunk.html#method.from_fn
//! [`Thunk::invoke`]: struct.Thunk.html#method.invoke
//! [`Thunk`]: struct.Thunk.html
//! [`ThunkError::Abandoned`]: enum.ThunkError.html#variant.Abandoned
//! [`ThunkError::Action`]: enum.ThunkError.html#variant.Action
//! [`ThunkError::InterruptedWait`]: enum.ThunkError.html#variant.InterruptedWait
//! [`ThunkError::NoExecutorBound`]: enum.ThunkError.html#variant.NoExecutorBound
//! [`ThunkError::ThreadContextViolation`]: enum.ThunkError.html#variant.ThreadContextViolation
//! [`Thunker::set_logger`]: struct.Thunker.html#method.set_logger
//! [`Thunker`]: struct.Thunker.html

// Insist on 2018 style
#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use action::{Action, FnAction};
pub use context::{ContextGuard, ThreadContext};
pub use error::{ContextError, ThunkError};
pub use interrupt::Interrupt;
pub use key::{allocate, ActionKey};
pub use log::{LogFilter, LogID, LogLevel, LogLevelError, LogRecord, LogVisitor};
pub use thread::LoopThread;
pub use thunk::{Outcome, Pending, Perform, Thunk};
pub use thunker::{Executor, Submitter, Thunker};

// Static assertions
static_assertions::assert_not_impl_any!(Thunker: Send, Sync);
static_assertions::assert_not_impl_any!(ContextGuard: Send, Sync);
static_assertions::assert_not_impl_any!(Pending<u8, u8>: Clone);
static_assertions::assert_not_impl_any!(Thunk<FnAction<fn() -> Result<u8, u8>>>: Clone);
static_assertions::assert_impl_all!(Submitter: Send, Sync, Clone);
static_assertions::assert_impl_all!(Interrupt: Send, Sync, Clone);
static_assertions::assert_impl_all!(LoopThread: Send, Sync);
static_assertions::assert_impl_all!(Pending<u8, u8>: Send, Sync);
static_assertions::assert_impl_all!(ActionKey: Copy, Clone, Send, Sync);
static_assertions::assert_obj_safe!(Executor, Perform);

mod action;
mod context;
mod error;
mod interrupt;
mod key;
mod log;
mod thread;
mod thunk;
mod thunker;

#[cfg(test)]
mod test;
