use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Something that a blocked caller is waiting on, which can be
/// prodded to make the caller re-check its interrupt flag
pub(crate) trait WakeWaiter: Send + Sync {
    fn wake_waiter(&self);
}

struct InterruptInner {
    flag: AtomicBool,
    waiting: Mutex<Option<Arc<dyn WakeWaiter>>>,
}

/// Handle used to interrupt a caller thread blocked in a wait
///
/// Each caller thread registered with [`ThreadContext::register`] gets
/// its own [`Interrupt`].  Clone the handle and pass it to whatever
/// other thread needs to be able to tell the caller to stop waiting.
///
/// Raising an interrupt sets a flag which stays set until a wait
/// observes it, like a thread's interrupted status.  If the caller is
/// blocked waiting on a thunk when the interrupt is raised, it wakes
/// and returns [`ThunkError::InterruptedWait`].  If it is not waiting,
/// the next wait that finds its thunk still pending returns that
/// error immediately.  Interrupting a wait never cancels the action
/// itself, which still runs to completion on the loop thread.
///
/// The interrupt applies to waits made on its own thread, whichever
/// thread dispatched the thunk being waited on.
///
/// [`Interrupt`]: struct.Interrupt.html
/// [`ThreadContext::register`]: struct.ThreadContext.html#method.register
/// [`ThunkError::InterruptedWait`]: enum.ThunkError.html#variant.InterruptedWait
#[derive(Clone)]
pub struct Interrupt {
    inner: Arc<InterruptInner>,
}

impl Interrupt {
    /// Create a new interrupt handle, with the flag clear
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InterruptInner {
                flag: AtomicBool::new(false),
                waiting: Mutex::new(None),
            }),
        }
    }

    /// Raise the interrupt, waking the caller if it is currently
    /// blocked
    pub fn interrupt(&self) {
        // The flag must be set before `waiting` is checked.  The
        // waiter does these in the opposite order, so one side or
        // the other always sees what it needs to.
        self.inner.flag.store(true, Ordering::SeqCst);
        let waiting = self
            .inner
            .waiting
            .lock()
            .expect("Interrupt lock poisoned")
            .clone();
        if let Some(w) = waiting {
            w.wake_waiter();
        }
    }

    /// Test whether the interrupt is raised, without clearing it
    pub fn is_interrupted(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Clear the interrupt, returning whether it was raised
    pub fn clear(&self) -> bool {
        self.inner.flag.swap(false, Ordering::SeqCst)
    }

    // Register the cell that is about to be waited on
    pub(crate) fn park(&self, w: Arc<dyn WakeWaiter>) {
        *self.inner.waiting.lock().expect("Interrupt lock poisoned") = Some(w);
    }

    // Clear the registration, unless it has since been replaced
    pub(crate) fn unpark(&self, w: &Arc<dyn WakeWaiter>) {
        // Ignore poisoning here, as this runs on the way out of a wait
        if let Ok(mut guard) = self.inner.waiting.lock() {
            let same = match *guard {
                Some(ref current) => {
                    Arc::as_ptr(current) as *const u8 == Arc::as_ptr(w) as *const u8
                }
                None => false,
            };
            if same {
                *guard = None;
            }
        }
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}
