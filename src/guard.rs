//! Per-thread reentrancy guard.
//!
//! The logger's write path can itself take locks (the writer mutex,
//! allocator or unwinder internals). If those locks are the very
//! pthread primitives the tracer interposes, a nested shim entry would
//! recurse into the tracer and deadlock. The guard is a thread-local
//! flag: a shim entered while it is set forwards straight to the real
//! function and records nothing.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    // Every thread is born outside the tracer.
    static IN_TRACER: Cell<bool> = const { Cell::new(false) };
}

/// RAII token proving this thread entered the tracer.
///
/// Dropping the token clears the flag, so every exit path (early
/// returns and panics included) releases the guard.
pub struct ReentryGuard {
    // Tied to the thread whose flag it set.
    _not_send: PhantomData<*const ()>,
}

impl ReentryGuard {
    /// Claim the current thread for the tracer.
    ///
    /// Returns `None` if the thread is already inside the tracer, in
    /// which case the caller must forward without logging.
    pub fn enter() -> Option<Self> {
        IN_TRACER.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(ReentryGuard {
                    _not_send: PhantomData,
                })
            }
        })
    }

    /// Whether the current thread is inside the tracer.
    pub fn active() -> bool {
        IN_TRACER.with(Cell::get)
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        IN_TRACER.with(|flag| flag.set(false));
    }
}
