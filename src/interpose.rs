//! Interposed pthread entry points.
//!
//! Every function here is exported unmangled with the exact signature
//! of its libc namesake, so preloading the built library (for example
//! `LD_PRELOAD=libskeletonkey.so ./app`) routes the host process's
//! synchronization calls through the tracer.
//!
//! Shim shape, blocking operations (`lock`, `rdlock`, `wrlock`,
//! `wait` and their try/timed variants):
//!
//! 1. If the reentrancy guard is set, forward to the real function:
//!    the tracer never re-enters itself.
//! 2. Emit a begin event (result 0, duration 0), call the real
//!    function, then emit the matching `Done` event with its return
//!    value and the elapsed monotonic time.
//! 3. Return the real result unchanged; the tracer never alters
//!    outcomes.
//!
//! Non-blocking operations (`init`, `destroy`, `unlock`, `signal`,
//! `broadcast`, thread creation) emit a single event after the real
//! call. Cond waits record the mutex alongside the condvar so a
//! decoder can reconstruct the association even though the mutex is
//! released for the duration of the wait.

use libc::{
    c_int, c_void, pthread_attr_t, pthread_cond_t, pthread_condattr_t, pthread_mutex_t,
    pthread_mutexattr_t, pthread_rwlock_t, pthread_rwlockattr_t, pthread_t, timespec,
};
use tracing::debug;

use crate::clock;
use crate::event::EventKind;
use crate::guard::ReentryGuard;
use crate::logger::{self, EventLogger};
use crate::real::{real, ThreadStart};

/// Library-load hook: resolve the real symbol table (fatal if any
/// symbol is missing) and open the trace file, so both are ready
/// before the host makes its first traced call.
#[ctor::ctor]
fn tracer_load() {
    let _ = real();
    EventLogger::global().init(&logger::output_path());
    debug!("interposition active");
}

/// Library-unload hook: flush and close the trace.
#[ctor::dtor]
fn tracer_unload() {
    EventLogger::global().close();
}

/// Bracket a blocking call with its begin/`Done` event pair.
///
/// No other traced call from this thread can interleave between the
/// two events: the thread is busy inside `call`, and nested entries
/// are short-circuited by the reentrancy guard the caller holds.
fn traced_call(
    begin: EventKind,
    done: EventKind,
    ptr1: u64,
    ptr2: u64,
    call: impl FnOnce() -> c_int,
) -> c_int {
    let logger = EventLogger::global();
    let start = clock::now_ns();
    logger.log(begin, ptr1, ptr2, 0, 0);
    let result = call();
    let elapsed = clock::now_ns().saturating_sub(start);
    logger.log(done, ptr1, ptr2, result, elapsed);
    result
}

/// Record the single post-call event of a non-blocking operation.
fn after_call(kind: EventKind, ptr1: u64, result: c_int) -> c_int {
    EventLogger::global().log(kind, ptr1, 0, result, 0);
    result
}

// =========================================================================
// Mutex
// =========================================================================

/// Traced replacement for `pthread_mutex_init`.
///
/// # Safety
///
/// All pointers must satisfy the contract of `pthread_mutex_init`.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_init(
    mutex: *mut pthread_mutex_t,
    attr: *const pthread_mutexattr_t,
) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().mutex_init)(mutex, attr);
    };
    let result = (real().mutex_init)(mutex, attr);
    after_call(EventKind::MutexInit, mutex as u64, result)
}

/// Traced replacement for `pthread_mutex_destroy`.
///
/// # Safety
///
/// `mutex` must satisfy the contract of `pthread_mutex_destroy`.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_destroy(mutex: *mut pthread_mutex_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().mutex_destroy)(mutex);
    };
    let result = (real().mutex_destroy)(mutex);
    after_call(EventKind::MutexDestroy, mutex as u64, result)
}

/// Traced replacement for `pthread_mutex_lock`.
///
/// # Safety
///
/// `mutex` must be a valid, initialized mutex.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_lock(mutex: *mut pthread_mutex_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().mutex_lock)(mutex);
    };
    traced_call(
        EventKind::MutexLock,
        EventKind::MutexLockDone,
        mutex as u64,
        0,
        || (real().mutex_lock)(mutex),
    )
}

/// Traced replacement for `pthread_mutex_trylock`.
///
/// # Safety
///
/// `mutex` must be a valid, initialized mutex.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_trylock(mutex: *mut pthread_mutex_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().mutex_trylock)(mutex);
    };
    traced_call(
        EventKind::MutexTryLock,
        EventKind::MutexTryLockDone,
        mutex as u64,
        0,
        || (real().mutex_trylock)(mutex),
    )
}

/// Traced replacement for `pthread_mutex_timedlock`.
///
/// # Safety
///
/// `mutex` and `abstime` must satisfy the contract of
/// `pthread_mutex_timedlock`.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_timedlock(
    mutex: *mut pthread_mutex_t,
    abstime: *const timespec,
) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().mutex_timedlock)(mutex, abstime);
    };
    traced_call(
        EventKind::MutexTimedLock,
        EventKind::MutexTimedLockDone,
        mutex as u64,
        0,
        || (real().mutex_timedlock)(mutex, abstime),
    )
}

/// Traced replacement for `pthread_mutex_unlock`.
///
/// # Safety
///
/// `mutex` must be a valid mutex held by this thread.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_unlock(mutex: *mut pthread_mutex_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().mutex_unlock)(mutex);
    };
    let result = (real().mutex_unlock)(mutex);
    after_call(EventKind::MutexUnlock, mutex as u64, result)
}

// =========================================================================
// Read/write lock
// =========================================================================

/// Traced replacement for `pthread_rwlock_init`.
///
/// # Safety
///
/// All pointers must satisfy the contract of `pthread_rwlock_init`.
#[no_mangle]
pub unsafe extern "C" fn pthread_rwlock_init(
    rwlock: *mut pthread_rwlock_t,
    attr: *const pthread_rwlockattr_t,
) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().rwlock_init)(rwlock, attr);
    };
    let result = (real().rwlock_init)(rwlock, attr);
    after_call(EventKind::RwLockInit, rwlock as u64, result)
}

/// Traced replacement for `pthread_rwlock_destroy`.
///
/// # Safety
///
/// `rwlock` must satisfy the contract of `pthread_rwlock_destroy`.
#[no_mangle]
pub unsafe extern "C" fn pthread_rwlock_destroy(rwlock: *mut pthread_rwlock_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().rwlock_destroy)(rwlock);
    };
    let result = (real().rwlock_destroy)(rwlock);
    after_call(EventKind::RwLockDestroy, rwlock as u64, result)
}

/// Traced replacement for `pthread_rwlock_rdlock`.
///
/// # Safety
///
/// `rwlock` must be a valid, initialized reader/writer lock.
#[no_mangle]
pub unsafe extern "C" fn pthread_rwlock_rdlock(rwlock: *mut pthread_rwlock_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().rwlock_rdlock)(rwlock);
    };
    traced_call(
        EventKind::RwLockRead,
        EventKind::RwLockReadDone,
        rwlock as u64,
        0,
        || (real().rwlock_rdlock)(rwlock),
    )
}

/// Traced replacement for `pthread_rwlock_tryrdlock`.
///
/// # Safety
///
/// `rwlock` must be a valid, initialized reader/writer lock.
#[no_mangle]
pub unsafe extern "C" fn pthread_rwlock_tryrdlock(rwlock: *mut pthread_rwlock_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().rwlock_tryrdlock)(rwlock);
    };
    traced_call(
        EventKind::RwLockTryRead,
        EventKind::RwLockTryReadDone,
        rwlock as u64,
        0,
        || (real().rwlock_tryrdlock)(rwlock),
    )
}

/// Traced replacement for `pthread_rwlock_timedrdlock`.
///
/// # Safety
///
/// `rwlock` and `abstime` must satisfy the contract of
/// `pthread_rwlock_timedrdlock`.
#[no_mangle]
pub unsafe extern "C" fn pthread_rwlock_timedrdlock(
    rwlock: *mut pthread_rwlock_t,
    abstime: *const timespec,
) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().rwlock_timedrdlock)(rwlock, abstime);
    };
    traced_call(
        EventKind::RwLockTimedRead,
        EventKind::RwLockTimedReadDone,
        rwlock as u64,
        0,
        || (real().rwlock_timedrdlock)(rwlock, abstime),
    )
}

/// Traced replacement for `pthread_rwlock_wrlock`.
///
/// # Safety
///
/// `rwlock` must be a valid, initialized reader/writer lock.
#[no_mangle]
pub unsafe extern "C" fn pthread_rwlock_wrlock(rwlock: *mut pthread_rwlock_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().rwlock_wrlock)(rwlock);
    };
    traced_call(
        EventKind::RwLockWrite,
        EventKind::RwLockWriteDone,
        rwlock as u64,
        0,
        || (real().rwlock_wrlock)(rwlock),
    )
}

/// Traced replacement for `pthread_rwlock_trywrlock`.
///
/// # Safety
///
/// `rwlock` must be a valid, initialized reader/writer lock.
#[no_mangle]
pub unsafe extern "C" fn pthread_rwlock_trywrlock(rwlock: *mut pthread_rwlock_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().rwlock_trywrlock)(rwlock);
    };
    traced_call(
        EventKind::RwLockTryWrite,
        EventKind::RwLockTryWriteDone,
        rwlock as u64,
        0,
        || (real().rwlock_trywrlock)(rwlock),
    )
}

/// Traced replacement for `pthread_rwlock_timedwrlock`.
///
/// # Safety
///
/// `rwlock` and `abstime` must satisfy the contract of
/// `pthread_rwlock_timedwrlock`.
#[no_mangle]
pub unsafe extern "C" fn pthread_rwlock_timedwrlock(
    rwlock: *mut pthread_rwlock_t,
    abstime: *const timespec,
) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().rwlock_timedwrlock)(rwlock, abstime);
    };
    traced_call(
        EventKind::RwLockTimedWrite,
        EventKind::RwLockTimedWriteDone,
        rwlock as u64,
        0,
        || (real().rwlock_timedwrlock)(rwlock, abstime),
    )
}

/// Traced replacement for `pthread_rwlock_unlock`.
///
/// # Safety
///
/// `rwlock` must be a valid lock held by this thread.
#[no_mangle]
pub unsafe extern "C" fn pthread_rwlock_unlock(rwlock: *mut pthread_rwlock_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().rwlock_unlock)(rwlock);
    };
    let result = (real().rwlock_unlock)(rwlock);
    after_call(EventKind::RwLockUnlock, rwlock as u64, result)
}

// =========================================================================
// Condition variable
// =========================================================================

/// Traced replacement for `pthread_cond_init`.
///
/// # Safety
///
/// All pointers must satisfy the contract of `pthread_cond_init`.
#[no_mangle]
pub unsafe extern "C" fn pthread_cond_init(
    cond: *mut pthread_cond_t,
    attr: *const pthread_condattr_t,
) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().cond_init)(cond, attr);
    };
    let result = (real().cond_init)(cond, attr);
    after_call(EventKind::CondInit, cond as u64, result)
}

/// Traced replacement for `pthread_cond_destroy`.
///
/// # Safety
///
/// `cond` must satisfy the contract of `pthread_cond_destroy`.
#[no_mangle]
pub unsafe extern "C" fn pthread_cond_destroy(cond: *mut pthread_cond_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().cond_destroy)(cond);
    };
    let result = (real().cond_destroy)(cond);
    after_call(EventKind::CondDestroy, cond as u64, result)
}

/// Traced replacement for `pthread_cond_signal`.
///
/// # Safety
///
/// `cond` must be a valid, initialized condition variable.
#[no_mangle]
pub unsafe extern "C" fn pthread_cond_signal(cond: *mut pthread_cond_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().cond_signal)(cond);
    };
    let result = (real().cond_signal)(cond);
    after_call(EventKind::CondSignal, cond as u64, result)
}

/// Traced replacement for `pthread_cond_broadcast`.
///
/// # Safety
///
/// `cond` must be a valid, initialized condition variable.
#[no_mangle]
pub unsafe extern "C" fn pthread_cond_broadcast(cond: *mut pthread_cond_t) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().cond_broadcast)(cond);
    };
    let result = (real().cond_broadcast)(cond);
    after_call(EventKind::CondBroadcast, cond as u64, result)
}

/// Traced replacement for `pthread_cond_wait`.
///
/// The mutex travels in the event's secondary slot so decoders can
/// associate the pair even though the mutex is released while waiting.
///
/// # Safety
///
/// `cond` and `mutex` must satisfy the contract of
/// `pthread_cond_wait`; in particular `mutex` must be held by this
/// thread.
#[no_mangle]
pub unsafe extern "C" fn pthread_cond_wait(
    cond: *mut pthread_cond_t,
    mutex: *mut pthread_mutex_t,
) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().cond_wait)(cond, mutex);
    };
    traced_call(
        EventKind::CondWait,
        EventKind::CondWaitDone,
        cond as u64,
        mutex as u64,
        || (real().cond_wait)(cond, mutex),
    )
}

/// Traced replacement for `pthread_cond_timedwait`.
///
/// # Safety
///
/// `cond`, `mutex` and `abstime` must satisfy the contract of
/// `pthread_cond_timedwait`; in particular `mutex` must be held by
/// this thread.
#[no_mangle]
pub unsafe extern "C" fn pthread_cond_timedwait(
    cond: *mut pthread_cond_t,
    mutex: *mut pthread_mutex_t,
    abstime: *const timespec,
) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().cond_timedwait)(cond, mutex, abstime);
    };
    traced_call(
        EventKind::CondTimedWait,
        EventKind::CondTimedWaitDone,
        cond as u64,
        mutex as u64,
        || (real().cond_timedwait)(cond, mutex, abstime),
    )
}

// =========================================================================
// Thread lifecycle
// =========================================================================

/// Traced replacement for `pthread_create`.
///
/// The new thread runs the caller's start routine untouched; only the
/// creation itself is recorded, with the thread handle's address as
/// the primitive identity.
///
/// # Safety
///
/// All pointers must satisfy the contract of `pthread_create`.
#[no_mangle]
pub unsafe extern "C" fn pthread_create(
    thread: *mut pthread_t,
    attr: *const pthread_attr_t,
    start_routine: ThreadStart,
    arg: *mut c_void,
) -> c_int {
    let Some(_token) = ReentryGuard::enter() else {
        return (real().thread_create)(thread, attr, start_routine, arg);
    };
    let result = (real().thread_create)(thread, attr, start_routine, arg);
    after_call(EventKind::ThreadCreate, thread as u64, result)
}
