//! Trace event model: kinds, the on-disk record, and the stack cap.
//!
//! An [`Event`] is what the interposer records for every observed
//! pthread operation and what the reader hands back when decoding a
//! trace. Blocking operations produce two events (a begin event before
//! the real call, a `*Done` event after it); `Init`, `Destroy`,
//! `Unlock`, `Signal`, `Broadcast` and `ThreadCreate` produce a single
//! post-call event.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Maximum number of call-stack frames captured per event.
///
/// Raising this inflates every record linearly and adds per-event
/// latency in the capture path.
pub const MAX_STACK_DEPTH: usize = 16;

/// Kind of a traced operation.
///
/// The discriminants are the wire-format type tags; existing trace
/// consumers depend on them, so the numbering is frozen.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    // Thread events
    ThreadCreate = 0,

    // Mutex events
    MutexInit = 1,
    MutexDestroy = 2,
    MutexLock = 3,
    MutexLockDone = 4,
    MutexTryLock = 5,
    MutexTryLockDone = 6,
    MutexTimedLock = 7,
    MutexTimedLockDone = 8,
    MutexUnlock = 9,

    // RWLock events
    RwLockInit = 10,
    RwLockDestroy = 11,
    RwLockRead = 12,
    RwLockReadDone = 13,
    RwLockTryRead = 14,
    RwLockTryReadDone = 15,
    RwLockTimedRead = 16,
    RwLockTimedReadDone = 17,
    RwLockWrite = 18,
    RwLockWriteDone = 19,
    RwLockTryWrite = 20,
    RwLockTryWriteDone = 21,
    RwLockTimedWrite = 22,
    RwLockTimedWriteDone = 23,
    RwLockUnlock = 24,

    // Condition variable events
    CondInit = 25,
    CondDestroy = 26,
    CondSignal = 27,
    CondBroadcast = 28,
    CondWait = 29,
    CondWaitDone = 30,
    CondTimedWait = 31,
    CondTimedWaitDone = 32,
}

impl EventKind {
    /// The wire-format type tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Resolve a wire-format tag back to a kind.
    ///
    /// Returns `None` for tags outside the known range.
    pub fn from_tag(tag: u8) -> Option<Self> {
        use EventKind::*;
        Some(match tag {
            0 => ThreadCreate,
            1 => MutexInit,
            2 => MutexDestroy,
            3 => MutexLock,
            4 => MutexLockDone,
            5 => MutexTryLock,
            6 => MutexTryLockDone,
            7 => MutexTimedLock,
            8 => MutexTimedLockDone,
            9 => MutexUnlock,
            10 => RwLockInit,
            11 => RwLockDestroy,
            12 => RwLockRead,
            13 => RwLockReadDone,
            14 => RwLockTryRead,
            15 => RwLockTryReadDone,
            16 => RwLockTimedRead,
            17 => RwLockTimedReadDone,
            18 => RwLockWrite,
            19 => RwLockWriteDone,
            20 => RwLockTryWrite,
            21 => RwLockTryWriteDone,
            22 => RwLockTimedWrite,
            23 => RwLockTimedWriteDone,
            24 => RwLockUnlock,
            25 => CondInit,
            26 => CondDestroy,
            27 => CondSignal,
            28 => CondBroadcast,
            29 => CondWait,
            30 => CondWaitDone,
            31 => CondTimedWait,
            32 => CondTimedWaitDone,
            _ => return None,
        })
    }

    /// True for the begin side of a begin/`Done` pair.
    ///
    /// Begin events carry `result = 0` and `duration_ns = 0`; the
    /// matching `Done` event carries the real call's outcome.
    pub fn is_begin(self) -> bool {
        use EventKind::*;
        matches!(
            self,
            MutexLock
                | MutexTryLock
                | MutexTimedLock
                | RwLockRead
                | RwLockTryRead
                | RwLockTimedRead
                | RwLockWrite
                | RwLockTryWrite
                | RwLockTimedWrite
                | CondWait
                | CondTimedWait
        )
    }

    /// Stable display name, for reports and summaries.
    pub fn label(self) -> &'static str {
        use EventKind::*;
        match self {
            ThreadCreate => "thread_create",
            MutexInit => "mutex_init",
            MutexDestroy => "mutex_destroy",
            MutexLock => "mutex_lock",
            MutexLockDone => "mutex_lock_done",
            MutexTryLock => "mutex_trylock",
            MutexTryLockDone => "mutex_trylock_done",
            MutexTimedLock => "mutex_timedlock",
            MutexTimedLockDone => "mutex_timedlock_done",
            MutexUnlock => "mutex_unlock",
            RwLockInit => "rwlock_init",
            RwLockDestroy => "rwlock_destroy",
            RwLockRead => "rwlock_rdlock",
            RwLockReadDone => "rwlock_rdlock_done",
            RwLockTryRead => "rwlock_tryrdlock",
            RwLockTryReadDone => "rwlock_tryrdlock_done",
            RwLockTimedRead => "rwlock_timedrdlock",
            RwLockTimedReadDone => "rwlock_timedrdlock_done",
            RwLockWrite => "rwlock_wrlock",
            RwLockWriteDone => "rwlock_wrlock_done",
            RwLockTryWrite => "rwlock_trywrlock",
            RwLockTryWriteDone => "rwlock_trywrlock_done",
            RwLockTimedWrite => "rwlock_timedwrlock",
            RwLockTimedWriteDone => "rwlock_timedwrlock_done",
            RwLockUnlock => "rwlock_unlock",
            CondInit => "cond_init",
            CondDestroy => "cond_destroy",
            CondSignal => "cond_signal",
            CondBroadcast => "cond_broadcast",
            CondWait => "cond_wait",
            CondWaitDone => "cond_wait_done",
            CondTimedWait => "cond_timedwait",
            CondTimedWaitDone => "cond_timedwait_done",
        }
    }
}

/// One traced synchronization operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Nanoseconds from the monotonic clock's epoch, taken under the
    /// writer lock.
    pub timestamp_ns: u64,
    /// OS thread id of the calling thread (`gettid`).
    pub tid: u32,
    pub kind: EventKind,
    /// Identity of the primary primitive (mutex, rwlock, condvar, or
    /// thread handle address).
    pub ptr1: u64,
    /// Secondary identity: the mutex passed to a cond-wait. Zero when
    /// absent.
    pub ptr2: u64,
    /// Return status of the real call; 0 on begin events.
    pub result: i32,
    /// Elapsed nanoseconds of the real call for `Done` events; 0
    /// otherwise.
    pub duration_ns: u64,
    /// Innermost-first frame addresses, at most [`MAX_STACK_DEPTH`].
    pub stack: SmallVec<[u64; MAX_STACK_DEPTH]>,
}
