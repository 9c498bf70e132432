//! Resolution of the real pthread entry points.
//!
//! Every interposed symbol forwards to the implementation the dynamic
//! linker would have chosen next in search order (`RTLD_NEXT`). The
//! whole table resolves once, at library load, and is immutable
//! afterwards; the hot path only ever reads it.
//!
//! Condition-variable symbols are the exception to plain lookup: glibc
//! changed the condvar layout in 2.3.2 and kept both layouts behind
//! symbol versions. Taking the unversioned default would hand the host
//! application a condvar ABI it was not linked against, so those six
//! symbols resolve through `dlvsym` with an explicit version.

use std::ffi::CStr;
use std::sync::OnceLock;

use anyhow::{bail, Result};
use libc::{
    c_int, c_void, pthread_attr_t, pthread_cond_t, pthread_condattr_t, pthread_mutex_t,
    pthread_mutexattr_t, pthread_rwlock_t, pthread_rwlockattr_t, pthread_t, timespec,
};

pub type MutexInitFn =
    unsafe extern "C" fn(*mut pthread_mutex_t, *const pthread_mutexattr_t) -> c_int;
pub type MutexOpFn = unsafe extern "C" fn(*mut pthread_mutex_t) -> c_int;
pub type MutexTimedFn = unsafe extern "C" fn(*mut pthread_mutex_t, *const timespec) -> c_int;

pub type RwlockInitFn =
    unsafe extern "C" fn(*mut pthread_rwlock_t, *const pthread_rwlockattr_t) -> c_int;
pub type RwlockOpFn = unsafe extern "C" fn(*mut pthread_rwlock_t) -> c_int;
pub type RwlockTimedFn = unsafe extern "C" fn(*mut pthread_rwlock_t, *const timespec) -> c_int;

pub type CondInitFn = unsafe extern "C" fn(*mut pthread_cond_t, *const pthread_condattr_t) -> c_int;
pub type CondOpFn = unsafe extern "C" fn(*mut pthread_cond_t) -> c_int;
pub type CondWaitFn = unsafe extern "C" fn(*mut pthread_cond_t, *mut pthread_mutex_t) -> c_int;
pub type CondTimedWaitFn =
    unsafe extern "C" fn(*mut pthread_cond_t, *mut pthread_mutex_t, *const timespec) -> c_int;

/// Thread start routine, as `pthread_create` expects it.
pub type ThreadStart = extern "C" fn(*mut c_void) -> *mut c_void;
pub type ThreadCreateFn =
    unsafe extern "C" fn(*mut pthread_t, *const pthread_attr_t, ThreadStart, *mut c_void) -> c_int;

/// Symbol version carrying the condvar layout the host was linked
/// against. Architectures added to glibc after the 2.3.2 layout change
/// only ever shipped the new layout, under their baseline version.
#[cfg(target_arch = "x86_64")]
const COND_SYMBOL_VERSION: Option<&CStr> = Some(c"GLIBC_2.3.2");
#[cfg(target_arch = "aarch64")]
const COND_SYMBOL_VERSION: Option<&CStr> = Some(c"GLIBC_2.17");
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
const COND_SYMBOL_VERSION: Option<&CStr> = None;

fn lookup(name: &CStr) -> Result<*mut c_void> {
    let ptr = unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr()) };
    if ptr.is_null() {
        bail!("dlsym(RTLD_NEXT, {name:?}) found no next definition");
    }
    Ok(ptr)
}

fn lookup_cond(name: &CStr) -> Result<*mut c_void> {
    let Some(version) = COND_SYMBOL_VERSION else {
        return lookup(name);
    };
    let ptr = unsafe { libc::dlvsym(libc::RTLD_NEXT, name.as_ptr(), version.as_ptr()) };
    if ptr.is_null() {
        bail!("dlvsym(RTLD_NEXT, {name:?}, {version:?}) found no next definition");
    }
    Ok(ptr)
}

macro_rules! plain {
    ($name:expr) => {
        unsafe { std::mem::transmute::<*mut c_void, _>(lookup($name)?) }
    };
}

macro_rules! versioned {
    ($name:expr) => {
        unsafe { std::mem::transmute::<*mut c_void, _>(lookup_cond($name)?) }
    };
}

/// The resolved real implementations of every interposed symbol.
pub struct RealPthread {
    pub mutex_init: MutexInitFn,
    pub mutex_destroy: MutexOpFn,
    pub mutex_lock: MutexOpFn,
    pub mutex_trylock: MutexOpFn,
    pub mutex_timedlock: MutexTimedFn,
    pub mutex_unlock: MutexOpFn,

    pub rwlock_init: RwlockInitFn,
    pub rwlock_destroy: RwlockOpFn,
    pub rwlock_rdlock: RwlockOpFn,
    pub rwlock_tryrdlock: RwlockOpFn,
    pub rwlock_timedrdlock: RwlockTimedFn,
    pub rwlock_wrlock: RwlockOpFn,
    pub rwlock_trywrlock: RwlockOpFn,
    pub rwlock_timedwrlock: RwlockTimedFn,
    pub rwlock_unlock: RwlockOpFn,

    pub cond_init: CondInitFn,
    pub cond_destroy: CondOpFn,
    pub cond_signal: CondOpFn,
    pub cond_broadcast: CondOpFn,
    pub cond_wait: CondWaitFn,
    pub cond_timedwait: CondTimedWaitFn,

    pub thread_create: ThreadCreateFn,
}

impl RealPthread {
    /// Resolve the full table, failing if any symbol is missing.
    pub fn resolve() -> Result<Self> {
        Ok(RealPthread {
            mutex_init: plain!(c"pthread_mutex_init"),
            mutex_destroy: plain!(c"pthread_mutex_destroy"),
            mutex_lock: plain!(c"pthread_mutex_lock"),
            mutex_trylock: plain!(c"pthread_mutex_trylock"),
            mutex_timedlock: plain!(c"pthread_mutex_timedlock"),
            mutex_unlock: plain!(c"pthread_mutex_unlock"),

            rwlock_init: plain!(c"pthread_rwlock_init"),
            rwlock_destroy: plain!(c"pthread_rwlock_destroy"),
            rwlock_rdlock: plain!(c"pthread_rwlock_rdlock"),
            rwlock_tryrdlock: plain!(c"pthread_rwlock_tryrdlock"),
            rwlock_timedrdlock: plain!(c"pthread_rwlock_timedrdlock"),
            rwlock_wrlock: plain!(c"pthread_rwlock_wrlock"),
            rwlock_trywrlock: plain!(c"pthread_rwlock_trywrlock"),
            rwlock_timedwrlock: plain!(c"pthread_rwlock_timedwrlock"),
            rwlock_unlock: plain!(c"pthread_rwlock_unlock"),

            cond_init: versioned!(c"pthread_cond_init"),
            cond_destroy: versioned!(c"pthread_cond_destroy"),
            cond_signal: versioned!(c"pthread_cond_signal"),
            cond_broadcast: versioned!(c"pthread_cond_broadcast"),
            cond_wait: versioned!(c"pthread_cond_wait"),
            cond_timedwait: versioned!(c"pthread_cond_timedwait"),

            thread_create: plain!(c"pthread_create"),
        })
    }
}

static REAL: OnceLock<RealPthread> = OnceLock::new();

/// The process-wide resolved table.
///
/// The load constructor forces the one-time resolution before any
/// shim runs on the hot path. A missing symbol is fatal: the only
/// alternative would be a shim forwarding through a null pointer.
pub fn real() -> &'static RealPthread {
    REAL.get_or_init(|| match RealPthread::resolve() {
        Ok(table) => table,
        Err(err) => {
            eprintln!("skeletonkey: {err:#}");
            std::process::abort();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn all_symbols_resolve() {
        assert!(RealPthread::resolve().is_ok());
    }

    #[test]
    fn resolved_mutex_functions_work() {
        let table = real();
        let mut mutex: pthread_mutex_t = libc::PTHREAD_MUTEX_INITIALIZER;
        unsafe {
            assert_eq!((table.mutex_init)(&mut mutex, ptr::null()), 0);
            assert_eq!((table.mutex_lock)(&mut mutex), 0);
            assert_eq!((table.mutex_trylock)(&mut mutex), libc::EBUSY);
            assert_eq!((table.mutex_unlock)(&mut mutex), 0);
            assert_eq!((table.mutex_destroy)(&mut mutex), 0);
        }
    }

    #[test]
    fn resolved_cond_functions_work() {
        let table = real();
        let mut cond: pthread_cond_t = libc::PTHREAD_COND_INITIALIZER;
        unsafe {
            assert_eq!((table.cond_init)(&mut cond, ptr::null()), 0);
            assert_eq!((table.cond_signal)(&mut cond), 0);
            assert_eq!((table.cond_broadcast)(&mut cond), 0);
            assert_eq!((table.cond_destroy)(&mut cond), 0);
        }
    }

    #[test]
    fn missing_symbol_is_an_error() {
        assert!(lookup(c"pthread_totally_fictional_symbol").is_err());
    }
}
