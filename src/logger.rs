//! The process-wide event logger.
//!
//! Exactly one writer serialises all events: records from every
//! thread must form a single linear file and share one scratch
//! buffer, so the logger is a lazily-initialised singleton whose
//! mutation is confined to [`EventLogger::log`].
//!
//! Timestamps are taken *under* the writer lock, which makes file
//! order agree with the monotonic clock: if record A precedes record B
//! in the file, `A.timestamp_ns <= B.timestamp_ns`.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use nix::unistd::gettid;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::clock;
use crate::event::{Event, EventKind, MAX_STACK_DEPTH};
use crate::guard::ReentryGuard;
use crate::stack;
use crate::wire;

/// Environment variable naming the trace output file.
pub const OUTPUT_ENV: &str = "SKELETONKEY_OUTPUT";

/// Fallback output path when [`OUTPUT_ENV`] is unset.
pub const DEFAULT_OUTPUT: &str = "/tmp/skeleton_key.bin";

/// Where the trace goes: `SKELETONKEY_OUTPUT`, or the default path.
pub fn output_path() -> PathBuf {
    std::env::var_os(OUTPUT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
}

struct Sink {
    file: File,
    scratch: Vec<u8>,
}

/// Serialising writer for trace events.
pub struct EventLogger {
    initialized: AtomicBool,
    sink: Mutex<Option<Sink>>,
}

static LOGGER: EventLogger = EventLogger::new();

impl EventLogger {
    const fn new() -> Self {
        EventLogger {
            initialized: AtomicBool::new(false),
            sink: Mutex::new(None),
        }
    }

    /// The singleton all shims log through.
    pub fn global() -> &'static EventLogger {
        &LOGGER
    }

    /// Open the trace file, truncating any prior content.
    ///
    /// Idempotent: the first call decides the path, later calls are
    /// no-ops. If the file cannot be opened the logger stays disabled
    /// and every subsequent [`log`](Self::log) drops silently; shims
    /// keep forwarding either way.
    pub fn init(&self, path: &Path) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        match File::create(path) {
            Ok(file) => {
                debug!(path = %path.display(), "trace output open");
                *self.lock_sink() = Some(Sink {
                    file,
                    scratch: Vec::with_capacity(256),
                });
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "cannot open trace output, tracing disabled");
            }
        }
    }

    /// Record one event.
    ///
    /// Before init (or after close) events are dropped silently.
    /// Timestamp, thread id and call stack are captured here, under
    /// the writer lock. Write errors are swallowed: the traced call
    /// has already returned its result, and the next event retries.
    pub fn log(&self, kind: EventKind, ptr1: u64, ptr2: u64, result: i32, duration_ns: u64) {
        if !self.initialized.load(Ordering::Acquire) {
            return;
        }

        // Hold the guard while writing so any lock the unwinder,
        // allocator or file layer takes forwards untraced. When the
        // caller is a shim the guard is already held and this is a
        // no-op.
        let _reentry = ReentryGuard::enter();

        let mut sink = self.lock_sink();
        let Some(sink) = sink.as_mut() else {
            return;
        };

        let mut frames = [0u64; MAX_STACK_DEPTH];
        let depth = stack::capture(&mut frames);

        let event = Event {
            timestamp_ns: clock::now_ns(),
            tid: gettid().as_raw() as u32,
            kind,
            ptr1,
            ptr2,
            result,
            duration_ns,
            stack: SmallVec::from_slice(&frames[..depth]),
        };

        sink.scratch.clear();
        wire::encode_event(&mut sink.scratch, &event);
        if sink.file.write_all(&sink.scratch).is_ok() {
            let _ = sink.file.flush();
        }
    }

    /// Flush and close the trace file. Later events are dropped.
    pub fn close(&self) {
        if let Some(sink) = self.lock_sink().take() {
            drop(sink);
            debug!("trace output closed");
        }
    }

    fn lock_sink(&self) -> std::sync::MutexGuard<'_, Option<Sink>> {
        // A panic while holding the writer lock poisons it; the sink
        // itself is still consistent (scratch is cleared per event).
        match self.sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
