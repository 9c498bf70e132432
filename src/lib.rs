//! Skeletonkey - preload tracer for pthread synchronization primitives
//!
//! Skeletonkey observes every mutex, reader/writer-lock and
//! condition-variable operation of a multi-threaded native process by
//! interposing on the pthread symbols at load time. Each operation is
//! recorded with its timestamp, thread id, call stack, outcome and
//! duration to a compact varint-encoded trace file that offline tools
//! decode for reports and timeline visualisation.
//!
//! Build the cdylib and preload it:
//!
//! ```text
//! SKELETONKEY_OUTPUT=/tmp/app.trace LD_PRELOAD=target/release/libskeletonkey.so ./app
//! ```
//!
//! The tracer never alters the host's behavior: shims forward every
//! call to the real implementation and return its result unchanged,
//! and a per-thread reentrancy guard keeps the tracer's own locking
//! out of the trace.

pub mod clock;
pub mod event;
pub mod guard;
pub mod interpose;
pub mod logger;
pub mod reader;
pub mod real;
pub mod stack;
pub mod wire;

pub use event::{Event, EventKind, MAX_STACK_DEPTH};
pub use logger::EventLogger;
pub use reader::{read_trace, TraceReader};
