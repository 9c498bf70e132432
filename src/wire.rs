//! Varint wire format for trace records.
//!
//! A trace file is a plain concatenation of encoded events with no
//! framing, no length prefixes and no alignment; record boundaries are
//! recoverable only by decoding fields in order. Each record is, in
//! order:
//!
//! 1. `varint(timestamp_ns)`
//! 2. `varint(tid)`
//! 3. one type-tag byte
//! 4. `varint(ptr1)`
//! 5. `varint(ptr2)` (zero encodes as the single byte `0x00`)
//! 6. `varint(result)` with the signed result widened to 64 bits
//!    preserving its two's-complement bit pattern
//! 7. `varint(duration_ns)`
//! 8. `varint(depth)` followed by `varint(frame)` per stack frame
//!
//! Varints are little-endian base-128: seven payload bits per byte,
//! continuation bit set on every byte except the last.

use smallvec::SmallVec;
use thiserror::Error;

use crate::event::{Event, EventKind, MAX_STACK_DEPTH};

/// Longest legal varint for a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

/// Why a byte stream failed to decode as a trace record.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The input ended in the middle of a record. Trace files are
    /// best-effort and may be cut anywhere, including mid-field.
    #[error("input ended inside a record")]
    Truncated,
    /// A varint ran past the 10 bytes a 64-bit value can need.
    #[error("varint exceeds {MAX_VARINT_LEN} bytes")]
    VarintTooLong,
    /// The type-tag byte names no known event kind.
    #[error("unknown event type tag {0}")]
    UnknownTag(u8),
    /// A stack depth larger than the writer can ever produce.
    #[error("stack depth {0} exceeds the {MAX_STACK_DEPTH}-frame cap")]
    StackTooDeep(u64),
}

/// Append `value` to `buf` as a varint.
pub fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode one varint from the front of `input`.
///
/// Returns the value and the number of bytes consumed.
pub fn take_varint(input: &[u8]) -> Result<(u64, usize), DecodeError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (used, &byte) in input.iter().enumerate() {
        if used == MAX_VARINT_LEN {
            return Err(DecodeError::VarintTooLong);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, used + 1));
        }
        shift += 7;
    }
    Err(DecodeError::Truncated)
}

/// Append one event record to `buf`.
pub fn encode_event(buf: &mut Vec<u8>, event: &Event) {
    put_varint(buf, event.timestamp_ns);
    put_varint(buf, u64::from(event.tid));
    buf.push(event.kind.tag());
    put_varint(buf, event.ptr1);
    put_varint(buf, event.ptr2);
    // Widen preserving the two's-complement bit pattern, so -1 becomes
    // 0xFFFF_FFFF_FFFF_FFFF on the wire.
    put_varint(buf, event.result as i64 as u64);
    put_varint(buf, event.duration_ns);
    put_varint(buf, event.stack.len() as u64);
    for &frame in &event.stack {
        put_varint(buf, frame);
    }
}

/// Decode one event record from the front of `input`.
///
/// Returns the event and the exact number of bytes it occupied.
pub fn decode_event(input: &[u8]) -> Result<(Event, usize), DecodeError> {
    let mut pos = 0usize;

    let (timestamp_ns, used) = take_varint(&input[pos..])?;
    pos += used;
    let (tid, used) = take_varint(&input[pos..])?;
    pos += used;

    let tag = *input.get(pos).ok_or(DecodeError::Truncated)?;
    pos += 1;
    let kind = EventKind::from_tag(tag).ok_or(DecodeError::UnknownTag(tag))?;

    let (ptr1, used) = take_varint(&input[pos..])?;
    pos += used;
    let (ptr2, used) = take_varint(&input[pos..])?;
    pos += used;
    let (result_bits, used) = take_varint(&input[pos..])?;
    pos += used;
    let (duration_ns, used) = take_varint(&input[pos..])?;
    pos += used;

    let (depth, used) = take_varint(&input[pos..])?;
    pos += used;
    if depth > MAX_STACK_DEPTH as u64 {
        return Err(DecodeError::StackTooDeep(depth));
    }
    let mut stack = SmallVec::new();
    for _ in 0..depth {
        let (frame, used) = take_varint(&input[pos..])?;
        pos += used;
        stack.push(frame);
    }

    let event = Event {
        timestamp_ns,
        tid: tid as u32,
        kind,
        ptr1,
        ptr2,
        result: result_bits as i64 as i32,
        duration_ns,
        stack,
    };
    Ok((event, pos))
}
