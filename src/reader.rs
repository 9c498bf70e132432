//! Offline trace decoding.
//!
//! Trace files are best-effort: the producer may die mid-record, so a
//! file can end anywhere. [`TraceReader`] walks complete records and
//! reports a single decode error for a damaged or truncated tail;
//! [`read_trace`] is the forgiving loader that keeps whatever decoded
//! cleanly.

use std::path::Path;

use anyhow::{Context, Result};

use crate::event::Event;
use crate::wire::{decode_event, DecodeError};

/// Iterator over the records of an in-memory trace.
///
/// Yields `Ok(event)` per complete record in file order. The first
/// decode failure is yielded once as `Err` and ends the iteration;
/// there is no framing to resynchronise on.
pub struct TraceReader<'a> {
    input: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> TraceReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        TraceReader {
            input,
            pos: 0,
            failed: false,
        }
    }

    /// Byte offset of the next undecoded record.
    pub fn offset(&self) -> usize {
        self.pos
    }
}

impl Iterator for TraceReader<'_> {
    type Item = Result<Event, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.input.len() {
            return None;
        }
        match decode_event(&self.input[self.pos..]) {
            Ok((event, used)) => {
                self.pos += used;
                Some(Ok(event))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Load every complete event from a trace file.
///
/// A truncated trailing record is dropped silently; producers flush
/// per event, so everything before the cut is intact.
pub fn read_trace(path: impl AsRef<Path>) -> Result<Vec<Event>> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).with_context(|| format!("reading trace file {}", path.display()))?;
    Ok(TraceReader::new(&bytes)
        .take_while(|record| record.is_ok())
        .filter_map(|record| record.ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::wire::encode_event;
    use smallvec::smallvec;

    fn event(kind: EventKind, timestamp_ns: u64) -> Event {
        Event {
            timestamp_ns,
            tid: 7,
            kind,
            ptr1: 0x1000,
            ptr2: 0,
            result: 0,
            duration_ns: 0,
            stack: smallvec![0xfeed],
        }
    }

    fn trace_of(events: &[Event]) -> Vec<u8> {
        let mut buf = Vec::new();
        for ev in events {
            encode_event(&mut buf, ev);
        }
        buf
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert_eq!(TraceReader::new(&[]).count(), 0);
    }

    #[test]
    fn reads_back_concatenated_records() {
        let events = vec![
            event(EventKind::MutexLock, 10),
            event(EventKind::MutexLockDone, 20),
            event(EventKind::MutexUnlock, 30),
        ];
        let buf = trace_of(&events);
        let decoded: Vec<Event> = TraceReader::new(&buf).map(|r| r.unwrap()).collect();
        assert_eq!(decoded, events);
    }

    #[test]
    fn truncated_tail_reports_one_error_then_stops() {
        let events = vec![
            event(EventKind::MutexLock, 10),
            event(EventKind::MutexLockDone, 20),
        ];
        let buf = trace_of(&events);
        // Cut into the middle of the second record.
        let cut = buf.len() - 3;
        let mut reader = TraceReader::new(&buf[..cut]);

        assert_eq!(reader.next().unwrap().unwrap(), events[0]);
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn offset_tracks_record_boundaries() {
        let one = event(EventKind::CondSignal, 1);
        let mut first = Vec::new();
        encode_event(&mut first, &one);
        let first_len = first.len();
        encode_event(&mut first, &event(EventKind::CondBroadcast, 2));

        let mut reader = TraceReader::new(&first);
        reader.next().unwrap().unwrap();
        assert_eq!(reader.offset(), first_len);
    }

    #[test]
    fn read_trace_drops_truncated_tail() {
        let events = vec![
            event(EventKind::RwLockRead, 5),
            event(EventKind::RwLockReadDone, 6),
        ];
        let mut buf = trace_of(&events);
        buf.pop();

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &buf).unwrap();

        let decoded = read_trace(file.path()).unwrap();
        assert_eq!(decoded, &events[..1]);
    }

    #[test]
    fn read_trace_missing_file_is_an_error() {
        assert!(read_trace("/nonexistent/skeleton_key.bin").is_err());
    }
}
