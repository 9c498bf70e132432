#![no_main]

use libfuzzer_sys::fuzz_target;
use skeletonkey::TraceReader;

fuzz_target!(|data: &[u8]| {
    // Trace files may be truncated or corrupted anywhere; walking one
    // must never panic, whatever the bytes.
    for record in TraceReader::new(data) {
        let _ = record;
    }
});
