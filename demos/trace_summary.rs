//! Decode a skeletonkey trace and summarise it per primitive.
//!
//! ```text
//! cargo run --example trace_summary [-- /path/to/trace [--json]]
//! ```
//!
//! Without arguments it reads the default output path. `--json` dumps
//! every event as a JSON line instead of the aggregate table.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use skeletonkey::{logger, read_trace, Event};

#[derive(Default)]
struct LockStats {
    events: usize,
    waits: usize,
    total_wait_ns: u64,
    max_wait_ns: u64,
}

fn summarise(events: &[Event]) {
    let mut per_lock: BTreeMap<u64, LockStats> = BTreeMap::new();
    for event in events {
        let stats = per_lock.entry(event.ptr1).or_default();
        stats.events += 1;
        if event.duration_ns > 0 {
            stats.waits += 1;
            stats.total_wait_ns += event.duration_ns;
            stats.max_wait_ns = stats.max_wait_ns.max(event.duration_ns);
        }
    }

    let mut rows: Vec<(u64, LockStats)> = per_lock.into_iter().collect();
    rows.sort_by_key(|(_, stats)| std::cmp::Reverse(stats.total_wait_ns));

    println!("{} events, {} primitives", events.len(), rows.len());
    println!(
        "{:>18}  {:>7}  {:>7}  {:>12}  {:>12}",
        "primitive", "events", "waits", "total wait", "max wait"
    );
    for (ptr, stats) in rows {
        println!(
            "{:#18x}  {:>7}  {:>7}  {:>10}us  {:>10}us",
            ptr,
            stats.events,
            stats.waits,
            stats.total_wait_ns / 1_000,
            stats.max_wait_ns / 1_000,
        );
    }

    let mut per_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
    for event in events {
        *per_kind.entry(event.kind.label()).or_default() += 1;
    }
    println!();
    for (label, count) in per_kind {
        println!("{label:>24}  {count}");
    }
}

fn main() -> Result<()> {
    let mut json = false;
    let mut path: Option<PathBuf> = None;
    for arg in std::env::args().skip(1) {
        if arg == "--json" {
            json = true;
        } else {
            path = Some(PathBuf::from(arg));
        }
    }
    let path = path.unwrap_or_else(logger::output_path);

    let events = read_trace(&path)?;
    if json {
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
    } else {
        println!("trace: {}", path.display());
        summarise(&events);
    }
    Ok(())
}
