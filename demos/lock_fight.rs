//! Contention generator: a handful of workers fighting over one mutex.
//!
//! Because the example binary links the tracer, its pthread calls are
//! interposed at link time, the same way `LD_PRELOAD` interposes them
//! for an arbitrary host. Run it, then inspect the output with the
//! `trace_summary` example:
//!
//! ```text
//! cargo run --example lock_fight
//! cargo run --example trace_summary
//! ```

use std::thread;
use std::time::Duration;

use skeletonkey::logger;

const WORKERS: usize = 5;
const ITERATIONS: usize = 3;

fn worker(id: usize, mutex: usize) {
    let mutex = mutex as *mut libc::pthread_mutex_t;
    for round in 0..ITERATIONS {
        println!("worker {id} trying to acquire the lock");
        unsafe { libc::pthread_mutex_lock(mutex) };
        println!("worker {id} got the lock");

        // Hold it long enough that someone else piles up behind us.
        let hold = 20 + (id * 17 + round * 11) % 40;
        thread::sleep(Duration::from_millis(hold as u64));

        println!("worker {id} releasing the lock");
        unsafe { libc::pthread_mutex_unlock(mutex) };

        thread::sleep(Duration::from_millis(((id + round) % 3) as u64 * 10));
    }
}

fn main() {
    let mutex = Box::into_raw(Box::new(libc::PTHREAD_MUTEX_INITIALIZER)) as usize;

    let workers: Vec<_> = (0..WORKERS)
        .map(|id| thread::spawn(move || worker(id, mutex)))
        .collect();
    for handle in workers {
        handle.join().expect("worker panicked");
    }

    println!("trace written to {}", logger::output_path().display());
}
