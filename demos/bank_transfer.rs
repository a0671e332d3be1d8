//! Concurrent transfer demo
//!
//! Four workers move money between eight accounts. Each transfer write-locks
//! the two accounts involved, so workers regularly deadlock on crossing
//! transfers; the manager denies a victim, the worker backs off and retries.
//! Run with `RUST_LOG=warn` to see the deadlock probe at work.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rslock::{Config, ContentionMatrix, LockGuard, LockManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Mode {
    Write,
}

const ACCOUNTS: usize = 8;
const TRANSFERS: usize = 200;
const WORKERS: u64 = 4;

fn main() {
    env_logger::init();

    let matrix = ContentionMatrix::new().with_conflict(Mode::Write, Mode::Write);
    let config =
        Config::with_tick_interval(Duration::from_millis(50)).expect("valid tick interval");
    let manager: Arc<LockManager<usize, u64, Mode>> =
        Arc::new(LockManager::with_config(matrix, config).expect("valid config"));

    let mut handles = Vec::new();
    for tx in 1..=WORKERS {
        let manager = Arc::clone(&manager);
        handles.push(thread::spawn(move || {
            let mut denials = 0u32;
            for step in 0..TRANSFERS {
                let from = (tx as usize + step) % ACCOUNTS;
                let to = (tx as usize + step * 3 + 1) % ACCOUNTS;
                if from == to {
                    continue;
                }
                loop {
                    let source = LockGuard::new(&*manager, from, tx, Mode::Write);
                    if !source.owns() {
                        denials += 1;
                        thread::sleep(Duration::from_millis(1));
                        continue;
                    }
                    let target = LockGuard::new(&*manager, to, tx, Mode::Write);
                    if !target.owns() {
                        // Deadlock victim: release the source lock by
                        // dropping the guard, back off, retry the pair.
                        denials += 1;
                        drop(target);
                        drop(source);
                        thread::sleep(Duration::from_millis(1));
                        continue;
                    }
                    // The transfer itself would happen here, under both
                    // locks; the guards release them on scope exit.
                    break;
                }
            }
            denials
        }));
    }

    for (worker, handle) in handles.into_iter().enumerate() {
        let denials = handle.join().expect("worker panicked");
        println!(
            "worker {} completed {} transfers with {} deadlock denials",
            worker + 1,
            TRANSFERS,
            denials
        );
    }

    let stats = manager.stats();
    println!(
        "final state: {} records, {} requests, {} edges (idle: {})",
        stats.records,
        stats.requests,
        stats.edges,
        stats.is_idle()
    );
}
