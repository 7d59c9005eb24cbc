//! Stopping a task that spends most of its time asleep.
//!
//! Run with: cargo run --bin stop_task

use std::thread;
use std::time::Duration;

use bounded_queue::logging::init_tracing;
use bounded_queue::{spawn, CancelToken, TaskError};
use colored::*;
use tracing::{info, warn};

const LIMIT: u32 = 1000;

/// Counts up past `limit`, napping every hundred steps. Ends at `limit + 1`
/// unless cancelled first.
fn count(token: &CancelToken, limit: u32, nap: Duration) -> u32 {
    let mut count = 0;
    while !token.is_cancelled() && count <= limit {
        count += 1;
        if count % 100 == 0 {
            info!(count, "checkpoint, sleeping");
            if let Err(err) = token.sleep(nap) {
                warn!(%err, "sleep interrupted");
                break;
            }
        }
    }
    count
}

fn count_until_stopped() -> Result<u32, TaskError> {
    let task = spawn("counter", |token| count(token, LIMIT, Duration::from_secs(1)))?;

    thread::sleep(Duration::from_secs(5));
    println!("{} state before cancel: {:?}", "main:".cyan(), task.state());
    task.cancel();
    task.join()
}

fn main() {
    init_tracing("info");

    println!("=== Stopping a Sleeping Task ===\n");
    match count_until_stopped() {
        Ok(count) if count <= LIMIT => {
            println!("{} stopped early at {}", "counter:".green(), count)
        }
        Ok(count) => println!("{} ran to the end ({})", "counter:".yellow(), count),
        Err(err) => eprintln!("{} {}", "error:".red().bold(), err),
    }

    println!("\n=== Key Points ===");
    println!("1. The loop checks the token at the top of every round");
    println!("2. cancel() wakes the sleep immediately instead of waiting it out");
    println!("3. The task decides to stop; nothing kills it");
}
