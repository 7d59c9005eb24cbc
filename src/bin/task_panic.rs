//! A panicking task is reported, not lost.
//!
//! Run with: cargo run --bin task_panic

use bounded_queue::logging::{init_tracing, install_panic_hook};
use bounded_queue::{spawn, TaskError};
use colored::*;

fn crash() -> Result<(), TaskError> {
    let task = spawn("crasher", |_| {
        panic!("crashed");
    })?;
    task.join()
}

fn main() {
    init_tracing("info");
    install_panic_hook();

    println!("=== Catching a Task Panic ===\n");
    match crash() {
        Ok(()) => println!("{}", "task finished normally".green()),
        Err(TaskError::Panicked { task, message }) => {
            println!("{} task '{}' panicked with: {}", "caught:".yellow(), task, message)
        }
        Err(err) => eprintln!("{} {}", "error:".red().bold(), err),
    }

    println!("\n=== Key Points ===");
    println!("1. The panic hook logs the crash with the thread name");
    println!("2. join() turns the panic payload into TaskError::Panicked");
}
