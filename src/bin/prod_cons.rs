//! Producers and consumers sharing one bounded queue, stopped by
//! cancellation after a fixed run time.
//!
//! Run with: cargo run --bin prod_cons [-- demos/prod_cons.toml]

use std::env;
use std::ops::ControlFlow;
use std::process::ExitCode;
use std::thread;

use bounded_queue::logging::{init_tracing, install_panic_hook};
use bounded_queue::{
    run_consumer, run_producer, spawn_with_token, BoundedQueue, CancelToken, ConfigError,
    DemoConfig, StopReason, TaskError, TaskHandle, WorkerReport,
};
use colored::*;
use crossbeam::channel::{unbounded, Sender};

//==============================================================================
// Part 1: Workers
//==============================================================================

fn spawn_workers(
    config: &DemoConfig,
    queue: &BoundedQueue<String>,
    group: &CancelToken,
    consumed: Sender<String>,
) -> Result<Vec<TaskHandle<WorkerReport>>, TaskError> {
    let mut tasks = Vec::with_capacity(config.producers + config.consumers);

    for id in 0..config.producers {
        let name = format!("producer-{}", id);
        let queue = queue.clone();
        let pacing = config.produce_interval();
        let task = spawn_with_token(name.clone(), group.clone(), move |token| {
            let items = (1..).map(move |n: u64| format!("{}-{}", id, n));
            run_producer(&name, &queue, token, items, pacing)
        })?;
        tasks.push(task);
    }

    for id in 0..config.consumers {
        let name = format!("consumer-{}", id);
        let queue = queue.clone();
        let pacing = config.consume_interval();
        let consumed = consumed.clone();
        let task = spawn_with_token(name.clone(), group.clone(), move |token| {
            run_consumer(&name, &queue, token, pacing, |item| {
                if consumed.send(item).is_err() {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
        })?;
        tasks.push(task);
    }

    Ok(tasks)
}

fn run(config: &DemoConfig) -> Result<(), TaskError> {
    let queue = BoundedQueue::new(config.capacity);
    let group = CancelToken::new();
    let (consumed_tx, consumed_rx) = unbounded();

    let tasks = match spawn_workers(config, &queue, &group, consumed_tx) {
        Ok(tasks) => tasks,
        Err(err) => {
            group.cancel();
            return Err(err);
        }
    };

    thread::sleep(config.run_for());
    println!("{}", "Stopping workers...".yellow());
    group.cancel();

    let reports = tasks
        .into_iter()
        .map(TaskHandle::join)
        .collect::<Result<Vec<_>, _>>()?;
    let consumed: Vec<String> = consumed_rx.try_iter().collect();

    print_summary(&reports, &consumed, &queue);
    Ok(())
}

//==============================================================================
// Part 2: Output
//==============================================================================

fn print_summary(reports: &[WorkerReport], consumed: &[String], queue: &BoundedQueue<String>) {
    println!("\n{}", "=== Worker Reports ===".bold());
    for report in reports {
        let stop = match report.stop {
            StopReason::Cancelled => "cancelled".red(),
            StopReason::Completed => "completed".green(),
        };
        println!("  {:<12} processed {:>5}  ({})", report.name, report.processed, stop);
    }

    println!("\n{}", "=== Queue ===".bold());
    println!("  consumed items: {:?}", consumed);
    println!("  left in queue:  {} of {}", queue.len(), queue.capacity());
}

fn load_config() -> Result<DemoConfig, ConfigError> {
    match env::args().nth(1) {
        Some(path) => DemoConfig::load(path),
        None => Ok(DemoConfig::default()),
    }
}

fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.log_filter);
    install_panic_hook();

    println!("=== Bounded Queue: Producer / Consumer ===\n");
    println!(
        "capacity {}, {} producer(s) every {:?}, {} consumer(s) every {:?}, running {:?}\n",
        config.capacity,
        config.producers,
        config.produce_interval(),
        config.consumers,
        config.consume_interval(),
        config.run_for()
    );

    if let Err(err) = run(&config) {
        eprintln!("{} {}", "error:".red().bold(), err);
        return ExitCode::FAILURE;
    }

    println!("\n=== Key Points ===");
    println!("1. put() suspends while the queue is full, take() while it is empty");
    println!("2. Each put/take wakes one waiter of the other side");
    println!("3. cancel() wakes suspended workers; they stop on their own");
    ExitCode::SUCCESS
}
