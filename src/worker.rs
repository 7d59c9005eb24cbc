//! Producer and consumer run loops.
//!
//! Both loops check their token at the top of every round, pace themselves
//! with an interruptible sleep, and treat `Cancelled` from the sleep or the
//! queue as the signal to finish. Cancellation ends the loop locally: the
//! caller gets a [`WorkerReport`], not an error.

use std::ops::ControlFlow;
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::cancel::CancelToken;
use crate::queue::BoundedQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The token was cancelled.
    Cancelled,
    /// The producer ran out of items or the consumer's handler broke out.
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub name: String,
    pub processed: usize,
    pub stop: StopReason,
}

impl WorkerReport {
    fn new(name: &str, processed: usize, stop: StopReason) -> Self {
        info!(worker = name, processed, ?stop, "worker finished");
        Self {
            name: name.to_string(),
            processed,
            stop,
        }
    }
}

/// Puts every item from `items` into `queue`, sleeping `pacing` before each.
pub fn run_producer<T, I>(
    name: &str,
    queue: &BoundedQueue<T>,
    token: &CancelToken,
    items: I,
    pacing: Duration,
) -> WorkerReport
where
    T: Send + 'static,
    I: IntoIterator<Item = T>,
{
    let mut items = items.into_iter();
    let mut produced = 0;

    while !token.is_cancelled() {
        if token.sleep(pacing).is_err() {
            break;
        }
        let Some(item) = items.next() else {
            return WorkerReport::new(name, produced, StopReason::Completed);
        };
        match queue.put(item, token) {
            Ok(()) => {
                produced += 1;
                trace!(worker = name, produced, "produced");
            }
            Err(err) => {
                debug!(worker = name, %err, "put interrupted, dropping pending item");
                break;
            }
        }
    }

    WorkerReport::new(name, produced, StopReason::Cancelled)
}

/// Takes items from `queue` and hands them to `handler`, sleeping `pacing`
/// before each take.
pub fn run_consumer<T, F>(
    name: &str,
    queue: &BoundedQueue<T>,
    token: &CancelToken,
    pacing: Duration,
    mut handler: F,
) -> WorkerReport
where
    T: Send + 'static,
    F: FnMut(T) -> ControlFlow<()>,
{
    let mut consumed = 0;

    while !token.is_cancelled() {
        if token.sleep(pacing).is_err() {
            break;
        }
        match queue.take(token) {
            Ok(item) => {
                consumed += 1;
                trace!(worker = name, consumed, "consumed");
                if handler(item).is_break() {
                    return WorkerReport::new(name, consumed, StopReason::Completed);
                }
            }
            Err(err) => {
                debug!(worker = name, %err, "take interrupted");
                break;
            }
        }
    }

    WorkerReport::new(name, consumed, StopReason::Cancelled)
}
