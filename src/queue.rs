//! Bounded blocking FIFO.
//!
//! One mutex guards the items; two condition variables carry the wake-ups:
//! `not_full` for producers waiting for a slot and `not_empty` for consumers
//! waiting for an item. Each state change wakes exactly one waiter of the
//! matching kind, and every waiter re-checks its condition after waking.

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::cancel::{CancelToken, Unpark};
use crate::error::{PutError, TakeError};

struct Shared<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> Shared<T> {
    // `items` is only changed by single push/pop calls, so a panic while
    // holding the lock cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send> Unpark for Shared<T> {
    fn unpark(&self) {
        drop(self.lock());
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

/// What a waiter is waiting for.
#[derive(Clone, Copy)]
enum Wait {
    Slot,
    Item,
}

enum WaitOutcome {
    Ready,
    TimedOut,
    Cancelled,
}

/// A fixed-capacity FIFO shared between producer and consumer threads.
///
/// Cloning yields another handle to the same queue.
pub struct BoundedQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        Self {
            shared: Arc::new(Shared {
                items: Mutex::new(VecDeque::with_capacity(capacity)),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.shared.lock().len() >= self.shared.capacity
    }

    /// Appends `item` if there is a free slot, without waiting.
    pub fn try_put(&self, item: T) -> Result<(), PutError<T>> {
        let mut items = self.shared.lock();
        if items.len() >= self.shared.capacity {
            return Err(PutError::Full(item));
        }
        self.push(&mut items, item);
        Ok(())
    }

    /// Removes the head item if there is one, without waiting.
    pub fn try_take(&self) -> Result<T, TakeError> {
        let mut items = self.shared.lock();
        self.pop(&mut items).ok_or(TakeError::Empty)
    }

    fn push(&self, items: &mut VecDeque<T>, item: T) {
        items.push_back(item);
        trace!(size = items.len(), "put");
        self.shared.not_empty.notify_one();
    }

    fn pop(&self, items: &mut VecDeque<T>) -> Option<T> {
        let item = items.pop_front()?;
        trace!(size = items.len(), "take");
        self.shared.not_full.notify_one();
        Some(item)
    }

    fn is_ready(&self, items: &VecDeque<T>, wait: Wait) -> bool {
        match wait {
            Wait::Slot => items.len() < self.shared.capacity,
            Wait::Item => !items.is_empty(),
        }
    }

    fn condvar(&self, wait: Wait) -> &Condvar {
        match wait {
            Wait::Slot => &self.shared.not_full,
            Wait::Item => &self.shared.not_empty,
        }
    }
}

// A waiting call registers the queue with its token as an `Arc<dyn Unpark>`,
// which is why the blocking operations need `T: Send + 'static`. The queue
// handle itself may still be borrowed (e.g. by scoped threads); only the
// items must be owned. `try_put`/`try_take` have no such bound.
impl<T: Send + 'static> BoundedQueue<T> {
    /// Appends `item`, waiting as long as the queue is full.
    ///
    /// Fails with [`PutError::Cancelled`] if `token` is cancelled while the
    /// call is waiting; the item is returned inside the error and the queue
    /// is left untouched.
    pub fn put(&self, item: T, token: &CancelToken) -> Result<(), PutError<T>> {
        self.put_until(item, None, token)
    }

    /// Like [`put`](Self::put), but gives up with [`PutError::Timeout`]
    /// after `timeout`. A timeout too large to represent waits forever.
    pub fn offer(&self, item: T, timeout: Duration, token: &CancelToken) -> Result<(), PutError<T>> {
        self.put_until(item, Instant::now().checked_add(timeout), token)
    }

    /// Removes the head item, waiting as long as the queue is empty.
    ///
    /// Fails with [`TakeError::Cancelled`] if `token` is cancelled while the
    /// call is waiting.
    pub fn take(&self, token: &CancelToken) -> Result<T, TakeError> {
        self.take_until(None, token)
    }

    /// Like [`take`](Self::take), but gives up with [`TakeError::Timeout`]
    /// after `timeout`. A timeout too large to represent waits forever.
    pub fn poll(&self, timeout: Duration, token: &CancelToken) -> Result<T, TakeError> {
        self.take_until(Instant::now().checked_add(timeout), token)
    }

    fn put_until(
        &self,
        item: T,
        deadline: Option<Instant>,
        token: &CancelToken,
    ) -> Result<(), PutError<T>> {
        let items = self.shared.lock();
        let (mut items, outcome) = self.wait_for(items, Wait::Slot, deadline, token);
        match outcome {
            WaitOutcome::Ready => {
                self.push(&mut items, item);
                Ok(())
            }
            WaitOutcome::TimedOut => Err(PutError::Timeout(item)),
            WaitOutcome::Cancelled => Err(PutError::Cancelled(item)),
        }
    }

    fn take_until(&self, deadline: Option<Instant>, token: &CancelToken) -> Result<T, TakeError> {
        let items = self.shared.lock();
        let (mut items, outcome) = self.wait_for(items, Wait::Item, deadline, token);
        match outcome {
            WaitOutcome::Ready => self.pop(&mut items).ok_or(TakeError::Empty),
            WaitOutcome::TimedOut => Err(TakeError::Timeout),
            WaitOutcome::Cancelled => Err(TakeError::Cancelled),
        }
    }

    /// Suspends on the condition for `wait` until it holds, the deadline
    /// passes or the token is cancelled. The lock is released while
    /// suspended and held again on return.
    fn wait_for<'a>(
        &'a self,
        mut items: MutexGuard<'a, VecDeque<T>>,
        wait: Wait,
        deadline: Option<Instant>,
        token: &CancelToken,
    ) -> (MutexGuard<'a, VecDeque<T>>, WaitOutcome) {
        if self.is_ready(&items, wait) {
            return (items, WaitOutcome::Ready);
        }

        let site: Arc<dyn Unpark> = self.shared.clone();
        let _parked = token.register(site);
        let condvar = self.condvar(wait);

        loop {
            // Cancellation wins over a condition that came true while this
            // waiter was being woken.
            if token.is_cancelled() {
                debug!(len = items.len(), "wait cancelled");
                self.pass_on(&items, wait);
                return (items, WaitOutcome::Cancelled);
            }
            if self.is_ready(&items, wait) {
                return (items, WaitOutcome::Ready);
            }

            items = match deadline {
                None => condvar.wait(items).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!(len = items.len(), "wait timed out");
                        self.pass_on(&items, wait);
                        return (items, WaitOutcome::TimedOut);
                    }
                    condvar
                        .wait_timeout(items, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    // A waiter that gives up may have swallowed the one wake meant for its
    // condition; hand it to the next waiter if the condition now holds.
    fn pass_on(&self, items: &VecDeque<T>, wait: Wait) {
        if self.is_ready(items, wait) {
            self.condvar(wait).notify_one();
        }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
