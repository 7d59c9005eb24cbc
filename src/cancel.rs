//! Cooperative cancellation.
//!
//! A [`CancelToken`] is a shared flag plus the list of places where its
//! holders are currently suspended. `cancel()` sets the flag and wakes every
//! such place; the woken waiter sees the flag and gives up on its own.
//! Nothing is ever stopped by force.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::Cancelled;

/// Something a cancelled token can wake up.
///
/// Implementors must take the lock their waiters wait under before
/// notifying, otherwise a waiter that checked the flag but has not started
/// waiting yet would miss the wake.
pub(crate) trait Unpark: Send + Sync {
    fn unpark(&self);
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    next_site: AtomicU64,
    sites: Mutex<HashMap<u64, Arc<dyn Unpark>>>,
    // Interruptible sleep parks here.
    sleep_lock: Mutex<()>,
    sleep_cv: Condvar,
}

/// Cancellation flag shared by a task and whoever may stop it.
///
/// Clones refer to the same flag. Once cancelled a token stays cancelled.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation and interrupts every suspended holder.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        // Snapshot first: unparking takes the waiter's lock, and waiters
        // register while holding it.
        let sites: Vec<Arc<dyn Unpark>> = lock(&self.inner.sites).values().cloned().collect();
        debug!(parked = sites.len(), "cancellation requested");
        for site in sites {
            site.unpark();
        }

        drop(lock(&self.inner.sleep_lock));
        self.inner.sleep_cv.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has been cancelled.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// True while some holder of this token is suspended in a queue wait.
    pub fn is_parked(&self) -> bool {
        !lock(&self.inner.sites).is_empty()
    }

    /// Sleeps for `duration` unless the token is cancelled first.
    ///
    /// Returns immediately with `Err(Cancelled)` if the token is already
    /// cancelled. A duration too large to represent sleeps until cancelled.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let deadline = Instant::now().checked_add(duration);
        let mut guard = lock(&self.inner.sleep_lock);
        loop {
            self.check()?;
            guard = match deadline {
                None => self
                    .inner
                    .sleep_cv
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    self.inner
                        .sleep_cv
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Registers a park site until the returned guard is dropped.
    pub(crate) fn register(&self, site: Arc<dyn Unpark>) -> ParkGuard<'_> {
        let id = self.inner.next_site.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.sites).insert(id, site);
        ParkGuard { token: self, id }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Keeps a park site registered with its token.
pub(crate) struct ParkGuard<'a> {
    token: &'a CancelToken,
    id: u64,
}

impl Drop for ParkGuard<'_> {
    fn drop(&mut self) {
        lock(&self.token.inner.sites).remove(&self.id);
    }
}

// The guarded data is always left consistent, so a poisoned lock is usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    struct CountingSite(AtomicUsize);

    impl Unpark for CountingSite {
        fn unpark(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_new_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.check(), Ok(()));
        assert!(!token.is_parked());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Cancelled));
    }

    #[test]
    fn test_cancel_unparks_registered_sites_once() {
        let token = CancelToken::new();
        let site = Arc::new(CountingSite(AtomicUsize::new(0)));

        let guard = token.register(site.clone());
        assert!(token.is_parked());

        token.cancel();
        token.cancel();
        assert_eq!(site.0.load(Ordering::SeqCst), 1);

        drop(guard);
        assert!(!token.is_parked());
    }

    #[test]
    fn test_dropped_guard_is_not_unparked() {
        let token = CancelToken::new();
        let site = Arc::new(CountingSite(AtomicUsize::new(0)));
        drop(token.register(site.clone()));

        token.cancel();
        assert_eq!(site.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sleep_completes_without_cancel() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert_eq!(token.sleep(Duration::from_millis(20)), Ok(()));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sleep_on_cancelled_token_returns_immediately() {
        let token = CancelToken::new();
        token.cancel();
        let start = Instant::now();
        assert_eq!(token.sleep(Duration::from_secs(30)), Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancel_interrupts_sleep() {
        let token = CancelToken::new();
        let sleeper = token.clone();
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let result = sleeper.sleep(Duration::from_secs(30));
            (result, start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        let (result, elapsed) = handle.join().unwrap();
        assert_eq!(result, Err(Cancelled));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_sleep_max_duration_on_cancelled_token() {
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(token.sleep(Duration::MAX), Err(Cancelled));
    }

    #[test]
    fn test_cancel_interrupts_unbounded_sleep() {
        let token = CancelToken::new();
        let sleeper = token.clone();
        let handle = thread::spawn(move || sleeper.sleep(Duration::MAX));

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        assert_eq!(handle.join().unwrap(), Err(Cancelled));
    }
}
