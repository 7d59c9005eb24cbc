//! Named worker threads that can be asked to stop.
//!
//! Each task owns a [`CancelToken`]. `cancel()` is the interrupt request:
//! the task observes it at its next check point and finishes on its own.
//! A panic inside a task is caught by `join` and reported as
//! [`TaskError::Panicked`] instead of disappearing with the thread.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::TaskError;

/// Where a task is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    /// Blocked in a queue wait.
    Suspended,
    /// The task body returned or panicked. Terminal.
    Stopped,
}

pub struct TaskHandle<R> {
    name: String,
    token: CancelToken,
    finished: Arc<AtomicBool>,
    handle: JoinHandle<R>,
}

/// Marks the task finished even when its body unwinds.
struct FinishGuard(Arc<AtomicBool>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Spawns `body` on a new named thread with a fresh token.
pub fn spawn<F, R>(name: impl Into<String>, body: F) -> Result<TaskHandle<R>, TaskError>
where
    F: FnOnce(&CancelToken) -> R + Send + 'static,
    R: Send + 'static,
{
    spawn_with_token(name, CancelToken::new(), body)
}

/// Spawns `body` with a caller-provided token.
///
/// Sharing one token between several tasks cancels them as a group; their
/// [`TaskState::Suspended`] then reflects any member being blocked.
pub fn spawn_with_token<F, R>(
    name: impl Into<String>,
    token: CancelToken,
    body: F,
) -> Result<TaskHandle<R>, TaskError>
where
    F: FnOnce(&CancelToken) -> R + Send + 'static,
    R: Send + 'static,
{
    let name = name.into();
    let finished = Arc::new(AtomicBool::new(false));

    let handle = {
        let token = token.clone();
        let finished = FinishGuard(Arc::clone(&finished));
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _finished = finished;
                body(&token)
            })
            .map_err(|source| TaskError::Spawn {
                task: name.clone(),
                source,
            })?
    };

    debug!(task = %name, "task started");
    Ok(TaskHandle {
        name,
        token,
        finished,
        handle,
    })
}

impl<R> TaskHandle<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Asks the task to stop. A suspended task is woken so it can notice.
    pub fn cancel(&self) {
        debug!(task = %self.name, "cancel requested");
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> TaskState {
        if self.is_finished() {
            TaskState::Stopped
        } else if self.token.is_parked() {
            TaskState::Suspended
        } else {
            TaskState::Running
        }
    }

    /// Waits for the task and returns what its body returned.
    pub fn join(self) -> Result<R, TaskError> {
        let TaskHandle { name, handle, .. } = self;
        match handle.join() {
            Ok(value) => {
                debug!(task = %name, "task stopped");
                Ok(value)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(task = %name, "caught panic: {}", message);
                Err(TaskError::Panicked {
                    task: name,
                    message,
                })
            }
        }
    }

    pub fn cancel_and_join(self) -> Result<R, TaskError> {
        self.cancel();
        self.join()
    }
}

impl<R> std::fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::BoundedQueue;
    use std::num::NonZeroUsize;
    use std::time::{Duration, Instant};

    fn wait_for_state<R>(task: &TaskHandle<R>, state: TaskState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while task.state() != state {
            assert!(Instant::now() < deadline, "task never reached {:?}", state);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_join_returns_body_value() {
        let task = spawn("adder", |_| 2 + 2).unwrap();
        assert_eq!(task.name(), "adder");
        assert_eq!(task.join().unwrap(), 4);
    }

    #[test]
    fn test_task_runs_on_named_thread() {
        let task = spawn("named-worker", |_| thread::current().name().map(str::to_owned)).unwrap();
        assert_eq!(task.join().unwrap().as_deref(), Some("named-worker"));
    }

    #[test]
    fn test_panic_is_reported_on_join() {
        let task = spawn("crasher", |_| -> u32 { panic!("crashed") }).unwrap();
        match task.join() {
            Err(TaskError::Panicked { task, message }) => {
                assert_eq!(task, "crasher");
                assert_eq!(message, "crashed");
            }
            other => panic!("expected a panic report, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_formatted_panic_message() {
        let task = spawn("formatter", |_| -> u32 { panic!("bad value {}", 7) }).unwrap();
        let err = task.join().unwrap_err();
        assert_eq!(err.to_string(), "task 'formatter' panicked: bad value 7");
    }

    #[test]
    fn test_loop_stops_after_cancel() {
        let task = spawn("counter", |token| {
            let mut count = 0u64;
            while !token.is_cancelled() {
                count += 1;
                if token.sleep(Duration::from_millis(1)).is_err() {
                    break;
                }
            }
            count
        })
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert_eq!(task.state(), TaskState::Running);
        let count = task.cancel_and_join().unwrap();
        assert!(count > 0);
    }

    #[test]
    fn test_state_follows_queue_waits() {
        let queue: BoundedQueue<u32> = BoundedQueue::new(NonZeroUsize::new(1).unwrap());
        let task = {
            let queue = queue.clone();
            spawn("consumer", move |token| {
                let first = queue.take(token);
                let second = queue.take(token);
                (first, second)
            })
            .unwrap()
        };

        wait_for_state(&task, TaskState::Suspended);
        queue.try_put(1).unwrap();

        // Once the item is gone the first wait is over; the next
        // suspension is the wait for the second item.
        let deadline = Instant::now() + Duration::from_secs(5);
        while !queue.is_empty() {
            assert!(Instant::now() < deadline, "item was never taken");
            thread::sleep(Duration::from_millis(1));
        }
        wait_for_state(&task, TaskState::Suspended);

        task.cancel();
        wait_for_state(&task, TaskState::Stopped);
        assert!(task.is_finished());

        let (first, second) = task.join().unwrap();
        assert_eq!(first, Ok(1));
        assert_eq!(second, Err(crate::error::TakeError::Cancelled));
    }

    #[test]
    fn test_shared_token_cancels_group() {
        let token = CancelToken::new();
        let tasks: Vec<_> = (0..3)
            .map(|i| {
                spawn_with_token(format!("member-{}", i), token.clone(), |token| {
                    token.sleep(Duration::from_secs(30))
                })
                .unwrap()
            })
            .collect();

        token.cancel();
        for task in tasks {
            assert!(task.is_cancelled());
            assert!(task.join().unwrap().is_err());
        }
    }
}
