//! A bounded blocking FIFO queue with cooperative cancellation.
//!
//! Producers block in [`BoundedQueue::put`] while the queue is full and
//! consumers block in [`BoundedQueue::take`] while it is empty. Every
//! blocking call takes a [`CancelToken`]; cancelling the token wakes the
//! suspended call, which then fails with a `Cancelled` error instead of
//! hanging.
//!
//! ```
//! use std::num::NonZeroUsize;
//! use bounded_queue::{BoundedQueue, CancelToken};
//!
//! let queue = BoundedQueue::new(NonZeroUsize::new(2).unwrap());
//! let token = CancelToken::new();
//!
//! queue.put("a", &token).unwrap();
//! queue.put("b", &token).unwrap();
//! assert!(queue.is_full());
//!
//! assert_eq!(queue.take(&token).unwrap(), "a");
//! assert_eq!(queue.take(&token).unwrap(), "b");
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod queue;
pub mod task;
pub mod worker;

pub use cancel::CancelToken;
pub use config::{ConfigError, DemoConfig};
pub use error::{Cancelled, PutError, TakeError, TaskError};
pub use queue::BoundedQueue;
pub use task::{spawn, spawn_with_token, TaskHandle, TaskState};
pub use worker::{run_consumer, run_producer, StopReason, WorkerReport};
