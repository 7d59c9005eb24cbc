use std::fmt;
use std::io;

use thiserror::Error;

//==============================================================================
// Cancellation
//==============================================================================

/// The calling task was asked to stop while it was suspended.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

//==============================================================================
// Queue errors
//==============================================================================

/// Why a `put` did not insert its item. The item is handed back.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PutError<T> {
    /// `try_put` found the queue full.
    Full(T),
    /// `offer` ran out of time while the queue stayed full.
    Timeout(T),
    /// The token was cancelled while waiting for a free slot.
    Cancelled(T),
}

impl<T> PutError<T> {
    /// Recovers the item that was not inserted.
    pub fn into_inner(self) -> T {
        match self {
            PutError::Full(item) | PutError::Timeout(item) | PutError::Cancelled(item) => item,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PutError::Cancelled(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PutError::Timeout(_))
    }

    pub fn is_full(&self) -> bool {
        matches!(self, PutError::Full(_))
    }
}

// Written by hand so that `PutError<T>: Debug` does not need `T: Debug`.
impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PutError::Full(_) => f.write_str("Full(..)"),
            PutError::Timeout(_) => f.write_str("Timeout(..)"),
            PutError::Cancelled(_) => f.write_str("Cancelled(..)"),
        }
    }
}

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PutError::Full(_) => f.write_str("put on a full queue"),
            PutError::Timeout(_) => f.write_str("timed out waiting for a free slot"),
            PutError::Cancelled(_) => f.write_str("put cancelled while waiting for a free slot"),
        }
    }
}

impl<T> std::error::Error for PutError<T> {}

/// Why a `take` returned no item.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakeError {
    #[error("take on an empty queue")]
    Empty,

    #[error("timed out waiting for an item")]
    Timeout,

    #[error("take cancelled while waiting for an item")]
    Cancelled,
}

impl From<Cancelled> for TakeError {
    fn from(_: Cancelled) -> Self {
        TakeError::Cancelled
    }
}

//==============================================================================
// Task errors
//==============================================================================

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("failed to spawn task '{task}': {source}")]
    Spawn {
        task: String,
        #[source]
        source: io::Error,
    },

    #[error("task '{task}' panicked: {message}")]
    Panicked { task: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_put_error_returns_item() {
        let err = PutError::Cancelled(String::from("payload"));
        assert!(err.is_cancelled());
        assert!(!err.is_full());
        assert_eq!(err.into_inner(), "payload");

        assert_eq!(PutError::Timeout(7).into_inner(), 7);
        assert_eq!(PutError::Full(8).into_inner(), 8);
    }

    #[test]
    fn test_put_error_debug_hides_item() {
        struct Opaque;
        let err = PutError::Full(Opaque);
        assert_eq!(format!("{:?}", err), "Full(..)");
        assert_eq!(err.to_string(), "put on a full queue");
    }

    #[test]
    fn test_cancelled_converts_to_take_error() {
        let err: TakeError = Cancelled.into();
        assert_eq!(err, TakeError::Cancelled);
        assert_eq!(err.to_string(), "take cancelled while waiting for an item");
    }

    #[test]
    fn test_task_error_messages() {
        let err = TaskError::Panicked {
            task: "worker-1".to_string(),
            message: "crashed".to_string(),
        };
        assert_eq!(err.to_string(), "task 'worker-1' panicked: crashed");

        let err = TaskError::Spawn {
            task: "worker-2".to_string(),
            source: io::Error::new(io::ErrorKind::Other, "no threads left"),
        };
        assert!(err.to_string().starts_with("failed to spawn task 'worker-2'"));
        assert!(err.source().is_some());
    }
}
