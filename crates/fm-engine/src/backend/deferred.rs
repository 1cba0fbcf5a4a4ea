//! Hook results that may already be available or still be running.

use fm_db::DbError;
use futures::future::BoxFuture;
use std::future::Future;
use thiserror::Error;

/// Failure reported by a backend hook
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    /// Create a hook error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<DbError> for HookError {
    fn from(err: DbError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<std::io::Error> for HookError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Result type alias for hook calls
pub type HookResult<T> = Result<T, HookError>;

/// The result of a backend hook.
///
/// Synchronous hooks return [`Deferred::Ready`]; asynchronous hooks return
/// [`Deferred::Pending`]. The engine awaits both through [`Deferred::resolve`].
pub enum Deferred<'a, T> {
    /// Result computed eagerly
    Ready(HookResult<T>),
    /// Result still to be produced by a future
    Pending(BoxFuture<'a, HookResult<T>>),
}

impl<'a, T: Send + 'a> Deferred<'a, T> {
    /// Wrap an eagerly computed result
    pub fn ready(result: HookResult<T>) -> Self {
        Deferred::Ready(result)
    }

    /// Wrap a future producing the result
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = HookResult<T>> + Send + 'a,
    {
        Deferred::Pending(Box::pin(future))
    }

    /// Whether the result is already available
    pub fn is_ready(&self) -> bool {
        matches!(self, Deferred::Ready(_))
    }

    /// Transform the success value without forcing the result
    pub fn map<U, F>(self, f: F) -> Deferred<'a, U>
    where
        U: Send + 'a,
        F: FnOnce(T) -> U + Send + 'a,
    {
        match self {
            Deferred::Ready(result) => Deferred::Ready(result.map(f)),
            Deferred::Pending(future) => {
                Deferred::Pending(Box::pin(async move { future.await.map(f) }))
            }
        }
    }

    /// Await the result, whichever form it takes
    pub async fn resolve(self) -> HookResult<T> {
        match self {
            Deferred::Ready(result) => result,
            Deferred::Pending(future) => future.await,
        }
    }
}

impl<'a, T> From<HookResult<T>> for Deferred<'a, T> {
    fn from(result: HookResult<T>) -> Self {
        Deferred::Ready(result)
    }
}

impl<T> std::fmt::Debug for Deferred<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Deferred::Ready(_) => write!(f, "Deferred::Ready"),
            Deferred::Pending(_) => write!(f, "Deferred::Pending"),
        }
    }
}
