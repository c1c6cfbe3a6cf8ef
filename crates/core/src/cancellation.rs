//! Cooperative cancellation for backend requests.
//!
//! Every service operation takes a [`CancellationToken`]. Cancelling it abandons the in-flight
//! request (the transport future is dropped) and makes the operation resolve to
//! [`Outcome::Cancelled`], which is neither a success nor an error. A response that arrives after
//! cancellation is discarded.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable handle that signals cancellation to every holder.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives as long as `self`, so this can only return once the flag is set.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Cancel the token when the returned guard is dropped.
    ///
    /// Request handlers use this so a client disconnect, which drops the handler future, also
    /// abandons the backend request.
    pub fn drop_guard(&self) -> DropGuard {
        DropGuard {
            token: Some(self.clone()),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancels its token on drop unless disarmed.
#[derive(Debug)]
pub struct DropGuard {
    token: Option<CancellationToken>,
}

impl DropGuard {
    /// Keep the token alive without cancelling it.
    pub fn disarm(mut self) -> CancellationToken {
        self.token.take().unwrap_or_default()
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

/// Result of an operation that may be cancelled.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }

    /// Apply a fallible conversion to a completed value.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Outcome<U>, E> {
        match self {
            Outcome::Completed(value) => f(value).map(Outcome::Completed),
            Outcome::Cancelled => Ok(Outcome::Cancelled),
        }
    }
}

/// Drive `future` unless `token` is cancelled first.
///
/// An already-cancelled token never polls the future.
pub async fn run_cancellable<F>(token: &CancellationToken, future: F) -> Outcome<F::Output>
where
    F: Future,
{
    if token.is_cancelled() {
        return Outcome::Cancelled;
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => Outcome::Cancelled,
        output = future => Outcome::Completed(output),
    }
}
