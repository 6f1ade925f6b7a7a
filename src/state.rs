//! Connection readiness.
//!
//! A connection is `Disconnected` until `connect()` or its first operation
//! starts the token exchange, `Authenticating` while it runs, then either `Connected` or
//! `Failed` for good. Work submitted before the outcome is known waits in a
//! FIFO list and is released exactly once, in submission order.

use std::fmt;
use std::mem;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::Error;

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Authenticating,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Authenticating => "authenticating",
            Self::Connected => "connected",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Deferred unit of work, fired once with the readiness outcome.
pub type PendingOperation<T> = Box<dyn FnOnce(Result<T, Error>) + Send>;

enum Inner<T> {
    Waiting {
        authenticating: bool,
        queue: Vec<PendingOperation<T>>,
    },
    Connected(T),
    Failed(Error),
}

/// Readiness gate holding the ready value (the session) once available.
pub struct Readiness<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> fmt::Debug for Readiness<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Readiness")
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

impl<T> Readiness<T> {
    /// Create a gate that is already open.
    pub fn connected(value: T) -> Self {
        Self {
            inner: Mutex::new(Inner::Connected(value)),
        }
    }

    /// Create a closed gate.
    pub fn disconnected() -> Self {
        Self {
            inner: Mutex::new(Inner::Waiting {
                authenticating: false,
                queue: Vec::new(),
            }),
        }
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match &*self.inner.lock().unwrap_or_else(|e| e.into_inner()) {
            Inner::Waiting {
                authenticating: false,
                ..
            } => ConnectionState::Disconnected,
            Inner::Waiting {
                authenticating: true,
                ..
            } => ConnectionState::Authenticating,
            Inner::Connected(_) => ConnectionState::Connected,
            Inner::Failed(_) => ConnectionState::Failed,
        }
    }

    /// Get the number of queued operations.
    #[must_use]
    pub fn pending(&self) -> usize {
        match &*self.inner.lock().unwrap_or_else(|e| e.into_inner()) {
            Inner::Waiting { queue, .. } => queue.len(),
            Inner::Connected(_) | Inner::Failed(_) => 0,
        }
    }

    /// Move from `Disconnected` to `Authenticating`.
    ///
    /// Returns `true` if this call made the move; the caller is then
    /// responsible for calling [`complete`](Self::complete).
    pub fn begin(&self) -> bool {
        match &mut *self.inner.lock().unwrap_or_else(|e| e.into_inner()) {
            Inner::Waiting { authenticating, .. } if !*authenticating => {
                *authenticating = true;
                true
            }
            _ => false,
        }
    }
}

impl<T: Clone + Send + 'static> Readiness<T> {
    /// Like [`begin`](Self::begin), but hands back an [`Attempt`] that
    /// fails the gate if it is dropped before being completed.
    pub fn try_begin(&self) -> Option<Attempt<'_, T>> {
        self.begin().then_some(Attempt {
            readiness: self,
            settled: false,
        })
    }

    /// Run `op` now if the outcome is known, otherwise queue it.
    ///
    /// A connected gate runs `op` on the calling thread before returning. A
    /// failed gate hands `op` the cached error, so nothing waits forever.
    pub fn run_when_ready<F>(&self, op: F)
    where
        F: FnOnce(Result<T, Error>) + Send + 'static,
    {
        let outcome = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            match &mut *inner {
                Inner::Connected(value) => Ok(value.clone()),
                Inner::Failed(error) => Err(error.clone()),
                Inner::Waiting { queue, .. } => {
                    queue.push(Box::new(op));
                    debug!(pending = queue.len(), "operation queued until connected");
                    return;
                }
            }
        };
        op(outcome);
    }

    /// Wait for the outcome.
    ///
    /// # Errors
    ///
    /// Returns the authentication error if the gate failed.
    pub async fn wait(&self) -> Result<T, Error> {
        let (tx, rx) = oneshot::channel();
        self.run_when_ready(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await
            .unwrap_or_else(|_| Err(Error::Http("connection dropped before it was ready".to_string())))
    }

    /// Record the outcome and release every queued operation in FIFO order.
    ///
    /// Only the first outcome counts; returns `false` if one was already
    /// recorded.
    pub fn complete(&self, outcome: Result<T, Error>) -> bool {
        let queue = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let queue = match &mut *inner {
                Inner::Waiting { queue, .. } => mem::take(queue),
                Inner::Connected(_) | Inner::Failed(_) => return false,
            };
            *inner = match &outcome {
                Ok(value) => Inner::Connected(value.clone()),
                Err(error) => Inner::Failed(error.clone()),
            };
            queue
        };

        debug!(released = queue.len(), ok = outcome.is_ok(), "readiness settled");
        for op in queue {
            op(outcome.clone());
        }
        true
    }
}

/// The right to settle a gate, taken by whoever moved it to
/// `Authenticating`.
///
/// Dropping it unsettled (the authenticating future was cancelled) fails
/// the gate, so queued operations never wait forever.
pub struct Attempt<'a, T: Clone + Send + 'static> {
    readiness: &'a Readiness<T>,
    settled: bool,
}

impl<T: Clone + Send + 'static> Attempt<'_, T> {
    /// Record the outcome and release the queue.
    pub fn complete(mut self, outcome: Result<T, Error>) -> bool {
        self.settled = true;
        self.readiness.complete(outcome)
    }
}

impl<T: Clone + Send + 'static> Drop for Attempt<'_, T> {
    fn drop(&mut self) {
        if !self.settled {
            self.readiness.complete(Err(Error::Http(
                "authentication was abandoned before it finished".to_string(),
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> PendingOperation<u32>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |label: &'static str| -> PendingOperation<u32> {
            let sink = Arc::clone(&sink);
            Box::new(move |outcome: Result<u32, Error>| {
                let entry = match outcome {
                    Ok(v) => format!("{label}:{v}"),
                    Err(_) => format!("{label}:err"),
                };
                sink.lock().unwrap().push(entry);
            })
        };
        (log, make)
    }

    #[test]
    fn test_connected_runs_immediately() {
        let readiness = Readiness::connected(7_u32);
        let (log, make) = recorder();

        readiness.run_when_ready(make("a"));

        assert_eq!(*log.lock().unwrap(), vec!["a:7"]);
        assert_eq!(readiness.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_queued_operations_fire_in_order_once() {
        let readiness = Readiness::disconnected();
        let (log, make) = recorder();

        assert!(readiness.begin());
        assert!(!readiness.begin());
        for label in ["a", "b", "c"] {
            readiness.run_when_ready(make(label));
        }
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(readiness.pending(), 3);
        assert_eq!(readiness.state(), ConnectionState::Authenticating);

        assert!(readiness.complete(Ok(1)));
        assert!(!readiness.complete(Ok(2)));

        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1", "c:1"]);
        assert_eq!(readiness.pending(), 0);
    }

    #[test]
    fn test_failure_is_broadcast_and_cached() {
        let readiness = Readiness::<u32>::disconnected();
        let (log, make) = recorder();

        readiness.run_when_ready(make("queued"));
        readiness.complete(Err(Error::Http("refused".to_string())));
        readiness.run_when_ready(make("late"));

        assert_eq!(*log.lock().unwrap(), vec!["queued:err", "late:err"]);
        assert_eq!(readiness.state(), ConnectionState::Failed);
    }

    #[test]
    fn test_attempt_is_taken_once() {
        let readiness = Readiness::<u32>::disconnected();
        let attempt = readiness.try_begin().expect("first caller begins");
        assert!(readiness.try_begin().is_none());

        assert!(attempt.complete(Ok(3)));
        assert_eq!(readiness.state(), ConnectionState::Connected);
        assert!(readiness.try_begin().is_none());
    }

    #[test]
    fn test_abandoned_attempt_fails_waiters() {
        let readiness = Readiness::<u32>::disconnected();
        let (log, make) = recorder();

        let attempt = readiness.try_begin().expect("first caller begins");
        readiness.run_when_ready(make("queued"));
        drop(attempt);

        assert_eq!(*log.lock().unwrap(), vec!["queued:err"]);
        assert_eq!(readiness.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_wait_resolves_after_complete() {
        let readiness = Arc::new(Readiness::disconnected());
        let waiter = {
            let readiness = Arc::clone(&readiness);
            tokio::spawn(async move { readiness.wait().await })
        };

        tokio::task::yield_now().await;
        assert_eq!(readiness.pending(), 1);
        readiness.complete(Ok(5_u32));

        assert_eq!(waiter.await.expect("task joined").expect("ready"), 5);
    }
}
