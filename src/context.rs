//! Per-request cancellation, deadline and value context.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// The context object associated with every inbound request.
///
/// A context carries a cancellation signal shared with its [`CancelHandle`],
/// an optional deadline, and a set of string values (for example a principal
/// attached by an authenticator). Cloning is cheap and clones observe the same
/// cancellation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
    values: Arc<BTreeMap<String, String>>,
}

/// Cancels every context derived from the [`RequestContext`] it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal cancellation. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        // The sender is dropped right away, so the flag stays `false` forever.
        let (_, rx) = watch::channel(false);
        Self::from_receiver(rx)
    }

    /// A fresh context together with the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (Self::from_receiver(rx), CancelHandle { tx })
    }

    fn from_receiver(cancel: watch::Receiver<bool>) -> Self {
        Self {
            cancel,
            deadline: None,
            values: Arc::new(BTreeMap::new()),
        }
    }

    /// Derive a context that expires at `deadline`.
    ///
    /// An earlier deadline inherited from `self` is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Derive a context that expires `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context carrying an additional value.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.values).insert(key.into(), value.into());
        self
    }

    /// Look up a value attached to this context.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `true` once cancelled or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the context is cancelled or its deadline passes.
    ///
    /// Never resolves for a [`background`](Self::background) context.
    pub async fn cancelled(&self) {
        let mut cancel = self.cancel.clone();
        let signal = async move {
            let closed = cancel.wait_for(|cancelled| *cancelled).await.is_err();
            if closed {
                // Sender gone without cancelling.
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = signal => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => signal.await,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}
