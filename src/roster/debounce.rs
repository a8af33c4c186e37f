//! Debounced search feed.
//!
//! [`SearchDebouncer`] is the deterministic core driven by explicit
//! timestamps. [`DebouncedSearchFeed`] wraps the same rule in a tokio task for
//! callers that feed raw keystrokes from an event loop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

/// Default quiet window before a search term commits.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
struct PendingTerm {
    value: String,
    deadline: Instant,
}

#[derive(Debug, Clone)]
pub struct SearchDebouncer {
    window: Duration,
    pending: Option<PendingTerm>,
}

impl SearchDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a keystroke, replacing any pending value and restarting the timer.
    pub fn input(&mut self, value: impl Into<String>, now: Instant) {
        self.pending = Some(PendingTerm {
            value: value.into(),
            deadline: now + self.window,
        });
    }

    /// Commit the pending value if its window elapsed without further input.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        let due = self.pending.as_ref().is_some_and(|p| now >= p.deadline);
        if !due {
            return None;
        }
        self.pending.take().map(|p| p.value)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending value without committing it.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}

/// Sender half for raw keystroke values.
#[derive(Debug, Clone)]
pub struct SearchInput {
    tx: mpsc::UnboundedSender<String>,
}

impl SearchInput {
    /// Returns false once the feed has shut down.
    pub fn send(&self, value: impl Into<String>) -> bool {
        self.tx.send(value.into()).is_ok()
    }
}

/// Background task turning keystrokes into committed search terms.
#[derive(Debug)]
pub struct DebouncedSearchFeed {
    committed: mpsc::UnboundedReceiver<String>,
}

impl DebouncedSearchFeed {
    /// Spawn the feed on the current tokio runtime.
    ///
    /// Dropping every [`SearchInput`] ends the task; a value still inside its
    /// window at that point is never committed.
    pub fn spawn(window: Duration) -> (SearchInput, Self) {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
        let (commit_tx, commit_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(first) = input_rx.recv().await {
                let mut latest = first;
                loop {
                    match tokio::time::timeout(window, input_rx.recv()).await {
                        Ok(Some(next)) => latest = next,
                        Ok(None) => return,
                        Err(_) => {
                            tracing::debug!(search = %latest, "search term committed");
                            if commit_tx.send(latest).is_err() {
                                return;
                            }
                            break;
                        }
                    }
                }
            }
        });

        (SearchInput { tx: input_tx }, Self { committed: commit_rx })
    }

    /// Wait for the next committed term. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<String> {
        self.committed.recv().await
    }

    /// Non-blocking check for a committed term.
    pub fn try_next(&mut self) -> Option<String> {
        self.committed.try_recv().ok()
    }
}
