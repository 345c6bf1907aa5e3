//! Debounced search input and result ordering.
//!
//! # Design
//! - Every keystroke cancels the pending timer; only the last value within
//!   the debounce window is emitted.
//! - Submit and clear bypass the debounce.
//! - [`SearchSequencer`] tickets guarantee that an earlier, slower response
//!   never replaces a later one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Quiet period before a typed query is emitted.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Single-line search input emitting queries onto a channel.
#[derive(Debug)]
pub struct SearchBar {
    query: String,
    debounce: Duration,
    sender: mpsc::UnboundedSender<String>,
    pending: Option<JoinHandle<()>>,
}

impl SearchBar {
    /// Search bar plus the receiver its queries arrive on.
    #[must_use]
    pub fn new(debounce: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                query: String::new(),
                debounce,
                sender,
                pending: None,
            },
            receiver,
        )
    }

    /// Text currently in the input.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// A keystroke: replace the text and restart the debounce timer.
    pub fn input(&mut self, text: impl Into<String>) {
        self.cancel_pending();
        self.query = text.into();
        if self.debounce.is_zero() {
            self.emit();
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            self.emit();
            return;
        };
        let sender = self.sender.clone();
        let query = self.query.clone();
        let delay = self.debounce;
        self.pending = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(query);
        }));
    }

    /// Enter key: emit the current text immediately.
    pub fn submit(&mut self) {
        self.cancel_pending();
        self.emit();
    }

    /// Clear button: empty the input and emit `""` immediately.
    pub fn clear(&mut self) {
        self.cancel_pending();
        self.query.clear();
        self.emit();
    }

    fn emit(&self) {
        if self.sender.send(self.query.clone()).is_err() {
            tracing::debug!("search receiver dropped");
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for SearchBar {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

/// Ticket identifying one dispatched search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SearchTicket(u64);

/// Issues tickets and tells whether a result is still the latest.
#[derive(Debug, Clone, Default)]
pub struct SearchSequencer {
    latest: Arc<AtomicU64>,
}

impl SearchSequencer {
    /// Fresh sequencer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for a search about to be dispatched; invalidates older ones.
    #[must_use]
    pub fn issue(&self) -> SearchTicket {
        SearchTicket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Whether results for `ticket` may be applied.
    #[must_use]
    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }
}
