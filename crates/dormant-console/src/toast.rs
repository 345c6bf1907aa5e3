//! Ephemeral notification bus.
//!
//! # Design
//! - One ordered list per console, handed to views as a cloneable handle.
//! - Every toast with a non-zero duration owns an independent removal timer;
//!   dismissing a toast aborts its timer.
//! - Removal is idempotent.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Lifetime applied by the severity helpers.
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(5000);

/// Monotonic toast identifier.
pub type ToastId = u64;

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToastKind {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Error,
    /// Something needs attention.
    Warning,
    /// Neutral progress information.
    Info,
}

impl ToastKind {
    /// Short glyph shown next to the message.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Success => "✓",
            Self::Error => "✗",
            Self::Warning => "⚠",
            Self::Info => "ℹ",
        }
    }
}

impl Display for ToastKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

/// A notification waiting to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Identifier used to dismiss the toast.
    pub id: ToastId,
    /// Display text.
    pub message: String,
    /// Severity classification.
    pub kind: ToastKind,
    /// Lifetime; zero means the toast stays until dismissed.
    pub duration: Duration,
}

#[derive(Default)]
struct ToastState {
    next_id: ToastId,
    toasts: Vec<Toast>,
    timers: HashMap<ToastId, JoinHandle<()>>,
}

/// Shared handle to the console's toast list.
#[derive(Clone, Default)]
pub struct ToastBus {
    state: Arc<Mutex<ToastState>>,
}

impl fmt::Debug for ToastBus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ToastBus")
            .field("pending", &self.lock().toasts.len())
            .finish()
    }
}

impl ToastBus {
    /// Empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ToastState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a toast and schedule its removal after `duration`.
    pub fn show(&self, message: impl Into<String>, kind: ToastKind, duration: Duration) -> ToastId {
        let message = message.into();
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            let id = state.next_id;
            state.toasts.push(Toast {
                id,
                message: message.clone(),
                kind,
                duration,
            });
            id
        };
        tracing::debug!(id, %kind, message = %message, "toast shown");

        if !duration.is_zero() {
            match Handle::try_current() {
                Ok(handle) => {
                    let bus = self.clone();
                    let timer = handle.spawn(async move {
                        tokio::time::sleep(duration).await;
                        bus.expire(id);
                    });
                    let mut state = self.lock();
                    if state.toasts.iter().any(|toast| toast.id == id) {
                        state.timers.insert(id, timer);
                    } else {
                        timer.abort();
                    }
                }
                Err(_) => {
                    tracing::debug!(id, "no runtime available; toast stays until dismissed");
                }
            }
        }
        id
    }

    /// Success toast with the default duration.
    pub fn success(&self, message: impl Into<String>) -> ToastId {
        self.show(message, ToastKind::Success, DEFAULT_TOAST_DURATION)
    }

    /// Error toast with the default duration.
    pub fn error(&self, message: impl Into<String>) -> ToastId {
        self.show(message, ToastKind::Error, DEFAULT_TOAST_DURATION)
    }

    /// Warning toast with the default duration.
    pub fn warning(&self, message: impl Into<String>) -> ToastId {
        self.show(message, ToastKind::Warning, DEFAULT_TOAST_DURATION)
    }

    /// Info toast with the default duration.
    pub fn info(&self, message: impl Into<String>) -> ToastId {
        self.show(message, ToastKind::Info, DEFAULT_TOAST_DURATION)
    }

    /// Remove a toast and cancel its timer; unknown ids are ignored.
    pub fn dismiss(&self, id: ToastId) {
        let timer = {
            let mut state = self.lock();
            state.toasts.retain(|toast| toast.id != id);
            state.timers.remove(&id)
        };
        if let Some(timer) = timer {
            timer.abort();
        }
    }

    fn expire(&self, id: ToastId) {
        let mut state = self.lock();
        state.toasts.retain(|toast| toast.id != id);
        state.timers.remove(&id);
    }

    /// Current toasts in display order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Toast> {
        self.lock().toasts.clone()
    }

    /// Take every pending toast, cancelling their timers.
    #[must_use]
    pub fn drain(&self) -> Vec<Toast> {
        let mut state = self.lock();
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
        std::mem::take(&mut state.toasts)
    }
}
