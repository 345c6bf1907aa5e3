#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Headless console for managing dormant bank accounts.
//!
//! Layout:
//! - `config.rs`: console configuration and retry policy
//! - `session.rs`: durable session storage and the auth store
//! - `http.rs`: bearer-token HTTP wrapper with retry and forced logout
//! - `api.rs`: one function per backend operation
//! - `toast.rs`: ephemeral notification bus
//! - `navigation.rs`: routes, navigator and the route gate
//! - `scope.rs`: cancellation scopes tied to a view's lifetime
//! - `features/`: view state for dashboard, accounts, upload, reports, login
//! - `app.rs`: root composition wiring every service together

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod features;
pub mod http;
pub mod navigation;
pub mod scope;
pub mod session;
pub mod toast;

pub use api::{CsvExport, DormantApi};
pub use app::Console;
pub use config::{ConsoleConfig, DEFAULT_API_URL, RetryPolicy};
pub use error::{ApiError, ApiResult};
pub use navigation::{Gate, Navigator, Route};
pub use reqwest::StatusCode;
pub use scope::ViewScope;
pub use session::{AuthStore, FileStorage, MemoryStorage, Session, SessionError, SessionStorage};
pub use toast::{Toast, ToastBus, ToastId, ToastKind};
