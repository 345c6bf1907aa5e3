//! Admin-only bulk file ingestion.
//!
//! # Design
//! - The panel only exists for admins; everyone else gets `None`.
//! - File checks run locally before any network call.
//! - Progress is simulated: the transport gives no upload progress, so a
//!   ticker creeps to 90% and the response snaps it to 100%.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dormant_api_models::{UploadResponse, UserRecord};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::DormantApi;
use crate::error::ApiError;
use crate::scope::ViewScope;
use crate::toast::ToastBus;

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
/// Interval between simulated progress steps.
pub const PROGRESS_TICK: Duration = Duration::from_millis(200);
/// Percentage added per tick.
const PROGRESS_STEP: u8 = 10;
/// Ceiling the ticker stops at until the response arrives.
const PROGRESS_CAP: u8 = 90;
/// Extension the backend parses.
const ACCEPTED_EXTENSION: &str = ".txt";

/// Local reasons a file is refused before upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    /// Not a `.txt` file.
    #[error("Invalid file type. Please select a .txt file")]
    WrongExtension,
    /// Larger than [`MAX_UPLOAD_BYTES`].
    #[error("File size exceeds 10MB limit")]
    TooLarge {
        /// Size of the refused file.
        size: u64,
    },
}

/// Check name and size before anything is sent.
///
/// # Errors
/// Returns the first [`UploadRejection`] that applies.
pub fn validate_upload(file_name: &str, size: u64) -> Result<(), UploadRejection> {
    let lowered = file_name.to_ascii_lowercase();
    if !lowered.ends_with(ACCEPTED_EXTENSION) {
        return Err(UploadRejection::WrongExtension);
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge { size });
    }
    Ok(())
}

/// Why an upload did not complete.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Refused locally.
    #[error(transparent)]
    Rejected(#[from] UploadRejection),
    /// The panel was left mid-upload.
    #[error("upload cancelled")]
    Cancelled,
    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Outcome reported to the user after an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    /// Lines processed.
    pub total: u64,
    /// Lines ingested.
    pub success: u64,
    /// Lines rejected.
    pub failure: u64,
    /// Backend summary text.
    pub message: String,
}

impl From<UploadResponse> for UploadSummary {
    fn from(response: UploadResponse) -> Self {
        Self {
            total: response.total(),
            success: response.success_count,
            failure: response.failure_count,
            message: response.message,
        }
    }
}

/// Percentage indicator driven by a ticker.
#[derive(Debug)]
pub struct SimulatedProgress {
    sender: watch::Sender<u8>,
    tick: Duration,
    ticker: Option<JoinHandle<()>>,
}

impl SimulatedProgress {
    /// Indicator at 0% advancing every `tick` once started.
    #[must_use]
    pub fn new(tick: Duration) -> Self {
        let (sender, _receiver) = watch::channel(0);
        Self {
            sender,
            tick,
            ticker: None,
        }
    }

    /// Current percentage.
    #[must_use]
    pub fn value(&self) -> u8 {
        *self.sender.borrow()
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.sender.subscribe()
    }

    /// Reset to 0% and start creeping toward the cap.
    pub fn start(&mut self) {
        self.stop();
        self.sender.send_replace(0);
        let sender = self.sender.clone();
        let tick = self.tick;
        self.ticker = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                let mut reached_cap = false;
                sender.send_modify(|value| {
                    *value = value.saturating_add(PROGRESS_STEP).min(PROGRESS_CAP);
                    reached_cap = *value >= PROGRESS_CAP;
                });
                if reached_cap {
                    break;
                }
            }
        }));
    }

    /// Jump to 100%.
    pub fn complete(&mut self) {
        self.stop();
        self.sender.send_replace(100);
    }

    /// Back to 0% after a failure.
    pub fn reset(&mut self) {
        self.stop();
        self.sender.send_replace(0);
    }

    fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for SimulatedProgress {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Action run after a successful upload, once the refresh delay elapses.
pub type RefreshAction = Arc<dyn Fn() -> RefreshFuture + Send + Sync>;

/// Future returned by a [`RefreshAction`].
pub type RefreshFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Upload controls shown to admins.
pub struct UploadPanel {
    api: DormantApi,
    toasts: ToastBus,
    scope: ViewScope,
    progress: SimulatedProgress,
    refresh_delay: Duration,
    on_complete: Option<RefreshAction>,
    pending_refresh: Option<JoinHandle<()>>,
}

impl fmt::Debug for UploadPanel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("UploadPanel")
            .field("progress", &self.progress.value())
            .field("refresh_delay", &self.refresh_delay)
            .field("on_complete", &self.on_complete.is_some())
            .finish_non_exhaustive()
    }
}

impl UploadPanel {
    /// Panel for `user`; `None` unless the user is an admin.
    #[must_use]
    pub fn for_user(
        user: Option<&UserRecord>,
        api: DormantApi,
        toasts: ToastBus,
        refresh_delay: Duration,
    ) -> Option<Self> {
        if !user.is_some_and(UserRecord::is_admin) {
            return None;
        }
        Some(Self {
            api,
            toasts,
            scope: ViewScope::new(),
            progress: SimulatedProgress::new(PROGRESS_TICK),
            refresh_delay,
            on_complete: None,
            pending_refresh: None,
        })
    }

    /// Run `refresh` after every successful upload.
    #[must_use]
    pub fn with_refresh<F, Fut>(mut self, refresh: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action: RefreshAction = Arc::new(move || Box::pin(refresh()) as RefreshFuture);
        self.on_complete = Some(action);
        self
    }

    /// Refresh scheduled by the last successful upload, if any.
    pub fn take_pending_refresh(&mut self) -> Option<JoinHandle<()>> {
        self.pending_refresh.take()
    }

    /// Cancellation scope of this panel.
    #[must_use]
    pub const fn scope(&self) -> &ViewScope {
        &self.scope
    }

    /// Progress indicator.
    #[must_use]
    pub const fn progress(&self) -> &SimulatedProgress {
        &self.progress
    }

    /// Validate and upload one file.
    ///
    /// # Errors
    /// See [`UploadError`]; every failure is also toasted.
    pub async fn upload(
        &mut self,
        file_name: &str,
        contents: &[u8],
    ) -> Result<UploadSummary, UploadError> {
        let size = u64::try_from(contents.len()).unwrap_or(u64::MAX);
        if let Err(rejection) = validate_upload(file_name, size) {
            self.toasts.error(rejection.to_string());
            return Err(rejection.into());
        }

        self.progress.start();
        let result = self
            .scope
            .run(self.api.upload_file(file_name, contents))
            .await;
        match result {
            None => {
                self.progress.reset();
                Err(UploadError::Cancelled)
            }
            Some(Ok(response)) => {
                self.progress.complete();
                let summary = UploadSummary::from(response);
                self.toasts.success(summary.message.clone());
                if let Some(refresh) = self.on_complete.clone() {
                    self.pending_refresh = Some(self.schedule_refresh(refresh()));
                }
                Ok(summary)
            }
            Some(Err(err)) => {
                self.progress.reset();
                self.toasts.error(format!("Error uploading file: {err}"));
                Err(err.into())
            }
        }
    }

    /// Run `refresh` after the configured delay unless the panel is left.
    pub fn schedule_refresh<F>(&self, refresh: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let scope = self.scope.clone();
        let delay = self.refresh_delay;
        tokio::spawn(async move {
            scope
                .run(async move {
                    tokio::time::sleep(delay).await;
                    refresh.await;
                })
                .await;
        })
    }
}

/// One line the backend would ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRecord {
    /// 1-based line number in the file.
    pub line: usize,
    /// Account number.
    pub account_number: String,
    /// Holder name.
    pub customer_name: String,
    /// Bank name.
    pub bank_name: String,
    /// Parsed balance.
    pub balance: Decimal,
    /// Optional holder email.
    pub customer_email: Option<String>,
}

/// A line the backend would count as a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    /// 1-based line number in the file.
    pub line: usize,
    /// Why it would fail.
    pub reason: String,
}

/// Local dry run of an upload file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPreview {
    /// Parseable records.
    pub records: Vec<PreviewRecord>,
    /// Unparseable lines.
    pub rejected: Vec<RejectedLine>,
}

/// Parse `accountNumber|customerName|bankName|balance[|email]` lines.
///
/// The first line is a header and is skipped, as are blank lines.
#[must_use]
pub fn preview_records(contents: &str) -> UploadPreview {
    let mut preview = UploadPreview::default();
    for (index, raw) in contents.lines().enumerate().skip(1) {
        let line = index + 1;
        if raw.trim().is_empty() {
            continue;
        }
        match parse_line(raw) {
            Ok(record) => preview.records.push(PreviewRecord { line, ..record }),
            Err(reason) => preview.rejected.push(RejectedLine { line, reason }),
        }
    }
    preview
}

fn parse_line(raw: &str) -> Result<PreviewRecord, String> {
    let parts: Vec<&str> = raw.split('|').map(str::trim).collect();
    if parts.len() < 4 {
        return Err(format!("expected at least 4 fields, found {}", parts.len()));
    }
    if parts[0].is_empty() {
        return Err("missing account number".to_string());
    }
    let balance: Decimal = parts[3]
        .parse()
        .map_err(|_| format!("invalid balance '{}'", parts[3]))?;
    Ok(PreviewRecord {
        line: 0,
        account_number: parts[0].to_string(),
        customer_name: parts[1].to_string(),
        bank_name: parts[2].to_string(),
        balance,
        customer_email: parts
            .get(4)
            .filter(|email| !email.is_empty())
            .map(ToString::to_string),
    })
}
