//! Filtered CSV export.
//!
//! # Design
//! - Only non-blank, trimmed filters reach the query string.
//! - Saving the file goes through [`FileSink`] so the panel never touches the
//!   filesystem directly.
//! - One export at a time; controls read [`ReportsPanel::is_busy`].

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dormant_api_models::ReclaimStatus;
use thiserror::Error;

use crate::api::DormantApi;
use crate::error::ApiError;
use crate::scope::ViewScope;
use crate::toast::ToastBus;

/// Export filters as typed in the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilters {
    /// Free-text search.
    pub search: String,
    /// Bank name.
    pub bank_name: String,
    /// Reclaim status; `None` exports every status.
    pub status: Option<ReclaimStatus>,
}

impl ReportFilters {
    /// Query parameters for the non-blank filters.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        for (key, value) in [("search", &self.search), ("bankName", &self.bank_name)] {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                pairs.push((key, trimmed.to_string()));
            }
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        pairs
    }

    /// Whether no filter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.query_pairs().is_empty()
    }
}

/// Destination for downloaded files.
pub trait FileSink: Send + Sync {
    /// Save `bytes` under `filename`; returns where it landed.
    ///
    /// # Errors
    /// Returns the IO failure when the file cannot be written.
    fn save(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Writes files into one directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Sink writing into `root`, created on demand.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSink for DirectorySink {
    /// Existing files are never replaced; a taken name becomes
    /// `name (1).csv`, `name (2).csv` and so on.
    fn save(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let (stem, extension) = split_extension(filename);
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                filename.to_string()
            } else {
                format!("{stem} ({attempt}){extension}")
            };
            let path = self.root.join(candidate);
            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(bytes)?;
                    return Ok(path);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(err),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for {filename}"),
        ))
    }
}

/// Suffixed names tried before a save gives up.
const MAX_NAME_ATTEMPTS: u32 = 1000;

fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(dot) if dot > 0 => filename.split_at(dot),
        _ => (filename, ""),
    }
}

/// Why an export did not produce a file.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Another export is still running.
    #[error("an export is already in progress")]
    Busy,
    /// The panel was left mid-export.
    #[error("export cancelled")]
    Cancelled,
    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The file could not be saved.
    #[error("failed to save {filename}")]
    Save {
        /// File that could not be written.
        filename: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Saved export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReceipt {
    /// Where the file was written.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: usize,
}

/// Reports controller.
pub struct ReportsPanel {
    api: DormantApi,
    toasts: ToastBus,
    sink: Arc<dyn FileSink>,
    scope: ViewScope,
    filters: ReportFilters,
    busy: Arc<AtomicBool>,
}

impl std::fmt::Debug for ReportsPanel {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ReportsPanel")
            .field("filters", &self.filters)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReportsPanel {
    /// Panel with empty filters.
    #[must_use]
    pub fn new(api: DormantApi, toasts: ToastBus, sink: Arc<dyn FileSink>) -> Self {
        Self {
            api,
            toasts,
            sink,
            scope: ViewScope::new(),
            filters: ReportFilters::default(),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancellation scope of this panel.
    #[must_use]
    pub const fn scope(&self) -> &ViewScope {
        &self.scope
    }

    /// Current filters.
    #[must_use]
    pub const fn filters(&self) -> &ReportFilters {
        &self.filters
    }

    /// Replace the filters; ignored while an export runs.
    pub fn set_filters(&mut self, filters: ReportFilters) {
        if self.is_busy() {
            return;
        }
        self.filters = filters;
    }

    /// Reset every filter; ignored while an export runs.
    pub fn clear_filters(&mut self) {
        self.set_filters(ReportFilters::default());
    }

    /// Whether an export is in flight; every control is disabled meanwhile.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Download the CSV for the current filters and save it.
    ///
    /// # Errors
    /// See [`ExportError`]; failures other than [`ExportError::Busy`] and
    /// [`ExportError::Cancelled`] are toasted.
    pub async fn export(&self) -> Result<ExportReceipt, ExportError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ExportError::Busy);
        }
        let _guard = BusyGuard(Arc::clone(&self.busy));

        self.toasts.info("Generating CSV export...");
        let query = self.filters.query_pairs();
        let Some(result) = self.scope.run(self.api.export_csv(&query)).await else {
            return Err(ExportError::Cancelled);
        };
        let export = match result {
            Ok(export) => export,
            Err(err) => {
                self.toasts.error(format!("Export failed: {err}"));
                return Err(err.into());
            }
        };

        match self.sink.save(&export.filename, &export.bytes) {
            Ok(path) => {
                self.toasts.success("Export completed successfully!");
                tracing::info!(path = %path.display(), "export saved");
                Ok(ExportReceipt {
                    path,
                    bytes: export.bytes.len(),
                })
            }
            Err(source) => {
                self.toasts
                    .error(format!("Export failed: could not save {}", export.filename));
                Err(ExportError::Save {
                    filename: export.filename,
                    source,
                })
            }
        }
    }
}
