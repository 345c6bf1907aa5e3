//! Account list view: search, sort, selection and updates.
//!
//! # Design
//! - State lives behind a mutex so overlapping searches can race; only the
//!   latest search ticket may write results.
//! - Every backend call runs through the view's [`ViewScope`].
//! - Update routing (single vs bulk) is decided from the selection size.

pub mod search;
pub mod table;
pub mod update;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dormant_api_models::Account;
use thiserror::Error;

use self::search::SearchSequencer;
use self::table::{Selection, SortColumn, SortState, UpdateTarget, sort_accounts};
use self::update::{FieldError, UpdateForm};
use crate::api::DormantApi;
use crate::error::ApiError;
use crate::scope::ViewScope;
use crate::toast::ToastBus;

/// Renderable state of the accounts view.
#[derive(Debug, Clone, Default)]
pub struct AccountsState {
    /// Rows returned by the last applied search, in backend order.
    pub accounts: Vec<Account>,
    /// Query the rows were fetched for.
    pub query: String,
    /// Active sort.
    pub sort: SortState,
    /// Checked rows.
    pub selection: Selection,
    /// Whether a search is in flight.
    pub loading: bool,
    /// Last load failure, cleared by the next successful load.
    pub error: Option<String>,
}

/// Result of dispatching a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Results were applied.
    Applied(usize),
    /// A newer search superseded this one.
    Stale,
    /// The view was left before the response arrived.
    Cancelled,
}

/// Why an update was not applied.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// No rows were selected.
    #[error("Please select at least one account to update")]
    NothingSelected,
    /// The form has no value to send.
    #[error("No changes to apply")]
    NoChanges,
    /// The form failed validation.
    #[error("{}", join_errors(.0))]
    Invalid(Vec<FieldError>),
    /// The view was left while the update was in flight.
    #[error("update cancelled")]
    Cancelled,
    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Accounts view controller.
#[derive(Debug, Clone)]
pub struct AccountsView {
    api: DormantApi,
    toasts: ToastBus,
    scope: ViewScope,
    sequencer: SearchSequencer,
    state: Arc<Mutex<AccountsState>>,
}

impl AccountsView {
    /// Fresh view with an empty table.
    #[must_use]
    pub fn new(api: DormantApi, toasts: ToastBus) -> Self {
        Self {
            api,
            toasts,
            scope: ViewScope::new(),
            sequencer: SearchSequencer::new(),
            state: Arc::new(Mutex::new(AccountsState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AccountsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancellation scope of this view.
    #[must_use]
    pub const fn scope(&self) -> &ViewScope {
        &self.scope
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> AccountsState {
        self.lock().clone()
    }

    /// Rows in display order.
    #[must_use]
    pub fn rows(&self) -> Vec<Account> {
        let state = self.lock();
        sort_accounts(&state.accounts, state.sort)
    }

    /// Header click on `column`.
    pub fn sort_by(&self, column: SortColumn) -> SortState {
        let mut state = self.lock();
        state.sort = state.sort.toggle(column);
        state.sort
    }

    /// Replace the active sort.
    pub fn set_sort(&self, sort: SortState) {
        self.lock().sort = sort;
    }

    /// Row checkbox.
    pub fn toggle_row(&self, id: i64) {
        self.lock().selection.toggle(id);
    }

    /// Header checkbox.
    pub fn toggle_all(&self) {
        let mut state = self.lock();
        let visible = state.accounts.clone();
        state.selection.select_all(&visible);
    }

    /// Replace the selection with `ids`.
    pub fn select(&self, ids: impl IntoIterator<Item = i64>) {
        self.lock().selection = ids.into_iter().collect();
    }

    /// Uncheck everything.
    pub fn clear_selection(&self) {
        self.lock().selection.clear();
    }

    /// Loaded accounts that are currently checked.
    #[must_use]
    pub fn selected_accounts(&self) -> Vec<Account> {
        let state = self.lock();
        state
            .accounts
            .iter()
            .filter(|account| state.selection.contains(account.id))
            .cloned()
            .collect()
    }

    /// Update modal state for the current selection.
    #[must_use]
    pub fn update_form(&self) -> UpdateForm {
        UpdateForm::for_selection(&self.selected_accounts())
    }

    /// Reload with the current query.
    ///
    /// # Errors
    /// Returns the backend failure after toasting it.
    pub async fn reload(&self) -> Result<SearchOutcome, ApiError> {
        let query = self.lock().query.clone();
        self.search(&query).await
    }

    /// Fetch accounts for `query`; only the newest search may apply results.
    ///
    /// # Errors
    /// Returns the backend failure after toasting it, unless superseded.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome, ApiError> {
        let ticket = self.sequencer.issue();
        {
            let mut state = self.lock();
            state.query = query.to_string();
            state.loading = true;
        }

        let Some(result) = self.scope.run(self.api.search_accounts(query)).await else {
            return Ok(SearchOutcome::Cancelled);
        };
        if !self.sequencer.is_current(ticket) {
            tracing::debug!(query, "discarding superseded search results");
            return Ok(SearchOutcome::Stale);
        }

        let mut state = self.lock();
        state.loading = false;
        match result {
            Ok(accounts) => {
                let count = accounts.len();
                state.selection.retain_visible(&accounts);
                state.accounts = accounts;
                state.error = None;
                Ok(SearchOutcome::Applied(count))
            }
            Err(err) => {
                let message = err.to_string();
                state.error = Some(message.clone());
                drop(state);
                self.toasts.error(format!("Failed to load accounts: {message}"));
                Err(err)
            }
        }
    }

    /// Validate `form` and send it to the selected accounts.
    ///
    /// Returns the number of accounts the backend reports as updated. On
    /// success the selection is cleared and the list reloaded.
    ///
    /// # Errors
    /// See [`UpdateError`]; each case is also toasted.
    pub async fn apply_update(&self, form: &UpdateForm) -> Result<u64, UpdateError> {
        let selection = self.lock().selection.clone();
        let Some(target) = UpdateTarget::from_selection(&selection) else {
            self.toasts.warning(UpdateError::NothingSelected.to_string());
            return Err(UpdateError::NothingSelected);
        };

        let update = match form.validate() {
            Ok(update) => update,
            Err(errors) => {
                let err = UpdateError::Invalid(errors);
                self.toasts.warning(err.to_string());
                return Err(err);
            }
        };
        if update.is_empty() {
            self.toasts.warning(UpdateError::NoChanges.to_string());
            return Err(UpdateError::NoChanges);
        }

        let call = async {
            match &target {
                UpdateTarget::Single(id) => self.api.update_account(*id, &update).await.map(|_| 1),
                UpdateTarget::Bulk(ids) => self.api.bulk_update(ids, &update).await,
            }
        };
        let updated = match self.scope.run(call).await {
            None => return Err(UpdateError::Cancelled),
            Some(Ok(updated)) => updated,
            Some(Err(err)) => {
                self.toasts.error(format!("Update failed: {err}"));
                return Err(err.into());
            }
        };

        let noun = if updated == 1 { "account" } else { "accounts" };
        self.toasts.success(format!("Updated {updated} {noun}"));
        self.clear_selection();
        if let Err(err) = self.reload().await {
            tracing::warn!(error = %err, "reload after update failed");
        }
        Ok(updated)
    }
}
