//! Aggregate balances per bank.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dormant_api_models::{Account, BankSummary};
use rust_decimal::Decimal;

use crate::api::DormantApi;
use crate::error::ApiError;
use crate::scope::ViewScope;
use crate::toast::ToastBus;

/// Renderable dashboard state.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    /// Every account, used for the total count.
    pub accounts: Vec<Account>,
    /// Per-bank aggregates.
    pub summaries: Vec<BankSummary>,
    /// Whether a load is in flight.
    pub loading: bool,
    /// Message of the last failed load.
    pub error: Option<String>,
}

impl DashboardState {
    /// Number of accounts loaded.
    #[must_use]
    pub fn total_accounts(&self) -> usize {
        self.accounts.len()
    }

    /// Sum of the per-bank balances.
    #[must_use]
    pub fn total_balance(&self) -> Decimal {
        self.summaries
            .iter()
            .map(|summary| summary.total_balance)
            .sum()
    }

    /// Number of banks with dormant accounts.
    #[must_use]
    pub fn bank_count(&self) -> usize {
        self.summaries.len()
    }
}

/// Dashboard controller.
#[derive(Debug, Clone)]
pub struct DashboardView {
    api: DormantApi,
    toasts: ToastBus,
    scope: ViewScope,
    state: Arc<Mutex<DashboardState>>,
}

impl DashboardView {
    /// Empty dashboard.
    #[must_use]
    pub fn new(api: DormantApi, toasts: ToastBus) -> Self {
        Self {
            api,
            toasts,
            scope: ViewScope::new(),
            state: Arc::new(Mutex::new(DashboardState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancellation scope of this view.
    #[must_use]
    pub const fn scope(&self) -> &ViewScope {
        &self.scope
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> DashboardState {
        self.lock().clone()
    }

    /// Fetch accounts and summaries concurrently.
    ///
    /// Returns `false` when the view was left before both answered.
    ///
    /// # Errors
    /// Returns the first backend failure after toasting it.
    pub async fn load(&self) -> Result<bool, ApiError> {
        {
            let mut state = self.lock();
            state.loading = true;
            state.error = None;
        }
        let fetch = async {
            tokio::try_join!(self.api.list_accounts(), self.api.bank_summaries())
        };
        let Some(result) = self.scope.run(fetch).await else {
            return Ok(false);
        };

        let mut state = self.lock();
        state.loading = false;
        match result {
            Ok((accounts, summaries)) => {
                state.accounts = accounts;
                state.summaries = summaries;
                Ok(true)
            }
            Err(err) => {
                let message = err.to_string();
                state.error = Some(message.clone());
                drop(state);
                self.toasts.error(message);
                Err(err)
            }
        }
    }

    /// User-triggered reload.
    ///
    /// # Errors
    /// See [`DashboardView::load`].
    pub async fn refresh(&self) -> Result<bool, ApiError> {
        self.toasts.info("Refreshing dashboard data...");
        self.load().await
    }
}
