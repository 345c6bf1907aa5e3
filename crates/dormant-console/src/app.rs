//! Root composition.
//!
//! # Design
//! - Every service is built here once and handed out by reference; there
//!   are no process-wide singletons.
//! - Leaving a view cancels its scope and drops its state, so a late
//!   response can never land on a view that is no longer shown.
//! - Views follow the navigator, not `Console::navigate`, so a redirect
//!   forced by a `401` tears them down too.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use dormant_api_models::UserRecord;

use crate::api::DormantApi;
use crate::config::ConsoleConfig;
use crate::error::ApiResult;
use crate::features::accounts::AccountsView;
use crate::features::dashboard::DashboardView;
use crate::features::login::{self, LoginError, LoginForm};
use crate::features::reports::{FileSink, ReportsPanel};
use crate::features::upload::UploadPanel;
use crate::http::HttpClient;
use crate::navigation::{Gate, Navigator, Route};
use crate::session::{AuthStore, SessionStorage};
use crate::toast::ToastBus;

struct Views {
    shown: Route,
    api: DormantApi,
    toasts: ToastBus,
    accounts: AccountsView,
    dashboard: DashboardView,
}

impl Views {
    fn fresh(shown: Route, api: &DormantApi, toasts: &ToastBus) -> Self {
        Self {
            shown,
            api: api.clone(),
            toasts: toasts.clone(),
            accounts: AccountsView::new(api.clone(), toasts.clone()),
            dashboard: DashboardView::new(api.clone(), toasts.clone()),
        }
    }

    fn show(&mut self, route: Route) {
        if self.shown == route {
            return;
        }
        self.leave();
        self.shown = route;
    }

    fn leave(&mut self) {
        match self.shown {
            Route::Accounts => {
                self.accounts.scope().cancel();
                self.accounts = AccountsView::new(self.api.clone(), self.toasts.clone());
            }
            Route::Dashboard => {
                self.dashboard.scope().cancel();
                self.dashboard = DashboardView::new(self.api.clone(), self.toasts.clone());
            }
            Route::Login | Route::Upload | Route::Reports => {}
        }
    }
}

fn lock_views(views: &Mutex<Views>) -> MutexGuard<'_, Views> {
    views.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn refresh_after_upload(views: Weak<Mutex<Views>>) {
    let Some(views) = views.upgrade() else {
        return;
    };
    let (accounts, dashboard) = {
        let views = lock_views(&views);
        (views.accounts.clone(), views.dashboard.clone())
    };
    if let Err(err) = accounts.reload().await {
        tracing::warn!(error = %err, "accounts refresh after upload failed");
    }
    if let Err(err) = dashboard.load().await {
        tracing::warn!(error = %err, "dashboard refresh after upload failed");
    }
}

/// The assembled console.
pub struct Console {
    config: ConsoleConfig,
    auth: AuthStore,
    navigator: Navigator,
    toasts: ToastBus,
    api: DormantApi,
    views: Arc<Mutex<Views>>,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Console")
            .field("base_url", &self.config.base_url.as_str())
            .field("route", &self.navigator.current())
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl Console {
    /// Wire every service; starts on the dashboard when a session exists.
    ///
    /// # Errors
    /// Returns [`crate::ApiError::Request`] when the HTTP client cannot be
    /// built.
    pub fn new(config: ConsoleConfig, storage: Arc<dyn SessionStorage>) -> ApiResult<Self> {
        let auth = AuthStore::new(storage);
        let initial = Gate::evaluate(Route::Dashboard, &auth).resolve(Route::Dashboard);
        let navigator = Navigator::new(initial);
        let toasts = ToastBus::new();
        let http = HttpClient::new(&config, auth.clone(), navigator.clone())?;
        let api = DormantApi::new(http);
        let views = Arc::new(Mutex::new(Views::fresh(initial, &api, &toasts)));
        let tracked = Arc::downgrade(&views);
        navigator.on_change(move |route| {
            if let Some(views) = tracked.upgrade() {
                lock_views(&views).show(route);
            }
        });
        tracing::debug!(base_url = %config.base_url, route = %initial, "console ready");
        Ok(Self {
            config,
            auth,
            navigator,
            toasts,
            api,
            views,
        })
    }

    fn views(&self) -> MutexGuard<'_, Views> {
        lock_views(&self.views)
    }

    /// Configuration the console was built with.
    #[must_use]
    pub const fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Session store.
    #[must_use]
    pub const fn auth(&self) -> &AuthStore {
        &self.auth
    }

    /// Route holder.
    #[must_use]
    pub const fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Notification bus.
    #[must_use]
    pub const fn toasts(&self) -> &ToastBus {
        &self.toasts
    }

    /// Backend client.
    #[must_use]
    pub const fn api(&self) -> &DormantApi {
        &self.api
    }

    /// Signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<UserRecord> {
        self.auth.current_user()
    }

    /// Route currently shown.
    #[must_use]
    pub fn current_route(&self) -> Route {
        self.navigator.current()
    }

    /// Navigate through the gate; returns the route actually shown.
    pub fn navigate(&self, requested: Route) -> Route {
        let target = Gate::evaluate(requested, &self.auth).resolve(requested);
        if target != requested {
            tracing::debug!(requested = %requested, target = %target, "route gated");
        }
        self.navigator.navigate(target);
        target
    }

    /// Accounts view controller for the current visit.
    #[must_use]
    pub fn accounts(&self) -> AccountsView {
        self.views().accounts.clone()
    }

    /// Dashboard controller for the current visit.
    #[must_use]
    pub fn dashboard(&self) -> DashboardView {
        self.views().dashboard.clone()
    }

    /// Upload panel; `None` unless the signed-in user is an admin.
    ///
    /// A successful upload reloads the accounts and dashboard views once the
    /// refresh delay elapses.
    #[must_use]
    pub fn upload_panel(&self) -> Option<UploadPanel> {
        let views = Arc::downgrade(&self.views);
        UploadPanel::for_user(
            self.current_user().as_ref(),
            self.api.clone(),
            self.toasts.clone(),
            self.config.refresh_delay,
        )
        .map(|panel| panel.with_refresh(move || refresh_after_upload(views.clone())))
    }

    /// Reports panel saving through `sink`.
    #[must_use]
    pub fn reports_panel(&self, sink: Arc<dyn FileSink>) -> ReportsPanel {
        ReportsPanel::new(self.api.clone(), self.toasts.clone(), sink)
    }

    /// Submit the login form; on success the dashboard is shown.
    ///
    /// # Errors
    /// See [`login::submit`].
    pub async fn login(&self, form: &LoginForm) -> Result<UserRecord, LoginError> {
        let user = login::submit(&self.api, &self.toasts, &self.navigator, form).await?;
        self.navigate(Route::Dashboard);
        Ok(user)
    }

    /// End the session and return to the login route.
    ///
    /// # Errors
    /// Returns [`crate::ApiError::Session`] when local state cannot be cleared.
    pub async fn logout(&self) -> ApiResult<()> {
        self.api.logout().await?;
        self.navigate(Route::Login);
        Ok(())
    }
}
