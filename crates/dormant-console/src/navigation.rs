//! Routes, the navigator and the route gate.
//!
//! # Design
//! - The navigator is a watch channel so the HTTP wrapper can force a
//!   redirect to the login route without knowing who renders it. Change
//!   hooks let the console tear views down on any redirect.
//! - The gate is re-evaluated on every navigation; nothing is cached.
//! - Role checks here only shape the interface. The backend enforces access.

use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

use dormant_api_models::UserRecord;
use tokio::sync::watch;

use crate::session::AuthStore;

/// Views the console can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Credential form.
    Login,
    /// Aggregate balances per bank.
    Dashboard,
    /// Searchable, sortable account table.
    Accounts,
    /// Bulk file ingestion (admins only).
    Upload,
    /// Filtered CSV export.
    Reports,
}

impl Route {
    /// Path the route is mounted at.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Dashboard => "/",
            Self::Accounts => "/accounts",
            Self::Upload => "/upload",
            Self::Reports => "/reports",
        }
    }

    /// Whether the route is behind the authentication gate.
    #[must_use]
    pub const fn requires_auth(self) -> bool {
        !matches!(self, Self::Login)
    }
}

impl Display for Route {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.path())
    }
}

/// Outcome of evaluating the gate for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Render the requested view.
    Authenticated,
    /// Send the user elsewhere.
    Redirect(Route),
}

impl Gate {
    /// Decide whether `route` may render for the current auth state.
    #[must_use]
    pub fn evaluate(route: Route, auth: &AuthStore) -> Self {
        if route.requires_auth() && !auth.is_authenticated() {
            Self::Redirect(Route::Login)
        } else {
            Self::Authenticated
        }
    }

    /// Route that ends up rendered.
    #[must_use]
    pub const fn resolve(self, requested: Route) -> Route {
        match self {
            Self::Authenticated => requested,
            Self::Redirect(target) => target,
        }
    }
}

/// Whether the user may see admin-only controls.
#[must_use]
pub fn can_upload(user: Option<&UserRecord>) -> bool {
    user.is_some_and(UserRecord::is_admin)
}

type RouteHook = Box<dyn Fn(Route) + Send + Sync>;

/// Current route holder shared by every service.
#[derive(Clone)]
pub struct Navigator {
    sender: Arc<watch::Sender<Route>>,
    hooks: Arc<Mutex<Vec<RouteHook>>>,
}

impl fmt::Debug for Navigator {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Navigator")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

impl Navigator {
    /// Navigator starting at `initial`.
    #[must_use]
    pub fn new(initial: Route) -> Self {
        let (sender, _receiver) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
            hooks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Run `hook` synchronously whenever the route actually changes.
    ///
    /// Hooks fire on the navigating thread, including redirects forced by the
    /// HTTP wrapper, so view teardown completes before the caller resumes.
    /// A hook must not navigate.
    pub fn on_change<F>(&self, hook: F)
    where
        F: Fn(Route) + Send + Sync + 'static,
    {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// Route currently shown.
    #[must_use]
    pub fn current(&self) -> Route {
        *self.sender.borrow()
    }

    /// Move to `route`; returns the route that was shown before.
    pub fn navigate(&self, route: Route) -> Route {
        let previous = self.sender.send_replace(route);
        if previous != route {
            tracing::debug!(from = %previous, to = %route, "navigation");
            let hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
            for hook in hooks.iter() {
                hook(route);
            }
        }
        previous
    }

    /// Receiver notified on every navigation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.sender.subscribe()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Login)
    }
}

#[cfg(test)]
mod tests {
    use dormant_api_models::Role;

    use super::*;
    use crate::session::{MemoryStorage, Session, SessionError};

    fn store() -> AuthStore {
        AuthStore::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn gate_redirects_anonymous_users_to_login() {
        let auth = store();
        for route in [Route::Dashboard, Route::Accounts, Route::Upload, Route::Reports] {
            assert_eq!(Gate::evaluate(route, &auth), Gate::Redirect(Route::Login));
        }
        assert_eq!(Gate::evaluate(Route::Login, &auth), Gate::Authenticated);
    }

    #[test]
    fn gate_is_reevaluated_after_logout() -> Result<(), SessionError> {
        let auth = store();
        auth.persist(&Session {
            token: "t".to_string(),
            user: UserRecord {
                username: "op".to_string(),
                role: Role::Operator,
            },
        })?;
        assert_eq!(Gate::evaluate(Route::Accounts, &auth), Gate::Authenticated);
        auth.clear()?;
        let gate = Gate::evaluate(Route::Accounts, &auth);
        assert_eq!(gate.resolve(Route::Accounts), Route::Login);
        Ok(())
    }

    #[test]
    fn upload_requires_admin_role() {
        let operator = UserRecord {
            username: "op".to_string(),
            role: Role::Operator,
        };
        let admin = UserRecord {
            username: "admin".to_string(),
            role: Role::Admin,
        };
        assert!(!can_upload(None));
        assert!(!can_upload(Some(&operator)));
        assert!(can_upload(Some(&admin)));
    }

    #[test]
    fn navigator_notifies_subscribers() {
        let navigator = Navigator::new(Route::Dashboard);
        let mut receiver = navigator.subscribe();
        assert_eq!(navigator.navigate(Route::Login), Route::Dashboard);
        assert!(receiver.has_changed().unwrap_or(false));
        assert_eq!(*receiver.borrow_and_update(), Route::Login);
        assert_eq!(navigator.current(), Route::Login);
    }

    #[test]
    fn hooks_fire_only_on_real_changes() {
        let navigator = Navigator::new(Route::Accounts);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        navigator.on_change(move |route| {
            sink.lock().unwrap_or_else(PoisonError::into_inner).push(route);
        });
        navigator.navigate(Route::Accounts);
        navigator.clone().navigate(Route::Login);
        navigator.navigate(Route::Login);
        let seen = seen.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(*seen, vec![Route::Login]);
    }
}
