//! Credential form.

use std::fmt::{self, Display, Formatter};

use dormant_api_models::UserRecord;
use thiserror::Error;

use crate::api::DormantApi;
use crate::error::ApiError;
use crate::navigation::{Navigator, Route};
use crate::toast::ToastBus;

/// Field a login validation message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginField {
    /// Username input.
    Username,
    /// Password input.
    Password,
}

/// Inline validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginFieldError {
    /// Offending field.
    pub field: LoginField,
    /// Message shown under the field.
    pub message: &'static str,
}

impl Display for LoginFieldError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.message)
    }
}

/// Why a login attempt did not produce a session.
#[derive(Debug, Error)]
pub enum LoginError {
    /// Required fields are missing.
    #[error("Please fill in all required fields")]
    Invalid(Vec<LoginFieldError>),
    /// The backend refused or could not be reached.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Values typed into the login form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    /// Username, trimmed before use.
    pub username: String,
    /// Password, sent as typed.
    pub password: String,
}

impl LoginForm {
    /// Form holding the given credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Required-field checks; every missing field is reported.
    ///
    /// # Errors
    /// Returns one message per missing field.
    pub fn validate(&self) -> Result<(), Vec<LoginFieldError>> {
        let mut errors = Vec::new();
        if self.username.trim().is_empty() {
            errors.push(LoginFieldError {
                field: LoginField::Username,
                message: "Username is required",
            });
        }
        if self.password.is_empty() {
            errors.push(LoginFieldError {
                field: LoginField::Password,
                message: "Password is required",
            });
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Validate, log in, toast and route to the dashboard.
///
/// # Errors
/// Returns [`LoginError::Invalid`] without a network call when fields are
/// missing, or the API failure; both are toasted.
pub async fn submit(
    api: &DormantApi,
    toasts: &ToastBus,
    navigator: &Navigator,
    form: &LoginForm,
) -> Result<UserRecord, LoginError> {
    if let Err(errors) = form.validate() {
        let err = LoginError::Invalid(errors);
        toasts.warning(err.to_string());
        return Err(err);
    }

    match api.login(form.username.trim(), &form.password).await {
        Ok(user) => {
            toasts.success("Login successful! Welcome back.");
            navigator.navigate(Route::Dashboard);
            Ok(user)
        }
        Err(err) => {
            toasts.error(err.to_string());
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{Result, anyhow};
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;
    use crate::config::{ConsoleConfig, RetryPolicy};
    use crate::http::HttpClient;
    use crate::session::{AuthStore, MemoryStorage};
    use crate::toast::ToastKind;

    fn wiring(base_url: &str) -> Result<(DormantApi, Navigator)> {
        let mut config = ConsoleConfig::new(base_url.parse()?);
        config.retry = RetryPolicy::disabled();
        let navigator = Navigator::new(Route::Login);
        let auth = AuthStore::new(Arc::new(MemoryStorage::new()));
        let http = HttpClient::new(&config, auth, navigator.clone())?;
        Ok((DormantApi::new(http), navigator))
    }

    #[test]
    fn missing_fields_are_reported_together() {
        let errors = LoginForm::new("   ", "").validate().err().unwrap_or_default();
        let messages: Vec<_> = errors.iter().map(|error| error.message).collect();
        assert_eq!(messages, vec!["Username is required", "Password is required"]);
        assert!(LoginForm::new("admin", " ").validate().is_ok());
    }

    #[tokio::test]
    async fn invalid_form_skips_network() -> Result<()> {
        let (api, navigator) = wiring("http://127.0.0.1:9")?;
        let toasts = ToastBus::new();
        let result = submit(&api, &toasts, &navigator, &LoginForm::new("admin", "")).await;
        assert!(matches!(result, Err(LoginError::Invalid(_))));
        let toast = toasts.drain().pop().ok_or_else(|| anyhow!("missing toast"))?;
        assert_eq!(toast.kind, ToastKind::Warning);
        assert_eq!(toast.message, "Please fill in all required fields");
        assert_eq!(navigator.current(), Route::Login);
        Ok(())
    }

    #[tokio::test]
    async fn successful_login_routes_to_dashboard() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/auth/login")
                .json_body(json!({"username": "admin", "password": "admin123"}));
            then.status(200)
                .json_body(json!({"token": "jwt", "username": "admin", "role": "ADMIN"}));
        });
        let (api, navigator) = wiring(&server.base_url())?;
        let toasts = ToastBus::new();
        let user = submit(&api, &toasts, &navigator, &LoginForm::new(" admin ", "admin123")).await?;
        mock.assert();
        assert!(user.is_admin());
        assert_eq!(navigator.current(), Route::Dashboard);
        assert_eq!(toasts.drain()[0].message, "Login successful! Welcome back.");
        Ok(())
    }

    #[tokio::test]
    async fn refused_login_toasts_error() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(401);
        });
        let (api, navigator) = wiring(&server.base_url())?;
        let toasts = ToastBus::new();
        let result = submit(&api, &toasts, &navigator, &LoginForm::new("admin", "nope")).await;
        assert!(matches!(
            result,
            Err(LoginError::Api(ApiError::InvalidCredentials))
        ));
        let toast = toasts.drain().pop().ok_or_else(|| anyhow!("missing toast"))?;
        assert_eq!(toast.kind, ToastKind::Error);
        assert_eq!(toast.message, "Invalid username or password");
        assert_eq!(navigator.current(), Route::Login);
        Ok(())
    }
}
