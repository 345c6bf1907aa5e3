//! CLI error type, the shared application context and console wiring.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use dormant_console::{
    ApiError, Console, ConsoleConfig, FileStorage, Route, SessionStorage, Toast, ToastKind,
};
use url::Url;

use crate::cli::{Cli, OutputFormat};

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        classify_api_error(err)
    }
}

/// Map a console API failure onto a CLI error.
///
/// Credential problems and client-side request errors are the caller's to
/// fix (exit 2); everything else is operational (exit 3).
pub(crate) fn classify_api_error(err: ApiError) -> CliError {
    if let ApiError::Server { status, message } = &err
        && is_client_status(*status)
    {
        return CliError::validation(format!("{message} (status {status})"));
    }
    if is_caller_error(&err) {
        CliError::validation(err.to_string())
    } else {
        CliError::failure(err)
    }
}

/// Classify a failure the console already toasted as `{prefix}{err}`.
///
/// The message matches the toast so `run` does not print it twice.
pub(crate) fn classify_toasted(err: ApiError, prefix: &str) -> CliError {
    let message = format!("{prefix}{err}");
    if is_caller_error(&err) {
        CliError::validation(message)
    } else {
        CliError::failure(anyhow!(message))
    }
}

fn is_caller_error(err: &ApiError) -> bool {
    match err {
        ApiError::InvalidCredentials | ApiError::Unauthorized => true,
        ApiError::Server { status, .. } => is_client_status(*status),
        _ => false,
    }
}

fn is_client_status(status: dormant_console::StatusCode) -> bool {
    matches!(status.as_u16(), 400 | 409 | 422)
}

/// Application context passed to command handlers.
pub(crate) struct AppContext {
    pub(crate) console: Console,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Build the console from global flags, persisting the session on disk.
    pub(crate) fn from_cli(cli: &Cli, trace_id: &str) -> CliResult<Self> {
        let session_dir = cli
            .session_dir
            .clone()
            .unwrap_or_else(dormant_console::config::default_session_dir);
        let mut config = ConsoleConfig::new(cli.api_url.clone());
        config.timeout = Duration::from_secs(cli.timeout);
        config.session_dir = session_dir.clone();
        config.request_id = Some(trace_id.to_string());
        let storage: Arc<dyn SessionStorage> = Arc::new(FileStorage::new(session_dir));
        Self::with_storage(config, storage, cli.output)
    }

    /// Build the console over explicit storage.
    pub(crate) fn with_storage(
        config: ConsoleConfig,
        storage: Arc<dyn SessionStorage>,
        output: OutputFormat,
    ) -> CliResult<Self> {
        let console = Console::new(config, storage)
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;
        Ok(Self { console, output })
    }

    /// Enter `route`, failing when the gate sends the user to login.
    pub(crate) fn enter(&self, route: Route) -> CliResult<()> {
        let shown = self.console.navigate(route);
        if shown == route {
            Ok(())
        } else {
            Err(CliError::validation(
                "not logged in; run `dormant login` first",
            ))
        }
    }
}

/// Parse the API URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Print pending toasts to stderr; returns what was printed.
pub(crate) fn flush_toasts(console: &Console) -> Vec<Toast> {
    let toasts = console.toasts().drain();
    for toast in &toasts {
        eprintln!("{} {}", toast.kind.icon(), toast.message);
    }
    toasts
}

/// Whether `message` was already shown as an error or warning toast.
pub(crate) fn already_reported(toasts: &[Toast], message: &str) -> bool {
    toasts.iter().any(|toast| {
        matches!(toast.kind, ToastKind::Error | ToastKind::Warning) && toast.message == message
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dormant_console::MemoryStorage;
    use dormant_console::StatusCode;

    fn context() -> AppContext {
        let config = ConsoleConfig::new("http://127.0.0.1:9".parse().expect("valid URL"));
        AppContext::with_storage(config, Arc::new(MemoryStorage::new()), OutputFormat::Table)
            .unwrap_or_else(|err| panic!("context: {}", err.display_message()))
    }

    #[test]
    fn exit_codes_distinguish_validation_from_failure() {
        assert_eq!(CliError::validation("bad").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("boom")).exit_code(), 3);
        assert_eq!(CliError::validation("bad").display_message(), "bad");
    }

    #[test]
    fn api_errors_are_classified() {
        let conflict = classify_api_error(ApiError::Server {
            status: StatusCode::CONFLICT,
            message: "duplicate account".to_string(),
        });
        assert_eq!(conflict.exit_code(), 2);
        assert_eq!(
            conflict.display_message(),
            "duplicate account (status 409 Conflict)"
        );

        let outage = classify_api_error(ApiError::Server {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "database down".to_string(),
        });
        assert_eq!(outage.exit_code(), 3);
        assert_eq!(classify_api_error(ApiError::InvalidCredentials).exit_code(), 2);
    }

    #[test]
    fn toasted_errors_keep_the_toast_text() {
        let err = classify_toasted(
            ApiError::Server {
                status: StatusCode::BAD_GATEWAY,
                message: "upstream gone".to_string(),
            },
            "Export failed: ",
        );
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.display_message(), "Export failed: upstream gone");

        let err = classify_toasted(
            ApiError::Server {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: "bad date".to_string(),
            },
            "Update failed: ",
        );
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.display_message(), "Update failed: bad date");
    }

    #[test]
    fn entering_gated_route_without_session_fails() {
        let ctx = context();
        let err = ctx.enter(Route::Accounts).err().expect("gate should refuse");
        assert_eq!(err.exit_code(), 2);
        assert!(ctx.enter(Route::Login).is_ok());
    }

    #[test]
    fn reported_toasts_are_detected() {
        let ctx = context();
        ctx.console.toasts().error("Export failed: disk full");
        let shown = flush_toasts(&ctx.console);
        assert!(already_reported(&shown, "Export failed: disk full"));
        assert!(!already_reported(&shown, "something else"));
    }
}
