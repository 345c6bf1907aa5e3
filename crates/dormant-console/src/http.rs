//! Bearer-token HTTP wrapper shared by every API call.
//!
//! # Design
//! - Requests are rebuilt for each attempt so the freshest token is attached
//!   and bodies that cannot be cloned (multipart) still retry.
//! - Only transport failures (no response at all) are retried.
//! - A `401` clears the session and forces the login route before the call
//!   rejects.

use std::time::Duration;

use dormant_api_models::ErrorBody;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::{ConsoleConfig, RetryPolicy};
use crate::error::{ApiError, ApiResult};
use crate::navigation::{Navigator, Route};
use crate::session::AuthStore;

/// Correlation header attached when a request id is configured.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Longest raw body echoed back as an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Query parameters appended to a request.
pub type Query<'a> = [(&'a str, String)];

/// Raw response body plus the headers that came with it.
#[derive(Debug, Clone)]
pub struct BinaryResponse {
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Vec<u8>,
}

/// Configured client bound to the backend origin.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    auth: AuthStore,
    navigator: Navigator,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Build the client from console configuration.
    ///
    /// # Errors
    /// Returns [`ApiError::Request`] when the underlying client cannot be built.
    pub fn new(config: &ConsoleConfig, auth: AuthStore, navigator: Navigator) -> ApiResult<Self> {
        let mut default_headers = HeaderMap::new();
        if let Some(request_id) = &config.request_id {
            match HeaderValue::from_str(request_id) {
                Ok(value) => {
                    default_headers.insert(HEADER_REQUEST_ID, value);
                }
                Err(_) => tracing::warn!("request id contains invalid characters; not sent"),
            }
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|source| ApiError::Request {
                path: config.base_url.to_string(),
                source,
            })?;
        Ok(Self {
            client,
            base_url: directory_base(&config.base_url),
            auth,
            navigator,
            retry: config.retry,
        })
    }

    /// Auth store the client reads tokens from.
    #[must_use]
    pub const fn auth(&self) -> &AuthStore {
        &self.auth
    }

    /// Resolve an API path (and optional query) against the base URL.
    ///
    /// Paths resolve beneath any prefix the base URL carries, so
    /// `http://host/dormant` serves `/api/..` from `http://host/dormant/api/..`.
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidUrl`] when the path cannot be joined.
    pub fn url(&self, path: &str, query: &Query<'_>) -> ApiResult<Url> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| ApiError::InvalidUrl {
                path: path.to_string(),
                source,
            })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Send a request, retrying transport failures per the retry policy.
    ///
    /// `decorate` adds the body; it runs once per attempt.
    ///
    /// # Errors
    /// Returns [`ApiError::Unauthorized`] on `401`, [`ApiError::Network`] when
    /// no response arrives after every retry, and [`ApiError::Server`] for any
    /// other non-success status.
    pub async fn send<F>(
        &self,
        method: Method,
        path: &str,
        query: &Query<'_>,
        decorate: F,
    ) -> ApiResult<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let url = self.url(path, query)?;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let mut request = decorate(self.client.request(method.clone(), url.clone()));
            if let Some(token) = self.auth.token() {
                request = request.bearer_auth(token);
            }
            tracing::debug!(%method, path, attempt, "sending request");

            match request.send().await {
                Ok(response) => return self.inspect(path, response).await,
                Err(source) if source.is_builder() => {
                    return Err(ApiError::Request {
                        path: path.to_string(),
                        source,
                    });
                }
                Err(source) => {
                    if attempt > self.retry.max_retries {
                        tracing::warn!(path, attempt, error = %source, "giving up after transport failures");
                        return Err(ApiError::Network {
                            attempts: attempt,
                            source,
                        });
                    }
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        path,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %source,
                        "transport failure; retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn inspect(&self, path: &str, response: Response) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.force_logout(path);
            return Err(ApiError::Unauthorized);
        }

        let bytes = response.bytes().await.unwrap_or_default();
        let message = error_message(status, &bytes);
        tracing::debug!(path, %status, message = %message, "request rejected");
        Err(ApiError::Server { status, message })
    }

    fn force_logout(&self, path: &str) {
        tracing::warn!(path, "session rejected by server; logging out");
        if let Err(err) = self.auth.clear() {
            tracing::warn!(error = %err, "failed to clear session after 401");
        }
        self.navigator.navigate(Route::Login);
    }

    /// `GET` a JSON document.
    ///
    /// # Errors
    /// See [`HttpClient::send`]; additionally [`ApiError::Decode`].
    pub async fn get_json<T>(&self, path: &str, query: &Query<'_>) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(Method::GET, path, query, |request| request).await?;
        decode(path, response).await
    }

    /// Send `body` as JSON and decode the JSON answer.
    ///
    /// # Errors
    /// See [`HttpClient::send`]; additionally [`ApiError::Decode`].
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(method, path, &[], |request| request.json(body))
            .await?;
        decode(path, response).await
    }

    /// `POST` without a body, ignoring the answer.
    ///
    /// # Errors
    /// See [`HttpClient::send`].
    pub async fn post_empty(&self, path: &str) -> ApiResult<()> {
        self.send(Method::POST, path, &[], |request| request).await?;
        Ok(())
    }

    /// `POST` a single file as `multipart/form-data`.
    ///
    /// # Errors
    /// See [`HttpClient::send`]; additionally [`ApiError::Decode`].
    pub async fn post_file<T>(
        &self,
        path: &str,
        field: &str,
        file_name: &str,
        contents: &[u8],
    ) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .send(Method::POST, path, &[], |request| {
                let part = reqwest::multipart::Part::bytes(contents.to_vec())
                    .file_name(file_name.to_string());
                request.multipart(reqwest::multipart::Form::new().part(field.to_string(), part))
            })
            .await?;
        decode(path, response).await
    }

    /// `GET` a binary body along with its headers.
    ///
    /// # Errors
    /// See [`HttpClient::send`]; additionally [`ApiError::Decode`].
    pub async fn get_bytes(&self, path: &str, query: &Query<'_>) -> ApiResult<BinaryResponse> {
        let response = self.send(Method::GET, path, query, |request| request).await?;
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|source| ApiError::Decode {
                path: path.to_string(),
                source,
            })?;
        Ok(BinaryResponse {
            headers,
            body: body.to_vec(),
        })
    }
}

async fn decode<T>(path: &str, response: Response) -> ApiResult<T>
where
    T: DeserializeOwned,
{
    response
        .json::<T>()
        .await
        .map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
}

async fn sleep(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Base URL with a trailing slash so relative joins keep its path prefix.
fn directory_base(base: &Url) -> Url {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base.set_fragment(None);
    base
}

/// Human-readable message for a failed response, preferring the server's.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body)
        && let Some(message) = parsed.best_message()
    {
        return message.to_string();
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() && !text.starts_with('{') && !text.starts_with('<') {
        return text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    }
    format!("request failed with status {status}")
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::Arc;

    use anyhow::{Result, anyhow};
    use dormant_api_models::{Role, UserRecord};
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::{Value, json};

    use super::*;
    use crate::session::{MemoryStorage, Session};

    fn client_for(base_url: &str, retry: RetryPolicy) -> Result<(HttpClient, Navigator)> {
        let mut config = ConsoleConfig::new(base_url.parse()?);
        config.retry = retry;
        let navigator = Navigator::new(Route::Accounts);
        let auth = AuthStore::new(Arc::new(MemoryStorage::new()));
        auth.persist(&Session {
            token: "secret-token".to_string(),
            user: UserRecord {
                username: "op".to_string(),
                role: Role::Operator,
            },
        })?;
        let client = HttpClient::new(&config, auth, navigator.clone())?;
        Ok((client, navigator))
    }

    fn closed_port_url() -> Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        drop(listener);
        Ok(format!("http://127.0.0.1:{port}"))
    }

    #[tokio::test]
    async fn attaches_bearer_token() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/accounts")
                .header("authorization", "Bearer secret-token");
            then.status(200).json_body(json!([]));
        });
        let (client, _) = client_for(&server.base_url(), RetryPolicy::default())?;
        let body: Value = client.get_json("/api/accounts", &[]).await?;
        assert_eq!(body, json!([]));
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn configured_request_id_is_sent() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/accounts/summary")
                .header(HEADER_REQUEST_ID, "trace-123");
            then.status(200).json_body(json!([]));
        });
        let mut config = ConsoleConfig::new(server.base_url().parse()?);
        config.request_id = Some("trace-123".to_string());
        let auth = AuthStore::new(Arc::new(MemoryStorage::new()));
        let client = HttpClient::new(&config, auth, Navigator::default())?;
        let _: Value = client.get_json("/api/accounts/summary", &[]).await?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_clears_session_and_routes_to_login() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/accounts/summary");
            then.status(401);
        });
        let (client, navigator) = client_for(&server.base_url(), RetryPolicy::default())?;
        let result = client.get_json::<Value>("/api/accounts/summary", &[]).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
        assert!(!client.auth().is_authenticated());
        assert!(client.auth().current_user().is_none());
        assert_eq!(navigator.current(), Route::Login);
        Ok(())
    }

    #[tokio::test]
    async fn server_errors_carry_message_and_status() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/accounts/99");
            then.status(404)
                .json_body(json!({"error": "Not Found", "message": "Account 99 not found"}));
        });
        let (client, navigator) = client_for(&server.base_url(), RetryPolicy::default())?;
        let err = client
            .get_json::<Value>("/api/accounts/99", &[])
            .await
            .err()
            .ok_or_else(|| anyhow!("expected failure"))?;
        assert_eq!(err.to_string(), "Account 99 not found");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(!err.is_retryable());
        assert_eq!(navigator.current(), Route::Accounts);
        Ok(())
    }

    #[tokio::test]
    async fn bodyless_errors_fall_back_to_status() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/logout");
            then.status(500);
        });
        let (client, _) = client_for(&server.base_url(), RetryPolicy::default())?;
        let err = client
            .post_empty("/api/auth/logout")
            .await
            .err()
            .ok_or_else(|| anyhow!("expected failure"))?;
        assert_eq!(
            err.to_string(),
            "request failed with status 500 Internal Server Error"
        );
        Ok(())
    }

    #[tokio::test]
    async fn transport_failures_retry_then_surface_network_error() -> Result<()> {
        let retry = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(5),
        };
        let (client, navigator) = client_for(&closed_port_url()?, retry)?;
        let err = client
            .get_json::<Value>("/api/accounts", &[])
            .await
            .err()
            .ok_or_else(|| anyhow!("expected failure"))?;
        match &err {
            ApiError::Network { attempts, .. } => assert_eq!(*attempts, 3),
            other => return Err(anyhow!("unexpected error: {other:?}")),
        }
        assert!(err.is_retryable());
        assert!(client.auth().is_authenticated());
        assert_eq!(navigator.current(), Route::Accounts);
        Ok(())
    }

    #[test]
    fn url_appends_query_only_when_present() -> Result<()> {
        let (client, _) = client_for("http://localhost:8080", RetryPolicy::default())?;
        let bare = client.url("/api/accounts", &[])?;
        assert_eq!(bare.as_str(), "http://localhost:8080/api/accounts");
        let searched = client.url("/api/accounts", &[("search", "chase bank".to_string())])?;
        assert_eq!(
            searched.as_str(),
            "http://localhost:8080/api/accounts?search=chase+bank"
        );
        Ok(())
    }

    #[test]
    fn url_keeps_base_path_prefix() -> Result<()> {
        for base in ["http://localhost:8080/dormant", "http://localhost:8080/dormant/"] {
            let (client, _) = client_for(base, RetryPolicy::default())?;
            let url = client.url("/api/accounts/7", &[])?;
            assert_eq!(url.as_str(), "http://localhost:8080/dormant/api/accounts/7");
        }
        Ok(())
    }

    #[test]
    fn error_message_prefers_plain_text_over_status() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, b"comments too long"),
            "comments too long"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>"),
            "request failed with status 502 Bad Gateway"
        );
    }
}
