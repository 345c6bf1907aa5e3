//! Domain calls against the dormant accounts backend.

use dormant_api_models::{
    Account, AccountUpdate, BankSummary, BulkUpdateRequest, BulkUpdateResponse, LoginRequest,
    LoginResponse, UploadResponse, UserRecord,
};
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use reqwest::{Method, StatusCode};

use crate::error::{ApiError, ApiResult};
use crate::http::{HttpClient, Query};
use crate::session::{AuthStore, Session};

/// Filename used when the export response does not name one.
pub const DEFAULT_EXPORT_FILENAME: &str = "dormant_accounts.csv";

const LOGIN_PATH: &str = "/api/auth/login";
const LOGOUT_PATH: &str = "/api/auth/logout";
const ACCOUNTS_PATH: &str = "/api/accounts";
const SUMMARY_PATH: &str = "/api/accounts/summary";
const BULK_PATH: &str = "/api/accounts/bulk";
const UPLOAD_PATH: &str = "/api/accounts/upload";
const EXPORT_PATH: &str = "/api/reports/export";

/// A downloaded CSV report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    /// Suggested filename, free of path separators.
    pub filename: String,
    /// Raw CSV bytes.
    pub bytes: Vec<u8>,
}

/// Typed client for every backend operation the console uses.
#[derive(Debug, Clone)]
pub struct DormantApi {
    http: HttpClient,
}

impl DormantApi {
    /// Wrap a configured HTTP client.
    #[must_use]
    pub const fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Auth store shared with the HTTP client.
    #[must_use]
    pub const fn auth(&self) -> &AuthStore {
        self.http.auth()
    }

    /// Exchange credentials for a session and persist it.
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidCredentials`] when the backend refuses the
    /// credentials, or any transport/server error.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<UserRecord> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self
            .http
            .send_json(Method::POST, LOGIN_PATH, &request)
            .await
            .map_err(|err| match err {
                ApiError::Unauthorized => ApiError::InvalidCredentials,
                ApiError::Server { status, .. } if status == StatusCode::FORBIDDEN => {
                    ApiError::InvalidCredentials
                }
                other => other,
            })?;
        let user = response.user();
        self.auth().persist(&Session {
            token: response.token,
            user: user.clone(),
        })?;
        tracing::info!(username = %user.username, role = %user.role, "logged in");
        Ok(user)
    }

    /// Notify the backend (best effort) and clear the local session.
    ///
    /// # Errors
    /// Returns [`ApiError::Session`] only when the local session cannot be
    /// cleared; backend failures are logged.
    pub async fn logout(&self) -> ApiResult<()> {
        if self.auth().is_authenticated()
            && let Err(err) = self.http.post_empty(LOGOUT_PATH).await
        {
            tracing::warn!(error = %err, "logout notification failed");
        }
        self.auth().clear()?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Accounts matching `query`; a blank query lists every account.
    ///
    /// # Errors
    /// Propagates transport, server and decode errors.
    pub async fn search_accounts(&self, query: &str) -> ApiResult<Vec<Account>> {
        let query = query.trim();
        let params: Vec<(&str, String)> = if query.is_empty() {
            Vec::new()
        } else {
            vec![("search", query.to_string())]
        };
        self.http.get_json(ACCOUNTS_PATH, &params).await
    }

    /// Every account.
    ///
    /// # Errors
    /// Propagates transport, server and decode errors.
    pub async fn list_accounts(&self) -> ApiResult<Vec<Account>> {
        self.search_accounts("").await
    }

    /// Per-bank aggregates.
    ///
    /// # Errors
    /// Propagates transport, server and decode errors.
    pub async fn bank_summaries(&self) -> ApiResult<Vec<BankSummary>> {
        self.http.get_json(SUMMARY_PATH, &[]).await
    }

    /// One account by id.
    ///
    /// # Errors
    /// Propagates transport, server and decode errors.
    pub async fn get_account(&self, id: i64) -> ApiResult<Account> {
        self.http.get_json(&account_path(id), &[]).await
    }

    /// Apply a sparse update to one account.
    ///
    /// # Errors
    /// Propagates transport, server and decode errors.
    pub async fn update_account(&self, id: i64, update: &AccountUpdate) -> ApiResult<Account> {
        let account: Account = self
            .http
            .send_json(Method::PUT, &account_path(id), update)
            .await?;
        tracing::info!(id, "account updated");
        Ok(account)
    }

    /// Apply the same sparse update to many accounts; returns the count the
    /// backend reports as changed.
    ///
    /// # Errors
    /// Propagates transport, server and decode errors.
    pub async fn bulk_update(&self, ids: &[i64], update: &AccountUpdate) -> ApiResult<u64> {
        let request = BulkUpdateRequest {
            account_ids: ids.to_vec(),
            update_data: update.clone(),
        };
        let response: BulkUpdateResponse = self
            .http
            .send_json(Method::PUT, BULK_PATH, &request)
            .await?;
        let updated = response.updated_count();
        tracing::info!(requested = ids.len(), updated, "bulk update applied");
        Ok(updated)
    }

    /// Upload a pipe-delimited account file.
    ///
    /// # Errors
    /// Propagates transport, server and decode errors.
    pub async fn upload_file(&self, file_name: &str, contents: &[u8]) -> ApiResult<UploadResponse> {
        let response: UploadResponse = self
            .http
            .post_file(UPLOAD_PATH, "file", file_name, contents)
            .await?;
        tracing::info!(
            file_name,
            success = response.success_count,
            failure = response.failure_count,
            "upload processed"
        );
        Ok(response)
    }

    /// Download the CSV report for the given query parameters.
    ///
    /// # Errors
    /// Propagates transport, server and decode errors.
    pub async fn export_csv(&self, query: &Query<'_>) -> ApiResult<CsvExport> {
        let response = self.http.get_bytes(EXPORT_PATH, query).await?;
        let filename = export_filename(&response.headers);
        tracing::info!(filename = %filename, bytes = response.body.len(), "export downloaded");
        Ok(CsvExport {
            filename,
            bytes: response.body,
        })
    }
}

fn account_path(id: i64) -> String {
    format!("{ACCOUNTS_PATH}/{id}")
}

fn export_filename(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(filename_from_disposition)
        .unwrap_or_else(|| DEFAULT_EXPORT_FILENAME.to_string())
}

/// Extract a safe filename from a `Content-Disposition` value.
///
/// `filename*=UTF-8''...` wins over `filename="..."`. Directory components
/// are stripped; an empty result yields `None`.
#[must_use]
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;
    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(raw.trim().trim_matches('"').to_string()),
            "filename*" => {
                let raw = raw.trim();
                let encoded = raw
                    .split_once("''")
                    .map_or(raw, |(_charset, rest)| rest);
                extended = Some(percent_decode(encoded));
            }
            _ => {}
        }
    }
    let name = extended.or(plain)?;
    let name = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name)
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let high = bytes.get(index + 1).and_then(|b| char::from(*b).to_digit(16));
            let low = bytes.get(index + 2).and_then(|b| char::from(*b).to_digit(16));
            if let (Some(high), Some(low)) = (high, low) {
                decoded.push(u8::try_from(high * 16 + low).unwrap_or(b'?'));
                index += 3;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{Result, anyhow};
    use dormant_api_models::{ReclaimStatus, Role};
    use httpmock::Method::{GET, POST, PUT};
    use httpmock::MockServer;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::config::{ConsoleConfig, RetryPolicy};
    use crate::navigation::{Navigator, Route};
    use crate::session::MemoryStorage;

    fn api_for(server: &MockServer) -> Result<DormantApi> {
        let mut config = ConsoleConfig::new(server.base_url().parse()?);
        config.retry = RetryPolicy::disabled();
        let auth = AuthStore::new(Arc::new(MemoryStorage::new()));
        let http = HttpClient::new(&config, auth, Navigator::new(Route::Login))?;
        Ok(DormantApi::new(http))
    }

    fn sign_in(api: &DormantApi, role: Role) -> Result<()> {
        api.auth().persist(&Session {
            token: "tok".to_string(),
            user: UserRecord {
                username: "admin".to_string(),
                role,
            },
        })?;
        Ok(())
    }

    fn account_json(id: i64) -> serde_json::Value {
        json!({
            "id": id,
            "accountNumber": format!("ACC{id:03}"),
            "bankName": "Chase Bank",
            "customerName": "John Doe",
            "balance": 1500.5,
            "reclaimStatus": "PENDING",
            "reclaimDate": null,
            "clawbackDate": null,
            "comments": null
        })
    }

    #[tokio::test]
    async fn login_persists_session() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/auth/login")
                .json_body(json!({"username": "admin", "password": "admin123"}));
            then.status(200)
                .json_body(json!({"token": "jwt-abc", "username": "admin", "role": "ADMIN"}));
        });
        let api = api_for(&server)?;
        let user = api.login("admin", "admin123").await?;
        mock.assert();
        assert!(user.is_admin());
        assert_eq!(api.auth().token().as_deref(), Some("jwt-abc"));
        assert_eq!(api.auth().current_user(), Some(user));
        Ok(())
    }

    #[tokio::test]
    async fn login_rejection_is_invalid_credentials() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(401).json_body(json!({"message": "Bad credentials"}));
        });
        let api = api_for(&server)?;
        let result = api.login("admin", "wrong").await;
        assert!(matches!(result, Err(ApiError::InvalidCredentials)));
        assert!(!api.auth().is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn logout_clears_session_even_when_backend_fails() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/auth/logout")
                .header("authorization", "Bearer tok");
            then.status(503);
        });
        let api = api_for(&server)?;
        sign_in(&api, Role::Operator)?;
        api.logout().await?;
        mock.assert();
        assert!(!api.auth().is_authenticated());
        assert!(api.auth().current_user().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn search_sends_trimmed_query() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/accounts")
                .query_param("search", "chase");
            then.status(200).json_body(json!([account_json(1)]));
        });
        let api = api_for(&server)?;
        sign_in(&api, Role::Operator)?;
        let accounts = api.search_accounts("  chase ").await?;
        mock.assert();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].balance, Decimal::new(15005, 1));
        assert_eq!(accounts[0].reclaim_status, Some(ReclaimStatus::Pending));
        Ok(())
    }

    #[tokio::test]
    async fn bulk_update_nests_update_data_and_accepts_bare_count() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(PUT).path("/api/accounts/bulk").json_body(json!({
                "accountIds": [1, 2, 3],
                "updateData": {"reclaimStatus": "COMPLETED"}
            }));
            then.status(200).json_body(json!(3));
        });
        let api = api_for(&server)?;
        sign_in(&api, Role::Operator)?;
        let update = AccountUpdate {
            reclaim_status: Some(ReclaimStatus::Completed),
            ..AccountUpdate::default()
        };
        assert_eq!(api.bulk_update(&[1, 2, 3], &update).await?, 3);
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn update_account_puts_sparse_payload() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/accounts/7")
                .json_body(json!({"comments": "called customer"}));
            then.status(200).json_body(account_json(7));
        });
        let api = api_for(&server)?;
        sign_in(&api, Role::Operator)?;
        let update = AccountUpdate {
            comments: Some("called customer".to_string()),
            ..AccountUpdate::default()
        };
        let account = api.update_account(7, &update).await?;
        mock.assert();
        assert_eq!(account.id, 7);
        Ok(())
    }

    #[tokio::test]
    async fn export_uses_content_disposition_filename() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/reports/export")
                .query_param("bankName", "Chase Bank");
            then.status(200)
                .header("content-type", "text/csv")
                .header(
                    "content-disposition",
                    "attachment; filename=\"dormant_accounts_20240101.csv\"",
                )
                .body("id,accountNumber\n1,ACC001\n");
        });
        let api = api_for(&server)?;
        sign_in(&api, Role::Operator)?;
        let export = api
            .export_csv(&[("bankName", "Chase Bank".to_string())])
            .await?;
        mock.assert();
        assert_eq!(export.filename, "dormant_accounts_20240101.csv");
        assert_eq!(export.bytes, b"id,accountNumber\n1,ACC001\n".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn export_defaults_filename_without_header() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/reports/export");
            then.status(200).body("id\n");
        });
        let api = api_for(&server)?;
        sign_in(&api, Role::Operator)?;
        let export = api.export_csv(&[]).await?;
        assert_eq!(export.filename, DEFAULT_EXPORT_FILENAME);
        Ok(())
    }

    #[tokio::test]
    async fn get_account_surfaces_server_message() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/accounts/404");
            then.status(404).json_body(json!({"message": "Account not found"}));
        });
        let api = api_for(&server)?;
        sign_in(&api, Role::Operator)?;
        let err = api
            .get_account(404)
            .await
            .err()
            .ok_or_else(|| anyhow!("expected failure"))?;
        assert_eq!(err.to_string(), "Account not found");
        Ok(())
    }

    #[test]
    fn disposition_parsing_handles_both_forms() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"report.csv\"").as_deref(),
            Some("report.csv")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=plain.csv").as_deref(),
            Some("plain.csv")
        );
        assert_eq!(
            filename_from_disposition(
                "attachment; filename=\"fallback.csv\"; filename*=UTF-8''dormant%20q1.csv"
            )
            .as_deref(),
            Some("dormant q1.csv")
        );
        assert_eq!(filename_from_disposition("attachment"), None);
    }

    #[test]
    fn disposition_parsing_strips_directories() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"../../etc/passwd\"").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=\"C:\\\\tmp\\\\x.csv\"").as_deref(),
            Some("x.csv")
        );
        assert_eq!(filename_from_disposition("attachment; filename=\"dir/\""), None);
    }
}
