#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
//! Shared HTTP DTOs for the dormant accounts API.
//!
//! The console, the CLI and the tests all encode requests and decode responses
//! through these types so the wire contract lives in one place. Field names
//! follow the backend's camelCase JSON.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maximum number of characters accepted in the free-text comments field.
pub const MAX_COMMENTS_LEN: usize = 1000;

/// Workflow state of an account's fund-reclaim process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReclaimStatus {
    /// Reclaim has been flagged but not started.
    Pending,
    /// Reclaim is being processed.
    InProgress,
    /// Funds have been reclaimed.
    Completed,
    /// Reclaim failed and needs attention.
    Failed,
}

impl ReclaimStatus {
    /// Every status in workflow order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Failed,
    ];

    /// Wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl Display for ReclaimStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ReclaimStatus {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().replace('-', "_").to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ParseEnumError::new("reclaim status", value))
    }
}

/// Role attached to an authenticated console user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full access, including bulk file uploads.
    Admin,
    /// Day-to-day account maintenance.
    Operator,
}

impl Role {
    /// Wire representation of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Operator => "OPERATOR",
        }
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Raised when a textual enum value does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    /// Error for `value` not naming any `kind`.
    #[must_use]
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl Display for ParseEnumError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

/// Dormant bank account as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Backend identifier.
    pub id: i64,
    /// Bank-issued account number.
    pub account_number: String,
    /// Name of the holding bank.
    pub bank_name: String,
    /// Account holder name.
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Account holder email.
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Dormant balance.
    pub balance: Decimal,
    /// Reclaim workflow state, unset until triaged.
    #[serde(default)]
    pub reclaim_status: Option<ReclaimStatus>,
    /// Date the reclaim happened.
    #[serde(default)]
    pub reclaim_date: Option<NaiveDate>,
    /// Date after which reclaimed funds are clawed back.
    #[serde(default)]
    pub clawback_date: Option<NaiveDate>,
    /// Free-text operator notes.
    #[serde(default)]
    pub comments: Option<String>,
    /// Ingestion timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    /// Last modification timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

/// Per-bank aggregate computed server-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BankSummary {
    /// Bank the aggregate belongs to.
    pub bank_name: String,
    /// Number of dormant accounts at the bank.
    pub account_count: u64,
    /// Sum of dormant balances at the bank.
    pub total_balance: Decimal,
}

/// Credentials submitted to `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    /// Account name.
    pub username: String,
    /// Plain-text password; only ever sent over the wire.
    pub password: String,
}

/// Successful login payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// Canonical username.
    pub username: String,
    /// Role granted to the user.
    pub role: Role,
}

impl LoginResponse {
    /// User record carried by the session.
    #[must_use]
    pub fn user(&self) -> UserRecord {
        UserRecord {
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// User record persisted alongside the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    /// Username shown in the console header.
    pub username: String,
    /// Role used for client-side gating.
    pub role: Role,
}

impl UserRecord {
    /// Whether the user holds the administrator role.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

/// Sparse account update; absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    /// New reclaim status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclaim_status: Option<ReclaimStatus>,
    /// New reclaim date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclaim_date: Option<NaiveDate>,
    /// New clawback date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clawback_date: Option<NaiveDate>,
    /// Replacement comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl AccountUpdate {
    /// Whether the update would not change anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.reclaim_status.is_none()
            && self.reclaim_date.is_none()
            && self.clawback_date.is_none()
            && self.comments.is_none()
    }
}

/// Body of `PUT /api/accounts/bulk`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest {
    /// Accounts receiving the update.
    pub account_ids: Vec<i64>,
    /// Update applied to every listed account.
    pub update_data: AccountUpdate,
}

/// Result of a bulk update; the backend answers with either shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BulkUpdateResponse {
    /// `{"updatedCount": n}`.
    Detailed {
        /// Number of accounts modified.
        #[serde(rename = "updatedCount")]
        updated_count: u64,
    },
    /// Bare integer body.
    Count(u64),
}

impl BulkUpdateResponse {
    /// Number of accounts modified.
    #[must_use]
    pub const fn updated_count(self) -> u64 {
        match self {
            Self::Detailed { updated_count } | Self::Count(updated_count) => updated_count,
        }
    }
}

/// Outcome of `POST /api/accounts/upload`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Records ingested.
    pub success_count: u64,
    /// Records rejected.
    pub failure_count: u64,
    /// Server summary message.
    #[serde(default)]
    pub message: String,
}

impl UploadResponse {
    /// Total records the server looked at.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.success_count.saturating_add(self.failure_count)
    }
}

/// Error document returned by the backend on failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Human-readable message, preferred when present.
    #[serde(default)]
    pub message: Option<String>,
    /// Short error label.
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Best human-readable text in the document, if any.
    #[must_use]
    pub fn best_message(&self) -> Option<&str> {
        [self.message.as_deref(), self.error.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn account_decodes_backend_payload() -> Result<(), serde_json::Error> {
        let account: Account = serde_json::from_value(json!({
            "id": 7,
            "accountNumber": "ACC0000007",
            "bankName": "Chase Bank",
            "customerName": "Mary Smith",
            "customerEmail": null,
            "balance": 1500.25,
            "reclaimStatus": "IN_PROGRESS",
            "reclaimDate": "2024-01-10",
            "clawbackDate": null,
            "comments": "called twice",
            "createdAt": "2024-01-01T10:00:00",
            "updatedAt": "2024-01-02T10:00:00"
        }))?;
        assert_eq!(account.id, 7);
        assert_eq!(account.balance, Decimal::new(150_025, 2));
        assert_eq!(account.reclaim_status, Some(ReclaimStatus::InProgress));
        assert_eq!(
            account.reclaim_date,
            NaiveDate::from_ymd_opt(2024, 1, 10)
        );
        assert!(account.clawback_date.is_none());
        Ok(())
    }

    #[test]
    fn account_tolerates_missing_optional_fields() -> Result<(), serde_json::Error> {
        let account: Account = serde_json::from_value(json!({
            "id": 1,
            "accountNumber": "A-1",
            "bankName": "TD Bank",
            "balance": "10.00"
        }))?;
        assert!(account.customer_name.is_none());
        assert!(account.reclaim_status.is_none());
        Ok(())
    }

    #[test]
    fn sparse_update_omits_unset_fields() -> Result<(), serde_json::Error> {
        let update = AccountUpdate {
            reclaim_status: Some(ReclaimStatus::Completed),
            comments: Some("done".to_string()),
            ..AccountUpdate::default()
        };
        assert_eq!(
            serde_json::to_value(&update)?,
            json!({"reclaimStatus": "COMPLETED", "comments": "done"})
        );
        assert!(AccountUpdate::default().is_empty());
        Ok(())
    }

    #[test]
    fn bulk_update_response_accepts_both_shapes() -> Result<(), serde_json::Error> {
        let detailed: BulkUpdateResponse = serde_json::from_value(json!({"updatedCount": 3}))?;
        let bare: BulkUpdateResponse = serde_json::from_value(json!(4))?;
        assert_eq!(detailed.updated_count(), 3);
        assert_eq!(bare.updated_count(), 4);
        Ok(())
    }

    #[test]
    fn reclaim_status_parses_loose_spellings() {
        assert_eq!("in-progress".parse(), Ok(ReclaimStatus::InProgress));
        assert_eq!(" pending ".parse(), Ok(ReclaimStatus::Pending));
        assert!("archived".parse::<ReclaimStatus>().is_err());
    }

    #[test]
    fn error_body_prefers_message_over_label() {
        let body = ErrorBody {
            message: Some("Account not found".to_string()),
            error: Some("Not Found".to_string()),
        };
        assert_eq!(body.best_message(), Some("Account not found"));
        let blank = ErrorBody {
            message: Some("  ".to_string()),
            error: Some("Bad Request".to_string()),
        };
        assert_eq!(blank.best_message(), Some("Bad Request"));
        assert_eq!(ErrorBody::default().best_message(), None);
    }

    #[test]
    fn upload_total_sums_counts() {
        let response = UploadResponse {
            success_count: 998,
            failure_count: 2,
            message: String::new(),
        };
        assert_eq!(response.total(), 1000);
    }
}
