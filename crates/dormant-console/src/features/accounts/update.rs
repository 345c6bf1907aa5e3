//! Update modal form state and validation.

use std::fmt::{self, Display, Formatter};

use chrono::NaiveDate;
use dormant_api_models::{Account, AccountUpdate, MAX_COMMENTS_LEN, ReclaimStatus};

/// Date layout accepted by the date inputs.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Form field a validation error points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateField {
    /// Reclaim date input.
    ReclaimDate,
    /// Clawback date input.
    ClawbackDate,
    /// Comments textarea.
    Comments,
}

impl Display for UpdateField {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::ReclaimDate => "reclaim date",
            Self::ClawbackDate => "clawback date",
            Self::Comments => "comments",
        })
    }
}

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Offending field.
    pub field: UpdateField,
    /// User-facing explanation.
    pub message: String,
}

impl FieldError {
    fn new(field: UpdateField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for FieldError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.field, self.message)
    }
}

/// Raw values typed into the update modal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateForm {
    /// Selected status; `None` leaves it untouched.
    pub reclaim_status: Option<ReclaimStatus>,
    /// Reclaim date as typed (`YYYY-MM-DD`), empty when unset.
    pub reclaim_date: String,
    /// Clawback date as typed (`YYYY-MM-DD`), empty when unset.
    pub clawback_date: String,
    /// Free-text comments.
    pub comments: String,
}

impl UpdateForm {
    /// Form pre-filled from the single selected account; blank in bulk mode.
    #[must_use]
    pub fn for_selection(selected: &[Account]) -> Self {
        match selected {
            [account] => Self {
                reclaim_status: account.reclaim_status,
                reclaim_date: format_date(account.reclaim_date),
                clawback_date: format_date(account.clawback_date),
                comments: account.comments.clone().unwrap_or_default(),
            },
            _ => Self::default(),
        }
    }

    /// Validate every field and build the sparse payload.
    ///
    /// # Errors
    /// Returns every violation at once; nothing should be submitted then.
    pub fn validate(&self) -> Result<AccountUpdate, Vec<FieldError>> {
        let mut errors = Vec::new();
        let reclaim_date = parse_field(&self.reclaim_date, UpdateField::ReclaimDate, &mut errors);
        let clawback_date =
            parse_field(&self.clawback_date, UpdateField::ClawbackDate, &mut errors);

        if let (Some(reclaim), Some(clawback)) = (reclaim_date, clawback_date)
            && clawback < reclaim
        {
            errors.push(FieldError::new(
                UpdateField::ClawbackDate,
                "Clawback date cannot be before reclaim date",
            ));
        }

        let comment_len = self.comments.chars().count();
        if comment_len > MAX_COMMENTS_LEN {
            errors.push(FieldError::new(
                UpdateField::Comments,
                format!("Comments cannot exceed {MAX_COMMENTS_LEN} characters ({comment_len} entered)"),
            ));
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let comments = (!self.comments.trim().is_empty()).then(|| self.comments.clone());
        Ok(AccountUpdate {
            reclaim_status: self.reclaim_status,
            reclaim_date,
            clawback_date,
            comments,
        })
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

fn parse_field(
    raw: &str,
    field: UpdateField,
    errors: &mut Vec<FieldError>,
) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = parse_strict_date(raw);
    if parsed.is_none() {
        errors.push(FieldError::new(
            field,
            format!("'{raw}' is not a valid date (expected YYYY-MM-DD)"),
        ));
    }
    parsed
}

/// Parse exactly `YYYY-MM-DD` as a real calendar date.
#[must_use]
pub fn parse_strict_date(raw: &str) -> Option<NaiveDate> {
    let bytes = raw.as_bytes();
    let shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::accounts::table::fixtures::{account, with_status};

    fn fields(errors: &[FieldError]) -> Vec<UpdateField> {
        errors.iter().map(|error| error.field).collect()
    }

    #[test]
    fn single_selection_prefills_form() {
        let mut selected = with_status(account(1, "ACC001", "Chase", 100), ReclaimStatus::Failed);
        selected.reclaim_date = NaiveDate::from_ymd_opt(2024, 1, 15);
        selected.comments = Some("needs review".to_string());
        let form = UpdateForm::for_selection(&[selected.clone()]);
        assert_eq!(form.reclaim_status, Some(ReclaimStatus::Failed));
        assert_eq!(form.reclaim_date, "2024-01-15");
        assert_eq!(form.clawback_date, "");
        assert_eq!(form.comments, "needs review");

        let bulk = UpdateForm::for_selection(&[selected, account(2, "ACC002", "Chase", 0)]);
        assert_eq!(bulk, UpdateForm::default());
    }

    #[test]
    fn sparse_payload_skips_blank_fields() -> Result<(), Vec<FieldError>> {
        let form = UpdateForm {
            reclaim_status: Some(ReclaimStatus::InProgress),
            comments: "   ".to_string(),
            ..UpdateForm::default()
        };
        let update = form.validate()?;
        assert_eq!(update.reclaim_status, Some(ReclaimStatus::InProgress));
        assert!(update.reclaim_date.is_none());
        assert!(update.comments.is_none());
        Ok(())
    }

    #[test]
    fn boundary_values_are_accepted() -> Result<(), Vec<FieldError>> {
        let form = UpdateForm {
            reclaim_date: "2024-06-01".to_string(),
            clawback_date: "2024-06-01".to_string(),
            comments: "x".repeat(MAX_COMMENTS_LEN),
            ..UpdateForm::default()
        };
        let update = form.validate()?;
        assert_eq!(update.reclaim_date, update.clawback_date);
        assert_eq!(update.comments.map(|c| c.len()), Some(MAX_COMMENTS_LEN));
        Ok(())
    }

    #[test]
    fn every_violation_is_reported_together() {
        let form = UpdateForm {
            reclaim_date: "2024-06-02".to_string(),
            clawback_date: "2024-06-01".to_string(),
            comments: "x".repeat(MAX_COMMENTS_LEN + 1),
            ..UpdateForm::default()
        };
        let errors = form.validate().err().unwrap_or_default();
        assert_eq!(
            fields(&errors),
            vec![UpdateField::ClawbackDate, UpdateField::Comments]
        );
    }

    #[test]
    fn malformed_dates_are_rejected() {
        let form = UpdateForm {
            reclaim_date: "2024-2-30".to_string(),
            clawback_date: "2024-02-30".to_string(),
            ..UpdateForm::default()
        };
        let errors = form.validate().err().unwrap_or_default();
        assert_eq!(
            fields(&errors),
            vec![UpdateField::ReclaimDate, UpdateField::ClawbackDate]
        );
    }

    #[test]
    fn strict_date_parser_requires_exact_shape() {
        assert!(parse_strict_date("2024-02-29").is_some());
        assert!(parse_strict_date("2023-02-29").is_none());
        assert!(parse_strict_date("24-02-01").is_none());
        assert!(parse_strict_date("2024/02/01").is_none());
        assert!(parse_strict_date("+2024-02-1").is_none());
    }
}
