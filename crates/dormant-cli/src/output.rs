//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use chrono::NaiveDate;
use dormant_api_models::{Account, ReclaimStatus, UserRecord};
use dormant_console::features::dashboard::DashboardState;
use dormant_console::features::reports::ExportReceipt;
use dormant_console::features::upload::{UploadPreview, UploadSummary};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_accounts(accounts: &[Account], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(accounts)?,
        OutputFormat::Table => {
            if accounts.is_empty() {
                println!("no accounts found");
                return Ok(());
            }
            println!(
                "{:>6} {:<16} {:<20} {:<22} {:>16} {:<12} {:<10} {:<10}",
                "ID", "ACCOUNT", "BANK", "CUSTOMER", "BALANCE", "STATUS", "RECLAIM", "CLAWBACK"
            );
            for account in accounts {
                println!(
                    "{:>6} {:<16} {:<20} {:<22} {:>16} {:<12} {:<10} {:<10}",
                    account.id,
                    account.account_number,
                    account.bank_name,
                    account.customer_name.as_deref().unwrap_or("-"),
                    format_money(account.balance),
                    status_label(account.reclaim_status),
                    format_date(account.reclaim_date),
                    format_date(account.clawback_date),
                );
            }
            println!("{} account(s)", accounts.len());
        }
    }
    Ok(())
}

pub(crate) fn render_account(account: &Account, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(account)?,
        OutputFormat::Table => {
            println!("id: {}", account.id);
            println!("account: {}", account.account_number);
            println!("bank: {}", account.bank_name);
            if let Some(name) = &account.customer_name {
                println!("customer: {name}");
            }
            if let Some(email) = &account.customer_email {
                println!("email: {email}");
            }
            println!("balance: {}", format_money(account.balance));
            println!("status: {}", status_label(account.reclaim_status));
            println!("reclaim date: {}", format_date(account.reclaim_date));
            println!("clawback date: {}", format_date(account.clawback_date));
            if let Some(comments) = &account.comments {
                println!("comments: {comments}");
            }
            if let Some(updated) = account.updated_at {
                println!("updated: {updated}");
            }
        }
    }
    Ok(())
}

pub(crate) fn render_dashboard(state: &DashboardState, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "totalAccounts": state.total_accounts(),
            "totalBalance": state.total_balance(),
            "bankCount": state.bank_count(),
            "banks": state.summaries,
        }))?,
        OutputFormat::Table => {
            println!("total accounts: {}", state.total_accounts());
            println!("total balance: {}", format_money(state.total_balance()));
            println!("banks: {}", state.bank_count());
            if state.summaries.is_empty() {
                return Ok(());
            }
            println!();
            println!("{:<28} {:>9} {:>18}", "BANK", "ACCOUNTS", "BALANCE");
            for summary in &state.summaries {
                println!(
                    "{:<28} {:>9} {:>18}",
                    summary.bank_name,
                    summary.account_count,
                    format_money(summary.total_balance)
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_user(user: &UserRecord, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(user)?,
        OutputFormat::Table => println!("{} ({})", user.username, user.role),
    }
    Ok(())
}

pub(crate) fn render_upload_summary(summary: &UploadSummary, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "total": summary.total,
            "successCount": summary.success,
            "failureCount": summary.failure,
            "message": summary.message,
        }))?,
        OutputFormat::Table => {
            println!("total: {}", summary.total);
            println!("success: {}", summary.success);
            println!("failed: {}", summary.failure);
        }
    }
    Ok(())
}

pub(crate) fn render_preview(preview: &UploadPreview, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let records: Vec<_> = preview
                .records
                .iter()
                .map(|record| {
                    json!({
                        "line": record.line,
                        "accountNumber": record.account_number,
                        "customerName": record.customer_name,
                        "bankName": record.bank_name,
                        "balance": record.balance,
                        "customerEmail": record.customer_email,
                    })
                })
                .collect();
            let rejected: Vec<_> = preview
                .rejected
                .iter()
                .map(|line| json!({"line": line.line, "reason": line.reason}))
                .collect();
            print_json(&json!({"records": records, "rejected": rejected}))?;
        }
        OutputFormat::Table => {
            println!(
                "{:>5} {:<16} {:<22} {:<20} {:>16}",
                "LINE", "ACCOUNT", "CUSTOMER", "BANK", "BALANCE"
            );
            for record in &preview.records {
                println!(
                    "{:>5} {:<16} {:<22} {:<20} {:>16}",
                    record.line,
                    record.account_number,
                    record.customer_name,
                    record.bank_name,
                    format_money(record.balance)
                );
            }
            for line in &preview.rejected {
                println!("line {}: {}", line.line, line.reason);
            }
            println!(
                "{} valid, {} rejected",
                preview.records.len(),
                preview.rejected.len()
            );
        }
    }
    Ok(())
}

pub(crate) fn render_export(receipt: &ExportReceipt, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "path": receipt.path.display().to_string(),
            "bytes": receipt.bytes,
        }))?,
        OutputFormat::Table => println!("saved {} ({} bytes)", receipt.path.display(), receipt.bytes),
    }
    Ok(())
}

/// Human label for a reclaim status; accounts without one are pending.
#[must_use]
pub(crate) const fn status_label(status: Option<ReclaimStatus>) -> &'static str {
    match status {
        None | Some(ReclaimStatus::Pending) => "Pending",
        Some(ReclaimStatus::InProgress) => "In Progress",
        Some(ReclaimStatus::Completed) => "Completed",
        Some(ReclaimStatus::Failed) => "Failed",
    }
}

#[must_use]
pub(crate) fn format_date(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |date| date.format("%Y-%m-%d").to_string())
}

/// Dollar amount with two decimals and thousands separators.
#[must_use]
pub(crate) fn format_money(amount: Decimal) -> String {
    let fixed = format!("{:.2}", amount.abs().round_dp(2));
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{cents}")
}
