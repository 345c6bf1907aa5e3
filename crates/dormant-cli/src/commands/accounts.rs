use std::collections::BTreeSet;

use anyhow::anyhow;
use dormant_console::Route;
use dormant_console::features::accounts::UpdateError;
use dormant_console::features::accounts::table::{SortDirection, SortState};
use dormant_console::features::accounts::update::UpdateForm;
use serde_json::json;

use crate::cli::{AccountShowArgs, AccountUpdateArgs, AccountsListArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult, classify_api_error, classify_toasted};
use crate::output::{render_account, render_accounts};

pub(crate) async fn handle_list(ctx: &AppContext, args: AccountsListArgs) -> CliResult<()> {
    ctx.enter(Route::Accounts)?;
    let view = ctx.console.accounts();
    view.set_sort(SortState {
        column: args.sort,
        direction: if args.desc {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        },
    });
    let query = args.search.unwrap_or_default();
    view.search(&query)
        .await
        .map_err(|err| classify_toasted(err, "Failed to load accounts: "))?;
    render_accounts(&view.rows(), ctx.output)
}

pub(crate) async fn handle_show(ctx: &AppContext, args: AccountShowArgs) -> CliResult<()> {
    ctx.enter(Route::Accounts)?;
    let account = ctx
        .console
        .api()
        .get_account(args.id)
        .await
        .map_err(classify_api_error)?;
    render_account(&account, ctx.output)
}

pub(crate) async fn handle_update(ctx: &AppContext, args: AccountUpdateArgs) -> CliResult<()> {
    ctx.enter(Route::Accounts)?;
    let view = ctx.console.accounts();
    view.reload()
        .await
        .map_err(|err| classify_toasted(err, "Failed to load accounts: "))?;

    let known: BTreeSet<i64> = view.snapshot().accounts.iter().map(|a| a.id).collect();
    let unknown: Vec<String> = args
        .ids
        .iter()
        .filter(|id| !known.contains(id))
        .map(ToString::to_string)
        .collect();
    if !unknown.is_empty() {
        return Err(CliError::validation(format!(
            "unknown account id(s): {}",
            unknown.join(", ")
        )));
    }

    view.select(args.ids);
    let form = UpdateForm {
        reclaim_status: args.status,
        reclaim_date: args.reclaim_date.unwrap_or_default(),
        clawback_date: args.clawback_date.unwrap_or_default(),
        comments: args.comments.unwrap_or_default(),
    };
    let updated = view.apply_update(&form).await.map_err(|err| match err {
        UpdateError::Api(api) => classify_toasted(api, "Update failed: "),
        UpdateError::Cancelled => CliError::failure(anyhow!("update was cancelled")),
        other => CliError::validation(other.to_string()),
    })?;

    match ctx.output {
        OutputFormat::Json => println!("{}", json!({ "updated": updated })),
        OutputFormat::Table => println!("updated: {updated}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use dormant_api_models::{ReclaimStatus, Role};
    use dormant_console::features::accounts::table::SortColumn;
    use httpmock::prelude::*;

    use super::*;
    use crate::commands::test_support::signed_in;

    fn accounts_body() -> serde_json::Value {
        json!([
            {"id": 1, "accountNumber": "100", "bankName": "Chase", "balance": 10},
            {"id": 2, "accountNumber": "200", "bankName": "Wells", "balance": 20},
            {"id": 3, "accountNumber": "300", "bankName": "Chase", "balance": 30}
        ])
    }

    fn update_args(ids: Vec<i64>) -> AccountUpdateArgs {
        AccountUpdateArgs {
            ids,
            ..AccountUpdateArgs::default()
        }
    }

    #[tokio::test]
    async fn list_forwards_trimmed_search() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/accounts")
                .query_param("search", "chase");
            then.status(200).json_body(accounts_body());
        });
        let ctx = signed_in(&server, Role::Operator);
        handle_list(
            &ctx,
            AccountsListArgs {
                search: Some("  chase ".to_string()),
                sort: SortColumn::Balance,
                desc: true,
            },
        )
        .await
        .expect("list succeeds");
        mock.assert();
        let rows = ctx.console.accounts().rows();
        assert_eq!(rows.first().map(|a| a.id), Some(3));
    }

    #[tokio::test]
    async fn single_update_uses_put() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/accounts");
            then.status(200).json_body(accounts_body());
        });
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/accounts/2")
                .json_body(json!({"reclaimStatus": "COMPLETED"}));
            then.status(200).json_body(
                json!({"id": 2, "accountNumber": "200", "bankName": "Wells", "balance": 20, "reclaimStatus": "COMPLETED"}),
            );
        });
        let ctx = signed_in(&server, Role::Operator);
        let mut args = update_args(vec![2]);
        args.status = Some(ReclaimStatus::Completed);
        handle_update(&ctx, args).await.expect("update succeeds");
        put.assert();
        let toasts = ctx.console.toasts().drain();
        assert!(toasts.iter().any(|t| t.message == "Updated 1 account"));
    }

    #[tokio::test]
    async fn bulk_update_nests_payload() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/accounts");
            then.status(200).json_body(accounts_body());
        });
        let bulk = server.mock(|when, then| {
            when.method(PUT).path("/api/accounts/bulk").json_body(json!({
                "accountIds": [1, 3],
                "updateData": {"comments": "escalated"}
            }));
            then.status(200).json_body(json!({"updatedCount": 2}));
        });
        let ctx = signed_in(&server, Role::Admin);
        let mut args = update_args(vec![3, 1]);
        args.comments = Some("escalated".to_string());
        handle_update(&ctx, args).await.expect("bulk update succeeds");
        bulk.assert();
    }

    #[tokio::test]
    async fn unknown_ids_and_empty_updates_are_refused() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/accounts");
            then.status(200).json_body(accounts_body());
        });
        let ctx = signed_in(&server, Role::Operator);

        let err = handle_update(&ctx, update_args(vec![1, 9]))
            .await
            .expect_err("unknown id");
        assert_eq!(err.display_message(), "unknown account id(s): 9");

        let err = handle_update(&ctx, update_args(vec![1]))
            .await
            .expect_err("nothing to send");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.display_message(), "No changes to apply");
    }

    #[tokio::test]
    async fn invalid_dates_are_validation_errors() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/accounts");
            then.status(200).json_body(accounts_body());
        });
        let ctx = signed_in(&server, Role::Operator);
        let mut args = update_args(vec![1]);
        args.reclaim_date = Some("2024-05-10".to_string());
        args.clawback_date = Some("2024-05-01".to_string());
        let err = handle_update(&ctx, args).await.expect_err("dates out of order");
        assert_eq!(err.exit_code(), 2);
        assert!(
            err.display_message()
                .contains("Clawback date cannot be before reclaim date")
        );
    }

    #[tokio::test]
    async fn show_maps_missing_account() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/accounts/42");
            then.status(404).json_body(json!({"message": "Account not found"}));
        });
        let ctx = signed_in(&server, Role::Operator);
        let err = handle_show(&ctx, AccountShowArgs { id: 42 })
            .await
            .expect_err("missing account");
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("Account not found"));
    }
}
