use std::sync::Arc;

use anyhow::anyhow;
use dormant_console::Route;
use dormant_console::features::reports::{DirectorySink, ExportError, ReportFilters};

use crate::cli::ExportArgs;
use crate::client::{AppContext, CliError, CliResult, classify_toasted};
use crate::output::render_export;

pub(crate) async fn handle_export(ctx: &AppContext, args: ExportArgs) -> CliResult<()> {
    ctx.enter(Route::Reports)?;
    let sink = Arc::new(DirectorySink::new(args.out_dir));
    let mut panel = ctx.console.reports_panel(sink);
    panel.set_filters(ReportFilters {
        search: args.search.unwrap_or_default(),
        bank_name: args.bank_name.unwrap_or_default(),
        status: args.status,
    });

    let receipt = panel.export().await.map_err(|err| match err {
        ExportError::Api(api) => classify_toasted(api, "Export failed: "),
        other @ (ExportError::Busy | ExportError::Cancelled | ExportError::Save { .. }) => {
            CliError::failure(anyhow!(other))
        }
    })?;
    render_export(&receipt, ctx.output)
}
