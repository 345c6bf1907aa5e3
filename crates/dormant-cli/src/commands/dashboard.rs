use anyhow::anyhow;
use dormant_console::Route;

use crate::client::{AppContext, CliError, CliResult, classify_toasted};
use crate::output::render_dashboard;

pub(crate) async fn handle_dashboard(ctx: &AppContext) -> CliResult<()> {
    ctx.enter(Route::Dashboard)?;
    let view = ctx.console.dashboard();
    let loaded = view.load().await.map_err(|err| classify_toasted(err, ""))?;
    if !loaded {
        return Err(CliError::failure(anyhow!("dashboard load was cancelled")));
    }
    render_dashboard(&view.snapshot(), ctx.output)
}
