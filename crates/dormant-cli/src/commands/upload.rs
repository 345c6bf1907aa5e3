use std::fs;
use std::path::Path;

use anyhow::anyhow;
use dormant_console::Route;
use dormant_console::features::upload::{UploadError, preview_records, validate_upload};

use crate::cli::UploadArgs;
use crate::client::{AppContext, CliError, CliResult, classify_toasted};
use crate::output::{render_preview, render_upload_summary};

pub(crate) async fn handle_upload(ctx: &AppContext, args: UploadArgs) -> CliResult<()> {
    if args.preview {
        let bytes = read_file(&args.file)?;
        let contents = String::from_utf8_lossy(&bytes);
        return render_preview(&preview_records(&contents), ctx.output);
    }

    ctx.enter(Route::Upload)?;
    let mut panel = ctx
        .console
        .upload_panel()
        .ok_or_else(|| CliError::validation("uploading accounts requires an admin account"))?;
    let file_name = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CliError::validation("upload path must name a file"))?;
    let size = fs::metadata(&args.file)
        .map_err(|err| {
            CliError::failure(anyhow!(
                "failed to inspect '{}': {err}",
                args.file.display()
            ))
        })?
        .len();
    validate_upload(file_name, size)
        .map_err(|rejection| CliError::validation(rejection.to_string()))?;

    let bytes = read_file(&args.file)?;
    let summary = panel
        .upload(file_name, &bytes)
        .await
        .map_err(|err| match err {
            UploadError::Rejected(rejection) => CliError::validation(rejection.to_string()),
            UploadError::Cancelled => CliError::failure(anyhow!("upload was cancelled")),
            UploadError::Api(api) => classify_toasted(api, "Error uploading file: "),
        })?;
    render_upload_summary(&summary, ctx.output)
}

fn read_file(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path)
        .map_err(|err| CliError::failure(anyhow!("failed to read '{}': {err}", path.display())))
}
