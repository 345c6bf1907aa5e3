//! Command-line front end for the dormant accounts console.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use dormant_api_models::ReclaimStatus;
use dormant_console::DEFAULT_API_URL;
use dormant_console::features::accounts::table::SortColumn;
use dormant_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
use url::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliResult, already_reported, flush_toasts, parse_url};
use crate::commands::{accounts, auth, dashboard, export, upload};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Parses CLI arguments, executes the requested command and reports the
/// outcome. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
        build_sha: build_sha(),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging disabled: {err:#}");
    }

    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4().to_string();
    let ctx = match AppContext::from_cli(&cli, &trace_id) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    let result = dispatch(cli.command, &ctx).await;
    let shown = flush_toasts(&ctx.console);

    match result {
        Ok(()) => {
            tracing::debug!(command = command_name, trace_id = %trace_id, "command succeeded");
            0
        }
        Err(err) => {
            let message = err.display_message();
            if !already_reported(&shown, &message) {
                eprintln!("error: {message}");
            }
            tracing::debug!(
                command = command_name,
                trace_id = %trace_id,
                error = %message,
                "command failed"
            );
            err.exit_code()
        }
    }
}

async fn dispatch(command: Command, ctx: &AppContext) -> CliResult<()> {
    match command {
        Command::Login(args) => auth::handle_login(ctx, args).await,
        Command::Logout => auth::handle_logout(ctx).await,
        Command::Whoami => auth::handle_whoami(ctx),
        Command::Dashboard => dashboard::handle_dashboard(ctx).await,
        Command::Accounts(command) => match command {
            AccountsCommand::Ls(args) => accounts::handle_list(ctx, args).await,
            AccountsCommand::Show(args) => accounts::handle_show(ctx, args).await,
            AccountsCommand::Update(args) => accounts::handle_update(ctx, args).await,
        },
        Command::Upload(args) => upload::handle_upload(ctx, args).await,
        Command::Export(args) => export::handle_export(ctx, args).await,
    }
}

pub(crate) const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Login(_) => "login",
        Command::Logout => "logout",
        Command::Whoami => "whoami",
        Command::Dashboard => "dashboard",
        Command::Accounts(AccountsCommand::Ls(_)) => "accounts_ls",
        Command::Accounts(AccountsCommand::Show(_)) => "accounts_show",
        Command::Accounts(AccountsCommand::Update(_)) => "accounts_update",
        Command::Upload(_) => "upload",
        Command::Export(_) => "export",
    }
}

#[derive(Parser)]
#[command(
    name = "dormant",
    about = "Administrative console for dormant bank accounts"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "DORMANT_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(
        long,
        global = true,
        env = "DORMANT_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long,
        global = true,
        env = "DORMANT_SESSION_DIR",
        help = "Directory holding the persisted session"
    )]
    pub(crate) session_dir: Option<PathBuf>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(
        long,
        global = true,
        env = "DORMANT_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL
    )]
    pub(crate) log_level: String,
    #[arg(
        long,
        global = true,
        env = "DORMANT_LOG_FORMAT",
        value_parser = parse_log_format,
        help = "Log format: json or pretty (defaults by build profile)"
    )]
    pub(crate) log_format: Option<LogFormat>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Sign in and persist the session.
    Login(LoginArgs),
    /// End the session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Totals and per-bank balances.
    Dashboard,
    #[command(subcommand)]
    Accounts(AccountsCommand),
    /// Upload a pipe-delimited account file (admins only).
    Upload(UploadArgs),
    /// Download the filtered CSV report.
    Export(ExportArgs),
}

#[derive(Subcommand)]
pub(crate) enum AccountsCommand {
    Ls(AccountsListArgs),
    Show(AccountShowArgs),
    Update(AccountUpdateArgs),
}

#[derive(Args)]
pub(crate) struct LoginArgs {
    #[arg(long, short = 'u')]
    pub(crate) username: Option<String>,
    #[arg(long, env = "DORMANT_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
}

#[derive(Args)]
pub(crate) struct AccountsListArgs {
    #[arg(long, short = 's', help = "Filter by account, customer or bank")]
    pub(crate) search: Option<String>,
    #[arg(long, value_parser = parse_sort_column, default_value = "account")]
    pub(crate) sort: SortColumn,
    #[arg(long, help = "Sort descending")]
    pub(crate) desc: bool,
}

#[derive(Args)]
pub(crate) struct AccountShowArgs {
    #[arg(help = "Account identifier")]
    pub(crate) id: i64,
}

#[derive(Args, Default)]
pub(crate) struct AccountUpdateArgs {
    #[arg(required = true, num_args = 1.., help = "Account identifiers")]
    pub(crate) ids: Vec<i64>,
    #[arg(long, value_parser = parse_status)]
    pub(crate) status: Option<ReclaimStatus>,
    #[arg(long, help = "Reclaim date (YYYY-MM-DD)")]
    pub(crate) reclaim_date: Option<String>,
    #[arg(long, help = "Clawback date (YYYY-MM-DD)")]
    pub(crate) clawback_date: Option<String>,
    #[arg(long)]
    pub(crate) comments: Option<String>,
}

#[derive(Args)]
pub(crate) struct UploadArgs {
    #[arg(help = "Path to the .txt file")]
    pub(crate) file: PathBuf,
    #[arg(long, help = "Parse locally and report without uploading")]
    pub(crate) preview: bool,
}

#[derive(Args, Default)]
pub(crate) struct ExportArgs {
    #[arg(long)]
    pub(crate) search: Option<String>,
    #[arg(long)]
    pub(crate) bank_name: Option<String>,
    #[arg(long, value_parser = parse_status)]
    pub(crate) status: Option<ReclaimStatus>,
    #[arg(long, default_value = ".", help = "Directory the CSV is written to")]
    pub(crate) out_dir: PathBuf,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

fn parse_sort_column(input: &str) -> Result<SortColumn, String> {
    input.parse::<SortColumn>().map_err(|err| err.to_string())
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input.parse::<LogFormat>()
}

fn parse_status(input: &str) -> Result<ReclaimStatus, String> {
    input.parse::<ReclaimStatus>().map_err(|err| err.to_string())
}
