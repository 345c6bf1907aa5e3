use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::anyhow;
use dormant_console::features::login::{LoginError, LoginForm};

use crate::cli::LoginArgs;
use crate::client::{AppContext, CliError, CliResult, classify_toasted};
use crate::output::render_user;

pub(crate) async fn handle_login(ctx: &AppContext, args: LoginArgs) -> CliResult<()> {
    let username = match args.username {
        Some(username) => username,
        None => prompt_line("Username: ")?,
    };
    let password = match args.password {
        Some(password) => password,
        None => prompt_password()?,
    };

    let form = LoginForm::new(username, password);
    let user = ctx.console.login(&form).await.map_err(|err| match err {
        LoginError::Invalid(_) => CliError::validation(err.to_string()),
        LoginError::Api(api) => classify_toasted(api, ""),
    })?;
    render_user(&user, ctx.output)
}

pub(crate) async fn handle_logout(ctx: &AppContext) -> CliResult<()> {
    let was_signed_in = ctx.console.auth().is_authenticated();
    ctx.console.logout().await?;
    if was_signed_in {
        println!("Logged out");
    } else {
        println!("No active session");
    }
    Ok(())
}

pub(crate) fn handle_whoami(ctx: &AppContext) -> CliResult<()> {
    let user = ctx
        .console
        .current_user()
        .ok_or_else(|| CliError::validation("not logged in; run `dormant login` first"))?;
    render_user(&user, ctx.output)
}

fn prompt_line(label: &str) -> CliResult<String> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Err(CliError::validation(
            "username is required (pass --username)",
        ));
    }
    eprint!("{label}");
    io::stderr()
        .flush()
        .map_err(|err| CliError::failure(anyhow!("failed to write prompt: {err}")))?;
    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .map_err(|err| CliError::failure(anyhow!("failed to read input: {err}")))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn prompt_password() -> CliResult<String> {
    if !io::stdin().is_terminal() {
        return Err(CliError::validation(
            "password is required (pass --password or set DORMANT_PASSWORD)",
        ));
    }
    rpassword::prompt_password("Password: ")
        .map_err(|err| CliError::failure(anyhow!("failed to read password: {err}")))
}
