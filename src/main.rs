// Entrypoint for the CLI application.
// - Keeps `main` small: load settings, obtain a token, build the API client
//   and hand it to the command dispatcher.
// - Returns `anyhow::Result` so any failure exits non-zero with its context.

use std::io::Write;

use anyhow::Context;
use clap::Parser;
use crossterm::tty::IsTty;

use todo_cli::api::ApiClient;
use todo_cli::auth;
use todo_cli::commands::{self, Cli, Output};
use todo_cli::config::{self, Overrides, Settings};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let dir = match cli.config_dir.clone() {
        Some(dir) => dir,
        None => config::config_dir()?,
    };
    let path = config::settings_path(&dir);
    let mut settings = Settings::load(&path).context("Failed to get configuration")?;
    let overrides = Overrides::from_env();
    let token = auth::obtain_token(&mut settings, &overrides, &path)
        .context("Failed to get access token")?;

    let effective = settings.with_overrides(&overrides);
    let api = ApiClient::new(effective.api_url.as_deref(), &token)?;

    let stdout = std::io::stdout();
    let color = stdout.is_tty();
    let mut lock = stdout.lock();
    let mut output = Output {
        out: &mut lock,
        color,
    };
    commands::run(&api, cli.command, &mut output)?;
    lock.flush()?;
    Ok(())
}
