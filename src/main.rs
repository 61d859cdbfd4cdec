mod cli;
mod config;
mod error;
mod model;
mod providers;
mod sweep;
mod util;

use anyhow::Result;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use cli::Command;

#[tokio::main]
async fn main() -> Result<()> {
    // A `.env` in the working directory may supply credentials; real env vars win.
    let dotenv = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to read .env"),
    }

    let args: Vec<String> = std::env::args().skip(1).collect();

    match cli::parse_args(&args)? {
        Command::Help => cli::print_help(),
        Command::Log { limit } => cli::print_log(limit),
        Command::Run { mode, activity_log } => cli::handle_run(mode, activity_log).await?,
    }

    Ok(())
}
