use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::{self, RenameMode};
use crate::providers::trello::TrelloClient;
use crate::sweep::log::{default_log_path, read_events, ActivityLog};
use crate::sweep::{Phase, RunSummary, Sweeper};

const DEFAULT_LOG_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run {
        mode: Option<RenameMode>,
        activity_log: bool,
    },
    Log {
        limit: usize,
    },
    Help,
}

/// Parse arguments (without the program name).
///
/// Supported forms:
///   sweep
///   sweep run --mode simple
///   sweep --mode extract --no-log
///   sweep log 50
pub fn parse_args(args: &[String]) -> Result<Command> {
    let (first, rest) = match args.split_first() {
        Some((first, rest)) => (first.as_str(), rest),
        None => {
            return Ok(Command::Run {
                mode: None,
                activity_log: true,
            })
        }
    };

    match first {
        "help" | "-h" | "--help" => Ok(Command::Help),
        "log" => parse_log_args(rest),
        "run" => parse_run_args(rest),
        _ => parse_run_args(args),
    }
}

fn parse_run_args(args: &[String]) -> Result<Command> {
    let mut mode = None;
    let mut activity_log = true;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "-m" | "--mode" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    bail!("Missing value for --mode (expected `simple` or `extract`)");
                };
                mode = Some(value.parse::<RenameMode>()?);
            }
            "--no-log" => activity_log = false,
            other => bail!("Unknown argument `{other}`. Run `sweep help` for usage."),
        }
        i += 1;
    }

    Ok(Command::Run { mode, activity_log })
}

fn parse_log_args(args: &[String]) -> Result<Command> {
    match args {
        [] => Ok(Command::Log {
            limit: DEFAULT_LOG_LIMIT,
        }),
        [n] => {
            let limit = n
                .parse::<usize>()
                .with_context(|| format!("Invalid event count `{n}`"))?;
            Ok(Command::Log { limit })
        }
        _ => bail!("Usage: sweep log [N]"),
    }
}

pub async fn handle_run(mode: Option<RenameMode>, activity_log: bool) -> Result<()> {
    let config = config::load_config(mode).context("Invalid configuration")?;
    let client = TrelloClient::new(&config.credentials);
    let log = if activity_log {
        ActivityLog::at(default_log_path())
    } else {
        ActivityLog::disabled()
    };
    if let Some(path) = log.path() {
        info!(path = %path.display(), "Recording activity");
    }

    let summary = Sweeper::new(&client, &config.sweep, &log).run().await;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    for report in Phase::ALL.iter().filter_map(|p| summary.report(*p)) {
        let line = if !report.enabled {
            "disabled".to_string()
        } else if report.fetch_failed {
            "skipped (could not fetch cards)".to_string()
        } else {
            format!(
                "{} cards, {} changed, {} unchanged, {} failed",
                report.processed, report.changed, report.skipped, report.failed
            )
        };
        println!("  {:<20} {line}", report.phase.as_str());
    }
    println!("Done.");
}

pub fn print_log(limit: usize) {
    let path = default_log_path();
    let events = read_events(&path, Some(limit));
    if events.is_empty() {
        println!("No activity recorded in {}", path.display());
        return;
    }
    for e in events {
        let card = match (&e.card_name, &e.card_id) {
            (Some(name), Some(id)) => format!("{name} ({id})"),
            (None, Some(id)) => id.clone(),
            _ => "-".to_string(),
        };
        let event = serde_json::to_value(e.event)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        let message = e.message.as_deref().unwrap_or("");
        println!("{} {:<18} {:<22} {card} {message}", e.timestamp, e.phase.as_str(), event);
    }
}

pub fn print_help() {
    println!("sweep — tidy every card in one board list\n");
    println!("USAGE:");
    println!("  sweep [run] [--mode simple|extract] [--no-log]");
    println!("  sweep log [N]       Show the last N recorded actions (default {DEFAULT_LOG_LIMIT})");
    println!();
    println!("PHASES (in order):");
    println!("  delete-attachment   Remove the named attachment from each card");
    println!("  rename              simple: keep the text in parentheses");
    println!("                      extract: name from the description, policy number to a custom field");
    println!("  clear-descriptions  Empty each card's description");
    println!();
    println!("ENVIRONMENT:");
    println!("  ENV_API_KEY, ENV_API_TOKEN, ENV_LIST_ID, ATTACHMENT_NAME_TO_DELETE,");
    println!("  ENV_CUSTOM_FIELD_ID, RENAME_MODE, TRELLO_BASE_URL, CARD_SWEEP_CONFIG");
}
