//! Jot CLI - Command-line interface for offline-first notes
//!
//! Notes are written to the local store first; `jot sync` pushes whatever
//! is queued once the server is reachable.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};
use jot_core::models::NoteKind;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::archive::run_archive;
use crate::commands::common::AppPaths;
use crate::commands::conflicts::run_conflicts;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::queue::run_queue;
use crate::commands::resolve::run_resolve;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jot=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = AppPaths::resolve(cli.db_path, cli.config)?;

    match cli.command {
        Some(Commands::Add { kind, content }) => run_add(&content, kind.into(), &paths).await?,
        Some(Commands::List {
            limit,
            kind,
            archived,
            json,
        }) => run_list(limit, kind.map(Into::into), archived, json, &paths).await?,
        Some(Commands::Edit { id, content }) => run_edit(&id, &content, &paths).await?,
        Some(Commands::Archive { id, undo }) => run_archive(&id, !undo, &paths).await?,
        Some(Commands::Delete { id }) => run_delete(&id, &paths).await?,
        Some(Commands::Resolve { id, decision }) => {
            run_resolve(&id, decision.resolution(), &paths).await?;
        }
        Some(Commands::Conflicts { json }) => run_conflicts(json, &paths).await?,
        Some(Commands::Queue { json }) => run_queue(json, &paths).await?,
        Some(Commands::Sync) => run_sync(&paths).await?,
        None => {
            if cli.note.is_empty() {
                Cli::command().print_help()?;
                println!();
            } else {
                run_add(&cli.note, NoteKind::QuickCapture, &paths).await?;
            }
        }
    }

    Ok(())
}
