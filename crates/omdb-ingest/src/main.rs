//! omdbctl - load OMDb dumps from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use omdb_common::logging::{init_logging, LogConfig, LogLevel};
use omdb_ingest::{config::ImportConfig, ImportKind, Importer};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "omdbctl")]
#[command(author, version, about = "Import OMDb data dumps into Postgres")]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upsert every movie from all_movies.csv.bz2
    ImportAllMovies {
        /// Read a local dump (.csv or .csv.bz2) instead of downloading
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Replace all movie links with movie_links.csv.bz2
    ImportMovieLinks {
        /// Read a local dump (.csv or .csv.bz2) instead of downloading
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

impl Command {
    fn kind(&self) -> ImportKind {
        match self {
            Command::ImportAllMovies { .. } => ImportKind::AllMovies,
            Command::ImportMovieLinks { .. } => ImportKind::MovieLinks,
        }
    }

    fn file(&self) -> Option<&PathBuf> {
        match self {
            Command::ImportAllMovies { file } | Command::ImportMovieLinks { file } => file.as_ref(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // environment variables take precedence
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("omdbctl")
        .filter_directives("sqlx=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    match run(cli).await {
        Ok(()) => {
            info!("done");
            Ok(ExitCode::SUCCESS)
        },
        Err(err) => {
            error!("{err:#}");
            Ok(ExitCode::FAILURE)
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let database_url = cli
        .database_url
        .context("DATABASE_URL not set (use --database-url or the environment)")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&database_url)
        .await
        .context("connecting to database")?;

    let importer = Importer::new(ImportConfig::from_env()?, pool)?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let kind = cli.command.kind();
    let summary = match cli.command.file() {
        Some(path) => importer.import_file(kind, path, &cancel).await,
        None => importer.import_remote(kind, &cancel).await,
    }
    .with_context(|| format!("import {kind}"))?;

    info!(
        kind = kind.as_str(),
        rows = summary.rows,
        statements = summary.statements,
        "import finished"
    );
    Ok(())
}

/// Cancel the running import on Ctrl+C or SIGTERM; its transaction rolls back.
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Interrupted, cancelling import");
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_file_import() {
        let cli = Cli::try_parse_from([
            "omdbctl",
            "import-movie-links",
            "--file",
            "movie_links.csv.bz2",
            "--database-url",
            "postgres://localhost/omdb",
        ])
        .unwrap();

        assert_eq!(cli.command.kind(), ImportKind::MovieLinks);
        assert_eq!(cli.command.file(), Some(&PathBuf::from("movie_links.csv.bz2")));
        assert_eq!(cli.database_url.as_deref(), Some("postgres://localhost/omdb"));
    }

    #[test]
    fn test_unknown_command_is_an_error() {
        assert!(Cli::try_parse_from(["omdbctl", "import-everything"]).is_err());
    }
}
