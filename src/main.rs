use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;

use shellgate::config::Config;
use shellgate::executor::Executor;
use shellgate::hint::HintKind;
use shellgate::server::{self, ServerState};
use shellgate::session::Session;
use shellgate::store::SessionDb;

mod commands;
use commands::Commands;

#[derive(Parser)]
#[command(name = "shellgate")]
#[command(about = "Browser shell gateway - run commands on the host from an authenticated web client")]
#[command(version)]
struct Cli {
    /// Directory the session starts in (defaults to current directory)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Path to the config file (defaults to .shellgate/config.toml in the work dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let work_dir = cli.path.unwrap_or_else(|| PathBuf::from("."));
    let config = match cli.config {
        Some(path) => Config::from_file(&path)?,
        None => Config::from_dir(&work_dir)?,
    };
    std::env::set_current_dir(&work_dir)
        .with_context(|| format!("Failed to enter work dir: {}", work_dir.display()))?;

    let db = SessionDb::open(&config.db_path())?;
    let executor = Executor::new();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            let state = Arc::new(ServerState::new(
                executor,
                db,
                config.caller.clone(),
                config.auth_token(),
            ));
            let (_addr, handle) = server::start(state, port.unwrap_or(config.port))?;
            handle
                .join()
                .map_err(|_| anyhow!("server thread panicked"))?;
        }
        Commands::Exec { command } => {
            let session = Session::new(&executor, &db, &db, &config.caller);
            let result = session.run(&command)?;
            if !result.output.is_empty() {
                println!("{}", result.output);
            }
            info!("{}:{}", result.user, result.working_dir);
        }
        Commands::Hint { value, kind } => {
            let session = Session::new(&executor, &db, &db, &config.caller);
            let outcome = session.hint(&value, HintKind::from(kind.as_str()))?;
            for matched in outcome.matches {
                println!("{}", matched);
            }
        }
        Commands::History { limit } => {
            for entry in db.recent_commands(&config.caller, limit)? {
                println!("{}\t{}", entry.executed_at, entry.command);
            }
        }
        Commands::Reset => {
            let session = Session::new(&executor, &db, &db, &config.caller);
            session.reset()?;
            info!("Cleared stored working directory for {}", config.caller);
        }
    }

    Ok(())
}
