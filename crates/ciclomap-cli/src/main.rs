//! ciclomap: Local client for the shared map annotations.
//!
//! Each invocation restores the collection from the state file, runs one
//! command through the synchronization controller, and saves the result.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use ciclomap_cli::{Command, Config, LocalState, OutputFormat, Session};
use ciclomap_core::UserId;

#[derive(Parser, Debug)]
#[command(name = "ciclomap")]
#[command(about = "Shared map annotations for cyclists")]
struct Args {
    /// Directory holding config.json
    #[arg(long, default_value = ".ciclomap")]
    config_dir: PathBuf,

    /// Session state file (defaults to <config-dir>/state.json)
    #[arg(long)]
    state: Option<PathBuf>,

    /// Act as this user instead of the saved identity
    #[arg(long)]
    user: Option<UserId>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,ciclomap_core=debug,ciclomap_cli=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(&args.config_dir)?;
    let state_path = args
        .state
        .clone()
        .unwrap_or_else(|| args.config_dir.join("state.json"));
    let state = LocalState::load(&state_path)?;
    debug!("Loaded {} documents from {:?}", state.documents.len(), state_path);

    let session = Session::open(&config, state, args.user.clone()).await;
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let result = session.run(&args.command, format).await;

    // Persist even on failure: a sign-in may have happened.
    session.state().save(&state_path)?;
    info!("Saved session to {:?}", state_path);

    let output = result?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
