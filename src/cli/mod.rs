use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::auth::SessionFile;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::storage;

pub mod commands;

use self::commands::{AddArgs, DeleteArgs, ListArgs, LoginArgs};

#[derive(Parser, Debug)]
#[command(
    name = "frontdesk",
    version,
    about = "Front-desk patient records: browse, search, and maintain NHIS and private insurance records"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over FRONTDESK_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over FRONTDESK_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive dashboard (default)
    Tui,
    /// Sign in as a front-desk operator
    Login(LoginArgs),
    /// Sign out the current operator
    Logout,
    /// Add a record from the command line
    Add(AddArgs),
    /// Browse or search records and print them
    List(ListArgs),
    /// Delete records by id
    Delete(DeleteArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);
    let log_file = matches!(command, Commands::Tui).then(|| paths.log_file());
    init_tracing(&cli.log_level, log_file.as_deref())
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = Arc::new(loader.load_or_init()?);
    let sessions = SessionFile::new(paths.session_file());

    match command {
        Commands::Tui => {
            let storage = storage::init(&paths, &config.storage)?;
            commands::run_tui(config, storage, sessions)
        }
        Commands::Login(args) => commands::login(&sessions, args),
        Commands::Logout => commands::logout(&sessions),
        Commands::Add(args) => {
            let storage = storage::init(&paths, &config.storage)?;
            commands::add_record(&storage, args)
        }
        Commands::List(args) => {
            let storage = storage::init(&paths, &config.storage)?;
            commands::list_records(&storage, config.search.recent_limit, args)
        }
        Commands::Delete(args) => {
            let storage = storage::init(&paths, &config.storage)?;
            commands::delete_records(&storage, args)
        }
    }
}

/// Installs the global subscriber. The dashboard owns the terminal, so it
/// logs to a file; every other command logs to stderr.
fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
            None => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}
