use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;
use crate::storage;

pub mod commands;

use self::commands::{
    CategoryArgs, DeleteArgs, EditArgs, ListArgs, NewArgs, Session, ShowArgs, WidgetArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "notepad",
    version,
    about = "Notes with categories, filtered search and home-surface widgets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over NOTEPAD_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over NOTEPAD_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List notes, newest first (default)
    List(ListArgs),
    /// Create a new note
    New(NewArgs),
    /// Change a note's title, body or category
    Edit(EditArgs),
    /// Delete a note
    Delete(DeleteArgs),
    /// Print one note
    Show(ShowArgs),
    /// Manage categories
    Category(CategoryArgs),
    /// Configure and render note widgets
    Widget(WidgetArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("NOTEPAD_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("NOTEPAD_DATA", path);
    }

    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let loader = ConfigLoader::discover()?;
    let paths = loader.paths().clone();
    let config = loader.load_or_init()?;
    let storage = storage::init(&paths, &config)?;

    let session = Session::new(storage, paths);
    let command = cli
        .command
        .unwrap_or_else(|| Commands::List(ListArgs::default()));
    let output = match command {
        Commands::List(args) => commands::list_notes(&session, args),
        Commands::New(args) => commands::new_note(&session, args),
        Commands::Edit(args) => commands::edit_note(&session, args),
        Commands::Delete(args) => commands::delete_note(&session, args),
        Commands::Show(args) => commands::show_note(&session, args),
        Commands::Category(args) => commands::handle_category_command(&session, args),
        Commands::Widget(args) => commands::handle_widget_command(&session, args),
    }?;
    print!("{output}");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
