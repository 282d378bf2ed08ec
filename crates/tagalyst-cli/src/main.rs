use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tagalyst_cli::cli::{CliCommand, CliConfig, Session};
use tagalyst_cli::tracing_setup::init_tracing;

#[derive(Parser)]
#[command(name = "tagalyst")]
#[command(about = "Inspect and annotate chat transcripts offline")]
struct Cli {
    /// Page fixture (JSON: location, turns, sidebar)
    #[arg(long, short = 'f')]
    fixture: Option<PathBuf>,

    /// Metadata store (JSON map); defaults to the platform data directory
    #[arg(long, short = 's')]
    store: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (storePath, fixturePath, pretty)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List query/response pairs
    Pairs,

    /// Run one render pass and print its summary
    Render,

    /// List focus matches
    Matches {
        /// Select a tag (repeatable)
        #[arg(long, short = 't')]
        tag: Vec<String>,
        /// Search text
        #[arg(long, short = 'q')]
        search: Option<String>,
    },

    /// Toggle the star on a message
    Star {
        /// Message index, top to bottom, from 0
        index: usize,
    },

    /// Replace the tags of a message
    Tag {
        index: usize,
        /// New tags; none clears them
        tags: Vec<String>,
    },

    /// Set or clear (empty text) the note of a message
    Note { index: usize, note: String },

    /// Rename the thread
    Name { name: String },

    /// Show settings, or set one flag
    Config {
        /// Flag name as stored (e.g. tagsEnabled)
        flag: Option<String>,
        /// New value
        value: Option<bool>,
    },
}

impl Commands {
    fn into_command(self) -> Result<CliCommand> {
        Ok(match self {
            Commands::Pairs => CliCommand::Pairs,
            Commands::Render => CliCommand::Render,
            Commands::Matches { tag, search } => CliCommand::Matches { tags: tag, search },
            Commands::Star { index } => CliCommand::Star { index },
            Commands::Tag { index, tags } => CliCommand::Tag { index, tags },
            Commands::Note { index, note } => CliCommand::Note { index, note },
            Commands::Name { name } => CliCommand::Name { name },
            Commands::Config { flag: None, .. } => CliCommand::Config { flag: None },
            Commands::Config { flag: Some(flag), value: Some(value) } => CliCommand::Config {
                flag: Some((flag, value)),
            },
            Commands::Config { flag: Some(flag), value: None } => {
                bail!("Missing value for flag {} (true or false)", flag)
            }
        })
    }
}

fn load_config(cli: &Cli) -> Result<CliConfig> {
    match &cli.config {
        Some(path) => CliConfig::load(path),
        None => Ok(CliConfig::default()),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let pretty = cli.pretty || config.pretty;
    let store = cli.store.clone().unwrap_or_else(|| config.resolved_store_path());
    let fixture = cli.fixture.clone().or_else(|| config.fixture_path.clone());
    let command = cli.command.into_command()?;
    if fixture.is_none() && !matches!(command, CliCommand::Config { .. }) {
        bail!("--fixture is required for this command");
    }

    let mut session = Session::open(fixture.as_deref(), &store)?;
    let output = session.execute(command).await?;
    let text = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", text);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
