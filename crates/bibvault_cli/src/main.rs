//! bibvault CLI
//!
//! Command-line entry points for running a sync server, managing access
//! keys and syncing a local library.
//!
//! # Commands
//!
//! - `serve` - Run the HTTP sync server
//! - `key` - Generate, register or delete access keys
//! - `sync` - Sync local documents with a server
//! - `list` - Print the summaries a server exposes to a key

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// bibvault command-line tools.
#[derive(Parser)]
#[command(name = "bibvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP sync server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Root of the served record store
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Credential file (defaults to keys.txt under the data root)
        #[arg(short, long)]
        keys: Option<PathBuf>,

        /// JSON server configuration; replaces the other flags
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Manage access keys
    Key {
        /// Credential file
        #[arg(short, long, default_value = "keys.txt")]
        keys: PathBuf,

        #[command(subcommand)]
        action: KeyAction,
    },

    /// Sync local documents with a server
    Sync {
        /// Root of the local record store
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Server base URL, e.g. http://192.168.1.10:8080
        #[arg(short, long)]
        server: Option<String>,

        /// Access key
        #[arg(short, long)]
        key: Option<String>,

        /// JSON client configuration; flags given alongside it win
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Concurrent transfers
        #[arg(long)]
        pool: Option<usize>,

        /// Documents to sync (all local and remote-only when omitted)
        ids: Vec<Uuid>,
    },

    /// Print remote summaries
    List {
        /// Server base URL
        #[arg(short, long)]
        server: String,

        /// Access key
        #[arg(short, long)]
        key: String,

        /// Only records carrying this tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum KeyAction {
    /// Generate and register a random key, printing it once
    Generate {
        /// Key length in characters
        #[arg(short, long, default_value = "32")]
        length: usize,

        /// Restrict the key to records carrying these tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Register an existing secret
    Register {
        /// The secret to register
        secret: String,

        /// Restrict the key to records carrying these tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Revoke a secret
    Delete {
        /// The secret to revoke
        secret: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = run(cli.command);
    if let Err(e) = &result {
        tracing::error!("{e}");
    }
    result
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Serve {
            port,
            host,
            data,
            keys,
            config,
        } => {
            let config = match config {
                Some(path) => commands::serve::load(&path)?,
                None => {
                    let data = data.ok_or("--data or --config required for serve")?;
                    commands::serve::from_flags(&host, port, data, keys)?
                }
            };
            commands::serve::run(config)?;
        }
        Commands::Key { keys, action } => match action {
            KeyAction::Generate { length, tags } => {
                let secret = commands::key::generate(&keys, length, &tags)?;
                println!("{}", secret.as_str());
            }
            KeyAction::Register { secret, tags } => {
                commands::key::register(&keys, &secret, &tags)?;
            }
            KeyAction::Delete { secret } => {
                commands::key::delete(&keys, &secret)?;
            }
        },
        Commands::Sync {
            data,
            server,
            key,
            config,
            pool,
            ids,
        } => {
            let options = commands::sync::SyncOptions {
                data,
                server,
                key,
                config,
                pool,
            };
            commands::sync::run(options, &ids)?;
        }
        Commands::List {
            server,
            key,
            tags,
            format,
        } => {
            commands::list::run(&server, &key, &tags, &format)?;
        }
        Commands::Version => {
            println!("bibvault CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
