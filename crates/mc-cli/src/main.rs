//! multiconn CLI
//!
//! Single binary for working with every application instance on this
//! machine:
//! - Discovery (scan and list the managed port range)
//! - Lifecycle commands (connect, disconnect, quit)
//! - Opening a project in a new instance

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mc_core::TeamworkCredentials;
use mc_orchestrator::MultiConn;
use multiconn::commands;
use multiconn::output::print_error;

#[derive(Parser)]
#[command(name = "multiconn")]
#[command(author, version, about = "Manage connections to local Archicad instances")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the port range and show every live instance
    Scan,

    /// List live instances
    List {
        /// Print headers as JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect instances (all when no port is given)
    Connect {
        /// Ports to connect
        ports: Vec<u16>,
    },

    /// Disconnect instances (all when no port is given)
    Disconnect {
        /// Ports to disconnect
        ports: Vec<u16>,
    },

    /// Ask instances to quit (all when no port is given)
    Quit {
        /// Ports to quit
        ports: Vec<u16>,
    },

    /// Open a project in a new instance from a saved header
    Open {
        /// Header JSON file, as printed by `list --json`
        header: PathBuf,
        /// Teamwork user name (overrides the stored one)
        #[arg(long, requires = "password")]
        username: Option<String>,
        /// Teamwork password (overrides the stored one)
        #[arg(long, requires = "username")]
        password: Option<String>,
        /// Seconds to wait for the new instance to bind a port
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Scan => commands::scan_command(&orchestrator(config_path)?).await?,
        Commands::List { json } => {
            commands::list_command(&orchestrator(config_path)?, json).await?
        }
        Commands::Connect { ports } => {
            commands::connect_command(&orchestrator(config_path)?, &ports).await?
        }
        Commands::Disconnect { ports } => {
            commands::disconnect_command(&orchestrator(config_path)?, &ports).await?
        }
        Commands::Quit { ports } => {
            commands::quit_command(&orchestrator(config_path)?, &ports).await?
        }
        Commands::Open {
            header,
            username,
            password,
            timeout,
        } => {
            let credentials = match (username, password) {
                (Some(username), Some(password)) => {
                    Some(TeamworkCredentials::new(username, password))
                }
                _ => None,
            };
            let timeout = timeout.map(Duration::from_secs);
            let multi = orchestrator(config_path)?;
            commands::open_command(&multi, &header, credentials, timeout).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path)?,
            ConfigAction::Path => commands::config_path(config_path)?,
            ConfigAction::Init { force } => commands::config_init(config_path, force)?,
        },
    }

    Ok(())
}

fn orchestrator(config_path: Option<&PathBuf>) -> Result<MultiConn> {
    let config = commands::load_orchestrator_config(config_path)?;
    tracing::debug!("Managing ports {} on {}", config.port_range, config.host);
    Ok(MultiConn::new(config)?)
}
