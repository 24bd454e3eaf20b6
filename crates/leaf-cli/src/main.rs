//! leaf-cli - Command-line tool for the Nissan Leaf telematics gateway
//!
//! Each invocation builds one client, runs one command, and exits.

mod commands;
mod config;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leaf_client::{Command, Credentials, Deadline, LeafClient};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, Overrides};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "leaf-cli")]
#[command(author, version, about = "Nissan Leaf remote control CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LEAF_CONFIG")]
    config: Option<PathBuf>,

    /// Account user name or email address
    #[arg(short, long, env = "LEAF_USERNAME")]
    username: Option<String>,

    /// Account password
    #[arg(long, env = "LEAF_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Region code: NE, NNA, NCI, NMA or NML
    #[arg(short, long, env = "LEAF_REGION")]
    region: Option<String>,

    /// Gateway base URL
    #[arg(long, env = "LEAF_BASE_URL")]
    base_url: Option<String>,

    /// Total time budget for the invocation, in milliseconds
    #[arg(short, long, env = "LEAF_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Time kept back from the budget so requests give up first
    #[arg(long, default_value = "500")]
    margin_ms: u64,

    /// Session id from an earlier login (skips logging in)
    #[arg(long, env = "LEAF_SESSION_ID", requires = "vin")]
    session_id: Option<String>,

    /// Vehicle id from an earlier login
    #[arg(long, env = "LEAF_VIN", requires = "session_id")]
    vin: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Log in and print the session credentials
    Login,
    /// Show the latest battery status
    Status,
    /// Pre-heat the cabin
    Preheat,
    /// Cool the cabin
    Cool,
    /// Switch climate control off
    ClimateOff,
    /// Start charging now
    Charge,
    /// Ask the car to upload fresh data
    Update,
}

impl Commands {
    fn command(self) -> Option<Command> {
        match self {
            Commands::Login => None,
            Commands::Status => Some(Command::BatteryStatus),
            Commands::Preheat => Some(Command::Preheat),
            Commands::Cool => Some(Command::Cooling),
            Commands::ClimateOff => Some(Command::ClimateOff),
            Commands::Charge => Some(Command::StartCharging),
            Commands::Update => Some(Command::RequestUpdate),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let merged = config.merge_with_args(&Overrides {
        username: cli.username.as_deref(),
        password: cli.password.as_deref(),
        region: cli.region.as_deref(),
        base_url: cli.base_url.as_deref(),
        timeout_ms: cli.timeout_ms,
    })?;

    let ctx = OutputContext::new(cli.output, cli.no_color, cli.quiet);

    let mut builder = LeafClient::builder(merged.account);
    if let Some(ms) = merged.timeout_ms {
        builder = builder.time_budget(
            Deadline::after(Duration::from_millis(ms))
                .with_margin(Duration::from_millis(cli.margin_ms)),
        );
    }
    if let (Some(session_id), Some(vin)) = (&cli.session_id, &cli.vin) {
        let credentials = Credentials::new(session_id.as_str(), vin.as_str())
            .context("Invalid --session-id/--vin")?;
        builder = builder.credentials(credentials);
    }
    let client = builder
        .on_login_failure(|| {
            tracing::error!("Unable to log in: credentials are wrong or the service is down")
        })
        .build()
        .context("Failed to create Leaf client")?;

    match cli.command.command() {
        None => commands::login(&client, &ctx).await,
        Some(command) => commands::run(&client, command, &ctx).await,
    }
}
