//! Temps console CLI
//!
//! Terminal front end for the console's logic core: browse the repositories
//! a git provider exposes, manage stored provider tokens and collect form
//! snapshots.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::{FormCommand, LoginCommand, LogoutCommand, ReposCommand};
use temps_config::{ConfigService, ConsoleConfig};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(
    author,
    version = env!("TEMPS_VERSION"),
    about,
    long_about = None
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "TEMPS_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "TEMPS_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    /// Configuration file (defaults to <data dir>/console.toml)
    #[arg(long, env = "TEMPS_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List repositories available through a git provider
    Repos(ReposCommand),
    /// Store an access token for a git provider
    Login(LoginCommand),
    /// Remove the stored access token of a git provider
    Logout(LogoutCommand),
    /// Form utilities
    Form(FormCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Commands::Repos(cmd) => cmd.execute(&load_config(cli.config)?),
        Commands::Login(cmd) => cmd.execute(&load_config(cli.config)?),
        Commands::Logout(cmd) => cmd.execute(&load_config(cli.config)?),
        Commands::Form(cmd) => cmd.execute(),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ConsoleConfig> {
    let mut service = ConfigService::new();
    if let Some(path) = path {
        service = service.with_config_file(path);
    }
    Ok(service.load()?)
}

fn init_tracing(log_level: &str, log_format: &str) -> anyhow::Result<()> {
    // If RUST_LOG is set, use it directly; otherwise use our default filter
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()?
    } else {
        // All temps crates at the requested level, noisy dependencies at warn
        tracing_subscriber::EnvFilter::try_new(format!(
            "temps_cli={level},\
             temps_core={level},\
             temps_config={level},\
             temps_forms={level},\
             temps_git={level},\
             h2=warn,\
             hyper=warn,\
             hyper_util=warn,\
             reqwest=warn,\
             rustls=warn",
            level = log_level
        ))?
    };

    let fmt_layer = match log_format {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed(),
        _ => tracing_subscriber::fmt::layer() // "compact" or any other value
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
