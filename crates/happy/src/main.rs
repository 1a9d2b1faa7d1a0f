//! Happy - operator CLI for the Happy chat bot
//!
//! Main entry point for the `happy` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{langs, translate, user};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Happy - inspect users and translations of the Happy chat bot
#[derive(Parser)]
#[command(name = "happy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (default: discovered)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for the rolling JSON log
    #[arg(long, global = true, env = "HAPPY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List installed languages
    Langs(langs::LangsArgs),

    /// Inspect and modify users
    User(user::UserArgs),

    /// Resolve a message through the catalog pool
    Translate(translate::TranslateArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) plus a rotating JSON file
    let filter = if cli.verbose {
        "happy=debug,happy_bot=debug,happy_pool=debug,happy_store=debug,happy_i18n=debug,happy_config=debug,info"
    } else {
        "happy=info,happy_bot=warn,happy_pool=warn,warn"
    };

    let log_dir = cli.log_dir.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .map(|d| d.join("happy").join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    });
    let file_appender = tracing_appender::rolling::daily(&log_dir, "happy.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "happy=trace,happy_bot=trace,happy_pool=trace,happy_store=debug,happy_i18n=debug,happy_config=debug,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        config_path: cli.config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Langs(args) => langs::run(args, &ctx).await,
        Commands::User(args) => user::run(args, &ctx).await,
        Commands::Translate(args) => translate::run(args, &ctx).await,
    }
}
