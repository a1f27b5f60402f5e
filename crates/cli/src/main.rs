//! # salesbot: ask sales questions in plain language
//!
//! This is the main entry point for the `salesbot` command-line interface.

mod app;
mod config;
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fs::File;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a config file, instead of `config.yml`.
    #[arg(long, global = true, env = "SALESBOT_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat interactively (the default)
    Chat,
    /// Answer a single question and exit
    Ask(AskArgs),
    /// Print the schema as it is given to the model
    Schema,
}

#[derive(Parser, Debug)]
struct AskArgs {
    /// The question, e.g. "Show me total sales by channel"
    question: String,
    /// The time period to use if the question has none, e.g. 2024 or FY2024
    #[arg(long)]
    year: Option<String>,
    /// The option (1-based) to pick if the question contains an ambiguous term
    #[arg(long)]
    option: Option<usize>,
}

// --- Main Application Entry ---

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Setup logging to a file so the chat output stays clean.
    let log_file = File::create("salesbot-cli.log")?;
    let subscriber = fmt::Subscriber::builder()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = config::get_config(cli.config.as_deref())?;
    info!(db_url = %config.db_url, "Configuration loaded.");

    let controller = match app::build_controller(&config).await {
        Ok(controller) => controller,
        Err(e) => {
            eprintln!("❌ {e:#}");
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => app::run_chat(&controller, config.rows_before_scroll).await?,
        Commands::Ask(args) => {
            app::run_ask(
                &controller,
                config.rows_before_scroll,
                &args.question,
                args.year,
                args.option,
            )
            .await?
        }
        Commands::Schema => app::print_schema(&controller),
    }

    Ok(())
}
