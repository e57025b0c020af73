mod app;
mod config;
mod conversation;
mod events;
mod llm;
mod tui;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm::CompletionClient;

#[derive(Parser)]
#[command(name = "chatwin")]
#[command(version)]
#[command(about = "Chat with an LLM from your terminal", long_about = None)]
struct Cli {
    /// Path to a config file (default: ~/.chatwin/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the model identifier
    #[arg(long, global = true)]
    model: Option<String>,

    /// Override the chat-completion endpoint URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Write logs here instead of ~/.chatwin/chatwin.log
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Ask { prompt: String },
}

fn init_tracing(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "chatwin=info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine
    dotenv::dotenv().ok();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }

    let log_path = cli.log_file.unwrap_or_else(|| config.log_path());
    init_tracing(&log_path)?;

    let completion = config.completion();
    if completion.api_key.is_none() {
        tracing::warn!(
            env = %config.api_key_env,
            "no API key configured; requests will be sent without credentials"
        );
    }
    tracing::info!(model = %completion.model, endpoint = %completion.endpoint, "starting chatwin");
    let client = CompletionClient::new(completion)?;

    match cli.command {
        Some(Commands::Ask { prompt }) => {
            let reply = app::ask(&client, &prompt).await?;
            println!("{}", reply);
            Ok(())
        }
        None => {
            tui::install_panic_hook();
            let mut terminal = tui::init()?;
            let result = app::App::new(&config, client).run(&mut terminal).await;
            tui::restore()?;
            result
        }
    }
}
