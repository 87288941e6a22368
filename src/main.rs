use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use lexsum::server::Server;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_PORT: u16 = 8790;

#[derive(Parser)]
#[command(name = "lexsum")]
#[command(version = VERSION)]
#[command(about = "Authenticated legal document summarization service")]
#[command(long_about = "lexsum - legal document summarization\n\n\
    Start the server:    lexsum\n\
    Custom port:         lexsum --port 9000\n\
    Custom database:     lexsum --db ./users.db\n\n\
    Set GEMINI_API_KEY to enable summarization, or pass an x-api-key\n\
    header per request.")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind to (use 0.0.0.0 to allow network access)
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Path to the credential database (defaults to ~/.lexsum/users.db)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Model identifier to request summaries from
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the hosted model's OpenAI-compatible endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// Verbose mode: detailed output for debugging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("lexsum={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };

    let mut server = Server::new(cli.port)
        .with_bind_address(cli.bind)
        .with_db_path(db_path);
    if let Some(model) = cli.model {
        server = server.with_model(model);
    }
    if let Some(base_url) = cli.base_url {
        server = server.with_base_url(base_url);
    }

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    runtime.block_on(server.start())
}

/// Default credential database location: `~/.lexsum/users.db`.
fn default_db_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".lexsum").join("users.db"))
}
