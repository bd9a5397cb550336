use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chat_ai::api::ApiClient;
use chat_ai::app::App;
use chat_ai::config::Config;
use chat_ai::session::{FileTokenStore, MemoryTokenStore, Session, TokenStore};
use chat_ai::{handler, tui, ui};

#[derive(Parser)]
#[command(name = "chat-ai")]
#[command(about = "Log in to a Chat-AI server and chat with its bot")]
struct Cli {
    /// Server base URL (default: http://localhost:8000)
    #[arg(short, long)]
    server: Option<String>,

    /// Where the login session is kept between runs
    #[arg(long)]
    session_file: Option<PathBuf>,

    /// Keep the session in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Discard any saved session before starting
    #[arg(long)]
    forget: bool,

    /// Diagnostics log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Remember --server / --session-file in the config file
    #[arg(long)]
    save_config: bool,
}

fn init_logging(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::default_log_path()?,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_ai=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.clone())?;

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Using default config: {}", e);
        Config::new()
    });
    if let Some(server) = cli.server {
        config.server_url = Some(server);
    }
    if let Some(path) = cli.session_file {
        config.session_file = Some(path);
    }
    if cli.save_config {
        config.save().context("saving config")?;
    }

    let store: Box<dyn TokenStore> = if cli.ephemeral {
        Box::new(MemoryTokenStore::new())
    } else {
        let file_store = FileTokenStore::new(config.session_path()?);
        tracing::info!("Session file {}", file_store.path().display());
        Box::new(file_store)
    };
    if cli.forget {
        store.clear().context("clearing saved session")?;
    }

    let server_url = config.server_url();
    tracing::info!("Starting against {}", server_url);

    let client = Arc::new(ApiClient::new(&server_url));
    let session = Session::restore(store);
    let mut app = App::new(session, client.clone(), client, &server_url);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = run(&mut app, &mut terminal, &mut events).await;

    tui::restore()?;
    result
}

async fn run(app: &mut App, terminal: &mut tui::Tui, events: &mut tui::EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;
        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}
