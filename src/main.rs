//! Telegram scraper CLI - main entry point
//!
//! Fetches messages from one chat/topic within a trailing day window and
//! prints them as a single JSON array on stdout.

use std::fs::File;
use std::io;
use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use telegram_scraper::config::{Config, DEFAULT_DAYS, DEFAULT_SESSION_NAME};
use telegram_scraper::{fail_after_disconnect, scrape, ChatReference, SessionLock, TelegramClient};

#[derive(Parser)]
#[command(name = "telegram_scraper")]
#[command(about = "Scrape recent Telegram messages and emit JSON", long_about = None)]
#[command(version)]
struct Cli {
    /// Telegram API id (from my.telegram.org)
    #[arg(long)]
    api_id: i32,

    /// Telegram API hash
    #[arg(long)]
    api_hash: String,

    /// Chat username/ID or t.me link; a topic id in the link is honored
    #[arg(long)]
    chat: String,

    /// Days back to include
    #[arg(long, default_value_t = DEFAULT_DAYS)]
    days: i64,

    /// Session name; the session file is <name>.session
    #[arg(long, default_value = DEFAULT_SESSION_NAME)]
    session: String,

    /// Explicit topic/thread id, overrides one derived from the link
    #[arg(long)]
    topic_id: Option<i32>,

    /// Phone number (with country code) or bot token, for first sign-in
    #[arg(long)]
    phone_or_token: Option<String>,

    /// Write the JSON array to a file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Indent the JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries only the JSON result.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("telegram_scraper=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let reference = ChatReference::parse(&cli.chat, cli.topic_id)?;
    // Argument-derived and pure; reject a bad --days before touching the
    // network.
    let cutoff = scrape::cutoff(cli.days, Utc::now())?;
    let config = Config {
        api_id: cli.api_id,
        api_hash: cli.api_hash.clone(),
        session_name: cli.session.clone(),
        phone_or_token: cli.phone_or_token.clone(),
    };

    let _lock = SessionLock::acquire(config.lock_file())?;

    let client = TelegramClient::connect(&config).await?;
    client.ensure_authorized(&config).await?;

    // The one error edge in the run: a chat that cannot be resolved still
    // gets a best-effort disconnect before the failure surfaces.
    let peer = match telegram_scraper::resolve_peer(&client, &reference).await {
        Ok(peer) => peer,
        Err(err) => {
            return Err(fail_after_disconnect(err, client.disconnect()).await.into());
        }
    };

    info!(chat = %reference.identifier, topic = ?reference.topic_id, "resolved chat");

    let records = scrape::fetch_window(&client, &peer, &reference, cutoff).await?;

    client.disconnect().await;

    match cli.output {
        Some(path) => {
            let mut file = File::create(&path)?;
            scrape::emit_json(&records, &mut file, cli.pretty)?;
            info!(path = %path.display(), "wrote output file");
        }
        None => {
            let stdout = io::stdout();
            let mut sink = stdout.lock();
            scrape::emit_json(&records, &mut sink, cli.pretty)?;
        }
    }

    Ok(())
}
