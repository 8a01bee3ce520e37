//! Telegram time-window scraper library
//!
//! This library provides the pieces behind the `telegram_scraper` binary:
//! - Parse chat references (handles, numeric ids, t.me links with topics)
//! - Manage a locked, SQLite-backed Telegram session
//! - Collect messages inside a trailing day window
//! - Emit the collected records as one JSON array

pub mod chat;
pub mod config;
pub mod error;
pub mod record;
pub mod scrape;
pub mod session;

// Re-export common types
pub use chat::{resolve_peer, ChatReference, ChatTarget};
pub use config::Config;
pub use error::{Error, Result};
pub use record::{MessageRecord, MessageView};
pub use scrape::{cutoff, emit_json, fetch_window, scan_message, Scan};
pub use session::{fail_after_disconnect, SessionLock, TelegramClient};
