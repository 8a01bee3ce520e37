//! Session management for the Telegram client
//!
//! Provides:
//! - File-based session locking to prevent parallel runs over one session
//! - Client creation from a SQLite session file
//! - Sign-in for unauthorized sessions (login code or bot token)

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use grammers_client::client::updates::UpdatesLike;
use grammers_client::Client;
use grammers_mtsender::{SenderPool, SenderPoolHandle};
use grammers_session::storages::SqliteSession;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::{AuthMethod, Config};
use crate::error::{Error, Result};

/// Session lock guard that ensures exclusive access to the Telegram session.
///
/// Telegram requires sequential use of a session; two processes sharing one
/// session file conflict and can invalidate it.
pub struct SessionLock {
    lock_file: Option<File>,
    lock_path: PathBuf,
}

impl SessionLock {
    /// Acquire an exclusive lock at the given path.
    pub fn acquire(lock_path: impl AsRef<Path>) -> Result<Self> {
        let lock_path = lock_path.as_ref().to_path_buf();
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                lock_file: Some(lock_file),
                lock_path,
            }),
            Err(_) => Err(Error::SessionLocked),
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(ref file) = self.lock_file {
            let _ = file.unlock();
        }
        self.lock_file = None;
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Holder for SenderPool components and the Client
pub struct TelegramClient {
    pub client: Client,
    handle: SenderPoolHandle,
    _session: Arc<SqliteSession>,
    // Kept alive so the runner does not see a closed updates channel;
    // this tool never consumes updates.
    _updates: mpsc::UnboundedReceiver<UpdatesLike>,
    runner_handle: tokio::task::JoinHandle<()>,
}

impl TelegramClient {
    /// Open the session file and connect. The session file is created when
    /// it does not exist yet; authorization is a separate step.
    pub async fn connect(config: &Config) -> Result<Self> {
        let session = SqliteSession::open(&config.session_file())
            .map_err(|e| Error::SessionError(format!("Failed to open session file: {}", e)))?;
        let session = Arc::new(session);

        let pool = SenderPool::new(session.clone(), config.api_id);
        let client = Client::new(&pool);

        let SenderPool {
            runner,
            updates,
            handle,
        } = pool;

        let runner_handle = tokio::spawn(async move {
            runner.run().await;
        });

        info!(session = %config.session_file(), "connected to Telegram");

        Ok(Self {
            client,
            handle,
            _session: session,
            _updates: updates,
            runner_handle,
        })
    }

    /// Make sure the session is signed in, using --phone-or-token when the
    /// stored session is not yet authorized.
    pub async fn ensure_authorized(&self, config: &Config) -> Result<()> {
        if self
            .client
            .is_authorized()
            .await
            .map_err(|e| Error::TelegramError(format!("Authorization check failed: {}", e)))?
        {
            return Ok(());
        }

        match config.auth_method() {
            AuthMethod::BotToken(token) => {
                self.client
                    .bot_sign_in(token, &config.api_hash)
                    .await
                    .map_err(|e| Error::TelegramError(format!("Bot sign-in failed: {}", e)))?;
                info!("signed in with bot token");
            }
            AuthMethod::Phone(phone) => {
                let token = self
                    .client
                    .request_login_code(phone, &config.api_hash)
                    .await
                    .map_err(|e| {
                        Error::TelegramError(format!("Failed to request login code: {}", e))
                    })?;

                let code = prompt_login_code(phone)?;

                self.client
                    .sign_in(&token, &code)
                    .await
                    .map_err(|e| Error::TelegramError(format!("Sign-in failed: {}", e)))?;
                info!(phone = %phone, "signed in with login code");
            }
            AuthMethod::SessionOnly => return Err(Error::AuthorizationRequired),
        }

        Ok(())
    }

    /// Shut the sender pool down and wait for its runner task.
    pub async fn disconnect(self) {
        self.handle.quit();
        let _ = self.runner_handle.await;
    }
}

/// The single error edge of a run: a step that failed after connecting
/// still gets its best-effort disconnect before the error surfaces.
///
/// Takes the disconnect as a future so the edge is exercisable without a
/// live client; callers pass `client.disconnect()`.
pub async fn fail_after_disconnect<E>(err: E, disconnect: impl std::future::Future<Output = ()>) -> E {
    disconnect.await;
    err
}

// Allow using TelegramClient wherever a &Client is expected
impl std::ops::Deref for TelegramClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Ask for the login code Telegram just sent. The prompt goes to stderr so
/// stdout stays reserved for the JSON result.
fn prompt_login_code(phone: &str) -> Result<String> {
    eprint!("Enter the login code sent to {}: ", phone);
    io::stderr().flush()?;

    let mut code = String::new();
    io::stdin().lock().read_line(&mut code)?;
    let code = code.trim().to_string();

    if code.is_empty() {
        return Err(Error::InvalidArgument("empty login code".to_string()));
    }
    Ok(code)
}
