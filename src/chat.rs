//! Chat reference parsing and entity resolution
//!
//! A chat reference is whatever the user hands to --chat: a bare handle
//! (with or without @), a numeric id, or a full t.me link, optionally with a
//! topic id as the second path segment.

use grammers_client::types::peer::Peer;
use grammers_client::{Client, InvocationError};

use crate::error::{Error, Result};

/// RPC error names that mean the chat itself is unusable, as opposed to a
/// transient or unrelated failure.
const CHAT_UNAVAILABLE_ERRORS: [&str; 3] =
    ["USERNAME_INVALID", "USERNAME_NOT_OCCUPIED", "CHANNEL_PRIVATE"];

/// Normalized chat reference: canonical identifier plus optional topic id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReference {
    pub identifier: String,
    pub topic_id: Option<i32>,
}

impl ChatReference {
    /// Parse a raw chat reference.
    ///
    /// For t.me links the first path segment is the identifier and the
    /// second, when numeric, is the topic id. An explicitly supplied
    /// `topic_id` always wins over a link-derived one, and a malformed
    /// numeric segment degrades silently to "no topic id".
    pub fn parse(raw: &str, topic_id: Option<i32>) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument("empty chat reference".to_string()));
        }

        if let Some(rest) = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
        {
            // Path only: cut query string and fragment first.
            let path = rest
                .split_once(['?', '#'])
                .map(|(head, _)| head)
                .unwrap_or(rest);
            let mut segments = path.split('/').filter(|s| !s.is_empty());
            let _host = segments.next();

            if let Some(slug) = segments.next() {
                let topic_id = topic_id.or_else(|| segments.next().and_then(|s| s.parse().ok()));
                return Ok(Self {
                    identifier: slug.to_string(),
                    topic_id,
                });
            }
            // A link with no path segments is used verbatim, like any
            // other non-link reference.
        }

        Ok(Self {
            identifier: trimmed.to_string(),
            topic_id,
        })
    }

    /// Classify the identifier for resolution.
    pub fn target(&self) -> ChatTarget {
        if let Ok(id) = self.identifier.parse::<i64>() {
            return ChatTarget::Id(id);
        }
        ChatTarget::Username(
            self.identifier
                .trim_start_matches('@')
                .to_string(),
        )
    }
}

/// How a chat identifier resolves against Telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    /// Username or channel slug, @ already stripped.
    Username(String),
    /// Numeric chat/channel/user id, found by scanning dialogs.
    Id(i64),
}

/// Resolve a chat reference to an actual Peer.
///
/// Invalid, unoccupied, and private identifiers all collapse into
/// [`Error::ChatUnavailable`]; everything else passes through untranslated.
pub async fn resolve_peer(client: &Client, reference: &ChatReference) -> Result<Peer> {
    match reference.target() {
        ChatTarget::Username(username) => resolve_by_username(client, reference, &username).await,
        ChatTarget::Id(id) => resolve_by_id(client, reference, id).await,
    }
}

async fn resolve_by_username(
    client: &Client,
    reference: &ChatReference,
    username: &str,
) -> Result<Peer> {
    match client.resolve_username(username).await {
        Ok(Some(peer)) => Ok(peer),
        Ok(None) => Err(Error::ChatUnavailable {
            chat: reference.identifier.clone(),
            reason: format!("username @{} is not occupied", username),
        }),
        Err(InvocationError::Rpc(rpc))
            if CHAT_UNAVAILABLE_ERRORS.contains(&rpc.name.as_str()) =>
        {
            Err(Error::ChatUnavailable {
                chat: reference.identifier.clone(),
                reason: rpc.name.clone(),
            })
        }
        Err(err) => Err(err.into()),
    }
}

/// Numeric ids only resolve through the dialog list; Telegram offers no
/// direct id lookup without an access hash.
async fn resolve_by_id(client: &Client, reference: &ChatReference, target_id: i64) -> Result<Peer> {
    let mut dialogs = client.iter_dialogs();

    while let Some(dialog) = dialogs.next().await? {
        let peer_id = match &dialog.peer {
            Peer::User(user) => user.raw.id(),
            Peer::Channel(channel) => channel.raw.id,
            Peer::Group(group) => match &group.raw {
                grammers_tl_types::enums::Chat::Empty(c) => c.id,
                grammers_tl_types::enums::Chat::Chat(c) => c.id,
                grammers_tl_types::enums::Chat::Forbidden(c) => c.id,
                grammers_tl_types::enums::Chat::Channel(c) => c.id,
                grammers_tl_types::enums::Chat::ChannelForbidden(c) => c.id,
            },
        };

        if peer_id == target_id {
            return Ok(dialog.peer);
        }
    }

    Err(Error::ChatUnavailable {
        chat: reference.identifier.clone(),
        reason: format!("no dialog with id {}", target_id),
    })
}
