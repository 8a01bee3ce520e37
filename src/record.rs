//! Flat message records for JSON emission

use chrono::{DateTime, Utc};
use grammers_client::types::peer::Peer;
use grammers_client::types::Message;
use serde::{Deserialize, Serialize};

/// Minimal capability view of a history item: has an id, may have a
/// timestamp, may have content. Anything the history yields that cannot
/// satisfy this view is discarded by the scan.
pub trait MessageView {
    fn msg_id(&self) -> i32;
    fn timestamp(&self) -> Option<DateTime<Utc>>;
    fn body(&self) -> &str;
    fn sender_id(&self) -> Option<i64>;
    fn sender_username(&self) -> Option<String>;
    fn reply_to(&self) -> Option<i32>;
    /// True for system/service notifications (joins, pins, topic edits).
    fn is_service(&self) -> bool;
    /// Id of the forum topic thread this message belongs to, if any.
    fn topic_root(&self) -> Option<i32>;
}

/// One retained message, flattened for downstream consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub chat_identifier: String,
    pub message_id: i32,
    pub date: DateTime<Utc>,
    pub sender_id: Option<i64>,
    pub sender_username: Option<String>,
    pub text: String,
    pub reply_to_msg_id: Option<i32>,
    pub is_service: bool,
}

impl MessageRecord {
    /// Project a history item into a record. Returns None for items without
    /// a timestamp; missing text becomes "" rather than null.
    pub fn project(chat_identifier: &str, msg: &impl MessageView) -> Option<Self> {
        let date = msg.timestamp()?;
        Some(Self {
            chat_identifier: chat_identifier.to_string(),
            message_id: msg.msg_id(),
            date,
            sender_id: msg.sender_id(),
            sender_username: msg.sender_username(),
            text: msg.body().to_string(),
            reply_to_msg_id: msg.reply_to(),
            is_service: msg.is_service(),
        })
    }
}

impl MessageView for Message {
    fn msg_id(&self) -> i32 {
        self.id()
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.date().timestamp(), 0)
    }

    fn body(&self) -> &str {
        self.text()
    }

    fn sender_id(&self) -> Option<i64> {
        self.sender().map(|peer| match peer {
            Peer::User(u) => u.raw.id(),
            Peer::Channel(c) => c.raw.id,
            Peer::Group(g) => match &g.raw {
                grammers_tl_types::enums::Chat::Empty(c) => c.id,
                grammers_tl_types::enums::Chat::Chat(c) => c.id,
                grammers_tl_types::enums::Chat::Forbidden(c) => c.id,
                grammers_tl_types::enums::Chat::Channel(c) => c.id,
                grammers_tl_types::enums::Chat::ChannelForbidden(c) => c.id,
            },
        })
    }

    fn sender_username(&self) -> Option<String> {
        self.sender().and_then(|peer| match peer {
            Peer::User(u) => {
                if let grammers_tl_types::enums::User::User(user) = &u.raw {
                    user.username.clone()
                } else {
                    None
                }
            }
            Peer::Channel(c) => c.raw.username.clone(),
            Peer::Group(_) => None,
        })
    }

    fn reply_to(&self) -> Option<i32> {
        self.reply_to_message_id()
    }

    fn is_service(&self) -> bool {
        self.action().is_some()
    }

    fn topic_root(&self) -> Option<i32> {
        let reply_to = match &self.raw {
            grammers_tl_types::enums::Message::Message(m) => m.reply_to.as_ref(),
            grammers_tl_types::enums::Message::Service(m) => m.reply_to.as_ref(),
            grammers_tl_types::enums::Message::Empty(_) => None,
        };
        match reply_to {
            Some(grammers_tl_types::enums::MessageReplyHeader::Header(header)) => {
                header.reply_to_top_id.or(header.reply_to_msg_id)
            }
            _ => None,
        }
    }
}
