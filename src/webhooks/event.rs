//! Canonical webhook events
//!
//! The normalized form of every inbound notification, independent of which
//! upstream object (`instagram` or `page`) delivered it.

use serde::Serialize;
use std::fmt;

/// Platform a notification originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Facebook,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler category an event is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Message,
    Comment,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Message => "message",
            Category::Comment => "comment",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A direct message (Instagram DM or Messenger message)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectMessage {
    pub platform: Platform,
    pub sender_id: String,
    pub recipient_id: String,
    /// Absent for media-only messages
    pub text: Option<String>,
    /// Absent when the payload carries no attachment list
    pub attachment_count: Option<usize>,
}

/// A comment on an Instagram post
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub platform: Platform,
    pub author_id: String,
    pub post_id: String,
    /// Comment object id, needed to reply
    pub comment_id: Option<String>,
    pub text: String,
}

/// A mention of the business account; the upstream value is kept verbatim
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mention {
    pub platform: Platform,
    pub raw_data: serde_json::Value,
}

/// A button postback from Messenger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Postback {
    pub platform: Platform,
    pub payload: Option<String>,
}

/// Normalized inbound event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalEvent {
    DirectMessage(DirectMessage),
    Comment(Comment),
    Mention(Mention),
    Postback(Postback),
}

impl CanonicalEvent {
    /// Handler category, or `None` for events no handler list subscribes to
    pub fn category(&self) -> Option<Category> {
        match self {
            CanonicalEvent::DirectMessage(_) => Some(Category::Message),
            CanonicalEvent::Comment(_) => Some(Category::Comment),
            CanonicalEvent::Mention(_) | CanonicalEvent::Postback(_) => None,
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            CanonicalEvent::DirectMessage(m) => m.platform,
            CanonicalEvent::Comment(c) => c.platform,
            CanonicalEvent::Mention(m) => m.platform,
            CanonicalEvent::Postback(p) => p.platform,
        }
    }

    /// Short variant name used in logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            CanonicalEvent::DirectMessage(_) => "direct_message",
            CanonicalEvent::Comment(_) => "comment",
            CanonicalEvent::Mention(_) => "mention",
            CanonicalEvent::Postback(_) => "postback",
        }
    }
}
