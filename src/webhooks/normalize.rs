//! Event Normalizer
//!
//! Turns a raw webhook body into a stream of [`CanonicalEvent`]s.
//!
//! Two upstream schemas are understood:
//!
//! - `object = "instagram"`: `entry[].changes[]`, each change tagged by `field`
//!   (`messages`, `comments`, `mentions`).
//! - `object = "page"`: `entry[].messaging[]`, each event carrying either a
//!   `message` or a `postback`.
//!
//! Only bytes that are not JSON, or a top level that is not an object, fail the
//! request. Everything below is read loosely: `object` may be any value, and
//! `entry`, `changes` and `messaging` are only looked at on the branch that
//! uses them. Absent or null arrays are empty, a non-array is empty, and every
//! item is decoded on its own, so one unusable item never costs its siblings.

use crate::metrics;
use crate::webhooks::event::{CanonicalEvent, Comment, DirectMessage, Mention, Platform, Postback};
use crate::webhooks::error::WebhookError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

/// Top-level webhook body
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawPayload {
    /// Object discriminator (`instagram`, `page`, anything else is ignored)
    #[serde(default)]
    pub object: Value,

    /// `entry` as received; only read for known objects
    #[serde(default)]
    pub entry: Value,
}

impl RawPayload {
    /// Parse the exact request body
    pub fn from_slice(body: &[u8]) -> Result<Self, WebhookError> {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(mut map)) => Ok(Self {
                object: map.remove("object").unwrap_or(Value::Null),
                entry: map.remove("entry").unwrap_or(Value::Null),
            }),
            Ok(other) => Err(WebhookError::MalformedPayload(format!(
                "expected a JSON object, found {}",
                json_type(&other)
            ))),
            Err(e) => Err(WebhookError::MalformedPayload(e.to_string())),
        }
    }

    pub fn object_kind(&self) -> ObjectKind {
        ObjectKind::from_discriminator(self.object.as_str())
    }

    /// Discriminator for log fields; non-string values are rendered as JSON
    pub fn object_label(&self) -> String {
        match &self.object {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Known values of the object discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Instagram,
    Page,
    Unknown,
}

impl ObjectKind {
    pub fn from_discriminator(object: Option<&str>) -> Self {
        match object {
            Some("instagram") => ObjectKind::Instagram,
            Some("page") => ObjectKind::Page,
            _ => ObjectKind::Unknown,
        }
    }
}

/// `changes[]` item of an instagram entry, decoded by its `field` tag
#[derive(Debug, Clone, PartialEq)]
pub enum InstagramChange {
    Messages(InstagramMessageValue),
    Comments(InstagramCommentValue),
    Mentions(Value),
    Unrecognized(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InstagramMessageValue {
    #[serde(deserialize_with = "lenient_id")]
    pub from_id: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub to_id: Option<String>,
    pub text: Option<String>,
    pub attachments: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InstagramCommentValue {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub from_id: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub media_id: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChange {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    value: Value,
}

impl InstagramChange {
    pub fn decode(item: Value) -> Self {
        let change: RawChange = match serde_json::from_value(item) {
            Ok(change) => change,
            Err(e) => return InstagramChange::Unrecognized(format!("change: {e}")),
        };
        let field = change.field.unwrap_or_default();
        match field.as_str() {
            "messages" => match serde_json::from_value(change.value) {
                Ok(value) => InstagramChange::Messages(value),
                Err(e) => InstagramChange::Unrecognized(format!("messages: {e}")),
            },
            "comments" => match serde_json::from_value(change.value) {
                Ok(value) => InstagramChange::Comments(value),
                Err(e) => InstagramChange::Unrecognized(format!("comments: {e}")),
            },
            "mentions" => InstagramChange::Mentions(change.value),
            _ => InstagramChange::Unrecognized(format!("field {field:?}")),
        }
    }

    pub fn into_event(self) -> Option<CanonicalEvent> {
        match self {
            InstagramChange::Messages(value) => {
                let (Some(sender_id), Some(recipient_id)) = (value.from_id, value.to_id) else {
                    return drop_item("instagram message without from_id/to_id");
                };
                Some(CanonicalEvent::DirectMessage(DirectMessage {
                    platform: Platform::Instagram,
                    sender_id,
                    recipient_id,
                    text: value.text,
                    attachment_count: value.attachments.map(|a| a.len()),
                }))
            }
            InstagramChange::Comments(value) => {
                let (Some(author_id), Some(post_id)) = (value.from_id, value.media_id) else {
                    return drop_item("instagram comment without from_id/media_id");
                };
                Some(CanonicalEvent::Comment(Comment {
                    platform: Platform::Instagram,
                    author_id,
                    post_id,
                    comment_id: value.id,
                    text: value.text.unwrap_or_default(),
                }))
            }
            InstagramChange::Mentions(raw_data) => Some(CanonicalEvent::Mention(Mention {
                platform: Platform::Instagram,
                raw_data,
            })),
            InstagramChange::Unrecognized(reason) => drop_item(&reason),
        }
    }
}

/// `messaging[]` item of a page entry
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Message {
        sender_id: String,
        recipient_id: String,
        message: PageMessage,
    },
    Postback(PagePostback),
    Unrecognized(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PageMessage {
    pub text: Option<String>,
    pub attachments: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PagePostback {
    pub payload: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Party {
    #[serde(deserialize_with = "lenient_id")]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMessagingEvent {
    sender: Option<Party>,
    recipient: Option<Party>,
    message: Option<PageMessage>,
    postback: Option<PagePostback>,
}

impl PageEvent {
    pub fn decode(item: Value) -> Self {
        let event: RawMessagingEvent = match serde_json::from_value(item) {
            Ok(event) => event,
            Err(e) => return PageEvent::Unrecognized(format!("messaging event: {e}")),
        };

        if let Some(message) = event.message {
            let sender_id = event.sender.and_then(|p| p.id);
            let recipient_id = event.recipient.and_then(|p| p.id);
            return match (sender_id, recipient_id) {
                (Some(sender_id), Some(recipient_id)) => PageEvent::Message {
                    sender_id,
                    recipient_id,
                    message,
                },
                _ => PageEvent::Unrecognized("message without sender/recipient id".into()),
            };
        }

        match event.postback {
            Some(postback) => PageEvent::Postback(postback),
            None => PageEvent::Unrecognized("neither message nor postback".into()),
        }
    }

    pub fn into_event(self) -> Option<CanonicalEvent> {
        match self {
            PageEvent::Message {
                sender_id,
                recipient_id,
                message,
            } => Some(CanonicalEvent::DirectMessage(DirectMessage {
                platform: Platform::Facebook,
                sender_id,
                recipient_id,
                text: message.text,
                attachment_count: message.attachments.map(|a| a.len()),
            })),
            PageEvent::Postback(postback) => Some(CanonicalEvent::Postback(Postback {
                platform: Platform::Facebook,
                payload: postback.payload,
            })),
            PageEvent::Unrecognized(reason) => drop_item(&reason),
        }
    }
}

/// Lazily normalize a payload into canonical events.
///
/// The returned iterator is consumed once; unknown objects yield nothing.
pub fn normalize(payload: RawPayload) -> impl Iterator<Item = CanonicalEvent> {
    let kind = payload.object_kind();
    let entries = match kind {
        ObjectKind::Unknown => {
            debug!(object = %payload.object_label(), "Ignoring webhook with unknown object type");
            Vec::new()
        }
        _ => array_items(payload.entry, "entry"),
    };

    entries
        .into_iter()
        .flat_map(move |entry| entry_items(kind, entry))
        .filter_map(move |item| match kind {
            ObjectKind::Instagram => InstagramChange::decode(item).into_event(),
            ObjectKind::Page => PageEvent::decode(item).into_event(),
            ObjectKind::Unknown => None,
        })
}

/// The `changes` or `messaging` items of one entry, depending on the branch
fn entry_items(kind: ObjectKind, entry: Value) -> Vec<Value> {
    let key = match kind {
        ObjectKind::Instagram => "changes",
        ObjectKind::Page => "messaging",
        ObjectKind::Unknown => return Vec::new(),
    };
    match entry {
        Value::Object(mut map) => array_items(map.remove(key).unwrap_or(Value::Null), key),
        Value::Null => Vec::new(),
        other => {
            drop_item(&format!("entry is {}", json_type(&other)));
            Vec::new()
        }
    }
}

fn array_items(value: Value, name: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => {
            debug!(name, found = json_type(&other), "Expected an array, treating as empty");
            Vec::new()
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn drop_item(reason: &str) -> Option<CanonicalEvent> {
    debug!(reason, "Dropping unrecognized webhook item");
    metrics::EVENTS_DROPPED_TOTAL.inc();
    None
}

/// Graph ids arrive as strings, but some test tools send bare numbers.
/// Any other type is treated as absent.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
