//! Built-in webhook handlers
//!
//! What the `webhook` command registers, depending on configuration:
//!
//! | handler                   | category         | enabled by                                   |
//! |---------------------------|------------------|----------------------------------------------|
//! | [`EventLogger`]           | message, comment | always                                       |
//! | [`AutoReplyHandler`]      | message          | `auto_reply_message` (Instagram DMs only)    |
//! | [`CommentLogHandler`]     | comment          | `log_comments`                               |
//! | [`CommentAutoReplyHandler`] | comment        | `auto_reply_comments` + `comment_reply_message` |

use crate::config::WebhookConfig;
use crate::graph::{GraphError, InstagramClient, MessengerClient};
use crate::webhooks::dispatch::EventHandler;
use crate::webhooks::event::{CanonicalEvent, Category, Platform};
use crate::webhooks::server::WebhookServer;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Sends a direct message
#[async_trait]
pub trait DirectMessenger: Send + Sync {
    async fn send_direct_message(&self, recipient_id: &str, text: &str) -> Result<(), GraphError>;
}

/// Replies to a comment
#[async_trait]
pub trait CommentReplier: Send + Sync {
    async fn send_comment_reply(&self, comment_id: &str, text: &str) -> Result<(), GraphError>;
}

#[async_trait]
impl DirectMessenger for MessengerClient {
    async fn send_direct_message(&self, recipient_id: &str, text: &str) -> Result<(), GraphError> {
        self.send_message(recipient_id, text).await.map(|_| ())
    }
}

#[async_trait]
impl CommentReplier for InstagramClient {
    async fn send_comment_reply(&self, comment_id: &str, text: &str) -> Result<(), GraphError> {
        self.reply_to_comment(comment_id, text).await.map(|_| ())
    }
}

/// Logs a one-line summary of every event
pub struct EventLogger;

#[async_trait]
impl EventHandler for EventLogger {
    fn name(&self) -> &str {
        "event_logger"
    }

    async fn handle(&self, event: &CanonicalEvent) -> anyhow::Result<()> {
        match event {
            CanonicalEvent::DirectMessage(m) => info!(
                platform = %m.platform,
                from = %m.sender_id,
                text = m.text.as_deref().unwrap_or("[media]"),
                attachments = m.attachment_count.unwrap_or(0),
                "📩 New message"
            ),
            CanonicalEvent::Comment(c) => info!(
                platform = %c.platform,
                from = %c.author_id,
                post = %c.post_id,
                text = %c.text,
                "💬 New comment"
            ),
            other => debug!(kind = other.kind(), "Event without a handler category"),
        }
        Ok(())
    }
}

/// Answers inbound Instagram direct messages with a fixed text.
///
/// Replies go through the business account's messages edge, which cannot reach
/// page-scoped Messenger ids, so Facebook messages are skipped. Messages sent
/// by the account itself are skipped too.
pub struct AutoReplyHandler {
    messenger: Arc<dyn DirectMessenger>,
    account_id: String,
    message: String,
}

impl AutoReplyHandler {
    pub fn new(
        messenger: Arc<dyn DirectMessenger>,
        account_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            messenger,
            account_id: account_id.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl EventHandler for AutoReplyHandler {
    fn name(&self) -> &str {
        "auto_reply"
    }

    async fn handle(&self, event: &CanonicalEvent) -> anyhow::Result<()> {
        let CanonicalEvent::DirectMessage(message) = event else {
            return Ok(());
        };
        if message.platform != Platform::Instagram {
            debug!(platform = %message.platform, "No auto-reply route for platform, skipping");
            return Ok(());
        }
        if message.sender_id == self.account_id {
            debug!("Message echo from the business account, skipping auto-reply");
            return Ok(());
        }

        self.messenger
            .send_direct_message(&message.sender_id, &self.message)
            .await
            .with_context(|| format!("Failed to auto-reply to {}", message.sender_id))?;
        info!(to = %message.sender_id, "✓ Auto-reply sent");
        Ok(())
    }
}

#[derive(Serialize)]
struct CommentLogLine<'a> {
    timestamp: String,
    from_id: &'a str,
    post_id: &'a str,
    text: &'a str,
}

/// Appends each comment as one JSON line
pub struct CommentLogHandler {
    path: PathBuf,
}

impl CommentLogHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EventHandler for CommentLogHandler {
    fn name(&self) -> &str {
        "comment_log"
    }

    async fn handle(&self, event: &CanonicalEvent) -> anyhow::Result<()> {
        let CanonicalEvent::Comment(comment) = event else {
            return Ok(());
        };

        let line = CommentLogLine {
            timestamp: Utc::now().to_rfc3339(),
            from_id: &comment.author_id,
            post_id: &comment.post_id,
            text: &comment.text,
        };
        let mut json = serde_json::to_string(&line)?;
        json.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open comment log {:?}", self.path))?;
        file.write_all(json.as_bytes())
            .await
            .with_context(|| format!("Failed to write comment log {:?}", self.path))?;
        file.flush().await?;
        Ok(())
    }
}

/// Replies to comments that carry a comment id
pub struct CommentAutoReplyHandler {
    replier: Arc<dyn CommentReplier>,
    message: String,
}

impl CommentAutoReplyHandler {
    pub fn new(replier: Arc<dyn CommentReplier>, message: impl Into<String>) -> Self {
        Self {
            replier,
            message: message.into(),
        }
    }
}

#[async_trait]
impl EventHandler for CommentAutoReplyHandler {
    fn name(&self) -> &str {
        "comment_auto_reply"
    }

    async fn handle(&self, event: &CanonicalEvent) -> anyhow::Result<()> {
        let CanonicalEvent::Comment(comment) = event else {
            return Ok(());
        };
        let Some(comment_id) = comment.comment_id.as_deref() else {
            debug!(post = %comment.post_id, "Comment has no id, skipping reply");
            return Ok(());
        };

        self.replier
            .send_comment_reply(comment_id, &self.message)
            .await
            .with_context(|| format!("Failed to reply to comment {}", comment_id))?;
        info!(comment = %comment_id, "✓ Comment reply sent");
        Ok(())
    }
}

/// Register the built-in handlers the configuration asks for
pub async fn register_builtin_handlers(
    server: &WebhookServer,
    config: &WebhookConfig,
    account_id: &str,
    messenger: Arc<dyn DirectMessenger>,
    replier: Arc<dyn CommentReplier>,
) {
    let logger: Arc<dyn EventHandler> = Arc::new(EventLogger);
    server.register(Category::Message, logger.clone()).await;
    server.register(Category::Comment, logger).await;

    if let Some(message) = config.auto_reply_message.as_deref().filter(|m| !m.is_empty()) {
        info!("🤖 Auto-reply enabled for direct messages");
        server
            .register(Category::Message, Arc::new(AutoReplyHandler::new(messenger, account_id, message)))
            .await;
    }

    if config.log_comments {
        info!(path = ?config.comments_log_path, "📝 Comment logging enabled");
        server
            .register(
                Category::Comment,
                Arc::new(CommentLogHandler::new(config.comments_log_path.clone())),
            )
            .await;
    }

    if config.auto_reply_comments {
        match config.comment_reply_message.as_deref().filter(|m| !m.is_empty()) {
            Some(message) => {
                info!("🤖 Auto-reply enabled for comments");
                server
                    .register(
                        Category::Comment,
                        Arc::new(CommentAutoReplyHandler::new(replier, message)),
                    )
                    .await;
            }
            None => tracing::warn!("auto_reply_comments is set but comment_reply_message is empty"),
        }
    }
}
