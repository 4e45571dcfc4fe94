//! Instagram direct messaging endpoints

use crate::graph::client::GraphClient;
use crate::graph::error::GraphError;
use crate::graph::Page;
use serde::{Deserialize, Serialize};
use serde_json::json;

const CONVERSATION_FIELDS: &str = "id,participants,last_message,unread_count,updated_time";
const MESSAGE_FIELDS: &str = "id,from,to,message,timestamp,attachment_type,attachment_url";

/// Messages fetched per conversation by [`MessengerClient::list_direct_messages`]
const RECENT_MESSAGES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub username: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participants: Option<Page<Participant>>,
    pub last_message: Option<String>,
    pub unread_count: Option<u64>,
    pub updated_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from: Option<Participant>,
    pub message: Option<String>,
    pub timestamp: Option<String>,
    pub attachment_type: Option<String>,
    pub attachment_url: Option<String>,
}

/// Send API response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentMessage {
    pub recipient_id: Option<String>,
    pub message_id: Option<String>,
}

/// A conversation with its most recent messages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thread {
    pub conversation: Conversation,
    pub recent_messages: Vec<Message>,
}

#[derive(Deserialize)]
struct ConversationParticipants {
    participants: Page<Participant>,
}

/// Client for the business account's conversations
#[derive(Debug, Clone)]
pub struct MessengerClient {
    graph: GraphClient,
    account_id: String,
}

impl MessengerClient {
    pub fn new(graph: GraphClient, account_id: impl Into<String>) -> Self {
        Self {
            graph,
            account_id: account_id.into(),
        }
    }

    pub async fn conversations(&self, limit: u32) -> Result<Page<Conversation>, GraphError> {
        self.graph
            .get(
                "conversations",
                &format!("{}/conversations", self.account_id),
                &[
                    ("fields", CONVERSATION_FIELDS.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await
    }

    pub async fn messages(&self, conversation_id: &str, limit: u32) -> Result<Page<Message>, GraphError> {
        self.graph
            .get(
                "messages",
                &format!("{}/messages", conversation_id),
                &[
                    ("fields", MESSAGE_FIELDS.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await
    }

    pub async fn send_message(&self, recipient_id: &str, text: &str) -> Result<SentMessage, GraphError> {
        let body = json!({
            "recipient": { "id": recipient_id },
            "message": { "text": text },
        });
        self.graph
            .post_json("send_message", &format!("{}/messages", self.account_id), &body)
            .await
    }

    /// Reply in a conversation to the first participant that is not us
    pub async fn reply_to_message(&self, conversation_id: &str, text: &str) -> Result<SentMessage, GraphError> {
        let conversation: ConversationParticipants = self
            .graph
            .get(
                "conversation_participants",
                conversation_id,
                &[("fields", "participants".to_string())],
            )
            .await?;

        let recipient = conversation
            .participants
            .data
            .into_iter()
            .find(|p| p.id != self.account_id)
            .ok_or_else(|| GraphError::RecipientNotFound(conversation_id.to_string()))?;

        self.send_message(&recipient.id, text).await
    }

    /// Conversations with their last few messages each
    pub async fn list_direct_messages(&self, limit: u32) -> Result<Vec<Thread>, GraphError> {
        let conversations = self.conversations(limit).await?;
        let mut threads = Vec::with_capacity(conversations.data.len());

        for conversation in conversations.data {
            let recent = self.messages(&conversation.id, RECENT_MESSAGES).await?;
            threads.push(Thread {
                conversation,
                recent_messages: recent.data,
            });
        }

        Ok(threads)
    }
}
