// Webhook receiver
//
// Handles:
// - Endpoint ownership handshake (GET /webhook)
// - Payload signature checks with the app secret
// - Normalizing `instagram` and `page` payloads into canonical events
// - Fan-out to registered handlers with per-handler failure isolation

pub mod dispatch;
pub mod error;
pub mod event;
pub mod handlers;
pub mod handshake;
pub mod normalize;
pub mod server;
pub mod signature;

#[cfg(test)]
mod proptests;

pub use dispatch::{DispatchReport, Dispatcher, EventHandler, FnHandler, HandlerOutcome};
pub use error::WebhookError;
pub use event::{CanonicalEvent, Category, Comment, DirectMessage, Mention, Platform, Postback};
pub use server::{shutdown_signal, WebhookServer, ACK_BODY, MAX_BODY_BYTES};
