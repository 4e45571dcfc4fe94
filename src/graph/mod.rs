//! Graph API client
//!
//! REST wrappers for the Instagram business account: publishing, comments,
//! profile and direct messages.

pub mod client;
pub mod error;
pub mod instagram;
pub mod messenger;

pub use client::GraphClient;
pub use error::GraphError;
pub use instagram::InstagramClient;
pub use messenger::MessengerClient;

use crate::config::Config;
use serde::{Deserialize, Serialize};

/// A `{"data": [...]}` collection page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Build both clients from a configuration with validated credentials
pub fn clients_from_config(config: &Config) -> Result<(InstagramClient, MessengerClient), GraphError> {
    let graph = GraphClient::new(&config.graph, config.credentials.access_token.clone())?;
    let account_id = config.credentials.business_account_id.clone();
    Ok((
        InstagramClient::new(graph.clone(), account_id.clone()),
        MessengerClient::new(graph, account_id),
    ))
}
