//! Graph API transport
//!
//! Thin wrapper over `reqwest` that prefixes the versioned base URL, attaches
//! the access token to every call and turns the Graph error envelope
//! (`{"error": {"message": .., "code": ..}}`) into [`GraphError::Api`].

use crate::config::GraphConfig;
use crate::graph::error::GraphError;
use crate::metrics;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    code: Option<i64>,
}

/// Authenticated Graph API client
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl GraphClient {
    pub fn new(config: &GraphConfig, access_token: impl Into<String>) -> Result<Self, GraphError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/{}",
                config.base_url.trim_end_matches('/'),
                config.api_version.trim_matches('/')
            ),
            access_token: access_token.into(),
        })
    }

    /// Versioned base URL, e.g. `https://graph.facebook.com/v18.0`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.http
            .request(method, url)
            .query(&[("access_token", self.access_token.as_str())])
    }

    /// GET `path` with extra query parameters
    pub async fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, GraphError> {
        let builder = self.request(Method::GET, path).query(params);
        self.execute(operation, builder).await
    }

    /// POST `path` with parameters in the query string and no body
    pub async fn post_params<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, GraphError> {
        let builder = self.request(Method::POST, path).query(params);
        self.execute(operation, builder).await
    }

    /// POST `path` with a JSON body
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<T, GraphError> {
        let builder = self.request(Method::POST, path).json(body);
        self.execute(operation, builder).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> Result<T, GraphError> {
        debug!(operation, "Graph API request");
        let result = match builder.send().await {
            Ok(response) => decode(response).await,
            Err(e) => Err(GraphError::Http(e)),
        };

        let status = match &result {
            Ok(_) => "ok".to_string(),
            Err(e) => e.status_label(),
        };
        metrics::GRAPH_REQUESTS_TOTAL
            .with_label_values(&[operation, status.as_str()])
            .inc();

        result
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GraphError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(match serde_json::from_slice::<ErrorEnvelope>(&body) {
            Ok(envelope) => GraphError::Api {
                status: status.as_u16(),
                message: envelope.error.message,
                code: envelope.error.code,
            },
            Err(_) => GraphError::Api {
                status: status.as_u16(),
                message: format!("Graph API returned {}", status),
                code: None,
            },
        });
    }

    serde_json::from_slice(&body).map_err(|e| GraphError::UnexpectedResponse(e.to_string()))
}
