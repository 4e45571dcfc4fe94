//! Webhook Endpoint
//!
//! The axum side of the receiver. `WebhookServer` owns the one server context
//! (settings, signature authenticator, dispatcher) and builds the router:
//!
//! - `GET  /webhook`  handshake, 200 with the challenge or 403
//! - `POST /webhook`  signature gate, normalize, dispatch, 200 `EVENT_RECEIVED`
//! - other verbs on `/webhook` answer 405 (HEAD is served by the GET route)
//! - `GET  /health`   liveness
//! - `GET  /metrics`  Prometheus text, only when metrics are enabled
//!
//! Dispatch runs on a detached task, so handler latency never reaches the
//! acknowledgment.

use crate::config::WebhookSettings;
use crate::metrics;
use crate::webhooks::dispatch::{Dispatcher, EventHandler};
use crate::webhooks::error::WebhookError;
use crate::webhooks::event::{CanonicalEvent, Category};
use crate::webhooks::handshake::{verify_handshake, HandshakeParams};
use crate::webhooks::normalize::{normalize, RawPayload};
use crate::webhooks::signature::{signature_header, Authentication, SignatureAuthenticator};
use anyhow::{Context, Result};
use axum::{
    extract::{
        rejection::{BytesRejection, QueryRejection},
        DefaultBodyLimit, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Acknowledgment body for accepted deliveries
pub const ACK_BODY: &str = "EVENT_RECEIVED";

/// Largest accepted POST body; bigger deliveries take the 500 path
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// State shared by every request
pub struct ServerContext {
    settings: WebhookSettings,
    authenticator: Option<SignatureAuthenticator>,
    dispatcher: Dispatcher,
}

impl ServerContext {
    fn new(settings: WebhookSettings) -> Self {
        let authenticator = settings
            .secret
            .as_ref()
            .map(|secret| SignatureAuthenticator::new(secret.clone(), settings.require_signature));
        let dispatcher = Dispatcher::new(settings.handler_timeout);
        Self {
            settings,
            authenticator,
            dispatcher,
        }
    }
}

/// The webhook receiver
pub struct WebhookServer {
    context: Arc<ServerContext>,
}

impl WebhookServer {
    pub fn new(settings: WebhookSettings) -> Self {
        if settings.secret.is_none() {
            warn!("No webhook secret configured, payload signatures will not be verified");
        }
        Self {
            context: Arc::new(ServerContext::new(settings)),
        }
    }

    pub fn settings(&self) -> &WebhookSettings {
        &self.context.settings
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.context.dispatcher
    }

    pub async fn register(&self, category: Category, handler: Arc<dyn EventHandler>) {
        self.context.dispatcher.register(category, handler).await;
    }

    /// Register an async closure for direct messages
    pub async fn on_message<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(CanonicalEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.context.dispatcher.on_message(name, f).await;
    }

    /// Register an async closure for comments
    pub async fn on_comment<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(CanonicalEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.context.dispatcher.on_comment(name, f).await;
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route(
                "/webhook",
                get(verify_webhook)
                    .post(receive_webhook)
                    .fallback(method_not_allowed)
                    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
            )
            .route("/health", get(health_handler));

        if self.context.settings.metrics_enabled {
            if let Err(e) = metrics::init() {
                warn!("Failed to register metrics: {}", e);
            }
            router = router.route("/metrics", get(metrics_handler));
        }

        router
            .layer(TraceLayer::new_for_http())
            .with_state(self.context.clone())
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight requests
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr().context("Failed to read listener address")?;
        let app = self.router();

        info!("🚀 Webhook server running on port {}", addr.port());
        info!("📍 Webhook URL: http://localhost:{}/webhook", addr.port());
        info!("🏥 Health check: http://localhost:{}/health", addr.port());

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Webhook server error")?;

        info!("Webhook server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal, starting graceful shutdown"),
        _ = terminate => info!("Received terminate signal, starting graceful shutdown"),
    }
}

/// GET /webhook
async fn verify_webhook(
    State(ctx): State<Arc<ServerContext>>,
    query: Result<Query<HandshakeParams>, QueryRejection>,
) -> Result<String, WebhookError> {
    // A query that fails to decode is just an incomplete handshake
    let params = query.map(|Query(p)| p).unwrap_or_default();

    match verify_handshake(&params, &ctx.settings.verify_token) {
        Ok(challenge) => {
            info!("✅ Webhook verified successfully");
            record_request("GET", "verified");
            Ok(challenge)
        }
        Err(e) => {
            warn!(mode = ?params.mode, "❌ Webhook verification failed");
            record_request("GET", "rejected");
            Err(e)
        }
    }
}

/// POST /webhook
async fn receive_webhook(
    State(ctx): State<Arc<ServerContext>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<&'static str, WebhookError> {
    let delivery_id = Uuid::new_v4();

    let body = body.map_err(|e| {
        error!(%delivery_id, error = %e, "Failed to read webhook body");
        record_request("POST", "malformed");
        WebhookError::MalformedPayload(e.body_text())
    })?;

    if let Some(authenticator) = &ctx.authenticator {
        match authenticator.authenticate(&body, signature_header(&headers)) {
            Ok(Authentication::Verified(algorithm)) => {
                debug!(%delivery_id, algorithm = algorithm.prefix(), "Signature verified");
            }
            Ok(Authentication::Unsigned) => {
                warn!(%delivery_id, "No signature found in webhook request");
            }
            Err(e) => {
                warn!(%delivery_id, error = %e, "Rejecting webhook delivery");
                metrics::SIGNATURE_FAILURES_TOTAL.inc();
                record_request("POST", "rejected");
                return Err(e);
            }
        }
    }

    let payload = RawPayload::from_slice(&body).map_err(|e| {
        error!(%delivery_id, error = %e, "Error processing webhook");
        record_request("POST", "malformed");
        e
    })?;
    let object = payload.object_label();

    let events: Vec<CanonicalEvent> =
        std::panic::catch_unwind(AssertUnwindSafe(|| normalize(payload).collect::<Vec<_>>())).map_err(|_| {
            error!(%delivery_id, %object, "Normalization failed unexpectedly");
            record_request("POST", "malformed");
            WebhookError::MalformedPayload("normalization failed".to_string())
        })?;

    info!(%delivery_id, %object, events = events.len(), "📨 Webhook event received");
    for event in &events {
        metrics::EVENTS_NORMALIZED_TOTAL
            .with_label_values(&[event.kind()])
            .inc();
    }

    if !events.is_empty() {
        // Detached; outcomes are logged by the dispatcher
        drop(ctx.dispatcher.dispatch_all(events));
    }

    record_request("POST", "accepted");
    Ok(ACK_BODY)
}

async fn method_not_allowed() -> WebhookError {
    record_request("OTHER", "method_not_allowed");
    WebhookError::MethodNotAllowed
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Webhook server is running",
    }))
}

/// Metrics endpoint handler
async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

fn record_request(method: &str, outcome: &str) {
    metrics::WEBHOOK_REQUESTS_TOTAL
        .with_label_values(&[method, outcome])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let server = WebhookServer::new(WebhookSettings::default());
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(server.router(), request).await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_handshake_uses_configured_token() {
        let settings = WebhookSettings {
            verify_token: "custom".to_string(),
            ..Default::default()
        };
        let server = WebhookServer::new(settings);

        let ok = Request::get("/webhook?hub.mode=subscribe&hub.verify_token=custom&hub.challenge=42")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(server.router(), ok).await, (StatusCode::OK, "42".to_string()));

        let default_token = Request::get(
            "/webhook?hub.mode=subscribe&hub.verify_token=meta_webhook_secret_2026&hub.challenge=42",
        )
        .body(Body::empty())
        .unwrap();
        let (status, _) = send(server.router(), default_token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_other_verbs_rejected() {
        let server = WebhookServer::new(WebhookSettings::default());
        for method in [Method::PUT, Method::DELETE, Method::PATCH] {
            let request = Request::builder()
                .method(method)
                .uri("/webhook")
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(server.router(), request).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(body, r#"{"error":"Method not allowed"}"#);
        }
    }

    #[tokio::test]
    async fn test_metrics_route_only_when_enabled() {
        let server = WebhookServer::new(WebhookSettings::default());
        let request = Request::get("/metrics").body(Body::empty()).unwrap();
        let (status, _) = send(server.router(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let server = WebhookServer::new(WebhookSettings {
            metrics_enabled: true,
            ..Default::default()
        });
        let request = Request::get("/metrics").body(Body::empty()).unwrap();
        let (status, _) = send(server.router(), request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let server = WebhookServer::new(WebhookSettings::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(server.serve(listener, async {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
