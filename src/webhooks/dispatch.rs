//! Event Dispatcher
//!
//! Holds the ordered handler lists per [`Category`] and fans each event out to
//! every handler registered for its category.
//!
//! # Failure containment
//!
//! Handlers run one after another in registration order. An `Err`, a panic, or
//! (when a timeout is configured) an overrun is logged and counted, and the next
//! handler still runs. Nothing a handler does reaches the HTTP response: the
//! endpoint hands events to [`Dispatcher::dispatch_all`], which runs on its own
//! task, and drops the join handle.
//!
//! Duplicate registrations are kept and fire once per registration.

use crate::metrics;
use crate::webhooks::event::{CanonicalEvent, Category};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// A consumer of canonical events
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &str;

    async fn handle(&self, event: &CanonicalEvent) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into an [`EventHandler`]
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(CanonicalEvent) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &CanonicalEvent) -> anyhow::Result<()> {
        (self.f)(event.clone()).await
    }
}

/// How a single handler invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Succeeded,
    Failed(String),
    Panicked(String),
    TimedOut,
}

impl HandlerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, HandlerOutcome::Succeeded)
    }

    fn status_label(&self) -> &'static str {
        match self {
            HandlerOutcome::Succeeded => "ok",
            HandlerOutcome::Failed(_) => "error",
            HandlerOutcome::Panicked(_) => "panic",
            HandlerOutcome::TimedOut => "timeout",
        }
    }
}

/// Result of dispatching one event
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub event_kind: &'static str,
    pub category: Option<Category>,
    /// (handler name, outcome) in invocation order
    pub outcomes: Vec<(String, HandlerOutcome)>,
}

impl DispatchReport {
    pub fn invoked(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| !o.is_success()).count()
    }
}

type HandlerList = RwLock<Vec<Arc<dyn EventHandler>>>;

#[derive(Default)]
struct Registry {
    message: HandlerList,
    comment: HandlerList,
}

impl Registry {
    fn list(&self, category: Category) -> &HandlerList {
        match category {
            Category::Message => &self.message,
            Category::Comment => &self.comment,
        }
    }
}

/// Fan-out dispatcher with per-handler failure isolation
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    handler_timeout: Option<Duration>,
}

impl Dispatcher {
    /// Create a dispatcher; `handler_timeout` bounds each handler invocation
    pub fn new(handler_timeout: Option<Duration>) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            handler_timeout,
        }
    }

    /// Append a handler to a category's list
    pub async fn register(&self, category: Category, handler: Arc<dyn EventHandler>) {
        debug!(category = %category, handler = handler.name(), "Registering webhook handler");
        self.registry.list(category).write().await.push(handler);
    }

    /// Register an async closure for direct messages
    pub async fn on_message<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(CanonicalEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(Category::Message, Arc::new(FnHandler::new(name, f)))
            .await;
    }

    /// Register an async closure for comments
    pub async fn on_comment<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(CanonicalEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(Category::Comment, Arc::new(FnHandler::new(name, f)))
            .await;
    }

    pub async fn handler_count(&self, category: Category) -> usize {
        self.registry.list(category).read().await.len()
    }

    /// Run every handler for the event's category and wait for them.
    ///
    /// Never fails; per-handler outcomes are returned in the report.
    pub async fn run(&self, event: &CanonicalEvent) -> DispatchReport {
        let Some(category) = event.category() else {
            debug!(kind = event.kind(), platform = %event.platform(), "No handler category for event");
            return DispatchReport {
                event_kind: event.kind(),
                category: None,
                outcomes: Vec::new(),
            };
        };

        // Snapshot so registration never waits on slow handlers
        let handlers: Vec<Arc<dyn EventHandler>> =
            self.registry.list(category).read().await.iter().cloned().collect();

        let mut outcomes = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let outcome = self.invoke(handler.as_ref(), event, category).await;
            outcomes.push((handler.name().to_string(), outcome));
        }

        DispatchReport {
            event_kind: event.kind(),
            category: Some(category),
            outcomes,
        }
    }

    /// Dispatch one event on a background task
    pub fn dispatch(&self, event: CanonicalEvent) -> JoinHandle<DispatchReport> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.run(&event).await })
    }

    /// Dispatch a batch on one background task, preserving arrival order
    pub fn dispatch_all(&self, events: Vec<CanonicalEvent>) -> JoinHandle<Vec<DispatchReport>> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let mut reports = Vec::with_capacity(events.len());
            for event in &events {
                reports.push(dispatcher.run(event).await);
            }
            reports
        })
    }

    async fn invoke(
        &self,
        handler: &dyn EventHandler,
        event: &CanonicalEvent,
        category: Category,
    ) -> HandlerOutcome {
        let started = Instant::now();
        let guarded = AssertUnwindSafe(handler.handle(event)).catch_unwind();

        let result = match self.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, guarded).await.ok(),
            None => Some(guarded.await),
        };

        let outcome = match result {
            Some(Ok(Ok(()))) => HandlerOutcome::Succeeded,
            Some(Ok(Err(e))) => HandlerOutcome::Failed(format!("{e:#}")),
            Some(Err(panic)) => HandlerOutcome::Panicked(panic_message(panic.as_ref())),
            None => HandlerOutcome::TimedOut,
        };

        let elapsed = started.elapsed();
        metrics::HANDLER_DURATION_SECONDS
            .with_label_values(&[category.as_str()])
            .observe(elapsed.as_secs_f64());
        metrics::HANDLER_INVOCATIONS_TOTAL
            .with_label_values(&[category.as_str(), outcome.status_label()])
            .inc();

        match &outcome {
            HandlerOutcome::Succeeded => {
                debug!(handler = handler.name(), category = %category, elapsed_ms = elapsed.as_millis() as u64, "Handler completed");
            }
            HandlerOutcome::Failed(reason) => {
                error!(handler = handler.name(), category = %category, error = %reason, "Error in webhook handler");
            }
            HandlerOutcome::Panicked(reason) => {
                error!(handler = handler.name(), category = %category, panic = %reason, "Webhook handler panicked");
            }
            HandlerOutcome::TimedOut => {
                warn!(handler = handler.name(), category = %category, timeout_ms = elapsed.as_millis() as u64, "Webhook handler timed out");
            }
        }

        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
