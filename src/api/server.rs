//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::routes;
use crate::config::Config;
use crate::pipeline::PipelineOrchestrator;
use crate::tasks::TaskRegistry;
use crate::Result;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    /// Service configuration
    pub config: Arc<Config>,
    /// Task registry shared with the orchestrator
    pub registry: Arc<TaskRegistry>,
    /// Orchestrator that schedules pipeline runs
    pub orchestrator: Arc<PipelineOrchestrator>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<TaskRegistry>,
        orchestrator: Arc<PipelineOrchestrator>,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            config,
            registry,
            orchestrator,
        }
    }
}

/// API server.
pub struct ApiServer {
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    /// Create a new API server over an already-wired application state.
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware and routes.
    fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone());

        if self.state.config.server.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Periodically evict terminal tasks past their TTL so memory stays
    /// bounded even when clients never poll to completion.
    fn spawn_eviction_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(&self.state.registry);
        let ttl_secs = self.state.config.server.task_ttl_secs;
        let ttl = chrono::Duration::seconds(ttl_secs as i64);
        let period = Duration::from_secs((ttl_secs / 4).max(30));
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; nothing can be expired yet.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = interval.tick() => {
                        let evicted = registry.evict_expired(ttl);
                        if evicted > 0 {
                            tracing::debug!(evicted, "Evicted finished tasks");
                        }
                    }
                }
            }
        })
    }

    /// Start the server.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.state.config.server.bind_address, self.state.config.server.port
        )
        .parse()
        .context("Invalid bind address")?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("API server listening on http://{}", addr);

        let sweeper = self.spawn_eviction_sweeper();
        let cancel_token = self.cancel_token.clone();

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await
            .context("Server error");

        sweeper.abort();
        served
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
