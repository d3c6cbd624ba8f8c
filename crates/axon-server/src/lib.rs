//! Server assembly for the Axon gateway

mod health;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axon_config::Config;
use axon_gateway::adapter::{Adapter, build_adapter};
use axon_gateway::{Dispatcher, GatewayState, gateway_router};
use axon_metrics::MetricsState;
use axon_routing::{LoadTracker, ProviderRegistry};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Assembled server with all routes and background tasks
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    background: Vec<JoinHandle<()>>,
}

impl Server {
    /// Build the server from configuration
    ///
    /// Spawns the metrics aggregator and resource sampler, so this must
    /// run inside a tokio runtime. Both stop when `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if any provider adapter fails to initialize
    pub fn new(config: &Config, shutdown: &CancellationToken) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let registry = Arc::new(ProviderRegistry::from_config(config.providers.iter()));
        let tracker = Arc::new(LoadTracker::new(Arc::clone(&registry)));
        let router = axon_routing::Router::new(
            Arc::clone(&registry),
            Arc::clone(&tracker),
            config.routing.clone(),
        );

        let mut adapters: HashMap<String, Arc<dyn Adapter>> = HashMap::new();
        for (name, provider_config) in &config.providers {
            adapters.insert(name.clone(), build_adapter(name, provider_config)?);
        }
        tracing::info!(providers = adapters.len(), "providers initialized");

        let metrics = Arc::new(MetricsState::new(config.alerts.clone()));
        let (metrics_handle, aggregator) =
            axon_metrics::spawn(Arc::clone(&metrics), shutdown.clone());
        let sampler =
            axon_metrics::spawn_resource_sampler(metrics_handle.clone(), shutdown.clone());

        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&tracker),
            router,
            adapters,
            metrics_handle,
        );

        let state = GatewayState::new(dispatcher, metrics);

        let mut app = Router::new();
        if config.server.health.enabled {
            app = app.route(
                &config.server.health.path,
                axum::routing::get(health::health_handler).with_state(Arc::clone(&registry)),
            );
        }
        app = app.merge(gateway_router(state));

        Ok(Self {
            router: app,
            listen_address,
            background: vec![aggregator, sampler],
        })
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered, then waits for
    /// the background tasks to drain.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        let graceful_shutdown = shutdown.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                graceful_shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        shutdown.cancel();
        for task in self.background {
            let _ = task.await;
        }

        Ok(())
    }
}
