//! # HTTP Server
//!
//! Serves the access routes to the tool pages.

pub mod access_routes;

pub use access_routes::{access_routes, session_from_headers, AccessState};

use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::access::FeatureAccessGate;
use crate::config::GateConfig;
use crate::store::StoreError;

/// Server startup and runtime errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to open usage store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Gate HTTP server
pub struct HttpServer {
    config: GateConfig,
}

impl HttpServer {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Application router with tracing and CORS layers
    pub fn router(gate: FeatureAccessGate) -> Router {
        access_routes(Arc::new(AccessState::new(gate)))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve until Ctrl-C
    pub async fn start(&self) -> Result<(), ServerError> {
        let gate = self.config.build_gate().await?;
        let address = self.config.bind_address();

        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;

        tracing::info!(
            %address,
            window = %gate.policy().window(),
            backend = ?self.config.store.backend,
            "medgate listening"
        );

        axum::serve(listener, Self::router(gate))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("medgate stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
