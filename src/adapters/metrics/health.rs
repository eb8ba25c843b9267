//! Health Check Server - Liveness and Readiness Probes
//!
//! Exposes /live and /ready endpoints via axum 0.7 for Docker
//! health checks and monitoring. Readiness requires loaded market
//! metadata and an open oracle subscription.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::usecases::app_state::AppState;

/// Axum-based health check HTTP server.
///
/// Serves liveness (/live) and readiness (/ready) endpoints for
/// Docker health checks and orchestrator probes.
pub struct HealthServer {
    /// Shared application state probed by /ready.
    state: Arc<AppState>,
    /// Bind port (default 8080 from config).
    port: u16,
}

impl HealthServer {
    /// Create a new health server.
    pub fn new(state: Arc<AppState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Build the probe router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .with_state(Arc::clone(&self.state))
    }

    /// Run the health check server until shutdown.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = self.router();

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 once metadata is loaded and the oracle is open.
    async fn readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
        if is_ready(&state).await {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}

/// Whether the client can serve price-dependent orders.
pub async fn is_ready(state: &AppState) -> bool {
    state.is_oracle_connected() && !state.catalog().await.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{AssetSpec, Market, MarketCatalog};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_ready_requires_catalog_and_oracle() {
        let state = AppState::default();
        assert!(!is_ready(&state).await);

        state.set_oracle_connected(true);
        assert!(!is_ready(&state).await);

        state
            .set_catalog(MarketCatalog::new(
                vec![Market {
                    id: "BTC-USD".into(),
                    oracle_feed: "ff".into(),
                    fee_bps: 10,
                    max_leverage: dec!(50),
                }],
                vec![AssetSpec::native_eth()],
            ))
            .await;
        assert!(is_ready(&state).await);
    }
}
