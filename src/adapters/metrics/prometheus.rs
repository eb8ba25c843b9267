//! Prometheus Metrics Registry - Client Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards.
//! Covers contract action outcomes and latency, price updates per
//! source, stale oracle updates and oracle connectivity.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

/// Centralized Prometheus metrics for the order client.
///
/// All metrics follow the naming convention `perp_client_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Contract actions by kind and outcome.
    pub contract_actions: IntCounterVec,
    /// Send-to-receipt latency in milliseconds, by action.
    pub action_latency_ms: HistogramVec,
    /// Draft submissions rejected because one was already in flight.
    pub submissions_skipped: IntCounter,
    /// Price table writes by source (`oracle`, `ticker`).
    pub price_updates: IntCounterVec,
    /// Oracle updates discarded by the staleness window.
    pub stale_oracle_updates: IntCounter,
    /// Failed fetches or subscriptions by source.
    pub feed_errors: IntCounterVec,
    /// Oracle subscription status (1 = connected, 0 = disconnected).
    pub oracle_connected: Gauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let contract_actions = IntCounterVec::new(
            Opts::new(
                "perp_client_contract_actions_total",
                "Contract actions by kind and terminal outcome",
            ),
            &["action", "outcome"],
        )?;

        let action_latency_ms = HistogramVec::new(
            HistogramOpts::new(
                "perp_client_action_latency_ms",
                "Latency from send to mined receipt in milliseconds",
            )
            .buckets(vec![
                250.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 30000.0, 60000.0,
            ]),
            &["action"],
        )?;

        let submissions_skipped = IntCounter::new(
            "perp_client_submissions_skipped_total",
            "Submissions ignored while another was in flight",
        )?;

        let price_updates = IntCounterVec::new(
            Opts::new(
                "perp_client_price_updates_total",
                "Price table writes by source",
            ),
            &["source"],
        )?;

        let stale_oracle_updates = IntCounter::new(
            "perp_client_stale_oracle_updates_total",
            "Oracle updates outside the staleness window",
        )?;

        let feed_errors = IntCounterVec::new(
            Opts::new(
                "perp_client_feed_errors_total",
                "Failed ticker fetches and oracle subscriptions",
            ),
            &["source"],
        )?;

        let oracle_connected = Gauge::new(
            "perp_client_oracle_connected",
            "Oracle subscription status (1=connected, 0=disconnected)",
        )?;

        registry.register(Box::new(contract_actions.clone()))?;
        registry.register(Box::new(action_latency_ms.clone()))?;
        registry.register(Box::new(submissions_skipped.clone()))?;
        registry.register(Box::new(price_updates.clone()))?;
        registry.register(Box::new(stale_oracle_updates.clone()))?;
        registry.register(Box::new(feed_errors.clone()))?;
        registry.register(Box::new(oracle_connected.clone()))?;

        Ok(Self {
            registry,
            contract_actions,
            action_latency_ms,
            submissions_skipped,
            price_updates,
            stale_oracle_updates,
            feed_errors,
            oracle_connected,
        })
    }

    /// Record the terminal outcome of a contract action.
    pub fn record_action(&self, action: &str, outcome: &str, latency_ms: f64) {
        self.contract_actions
            .with_label_values(&[action, outcome])
            .inc();
        self.action_latency_ms
            .with_label_values(&[action])
            .observe(latency_ms);
    }

    /// Encode every registered metric in the text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output is not UTF-8")
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move {
                    match metrics.render() {
                        Ok(body) => (StatusCode::OK, body),
                        Err(e) => {
                            warn!(error = %e, "Metrics render failed");
                            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
                        }
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_action() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.record_action("submit_order", "confirmed", 1200.0);
        metrics.price_updates.with_label_values(&["oracle"]).inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("perp_client_contract_actions_total"));
        assert!(text.contains("action=\"submit_order\""));
        assert!(text.contains("perp_client_price_updates_total"));
    }
}
