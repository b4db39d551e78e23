//! Prometheus metrics for the points reset.
//!
//! Metrics are always recorded through the `metrics` facade. They only leave
//! the process if [`MetricsServer::start`] installed the Prometheus exporter;
//! otherwise the calls are no-ops.
//!
//! # Example
//!
//! ```rust,no_run
//! use pointkeeper_points::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use crate::reset::{ResetError, ResetOutcome};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    started: bool,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            started: false,
        }
    }

    /// Address the exporter listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether [`start`](Self::start) installed the exporter.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Register metric descriptions and start the HTTP exporter.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed is logged and tolerated.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install() {
            Ok(()) => {
                self.started = true;
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            },
            Err(BuildError::FailedToSetGlobalRecorder(_)) => {
                tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                Ok(())
            },
            Err(e) => Err(MetricsError::Install(e.to_string())),
        }
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "points_reset_total",
        "Reset attempts that completed, labelled by outcome"
    );
    describe_counter!(
        "points_reset_errors_total",
        "Reset attempts that failed, labelled by error kind"
    );
    describe_histogram!(
        "points_reset_duration_seconds",
        "Time taken by one reset attempt, including store round trips"
    );
    describe_histogram!(
        "document_store_duration_seconds",
        "Time taken by one document store operation"
    );
}

/// Points reset metrics recorder.
pub struct ResetMetrics;

impl ResetMetrics {
    /// Record the result of one reset attempt.
    pub fn record(result: &Result<ResetOutcome, ResetError>, duration: Duration) {
        match result {
            Ok(outcome) => {
                counter!("points_reset_total", "outcome" => outcome.label()).increment(1);
            },
            Err(error) => {
                counter!("points_reset_errors_total", "kind" => error.label()).increment(1);
            },
        }
        histogram!("points_reset_duration_seconds").record(duration.as_secs_f64());
    }
}
