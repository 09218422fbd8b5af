//! Prometheus scrape endpoint.

use crate::services::metrics::get_metrics;

/// Export metrics in Prometheus text format.
///
/// GET /metrics
pub async fn metrics() -> String {
    get_metrics()
}
