//! Per-request HTTP metrics.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::services::metrics::{ERRORS_TOTAL, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION};

/// Record count and latency for every request. The path label uses the
/// matched route pattern rather than the raw URI, keeping label cardinality
/// bounded.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let start = Instant::now();
    let response = next.run(req).await;

    record_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

fn record_request(method: &str, path: &str, status: u16, elapsed: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method, path])
        .observe(elapsed);

    if status >= 500 {
        ERRORS_TOTAL.with_label_values(&["server_error"]).inc();
    } else if status >= 400 {
        ERRORS_TOTAL.with_label_values(&["client_error"]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_counted_by_method_path_and_status() {
        record_request("POST", "/invoices/:counted", 201, 0.01);
        record_request("POST", "/invoices/:counted", 201, 0.02);

        assert_eq!(
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["POST", "/invoices/:counted", "201"])
                .get(),
            2.0
        );
        assert_eq!(
            HTTP_REQUEST_DURATION
                .with_label_values(&["POST", "/invoices/:counted"])
                .get_sample_count(),
            2
        );
    }

    #[test]
    fn error_statuses_bump_the_error_counter_by_class() {
        let client_before = ERRORS_TOTAL.with_label_values(&["client_error"]).get();
        let server_before = ERRORS_TOTAL.with_label_values(&["server_error"]).get();

        record_request("GET", "/invoices/:errors", 404, 0.01);
        record_request("GET", "/invoices/:errors", 500, 0.01);
        record_request("GET", "/invoices/:errors", 200, 0.01);

        assert_eq!(
            ERRORS_TOTAL.with_label_values(&["client_error"]).get(),
            client_before + 1.0
        );
        assert_eq!(
            ERRORS_TOTAL.with_label_values(&["server_error"]).get(),
            server_before + 1.0
        );
    }
}
