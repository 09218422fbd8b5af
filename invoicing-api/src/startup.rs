use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::health_check,
    clients::{create_client, delete_client, get_client, list_clients, update_client},
    companies::{get_company, upsert_company},
    invoices::{
        change_status, create_invoice, get_invoice, list_activities, list_invoices, record_payment,
        record_pdf, update_invoice,
    },
    metrics::metrics,
};
use crate::middleware::auth::auth_middleware;
use crate::middleware::metrics::track_metrics;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route("/invoices/:invoice_id", get(get_invoice).put(update_invoice))
        .route("/invoices/:invoice_id/status", post(change_status))
        .route("/invoices/:invoice_id/payments", post(record_payment))
        .route("/invoices/:invoice_id/pdfs", post(record_pdf))
        .route("/invoices/:invoice_id/activities", get(list_activities))
        .route("/clients", get(list_clients).post(create_client))
        .route(
            "/clients/:client_id",
            get(get_client).put(update_client).delete(delete_client),
        )
        .route("/company", get(get_company).put(upsert_company))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .merge(protected)
        .layer(axum::middleware::from_fn(track_metrics))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .with_state(state)
}
