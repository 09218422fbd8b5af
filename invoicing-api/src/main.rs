use dotenvy::dotenv;
use invoicing_api::config::get_configuration;
use invoicing_api::services::database::Database;
use invoicing_api::services::jwt::JwtVerifier;
use invoicing_api::startup::build_router;
use invoicing_api::AppState;
use secrecy::ExposeSecret;
use service_core::observability::logging::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing("invoicing-api", &configuration.server.log_level);

    invoicing_api::services::metrics::init_metrics();

    let db = Database::new(
        configuration.database.url.expose_secret(),
        configuration.database.max_connections,
        configuration.database.min_connections,
    )
    .await?;
    db.run_migrations().await?;

    let jwt = JwtVerifier::new(&configuration.auth.jwt_secret);
    let app = build_router(AppState::new(db, jwt));

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting invoicing-api on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
