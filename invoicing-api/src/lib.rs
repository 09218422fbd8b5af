pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use services::database::Database;
use services::jwt::JwtVerifier;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: JwtVerifier,
}

impl AppState {
    pub fn new(db: Database, jwt: JwtVerifier) -> Self {
        Self { db, jwt }
    }
}
