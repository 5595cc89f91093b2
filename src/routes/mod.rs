pub mod health;
pub mod reports;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/generate-report/", post(reports::generate_report))
        .with_state(state)
}
