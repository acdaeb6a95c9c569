pub mod chat;
pub mod documents;
pub mod health;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::app::AppState;

/// Build all API routes: everything under `/api/v1`, plus the root banner.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(documents::routes(state.settings.max_file_size))
        .merge(chat::routes())
        .merge(health::routes());

    Router::new()
        .nest("/api/v1", api)
        .route("/", get(health::root))
        .with_state(state)
}

/// CORS restricted to the configured origins, with credentials allowed.
/// `*` allows any origin but then credentials are not allowed.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ORIGIN,
        ]);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {o}");
                None
            }
        })
        .collect();
    cors.allow_origin(allowed).allow_credentials(true)
}
