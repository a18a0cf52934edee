use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Only pages served from the API's own origin may read its responses
fn cors_layer(server_url: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = HeaderValue::from_str(server_url.trim_end_matches('/'))
        .into_iter()
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.server_url);

    let auth_routes = Router::new()
        .route("/auth/google", get(handlers::auth::google_redirect))
        .route("/auth/callback", get(handlers::auth::google_callback))
        .route("/auth/logout", post(handlers::auth::logout));

    let api_routes = Router::new()
        .route("/v1/status", get(handlers::auth::status))
        .route("/v1/calendars", get(handlers::calendars::list_calendars))
        .route(
            "/v1/selection",
            get(handlers::calendars::get_selection)
                .put(handlers::calendars::update_selection)
                .delete(handlers::calendars::clear_selection),
        )
        .route("/v1/reports", post(handlers::reports::create_report))
        .route("/v1/reports/:name", get(handlers::reports::download_report));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(auth_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
