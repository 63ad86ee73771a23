//! Router configuration for the HTTP API.
//!
//! Every route is served both at the root and under `/api`.

use std::time::Instant;

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;
use crate::observability;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Auth
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/edit", put(handlers::edit_user))
        // Owner
        .route("/locador/properties", post(handlers::create_property))
        .route("/locador/properties/{owner_id}", get(handlers::owner_properties))
        .route(
            "/locador/property/{id}",
            put(handlers::update_property).delete(handlers::delete_property),
        )
        .route("/locador/reservations/{owner_id}", get(handlers::owner_reservations))
        .route("/locador/reservation/{id}", put(handlers::decide_reservation))
        // Renter
        .route("/locatario/search", get(handlers::search))
        .route("/locatario/reserve", post(handlers::reserve))
        .route("/locatario/my-reservations/{user_id}", get(handlers::renter_reservations))
        .route("/locatario/review", post(handlers::post_review))
        .route("/locatario/property/{id}/reviews", get(handlers::property_reviews))
        .route(
            "/locatario/property/{id}/availability",
            get(handlers::property_availability),
        )
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = match req.extensions().get::<MatchedPath>() {
        Some(path) => path.as_str().to_owned(),
        None => req.uri().path().to_owned(),
    };
    let method = req.method().clone();

    let response = next.run(req).await;
    observability::record_request(
        method.as_str(),
        &route,
        response.status().as_u16(),
        start.elapsed(),
    );
    response
}

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .route_layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
