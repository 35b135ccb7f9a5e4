//! # brainiacs-api
//!
//! REST API layer for Brainiacs. Every board mutation is a versioned
//! read-modify-write through `brainiacs-db`, and every successful mutation
//! is announced through the shared [`Fanout`] so connected clients see it.

pub mod extract;
pub mod middleware;
pub mod projection;
pub mod routes;

use axum::Router;
use brainiacs_common::config::LimitsConfig;
use brainiacs_common::fanout::Fanout;
use brainiacs_db::Database;
use std::sync::Arc;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Outbound realtime events. Shared with the gateway, which owns the
    /// connections and their subscriptions.
    pub fanout: Fanout,
    pub limits: LimitsConfig,
}

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::boards::router())
        .merge(routes::messages::router())
        .merge(routes::polls::router())
        .merge(routes::join_requests::router())
        .merge(routes::health::router());

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(routes::health::router())
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::compression::CompressionLayer::new())
        .with_state(Arc::new(state))
}
