//! Route definitions for the Repair Shop Management Platform

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - catalog lookups
        .nest("/catalog", catalog_routes())
        // Protected routes - stock ledger
        .nest("/inventory", inventory_routes())
        // Protected routes - physical counts
        .nest("/counts", count_routes())
}

/// Catalog lookup routes (protected, read-only)
fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(handlers::list_products))
        .route("/locations", get(handlers::list_locations))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Stock ledger routes (protected)
fn inventory_routes() -> Router<AppState> {
    Router::new()
        // Intake
        .route("/stock", post(handlers::add_stock))
        .route("/stock/serialized", post(handlers::add_serialized_unit))
        // Corrections and movement between locations
        .route("/adjustments", post(handlers::adjust_stock))
        .route("/transfers", post(handlers::transfer_stock))
        // Consumption (sales, repairs) and its undo paths
        .route("/consumptions", post(handlers::commit_consumption))
        .route("/consumptions/reverse", post(handlers::reverse_consumption))
        .route("/restock", post(handlers::restock))
        .route("/repair-parts", post(handlers::consume_repair_part))
        .route(
            "/repair-parts/:repair_line_id/reverse",
            post(handlers::reverse_repair_part),
        )
        // Composite goods
        .route("/assemblies", post(handlers::assemble))
        .route("/disassemblies", post(handlers::disassemble))
        // Read APIs
        .route("/units", get(handlers::list_units))
        .route("/units/:unit_id", get(handlers::get_unit))
        .route("/units/:unit_id/movements", get(handlers::get_unit_history))
        .route("/on-hand", get(handlers::get_on_hand))
        .route("/movements", get(handlers::list_movements))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Physical count routes (protected)
fn count_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_sessions).post(handlers::start_session),
        )
        .route("/:session_id", get(handlers::get_session))
        .route(
            "/:session_id/lines/:line_id",
            post(handlers::record_count),
        )
        .route("/:session_id/finalize", post(handlers::finalize_session))
        .route_layer(middleware::from_fn(auth_middleware))
}
