//! HTTP handlers for catalog lookups
//!
//! Read-only: products and locations are written by the catalog service.

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Location, Product};
use crate::services::CatalogService;
use crate::AppState;

/// List products visible to the store
pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Product>>> {
    let service = CatalogService::new(state.db);
    let products = service.list_products(current_user.0.store_id).await?;
    Ok(Json(products))
}

/// List the store's active locations
pub async fn list_locations(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Location>>> {
    let service = CatalogService::new(state.db);
    let locations = service.list_locations(current_user.0.store_id).await?;
    Ok(Json(locations))
}
