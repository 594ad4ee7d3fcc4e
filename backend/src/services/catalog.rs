//! Catalog and location lookups at the stock ledger boundary
//!
//! Products and locations are owned by the catalog service; the ledger only
//! resolves them, always scoped by store. The `*_in` functions join the
//! caller's transaction so catalog reads see the same snapshot as the stock
//! mutations they guard.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Location, Product, ProductComponent};

/// Read-only access to the product catalog and location registry
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

impl CatalogService {
    /// Create a new CatalogService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List the products visible to a store (stock-entry pickers)
    pub async fn list_products(&self, store_id: Uuid) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, store_id, sku, name, tracks_serial, is_composite, default_unit_cost,
                   created_at, updated_at
            FROM products
            WHERE store_id = $1
            ORDER BY sku
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    /// List a store's active locations
    pub async fn list_locations(&self, store_id: Uuid) -> AppResult<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(
            r#"
            SELECT id, store_id, name, is_active, created_at
            FROM locations
            WHERE store_id = $1 AND is_active = TRUE
            ORDER BY name
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.db)
        .await?;

        Ok(locations)
    }

    /// Get a product by id inside an ambient transaction
    pub async fn get_product_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT id, store_id, sku, name, tracks_serial, is_composite, default_unit_cost,
                   created_at, updated_at
            FROM products
            WHERE id = $1 AND store_id = $2
            "#,
        )
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Get the ordered bill of materials for a composite product
    pub async fn get_components_in(
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> AppResult<Vec<ProductComponent>> {
        let components = sqlx::query_as::<_, ProductComponent>(
            r#"
            SELECT id, product_id, component_product_id, quantity_per_unit, position
            FROM product_components
            WHERE product_id = $1
            ORDER BY position, component_product_id
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(components)
    }

    /// Get a location by id inside an ambient transaction
    pub async fn get_location_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Location> {
        sqlx::query_as::<_, Location>(
            r#"
            SELECT id, store_id, name, is_active, created_at
            FROM locations
            WHERE id = $1 AND store_id = $2
            "#,
        )
        .bind(location_id)
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Location".to_string()))
    }

    /// Resolve a location and refuse inactive ones
    pub async fn ensure_active_location_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Location> {
        let location = Self::get_location_in(conn, store_id, location_id).await?;

        if !location.is_active {
            return Err(AppError::Validation {
                field: "location_id".to_string(),
                message: format!("Location {} is inactive", location.name),
                message_es: format!("La ubicación {} está inactiva", location.name),
            });
        }

        Ok(location)
    }
}
