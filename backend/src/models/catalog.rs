//! Catalog read models: products, bill of materials, locations
//!
//! Rows in these tables are owned by the catalog service; the stock ledger
//! only reads them to resolve serial tracking, composition and default cost.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A catalog product as seen by the stock ledger
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub store_id: Uuid,
    pub sku: String,
    pub name: String,
    pub tracks_serial: bool,
    pub is_composite: bool,
    pub default_unit_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of a composite product's bill of materials
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductComponent {
    pub id: Uuid,
    pub product_id: Uuid,
    pub component_product_id: Uuid,
    pub quantity_per_unit: i32,
    pub position: i32,
}

/// A stock location (counter, warehouse, repair bench)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Location {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
