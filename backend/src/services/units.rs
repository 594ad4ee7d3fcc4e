//! Inventory unit store
//!
//! Locates or creates the correct inventory unit for a mutation and owns the
//! grouping rules: lots match product + location + cost + condition exactly
//! (cost layers are never blended), serials are unique across the whole
//! system, and consumption selects the oldest single lot able to cover the
//! requested quantity on its own.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{InventoryUnit, UnitStatus};

/// Filters for the unit listing read API
#[derive(Debug, Default, Deserialize)]
pub struct UnitFilter {
    pub product_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub status: Option<UnitStatus>,
    pub condition: Option<String>,
    pub serial: Option<String>,
    pub search: Option<String>,
}

/// Access to current stock state per unit
#[derive(Clone)]
pub struct UnitService {
    db: PgPool,
}

impl UnitService {
    /// Create a new UnitService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a unit by id, locked for update inside the ambient transaction
    pub async fn get_unit_for_update_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        unit_id: Uuid,
    ) -> AppResult<InventoryUnit> {
        sqlx::query_as::<_, InventoryUnit>(
            r#"
            SELECT id, store_id, product_id, location_id, quantity, unit_cost, condition,
                   status, serial, notes, receipt_line_id, created_at, updated_at
            FROM inventory_units
            WHERE id = $1 AND store_id = $2
            FOR UPDATE
            "#,
        )
        .bind(unit_id)
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory unit".to_string()))
    }

    /// Find an existing lot matching product + location + cost + condition
    /// exactly, or create one with quantity 0. The match is locked so two
    /// concurrent mutations of the same lot serialize on the row.
    #[allow(clippy::too_many_arguments)]
    pub async fn find_or_create_lot_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
        unit_cost: Decimal,
        condition: &str,
        status: UnitStatus,
        receipt_line_id: Option<Uuid>,
    ) -> AppResult<InventoryUnit> {
        let existing = sqlx::query_as::<_, InventoryUnit>(
            r#"
            SELECT id, store_id, product_id, location_id, quantity, unit_cost, condition,
                   status, serial, notes, receipt_line_id, created_at, updated_at
            FROM inventory_units
            WHERE store_id = $1 AND product_id = $2 AND location_id = $3
              AND unit_cost = $4 AND condition = $5 AND serial IS NULL
            ORDER BY created_at
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(location_id)
        .bind(unit_cost)
        .bind(condition)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(lot) = existing {
            return Ok(lot);
        }

        let lot = sqlx::query_as::<_, InventoryUnit>(
            r#"
            INSERT INTO inventory_units
                (store_id, product_id, location_id, quantity, unit_cost, condition, status, receipt_line_id)
            VALUES ($1, $2, $3, 0, $4, $5, $6, $7)
            RETURNING id, store_id, product_id, location_id, quantity, unit_cost, condition,
                      status, serial, notes, receipt_line_id, created_at, updated_at
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(location_id)
        .bind(unit_cost)
        .bind(condition)
        .bind(status)
        .bind(receipt_line_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(lot)
    }

    /// Whether a serial already exists anywhere in the system
    pub async fn serial_exists_in(conn: &mut PgConnection, serial: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM inventory_units WHERE serial = $1)",
        )
        .bind(serial)
        .fetch_one(&mut *conn)
        .await?;

        Ok(exists)
    }

    /// Exact serial lookup, locked for update
    pub async fn find_serialized_unit_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        serial: &str,
    ) -> AppResult<InventoryUnit> {
        sqlx::query_as::<_, InventoryUnit>(
            r#"
            SELECT id, store_id, product_id, location_id, quantity, unit_cost, condition,
                   status, serial, notes, receipt_line_id, created_at, updated_at
            FROM inventory_units
            WHERE serial = $1 AND store_id = $2
            FOR UPDATE
            "#,
        )
        .bind(serial)
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Serialized unit".to_string()))
    }

    /// Select the oldest AVAILABLE lot that alone holds at least
    /// `min_quantity`. Consumption is never split across lots; if no single
    /// lot suffices the caller fails with `InsufficientStock` even when the
    /// sum across lots would be enough.
    pub async fn find_available_lot_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
        min_quantity: i32,
    ) -> AppResult<Option<InventoryUnit>> {
        let lot = sqlx::query_as::<_, InventoryUnit>(
            r#"
            SELECT id, store_id, product_id, location_id, quantity, unit_cost, condition,
                   status, serial, notes, receipt_line_id, created_at, updated_at
            FROM inventory_units
            WHERE store_id = $1 AND product_id = $2 AND location_id = $3
              AND serial IS NULL AND status = 'available' AND quantity >= $4
            ORDER BY created_at
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(location_id)
        .bind(min_quantity)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(lot)
    }

    /// Select the oldest AVAILABLE lot regardless of quantity (positive
    /// manual adjustments top up the oldest layer).
    pub async fn find_oldest_lot_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Option<InventoryUnit>> {
        let lot = sqlx::query_as::<_, InventoryUnit>(
            r#"
            SELECT id, store_id, product_id, location_id, quantity, unit_cost, condition,
                   status, serial, notes, receipt_line_id, created_at, updated_at
            FROM inventory_units
            WHERE store_id = $1 AND product_id = $2 AND location_id = $3
              AND serial IS NULL AND status = 'available'
            ORDER BY created_at
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(location_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(lot)
    }

    /// Apply a signed quantity delta with the store's native atomic
    /// increment. The CHECK constraint backs up the application-level
    /// non-negativity validation.
    pub async fn apply_quantity_delta_in(
        conn: &mut PgConnection,
        unit_id: Uuid,
        delta: i32,
    ) -> AppResult<InventoryUnit> {
        let unit = sqlx::query_as::<_, InventoryUnit>(
            r#"
            UPDATE inventory_units
            SET quantity = quantity + $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, store_id, product_id, location_id, quantity, unit_cost, condition,
                      status, serial, notes, receipt_line_id, created_at, updated_at
            "#,
        )
        .bind(delta)
        .bind(unit_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(unit)
    }

    /// Rewrite a serialized unit's state in one statement (consumption,
    /// reversal, restock and transfer all reduce to this).
    pub async fn update_serialized_state_in(
        conn: &mut PgConnection,
        unit_id: Uuid,
        quantity: i32,
        status: UnitStatus,
        location_id: Uuid,
        condition: &str,
    ) -> AppResult<InventoryUnit> {
        let unit = sqlx::query_as::<_, InventoryUnit>(
            r#"
            UPDATE inventory_units
            SET quantity = $1, status = $2, location_id = $3, condition = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING id, store_id, product_id, location_id, quantity, unit_cost, condition,
                      status, serial, notes, receipt_line_id, created_at, updated_at
            "#,
        )
        .bind(quantity)
        .bind(status)
        .bind(location_id)
        .bind(condition)
        .bind(unit_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(unit)
    }

    /// Get a unit by id (read API)
    pub async fn get_unit(&self, store_id: Uuid, unit_id: Uuid) -> AppResult<InventoryUnit> {
        sqlx::query_as::<_, InventoryUnit>(
            r#"
            SELECT id, store_id, product_id, location_id, quantity, unit_cost, condition,
                   status, serial, notes, receipt_line_id, created_at, updated_at
            FROM inventory_units
            WHERE id = $1 AND store_id = $2
            "#,
        )
        .bind(unit_id)
        .bind(store_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory unit".to_string()))
    }

    /// List units with optional filters (read API)
    pub async fn list_units(
        &self,
        store_id: Uuid,
        filter: &UnitFilter,
    ) -> AppResult<Vec<InventoryUnit>> {
        let units = sqlx::query_as::<_, InventoryUnit>(
            r#"
            SELECT id, store_id, product_id, location_id, quantity, unit_cost, condition,
                   status, serial, notes, receipt_line_id, created_at, updated_at
            FROM inventory_units
            WHERE store_id = $1
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::uuid IS NULL OR location_id = $3)
              AND ($4::unit_status IS NULL OR status = $4)
              AND ($5::text IS NULL OR condition = $5)
              AND ($6::text IS NULL OR serial = $6)
              AND ($7::text IS NULL OR serial ILIKE '%' || $7 || '%' OR notes ILIKE '%' || $7 || '%')
            ORDER BY created_at DESC
            "#,
        )
        .bind(store_id)
        .bind(filter.product_id)
        .bind(filter.location_id)
        .bind(filter.status)
        .bind(&filter.condition)
        .bind(&filter.serial)
        .bind(&filter.search)
        .fetch_all(&self.db)
        .await?;

        Ok(units)
    }

    /// Current on-hand quantity for a product, optionally at one location
    /// (read API; counts only AVAILABLE units)
    pub async fn quantity_on_hand(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        location_id: Option<Uuid>,
    ) -> AppResult<i64> {
        let mut conn = self.db.acquire().await?;
        Self::quantity_on_hand_in(&mut conn, store_id, product_id, location_id).await
    }

    /// On-hand quantity inside an ambient transaction (count snapshots)
    pub async fn quantity_on_hand_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        product_id: Uuid,
        location_id: Option<Uuid>,
    ) -> AppResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM inventory_units
            WHERE store_id = $1 AND product_id = $2
              AND ($3::uuid IS NULL OR location_id = $3)
              AND status = 'available'
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(location_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(total)
    }

    /// AVAILABLE units with positive quantity at a location, oldest first
    /// (count session auto-population; zero-quantity units are skipped)
    pub async fn list_countable_units_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Vec<InventoryUnit>> {
        let units = sqlx::query_as::<_, InventoryUnit>(
            r#"
            SELECT id, store_id, product_id, location_id, quantity, unit_cost, condition,
                   status, serial, notes, receipt_line_id, created_at, updated_at
            FROM inventory_units
            WHERE store_id = $1 AND location_id = $2
              AND status = 'available' AND quantity > 0
            ORDER BY created_at
            "#,
        )
        .bind(store_id)
        .bind(location_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(units)
    }
}
