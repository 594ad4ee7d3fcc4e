//! Movement log service
//!
//! Pure write-append component: every stock operation inserts one row here
//! per affected unit, in the same transaction as the unit mutation. Rows are
//! never updated or deleted; the history endpoints are the only readers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{DocumentKind, MovementKind, StockMovement};

/// One movement to append
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub kind: MovementKind,
    pub quantity_delta: i32,
    pub from_location_id: Option<Uuid>,
    pub to_location_id: Option<Uuid>,
    pub unit_cost: Option<Decimal>,
    pub reference: Option<(DocumentKind, Uuid)>,
    pub notes: Option<String>,
}

/// Filters for the movement history read API
#[derive(Debug, Default, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub kind: Option<MovementKind>,
    pub reference_id: Option<Uuid>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

/// Append-only access to the stock movement log
#[derive(Clone)]
pub struct MovementService {
    db: PgPool,
}

impl MovementService {
    /// Create a new MovementService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Append one movement row inside the ambient transaction
    pub async fn record_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        movement: NewMovement,
    ) -> AppResult<StockMovement> {
        let (reference_type, reference_id) = match movement.reference {
            Some((kind, id)) => (Some(kind.as_str()), Some(id)),
            None => (None, None),
        };

        let row = sqlx::query_as::<_, StockMovement>(
            r#"
            INSERT INTO stock_movements
                (store_id, product_id, unit_id, kind, quantity_delta, from_location_id,
                 to_location_id, unit_cost, reference_type, reference_id, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, store_id, product_id, unit_id, kind, quantity_delta, from_location_id,
                      to_location_id, unit_cost, reference_type, reference_id, notes,
                      created_by, created_at
            "#,
        )
        .bind(store_id)
        .bind(movement.product_id)
        .bind(movement.unit_id)
        .bind(movement.kind)
        .bind(movement.quantity_delta)
        .bind(movement.from_location_id)
        .bind(movement.to_location_id)
        .bind(movement.unit_cost)
        .bind(reference_type)
        .bind(reference_id)
        .bind(&movement.notes)
        .bind(actor_id)
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!(
            kind = row.kind.as_str(),
            delta = row.quantity_delta,
            unit = ?row.unit_id,
            "movement recorded"
        );

        Ok(row)
    }

    /// Consumption rows for a business document, oldest first
    /// (drives `reverse_consumption`)
    pub async fn find_consumptions_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        reference_type: DocumentKind,
        reference_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, store_id, product_id, unit_id, kind, quantity_delta, from_location_id,
                   to_location_id, unit_cost, reference_type, reference_id, notes,
                   created_by, created_at
            FROM stock_movements
            WHERE store_id = $1 AND reference_type = $2 AND reference_id = $3
              AND kind = 'consumption'
            ORDER BY created_at
            "#,
        )
        .bind(store_id)
        .bind(reference_type.as_str())
        .bind(reference_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Movement history for a unit, oldest first
    pub async fn get_unit_history(
        &self,
        store_id: Uuid,
        unit_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, store_id, product_id, unit_id, kind, quantity_delta, from_location_id,
                   to_location_id, unit_cost, reference_type, reference_id, notes,
                   created_by, created_at
            FROM stock_movements
            WHERE store_id = $1 AND unit_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(store_id)
        .bind(unit_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Filtered movement history (read API used by reporting)
    pub async fn list_movements(
        &self,
        store_id: Uuid,
        filter: &MovementFilter,
    ) -> AppResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, store_id, product_id, unit_id, kind, quantity_delta, from_location_id,
                   to_location_id, unit_cost, reference_type, reference_id, notes,
                   created_by, created_at
            FROM stock_movements
            WHERE store_id = $1
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::uuid IS NULL OR from_location_id = $3 OR to_location_id = $3)
              AND ($4::movement_kind IS NULL OR kind = $4)
              AND ($5::uuid IS NULL OR reference_id = $5)
              AND ($6::timestamptz IS NULL OR created_at >= $6)
              AND ($7::timestamptz IS NULL OR created_at <= $7)
            ORDER BY created_at DESC
            "#,
        )
        .bind(store_id)
        .bind(filter.product_id)
        .bind(filter.location_id)
        .bind(filter.kind)
        .bind(filter.reference_id)
        .bind(filter.from_date)
        .bind(filter.to_date)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}
