//! Physical count reconciliation
//!
//! Session-based workflow: snapshot expected quantities at start, collect
//! counted quantities while IN_PROGRESS, then finalize once. Finalization is
//! all-or-nothing: every lot line with a non-zero discrepancy drives one
//! corrective adjustment through the stock engine in a single transaction,
//! and any failure leaves the session IN_PROGRESS for retry.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{CountLine, CountSession, CountStatus, DocumentKind, MovementKind};
use crate::services::catalog::CatalogService;
use crate::services::sequence::SequenceService;
use crate::services::stock::{AdjustStockInput, StockService};
use crate::services::units::UnitService;

const COUNT_ADJUSTMENT_REASON: &str = "physical count adjustment";

/// One explicit line to include in a new session
#[derive(Debug, Deserialize)]
pub struct NewCountLine {
    pub product_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
}

/// Input for starting a count session
#[derive(Debug, Deserialize)]
pub struct StartSessionInput {
    pub location_id: Option<Uuid>,
    pub notes: Option<String>,
    pub lines: Option<Vec<NewCountLine>>,
}

/// Input for recording a counted quantity on a line
#[derive(Debug, Deserialize)]
pub struct RecordCountInput {
    pub counted_quantity: i32,
    pub notes: Option<String>,
}

/// Input for finalizing a session
#[derive(Debug, Deserialize)]
pub struct FinalizeSessionInput {
    pub notes: Option<String>,
}

/// A session together with its ordered lines
#[derive(Debug, Serialize)]
pub struct SessionWithLines {
    pub session: CountSession,
    pub lines: Vec<CountLine>,
}

/// Physical count session service
#[derive(Clone)]
pub struct CountService {
    db: PgPool,
    stock: StockService,
}

impl CountService {
    /// Create a new CountService instance
    pub fn new(db: PgPool) -> Self {
        let stock = StockService::new(db.clone());
        Self { db, stock }
    }

    /// Start a count session, snapshotting system quantities
    pub async fn start_session(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        input: StartSessionInput,
    ) -> AppResult<SessionWithLines> {
        let mut tx = self.db.begin().await?;
        let session = self
            .start_session_in(&mut tx, store_id, actor_id, input)
            .await?;
        tx.commit().await?;
        Ok(session)
    }

    /// Session start inside an ambient transaction.
    ///
    /// With a location and no explicit lines, one line is created per
    /// AVAILABLE positive-quantity unit at that location. Units at exactly
    /// zero quantity are not auto-included; supply explicit lines to count
    /// those.
    pub async fn start_session_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        input: StartSessionInput,
    ) -> AppResult<SessionWithLines> {
        if input.location_id.is_none() && input.lines.as_ref().map_or(true, |l| l.is_empty()) {
            return Err(AppError::Validation {
                field: "location_id".to_string(),
                message: "A location or explicit lines are required".to_string(),
                message_es: "Se requiere una ubicación o líneas explícitas".to_string(),
            });
        }

        if let Some(location_id) = input.location_id {
            CatalogService::ensure_active_location_in(conn, store_id, location_id).await?;
        }

        let session_number =
            SequenceService::next_document_number_in(conn, store_id, "count_session").await?;

        let session = sqlx::query_as::<_, CountSession>(
            r#"
            INSERT INTO count_sessions (store_id, session_number, location_id, notes, started_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, store_id, session_number, location_id, status, notes,
                      started_by, started_at, completed_at
            "#,
        )
        .bind(store_id)
        .bind(session_number)
        .bind(input.location_id)
        .bind(&input.notes)
        .bind(actor_id)
        .fetch_one(&mut *conn)
        .await?;

        let mut lines = Vec::new();

        match input.lines {
            Some(explicit) if !explicit.is_empty() => {
                for (position, line) in explicit.iter().enumerate() {
                    let (product_id, unit_id, location_id, system_quantity) =
                        match (line.unit_id, line.product_id) {
                            (Some(unit_id), product_id) => {
                                let unit =
                                    UnitService::get_unit_for_update_in(conn, store_id, unit_id)
                                        .await?;
                                if let Some(product_id) = product_id {
                                    if unit.product_id != product_id {
                                        return Err(AppError::Validation {
                                            field: "lines".to_string(),
                                            message: "Unit does not belong to the given product"
                                                .to_string(),
                                            message_es:
                                                "La unidad no pertenece al producto indicado"
                                                    .to_string(),
                                        });
                                    }
                                }
                                (
                                    unit.product_id,
                                    Some(unit.id),
                                    Some(unit.location_id),
                                    unit.quantity,
                                )
                            }
                            (None, Some(product_id)) => {
                                let product =
                                    CatalogService::get_product_in(conn, store_id, product_id)
                                        .await?;
                                let on_hand = UnitService::quantity_on_hand_in(
                                    conn,
                                    store_id,
                                    product.id,
                                    input.location_id,
                                )
                                .await?;
                                (product.id, None, input.location_id, on_hand as i32)
                            }
                            (None, None) => {
                                return Err(AppError::Validation {
                                    field: "lines".to_string(),
                                    message: "Each line needs a product or a unit".to_string(),
                                    message_es: "Cada línea necesita un producto o una unidad"
                                        .to_string(),
                                });
                            }
                        };

                    lines.push(
                        Self::insert_line_in(
                            conn,
                            session.id,
                            product_id,
                            unit_id,
                            location_id,
                            system_quantity,
                            position as i32,
                        )
                        .await?,
                    );
                }
            }
            _ => {
                // location_id presence was validated above
                let location_id = input.location_id.ok_or_else(|| {
                    AppError::Internal("count session without location or lines".to_string())
                })?;
                let units =
                    UnitService::list_countable_units_in(conn, store_id, location_id).await?;

                for (position, unit) in units.iter().enumerate() {
                    lines.push(
                        Self::insert_line_in(
                            conn,
                            session.id,
                            unit.product_id,
                            Some(unit.id),
                            Some(unit.location_id),
                            unit.quantity,
                            position as i32,
                        )
                        .await?,
                    );
                }
            }
        }

        Ok(SessionWithLines { session, lines })
    }

    async fn insert_line_in(
        conn: &mut PgConnection,
        session_id: Uuid,
        product_id: Uuid,
        unit_id: Option<Uuid>,
        location_id: Option<Uuid>,
        system_quantity: i32,
        position: i32,
    ) -> AppResult<CountLine> {
        let line = sqlx::query_as::<_, CountLine>(
            r#"
            INSERT INTO count_lines
                (session_id, product_id, unit_id, location_id, system_quantity, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, session_id, product_id, unit_id, location_id, system_quantity,
                      counted_quantity, discrepancy, notes, position
            "#,
        )
        .bind(session_id)
        .bind(product_id)
        .bind(unit_id)
        .bind(location_id)
        .bind(system_quantity)
        .bind(position)
        .fetch_one(&mut *conn)
        .await?;

        Ok(line)
    }

    /// Record a counted quantity on a line (last write wins until finalization)
    pub async fn record_count(
        &self,
        store_id: Uuid,
        session_id: Uuid,
        line_id: Uuid,
        input: RecordCountInput,
    ) -> AppResult<CountLine> {
        if input.counted_quantity < 0 {
            return Err(AppError::Validation {
                field: "counted_quantity".to_string(),
                message: "Counted quantity cannot be negative".to_string(),
                message_es: "La cantidad contada no puede ser negativa".to_string(),
            });
        }

        let session = self.get_session_row(store_id, session_id).await?;
        if session.status != CountStatus::InProgress {
            return Err(AppError::InvalidStateTransition(
                "counts can only be recorded while the session is in progress".to_string(),
            ));
        }

        let line = sqlx::query_as::<_, CountLine>(
            r#"
            UPDATE count_lines
            SET counted_quantity = $1,
                discrepancy = $1 - system_quantity,
                notes = COALESCE($2, notes)
            WHERE id = $3 AND session_id = $4
            RETURNING id, session_id, product_id, unit_id, location_id, system_quantity,
                      counted_quantity, discrepancy, notes, position
            "#,
        )
        .bind(input.counted_quantity)
        .bind(&input.notes)
        .bind(line_id)
        .bind(session_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Count line".to_string()))?;

        Ok(line)
    }

    /// Finalize a session, applying corrective adjustments
    pub async fn finalize(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        session_id: Uuid,
        input: FinalizeSessionInput,
    ) -> AppResult<SessionWithLines> {
        let mut tx = self.db.begin().await?;
        let session = self
            .finalize_in(&mut tx, store_id, actor_id, session_id, input)
            .await?;
        tx.commit().await?;
        Ok(session)
    }

    /// Finalization inside an ambient transaction.
    ///
    /// Serialized lines are never auto-adjusted: deciding which physical
    /// serial is missing takes a human, so those discrepancies are logged
    /// and skipped. The session still completes once the lot lines are
    /// adjusted.
    pub async fn finalize_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        session_id: Uuid,
        input: FinalizeSessionInput,
    ) -> AppResult<SessionWithLines> {
        let session = sqlx::query_as::<_, CountSession>(
            r#"
            SELECT id, store_id, session_number, location_id, status, notes,
                   started_by, started_at, completed_at
            FROM count_sessions
            WHERE id = $1 AND store_id = $2
            FOR UPDATE
            "#,
        )
        .bind(session_id)
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Count session".to_string()))?;

        if session.status != CountStatus::InProgress {
            return Err(AppError::InvalidStateTransition(format!(
                "session is already {}",
                session.status.as_str()
            )));
        }

        let lines = Self::fetch_lines_in(conn, session.id).await?;

        for line in &lines {
            let discrepancy = match line.discrepancy {
                Some(d) if d != 0 => d,
                _ => continue,
            };

            let product = CatalogService::get_product_in(conn, store_id, line.product_id).await?;
            if product.tracks_serial {
                tracing::warn!(
                    session = %session.id,
                    line = %line.id,
                    product = %product.sku,
                    discrepancy,
                    "serialized count discrepancy requires a manual decision, skipping"
                );
                continue;
            }

            let location_id = line
                .location_id
                .or(session.location_id)
                .ok_or_else(|| AppError::Validation {
                    field: "lines".to_string(),
                    message: "Line has no resolvable location for adjustment".to_string(),
                    message_es: "La línea no tiene una ubicación para el ajuste".to_string(),
                })?;

            self.stock
                .adjust_stock_with_kind_in(
                    conn,
                    store_id,
                    actor_id,
                    AdjustStockInput {
                        product_id: line.product_id,
                        location_id,
                        delta: discrepancy,
                        reason: COUNT_ADJUSTMENT_REASON.to_string(),
                    },
                    MovementKind::CountAdjustment,
                    Some((DocumentKind::CountSession, session.id)),
                )
                .await?;
        }

        let session = sqlx::query_as::<_, CountSession>(
            r#"
            UPDATE count_sessions
            SET status = 'completed', completed_at = $1, notes = COALESCE($2, notes)
            WHERE id = $3
            RETURNING id, store_id, session_number, location_id, status, notes,
                      started_by, started_at, completed_at
            "#,
        )
        .bind(Utc::now())
        .bind(&input.notes)
        .bind(session.id)
        .fetch_one(&mut *conn)
        .await?;

        let lines = Self::fetch_lines_in(conn, session.id).await?;

        Ok(SessionWithLines { session, lines })
    }

    /// Get a session with its lines
    pub async fn get_session(&self, store_id: Uuid, session_id: Uuid) -> AppResult<SessionWithLines> {
        let session = self.get_session_row(store_id, session_id).await?;

        let mut conn = self.db.acquire().await?;
        let lines = Self::fetch_lines_in(&mut conn, session.id).await?;

        Ok(SessionWithLines { session, lines })
    }

    /// List sessions for a store, newest first
    pub async fn list_sessions(&self, store_id: Uuid) -> AppResult<Vec<CountSession>> {
        let sessions = sqlx::query_as::<_, CountSession>(
            r#"
            SELECT id, store_id, session_number, location_id, status, notes,
                   started_by, started_at, completed_at
            FROM count_sessions
            WHERE store_id = $1
            ORDER BY started_at DESC
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.db)
        .await?;

        Ok(sessions)
    }

    async fn get_session_row(&self, store_id: Uuid, session_id: Uuid) -> AppResult<CountSession> {
        sqlx::query_as::<_, CountSession>(
            r#"
            SELECT id, store_id, session_number, location_id, status, notes,
                   started_by, started_at, completed_at
            FROM count_sessions
            WHERE id = $1 AND store_id = $2
            "#,
        )
        .bind(session_id)
        .bind(store_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Count session".to_string()))
    }

    async fn fetch_lines_in(conn: &mut PgConnection, session_id: Uuid) -> AppResult<Vec<CountLine>> {
        let lines = sqlx::query_as::<_, CountLine>(
            r#"
            SELECT id, session_id, product_id, unit_id, location_id, system_quantity,
                   counted_quantity, discrepancy, notes, position
            FROM count_lines
            WHERE session_id = $1
            ORDER BY position
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }
}
