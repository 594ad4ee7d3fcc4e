//! Store-scoped document numbering
//!
//! Counters are incremented inside the caller's transaction, so a number
//! claimed by a document that later rolls back is released with it.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;

/// Transactionally-incremented document counters
pub struct SequenceService;

impl SequenceService {
    /// Claim the next number for a counter kind within the ambient transaction
    pub async fn next_document_number_in(
        conn: &mut PgConnection,
        store_id: Uuid,
        counter_kind: &str,
    ) -> AppResult<i64> {
        let value = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO document_counters (store_id, counter_kind, current_value)
            VALUES ($1, $2, 1)
            ON CONFLICT (store_id, counter_kind)
            DO UPDATE SET current_value = document_counters.current_value + 1
            RETURNING current_value
            "#,
        )
        .bind(store_id)
        .bind(counter_kind)
        .fetch_one(&mut *conn)
        .await?;

        Ok(value)
    }
}
