//! Physical count session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Status of a count session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "count_session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CountStatus {
    InProgress,
    Completed,
}

impl CountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountStatus::InProgress => "in_progress",
            CountStatus::Completed => "completed",
        }
    }
}

/// A physical count workflow instance
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CountSession {
    pub id: Uuid,
    pub store_id: Uuid,
    pub session_number: i64,
    pub location_id: Option<Uuid>,
    pub status: CountStatus,
    pub notes: Option<String>,
    pub started_by: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One counted product or unit within a session
///
/// `system_quantity` is snapshotted at session start; `discrepancy` is
/// `counted_quantity - system_quantity`, recomputed on every count entry.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CountLine {
    pub id: Uuid,
    pub session_id: Uuid,
    pub product_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub system_quantity: i32,
    pub counted_quantity: Option<i32>,
    pub discrepancy: Option<i32>,
    pub notes: Option<String>,
    pub position: i32,
}
