//! Inventory unit models
//!
//! An inventory unit is either a lot (non-serialized stock of one product at
//! one location, one cost, one condition) or a single serialized item whose
//! quantity is bounded to 0 or 1.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of an inventory unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "unit_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Available,
    Sold,
    Damaged,
    UsedInConsumption,
    Reserved,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Available => "available",
            UnitStatus::Sold => "sold",
            UnitStatus::Damaged => "damaged",
            UnitStatus::UsedInConsumption => "used_in_consumption",
            UnitStatus::Reserved => "reserved",
        }
    }

    /// Only AVAILABLE units may be consumed, transferred or adjusted.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UnitStatus::Available)
    }
}

/// A stocked unit: one lot or one serialized item
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryUnit {
    pub id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub condition: String,
    pub status: UnitStatus,
    pub serial: Option<String>,
    pub notes: Option<String>,
    pub receipt_line_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryUnit {
    pub fn is_serialized(&self) -> bool {
        self.serial.is_some()
    }
}
