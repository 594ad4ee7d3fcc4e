//! Stock movement models
//!
//! Movements are the append-only audit trail of the ledger: one immutable
//! signed-delta row per inventory unit affected by an operation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kinds of stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "movement_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Intake,
    Adjustment,
    TransferOut,
    TransferIn,
    Consumption,
    ConsumptionReversal,
    Return,
    AssemblyIn,
    AssemblyOut,
    DisassemblyIn,
    DisassemblyOut,
    CountAdjustment,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Intake => "intake",
            MovementKind::Adjustment => "adjustment",
            MovementKind::TransferOut => "transfer_out",
            MovementKind::TransferIn => "transfer_in",
            MovementKind::Consumption => "consumption",
            MovementKind::ConsumptionReversal => "consumption_reversal",
            MovementKind::Return => "return",
            MovementKind::AssemblyIn => "assembly_in",
            MovementKind::AssemblyOut => "assembly_out",
            MovementKind::DisassemblyIn => "disassembly_in",
            MovementKind::DisassemblyOut => "disassembly_out",
            MovementKind::CountAdjustment => "count_adjustment",
        }
    }
}

/// Kind of business document a movement references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    SaleLine,
    RepairLine,
    ReceiptLine,
    Order,
    CountSession,
    Manual,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::SaleLine => "sale_line",
            DocumentKind::RepairLine => "repair_line",
            DocumentKind::ReceiptLine => "receipt_line",
            DocumentKind::Order => "order",
            DocumentKind::CountSession => "count_session",
            DocumentKind::Manual => "manual",
        }
    }

    /// Status a serialized unit takes when consumed against this document.
    pub fn consumed_status(&self) -> super::UnitStatus {
        match self {
            DocumentKind::RepairLine => super::UnitStatus::UsedInConsumption,
            _ => super::UnitStatus::Sold,
        }
    }
}

/// One immutable audit row in the movement log
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub kind: MovementKind,
    pub quantity_delta: i32,
    pub from_location_id: Option<Uuid>,
    pub to_location_id: Option<Uuid>,
    pub unit_cost: Option<Decimal>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}
