//! HTTP handlers for stock ledger endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{InventoryUnit, StockMovement};
use crate::services::movements::MovementFilter;
use crate::services::stock::{
    AddSerializedUnitInput, AddStockInput, AdjustStockInput, AssembleInput,
    CommitConsumptionInput, ConsumeRepairPartInput, ConsumptionReceipt, DisassembleInput,
    DisassemblyOutcome, RestockInput, ReverseConsumptionInput, TransferOutcome,
    TransferStockInput,
};
use crate::services::units::UnitFilter;
use crate::services::{MovementService, StockService, UnitService};
use crate::AppState;

/// Receive lot stock
pub async fn add_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AddStockInput>,
) -> AppResult<Json<InventoryUnit>> {
    let service = StockService::new(state.db);
    let unit = service
        .add_stock(current_user.0.store_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(unit))
}

/// Receive one serialized unit
pub async fn add_serialized_unit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AddSerializedUnitInput>,
) -> AppResult<Json<InventoryUnit>> {
    let service = StockService::new(state.db);
    let unit = service
        .add_serialized_unit(current_user.0.store_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(unit))
}

/// Manually adjust lot stock
pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<InventoryUnit>> {
    let service = StockService::new(state.db);
    let unit = service
        .adjust_stock(current_user.0.store_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(unit))
}

/// Transfer stock between locations
pub async fn transfer_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<TransferStockInput>,
) -> AppResult<Json<TransferOutcome>> {
    let service = StockService::new(state.db);
    let outcome = service
        .transfer_stock(current_user.0.store_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(outcome))
}

/// Commit stock for a finalized sale or repair line
pub async fn commit_consumption(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CommitConsumptionInput>,
) -> AppResult<Json<ConsumptionReceipt>> {
    let service = StockService::new(state.db);
    let receipt = service
        .commit_for_consumption(current_user.0.store_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(receipt))
}

/// Reverse a prior consumption by document reference
pub async fn reverse_consumption(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ReverseConsumptionInput>,
) -> AppResult<Json<Vec<InventoryUnit>>> {
    let service = StockService::new(state.db);
    let units = service
        .reverse_consumption(current_user.0.store_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(units))
}

/// Reintroduce returned goods
pub async fn restock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RestockInput>,
) -> AppResult<Json<InventoryUnit>> {
    let service = StockService::new(state.db);
    let unit = service
        .restock(current_user.0.store_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(unit))
}

/// Assemble composite units from component stock
pub async fn assemble(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AssembleInput>,
) -> AppResult<Json<InventoryUnit>> {
    let service = StockService::new(state.db);
    let unit = service
        .assemble(current_user.0.store_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(unit))
}

/// Disassemble composite units back into components
pub async fn disassemble(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<DisassembleInput>,
) -> AppResult<Json<DisassemblyOutcome>> {
    let service = StockService::new(state.db);
    let outcome = service
        .disassemble(current_user.0.store_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(outcome))
}

/// Consume a part against a repair line
pub async fn consume_repair_part(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ConsumeRepairPartInput>,
) -> AppResult<Json<ConsumptionReceipt>> {
    let service = StockService::new(state.db);
    let receipt = service
        .consume_repair_part(current_user.0.store_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(receipt))
}

/// Undo a repair line's part consumption
pub async fn reverse_repair_part(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(repair_line_id): Path<Uuid>,
) -> AppResult<Json<Vec<InventoryUnit>>> {
    let service = StockService::new(state.db);
    let units = service
        .reverse_repair_part(
            current_user.0.store_id,
            current_user.0.user_id,
            repair_line_id,
            None,
        )
        .await?;
    Ok(Json(units))
}

/// Get one inventory unit
pub async fn get_unit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(unit_id): Path<Uuid>,
) -> AppResult<Json<InventoryUnit>> {
    let service = UnitService::new(state.db);
    let unit = service.get_unit(current_user.0.store_id, unit_id).await?;
    Ok(Json(unit))
}

/// List inventory units with filters
pub async fn list_units(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<UnitFilter>,
) -> AppResult<Json<Vec<InventoryUnit>>> {
    let service = UnitService::new(state.db);
    let units = service.list_units(current_user.0.store_id, &filter).await?;
    Ok(Json(units))
}

/// Query parameters for on-hand quantity
#[derive(Debug, serde::Deserialize)]
pub struct OnHandQuery {
    pub product_id: Uuid,
    pub location_id: Option<Uuid>,
}

/// On-hand quantity response
#[derive(Debug, serde::Serialize)]
pub struct OnHandResponse {
    pub product_id: Uuid,
    pub location_id: Option<Uuid>,
    pub quantity: i64,
}

/// Current on-hand quantity for a product
pub async fn get_on_hand(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<OnHandQuery>,
) -> AppResult<Json<OnHandResponse>> {
    let service = UnitService::new(state.db);
    let quantity = service
        .quantity_on_hand(current_user.0.store_id, query.product_id, query.location_id)
        .await?;
    Ok(Json(OnHandResponse {
        product_id: query.product_id,
        location_id: query.location_id,
        quantity,
    }))
}

/// Filtered movement history
pub async fn list_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<MovementFilter>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let service = MovementService::new(state.db);
    let movements = service
        .list_movements(current_user.0.store_id, &filter)
        .await?;
    Ok(Json(movements))
}

/// Movement history for one unit
pub async fn get_unit_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(unit_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let service = MovementService::new(state.db);
    let movements = service
        .get_unit_history(current_user.0.store_id, unit_id)
        .await?;
    Ok(Json(movements))
}
