//! Stock operations engine
//!
//! The only component allowed to mutate inventory quantities. Every
//! operation validates its preconditions, applies one coherent set of unit
//! mutations and appends the matching movement rows before returning, all
//! inside one transaction. Each operation exists in two forms: the plain
//! method opens and commits its own transaction, the `*_in` method joins the
//! transaction of an outer business operation (sale finalization, count
//! reconciliation) and holds the actual logic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{DocumentKind, InventoryUnit, MovementKind, UnitStatus};
use crate::services::catalog::CatalogService;
use crate::services::movements::{MovementService, NewMovement};
use crate::services::units::UnitService;

/// Condition labels that route stock away from sellable status. Returned
/// goods in any other condition come back as AVAILABLE.
const NON_SELLABLE_CONDITIONS: [&str; 3] = ["damaged", "defective", "for_parts"];

/// Map a condition label to the unit status it implies
pub fn status_for_condition(condition: &str) -> UnitStatus {
    let normalized = condition.trim().to_lowercase();
    if NON_SELLABLE_CONDITIONS.contains(&normalized.as_str()) {
        UnitStatus::Damaged
    } else {
        UnitStatus::Available
    }
}

/// Per-unit cost of an assembled composite, rounded to 2 decimal places
pub fn blended_unit_cost(total_component_cost: Decimal, quantity: i32) -> Decimal {
    (total_component_cost / Decimal::from(quantity)).round_dp(2)
}

/// Input for lot intake
#[derive(Debug, Deserialize)]
pub struct AddStockInput {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub condition: Option<String>,
    pub notes: Option<String>,
    pub receipt_line_id: Option<Uuid>,
}

/// Input for serialized intake
#[derive(Debug, Deserialize)]
pub struct AddSerializedUnitInput {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub serial: String,
    pub unit_cost: Decimal,
    pub condition: Option<String>,
    pub notes: Option<String>,
    pub receipt_line_id: Option<Uuid>,
}

/// Input for manual adjustment
#[derive(Debug, Deserialize)]
pub struct AdjustStockInput {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub delta: i32,
    pub reason: String,
}

/// Input for a stock transfer (exactly one of `quantity` or `serial`)
#[derive(Debug, Deserialize)]
pub struct TransferStockInput {
    pub product_id: Uuid,
    pub from_location_id: Uuid,
    pub to_location_id: Uuid,
    pub quantity: Option<i32>,
    pub serial: Option<String>,
}

/// Outcome of a transfer. For serialized units both fields are the same
/// re-pointed unit.
#[derive(Debug, Serialize)]
pub struct TransferOutcome {
    pub source_unit: InventoryUnit,
    pub destination_unit: InventoryUnit,
}

/// Input for a consumption commit (sale or repair line finalization)
#[derive(Debug, Deserialize)]
pub struct CommitConsumptionInput {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: i32,
    pub unit_id: Option<Uuid>,
    pub reference_type: DocumentKind,
    pub reference_id: Uuid,
}

/// What the caller needs to record cost of goods on its own ledger line
#[derive(Debug, Serialize)]
pub struct ConsumptionReceipt {
    pub unit_id: Uuid,
    pub unit_cost: Decimal,
}

/// Input for reversing a prior consumption by document reference
#[derive(Debug, Deserialize)]
pub struct ReverseConsumptionInput {
    pub reference_type: DocumentKind,
    pub reference_id: Uuid,
    pub reason: Option<String>,
}

/// Input for reintroducing previously consumed goods (returns)
#[derive(Debug, Deserialize)]
pub struct RestockInput {
    pub unit_id: Uuid,
    pub quantity: i32,
    pub condition: String,
    pub location_id: Uuid,
    pub reference_type: DocumentKind,
    pub reference_id: Uuid,
}

/// Input for composite assembly
#[derive(Debug, Deserialize)]
pub struct AssembleInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub target_location_id: Uuid,
    pub component_location_id: Uuid,
}

/// Input for composite disassembly
#[derive(Debug, Deserialize)]
pub struct DisassembleInput {
    pub unit_id: Uuid,
    pub quantity: i32,
    pub component_location_id: Uuid,
}

/// Outcome of a disassembly
#[derive(Debug, Serialize)]
pub struct DisassemblyOutcome {
    pub composite_unit: InventoryUnit,
    pub component_units: Vec<InventoryUnit>,
}

/// Input for consuming a part against a repair line
#[derive(Debug, Deserialize)]
pub struct ConsumeRepairPartInput {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub repair_line_id: Uuid,
}

/// Stock operations engine
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Receive non-serialized stock into the matching lot
    pub async fn add_stock(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        input: AddStockInput,
    ) -> AppResult<InventoryUnit> {
        let mut tx = self.db.begin().await?;
        let unit = self.add_stock_in(&mut tx, store_id, actor_id, input).await?;
        tx.commit().await?;
        Ok(unit)
    }

    /// Lot intake inside an ambient transaction
    pub async fn add_stock_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        input: AddStockInput,
    ) -> AppResult<InventoryUnit> {
        if input.quantity <= 0 {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be positive".to_string(),
                message_es: "La cantidad debe ser positiva".to_string(),
            });
        }

        let product = CatalogService::get_product_in(conn, store_id, input.product_id).await?;
        if product.tracks_serial {
            return Err(AppError::Validation {
                field: "product_id".to_string(),
                message: "Serialized products are received one serial at a time".to_string(),
                message_es: "Los productos serializados se reciben serial por serial".to_string(),
            });
        }

        CatalogService::ensure_active_location_in(conn, store_id, input.location_id).await?;

        let condition = input.condition.unwrap_or_else(|| "new".to_string());
        let status = status_for_condition(&condition);

        let lot = UnitService::find_or_create_lot_in(
            conn,
            store_id,
            product.id,
            input.location_id,
            input.unit_cost,
            &condition,
            status,
            input.receipt_line_id,
        )
        .await?;

        let lot = UnitService::apply_quantity_delta_in(conn, lot.id, input.quantity).await?;

        MovementService::record_in(
            conn,
            store_id,
            actor_id,
            NewMovement {
                product_id: product.id,
                unit_id: Some(lot.id),
                kind: MovementKind::Intake,
                quantity_delta: input.quantity,
                from_location_id: None,
                to_location_id: Some(input.location_id),
                unit_cost: Some(input.unit_cost),
                reference: input
                    .receipt_line_id
                    .map(|id| (DocumentKind::ReceiptLine, id)),
                notes: input.notes,
            },
        )
        .await?;

        Ok(lot)
    }

    /// Receive one serialized unit
    pub async fn add_serialized_unit(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        input: AddSerializedUnitInput,
    ) -> AppResult<InventoryUnit> {
        let mut tx = self.db.begin().await?;
        let unit = self
            .add_serialized_unit_in(&mut tx, store_id, actor_id, input)
            .await?;
        tx.commit().await?;
        Ok(unit)
    }

    /// Serialized intake inside an ambient transaction
    pub async fn add_serialized_unit_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        input: AddSerializedUnitInput,
    ) -> AppResult<InventoryUnit> {
        let serial = input.serial.trim();
        if serial.is_empty() {
            return Err(AppError::Validation {
                field: "serial".to_string(),
                message: "Serial cannot be empty".to_string(),
                message_es: "El número de serie no puede estar vacío".to_string(),
            });
        }

        let product = CatalogService::get_product_in(conn, store_id, input.product_id).await?;
        if !product.tracks_serial {
            return Err(AppError::Validation {
                field: "product_id".to_string(),
                message: "Product does not track serials".to_string(),
                message_es: "El producto no maneja números de serie".to_string(),
            });
        }

        CatalogService::ensure_active_location_in(conn, store_id, input.location_id).await?;

        // Serials are unique across the whole system, not per location.
        if UnitService::serial_exists_in(conn, serial).await? {
            return Err(AppError::DuplicateEntry("serial".to_string()));
        }

        let condition = input.condition.unwrap_or_else(|| "new".to_string());
        let status = status_for_condition(&condition);

        let unit = sqlx::query_as::<_, InventoryUnit>(
            r#"
            INSERT INTO inventory_units
                (store_id, product_id, location_id, quantity, unit_cost, condition, status,
                 serial, notes, receipt_line_id)
            VALUES ($1, $2, $3, 1, $4, $5, $6, $7, $8, $9)
            RETURNING id, store_id, product_id, location_id, quantity, unit_cost, condition,
                      status, serial, notes, receipt_line_id, created_at, updated_at
            "#,
        )
        .bind(store_id)
        .bind(product.id)
        .bind(input.location_id)
        .bind(input.unit_cost)
        .bind(&condition)
        .bind(status)
        .bind(serial)
        .bind(&input.notes)
        .bind(input.receipt_line_id)
        .fetch_one(&mut *conn)
        .await?;

        MovementService::record_in(
            conn,
            store_id,
            actor_id,
            NewMovement {
                product_id: product.id,
                unit_id: Some(unit.id),
                kind: MovementKind::Intake,
                quantity_delta: 1,
                from_location_id: None,
                to_location_id: Some(input.location_id),
                unit_cost: Some(input.unit_cost),
                reference: input
                    .receipt_line_id
                    .map(|id| (DocumentKind::ReceiptLine, id)),
                notes: input.notes,
            },
        )
        .await?;

        Ok(unit)
    }

    /// Manually correct lot stock up or down
    pub async fn adjust_stock(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        input: AdjustStockInput,
    ) -> AppResult<InventoryUnit> {
        let mut tx = self.db.begin().await?;
        let unit = self
            .adjust_stock_in(&mut tx, store_id, actor_id, input)
            .await?;
        tx.commit().await?;
        Ok(unit)
    }

    /// Manual adjustment inside an ambient transaction
    pub async fn adjust_stock_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        input: AdjustStockInput,
    ) -> AppResult<InventoryUnit> {
        self.adjust_stock_with_kind_in(
            conn,
            store_id,
            actor_id,
            input,
            MovementKind::Adjustment,
            None,
        )
        .await
    }

    /// Adjustment core, shared with count reconciliation (which records its
    /// movements as `count_adjustment` referencing the session).
    pub async fn adjust_stock_with_kind_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        input: AdjustStockInput,
        kind: MovementKind,
        reference: Option<(DocumentKind, Uuid)>,
    ) -> AppResult<InventoryUnit> {
        if input.delta == 0 {
            return Err(AppError::Validation {
                field: "delta".to_string(),
                message: "Delta cannot be zero".to_string(),
                message_es: "El ajuste no puede ser cero".to_string(),
            });
        }

        let product = CatalogService::get_product_in(conn, store_id, input.product_id).await?;
        if product.tracks_serial {
            return Err(AppError::Validation {
                field: "product_id".to_string(),
                message: "Serialized stock is corrected through status transitions, not adjustments"
                    .to_string(),
                message_es: "El inventario serializado se corrige por transiciones de estado, no por ajustes"
                    .to_string(),
            });
        }

        CatalogService::ensure_active_location_in(conn, store_id, input.location_id).await?;

        let lot = if input.delta < 0 {
            UnitService::find_available_lot_in(
                conn,
                store_id,
                product.id,
                input.location_id,
                -input.delta,
            )
            .await?
            .ok_or_else(|| {
                AppError::InsufficientStock(format!(
                    "no lot of product {} at this location holds {} units",
                    product.sku, -input.delta
                ))
            })?
        } else {
            match UnitService::find_oldest_lot_in(conn, store_id, product.id, input.location_id)
                .await?
            {
                Some(lot) => lot,
                // Administrators may correct under-counted stock without
                // knowing historical cost: fall back to the catalog default.
                None => {
                    UnitService::find_or_create_lot_in(
                        conn,
                        store_id,
                        product.id,
                        input.location_id,
                        product.default_unit_cost,
                        "new",
                        UnitStatus::Available,
                        None,
                    )
                    .await?
                }
            }
        };

        let lot = UnitService::apply_quantity_delta_in(conn, lot.id, input.delta).await?;

        let (from_location_id, to_location_id) = if input.delta < 0 {
            (Some(input.location_id), None)
        } else {
            (None, Some(input.location_id))
        };

        MovementService::record_in(
            conn,
            store_id,
            actor_id,
            NewMovement {
                product_id: product.id,
                unit_id: Some(lot.id),
                kind,
                quantity_delta: input.delta,
                from_location_id,
                to_location_id,
                unit_cost: Some(lot.unit_cost),
                reference,
                notes: Some(input.reason),
            },
        )
        .await?;

        Ok(lot)
    }

    /// Move stock between two locations
    pub async fn transfer_stock(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        input: TransferStockInput,
    ) -> AppResult<TransferOutcome> {
        let mut tx = self.db.begin().await?;
        let outcome = self
            .transfer_stock_in(&mut tx, store_id, actor_id, input)
            .await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Transfer inside an ambient transaction. Lots carry cost and condition
    /// over to the destination lot; serialized units are re-pointed.
    pub async fn transfer_stock_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        input: TransferStockInput,
    ) -> AppResult<TransferOutcome> {
        if input.from_location_id == input.to_location_id {
            return Err(AppError::Validation {
                field: "to_location_id".to_string(),
                message: "Source and destination locations must differ".to_string(),
                message_es: "La ubicación de origen y destino deben ser distintas".to_string(),
            });
        }

        let product = CatalogService::get_product_in(conn, store_id, input.product_id).await?;
        CatalogService::ensure_active_location_in(conn, store_id, input.from_location_id).await?;
        CatalogService::ensure_active_location_in(conn, store_id, input.to_location_id).await?;

        match (input.quantity, &input.serial) {
            (Some(_), Some(_)) | (None, None) => Err(AppError::ValidationError(
                "provide exactly one of quantity or serial".to_string(),
            )),
            (None, Some(serial)) => {
                if !product.tracks_serial {
                    return Err(AppError::Validation {
                        field: "serial".to_string(),
                        message: "Product does not track serials".to_string(),
                        message_es: "El producto no maneja números de serie".to_string(),
                    });
                }

                let unit = UnitService::find_serialized_unit_in(conn, store_id, serial).await?;
                if unit.product_id != product.id || unit.location_id != input.from_location_id {
                    return Err(AppError::NotFound("Serialized unit at source location".to_string()));
                }
                if unit.status.is_terminal() || unit.quantity == 0 {
                    return Err(AppError::Conflict {
                        resource: "serial".to_string(),
                        message: format!("Unit {} is not available for transfer", serial),
                        message_es: format!("La unidad {} no está disponible para traslado", serial),
                    });
                }

                let unit = UnitService::update_serialized_state_in(
                    conn,
                    unit.id,
                    unit.quantity,
                    unit.status,
                    input.to_location_id,
                    &unit.condition,
                )
                .await?;

                self.record_transfer_pair(
                    conn, store_id, actor_id, product.id, unit.id, unit.id, 1,
                    input.from_location_id, input.to_location_id, unit.unit_cost,
                )
                .await?;

                Ok(TransferOutcome {
                    source_unit: unit.clone(),
                    destination_unit: unit,
                })
            }
            (Some(quantity), None) => {
                if quantity <= 0 {
                    return Err(AppError::Validation {
                        field: "quantity".to_string(),
                        message: "Quantity must be positive".to_string(),
                        message_es: "La cantidad debe ser positiva".to_string(),
                    });
                }
                if product.tracks_serial {
                    return Err(AppError::Validation {
                        field: "quantity".to_string(),
                        message: "Serialized products transfer by serial".to_string(),
                        message_es: "Los productos serializados se trasladan por número de serie"
                            .to_string(),
                    });
                }

                let source = UnitService::find_available_lot_in(
                    conn,
                    store_id,
                    product.id,
                    input.from_location_id,
                    quantity,
                )
                .await?
                .ok_or_else(|| {
                    AppError::InsufficientStock(format!(
                        "no lot of product {} at the source location holds {} units",
                        product.sku, quantity
                    ))
                })?;

                let source = UnitService::apply_quantity_delta_in(conn, source.id, -quantity).await?;

                let destination = UnitService::find_or_create_lot_in(
                    conn,
                    store_id,
                    product.id,
                    input.to_location_id,
                    source.unit_cost,
                    &source.condition,
                    source.status,
                    None,
                )
                .await?;
                let destination =
                    UnitService::apply_quantity_delta_in(conn, destination.id, quantity).await?;

                self.record_transfer_pair(
                    conn, store_id, actor_id, product.id, source.id, destination.id, quantity,
                    input.from_location_id, input.to_location_id, source.unit_cost,
                )
                .await?;

                Ok(TransferOutcome {
                    source_unit: source,
                    destination_unit: destination,
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_transfer_pair(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        product_id: Uuid,
        out_unit_id: Uuid,
        in_unit_id: Uuid,
        quantity: i32,
        from_location_id: Uuid,
        to_location_id: Uuid,
        unit_cost: Decimal,
    ) -> AppResult<()> {
        MovementService::record_in(
            conn,
            store_id,
            actor_id,
            NewMovement {
                product_id,
                unit_id: Some(out_unit_id),
                kind: MovementKind::TransferOut,
                quantity_delta: -quantity,
                from_location_id: Some(from_location_id),
                to_location_id: Some(to_location_id),
                unit_cost: Some(unit_cost),
                reference: None,
                notes: None,
            },
        )
        .await?;

        MovementService::record_in(
            conn,
            store_id,
            actor_id,
            NewMovement {
                product_id,
                unit_id: Some(in_unit_id),
                kind: MovementKind::TransferIn,
                quantity_delta: quantity,
                from_location_id: Some(from_location_id),
                to_location_id: Some(to_location_id),
                unit_cost: Some(unit_cost),
                reference: None,
                notes: None,
            },
        )
        .await?;

        Ok(())
    }

    /// Consume stock when a sale or repair line finalizes
    pub async fn commit_for_consumption(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        input: CommitConsumptionInput,
    ) -> AppResult<ConsumptionReceipt> {
        let mut tx = self.db.begin().await?;
        let receipt = self
            .commit_for_consumption_in(&mut tx, store_id, actor_id, input)
            .await?;
        tx.commit().await?;
        Ok(receipt)
    }

    /// Consumption commit inside an ambient transaction. Returns the unit
    /// consumed and its cost so the caller can record cost of goods on its
    /// own document line.
    pub async fn commit_for_consumption_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        input: CommitConsumptionInput,
    ) -> AppResult<ConsumptionReceipt> {
        if input.quantity <= 0 {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be positive".to_string(),
                message_es: "La cantidad debe ser positiva".to_string(),
            });
        }

        let product = CatalogService::get_product_in(conn, store_id, input.product_id).await?;
        CatalogService::ensure_active_location_in(conn, store_id, input.location_id).await?;

        let unit = match input.unit_id {
            Some(unit_id) => {
                let unit = UnitService::get_unit_for_update_in(conn, store_id, unit_id).await?;
                if unit.product_id != product.id || unit.location_id != input.location_id {
                    return Err(AppError::Validation {
                        field: "unit_id".to_string(),
                        message: "Unit does not belong to this product and location".to_string(),
                        message_es: "La unidad no pertenece a este producto y ubicación".to_string(),
                    });
                }
                if unit.status.is_terminal() {
                    return Err(AppError::Conflict {
                        resource: "unit_id".to_string(),
                        message: format!("Unit is already {}", unit.status.as_str()),
                        message_es: format!("La unidad ya está {}", unit.status.as_str()),
                    });
                }
                unit
            }
            None => {
                // Serialized consumption needs a human-chosen physical unit;
                // auto-selection only applies to lots.
                if product.tracks_serial {
                    return Err(AppError::Validation {
                        field: "unit_id".to_string(),
                        message: "Serialized products require an explicit unit".to_string(),
                        message_es: "Los productos serializados requieren una unidad explícita"
                            .to_string(),
                    });
                }

                UnitService::find_available_lot_in(
                    conn,
                    store_id,
                    product.id,
                    input.location_id,
                    input.quantity,
                )
                .await?
                .ok_or_else(|| {
                    AppError::InsufficientStock(format!(
                        "no lot of product {} at this location holds {} units",
                        product.sku, input.quantity
                    ))
                })?
            }
        };

        let unit = if unit.is_serialized() {
            if input.quantity != 1 {
                return Err(AppError::Validation {
                    field: "quantity".to_string(),
                    message: "Serialized units are consumed one at a time".to_string(),
                    message_es: "Las unidades serializadas se consumen de a una".to_string(),
                });
            }
            if unit.quantity != 1 {
                return Err(AppError::Conflict {
                    resource: "unit_id".to_string(),
                    message: "Unit has already been consumed".to_string(),
                    message_es: "La unidad ya fue consumida".to_string(),
                });
            }

            UnitService::update_serialized_state_in(
                conn,
                unit.id,
                0,
                input.reference_type.consumed_status(),
                unit.location_id,
                &unit.condition,
            )
            .await?
        } else {
            if unit.quantity < input.quantity {
                return Err(AppError::InsufficientStock(format!(
                    "lot holds {} of the {} requested",
                    unit.quantity, input.quantity
                )));
            }
            UnitService::apply_quantity_delta_in(conn, unit.id, -input.quantity).await?
        };

        MovementService::record_in(
            conn,
            store_id,
            actor_id,
            NewMovement {
                product_id: product.id,
                unit_id: Some(unit.id),
                kind: MovementKind::Consumption,
                quantity_delta: -input.quantity,
                from_location_id: Some(input.location_id),
                to_location_id: None,
                unit_cost: Some(unit.unit_cost),
                reference: Some((input.reference_type, input.reference_id)),
                notes: None,
            },
        )
        .await?;

        Ok(ConsumptionReceipt {
            unit_id: unit.id,
            unit_cost: unit.unit_cost,
        })
    }

    /// Restore every unit consumed under a document reference
    pub async fn reverse_consumption(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        input: ReverseConsumptionInput,
    ) -> AppResult<Vec<InventoryUnit>> {
        let mut tx = self.db.begin().await?;
        let units = self
            .reverse_consumption_in(&mut tx, store_id, actor_id, input)
            .await?;
        tx.commit().await?;
        Ok(units)
    }

    /// Consumption reversal inside an ambient transaction.
    ///
    /// The engine does not detect replay: reversing the same reference twice
    /// double-restores stock. Callers gate this behind their own document
    /// state machine (e.g. cancellation only from non-terminal sale states).
    pub async fn reverse_consumption_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        input: ReverseConsumptionInput,
    ) -> AppResult<Vec<InventoryUnit>> {
        let consumptions = MovementService::find_consumptions_in(
            conn,
            store_id,
            input.reference_type,
            input.reference_id,
        )
        .await?;

        if consumptions.is_empty() {
            return Err(AppError::NotFound("Consumption for reference".to_string()));
        }

        let mut restored = Vec::with_capacity(consumptions.len());

        for movement in consumptions {
            let unit_id = movement
                .unit_id
                .ok_or_else(|| AppError::Internal("consumption movement without unit".to_string()))?;
            let unit = UnitService::get_unit_for_update_in(conn, store_id, unit_id).await?;
            let quantity = -movement.quantity_delta;

            let unit = if unit.is_serialized() {
                UnitService::update_serialized_state_in(
                    conn,
                    unit.id,
                    1,
                    UnitStatus::Available,
                    unit.location_id,
                    &unit.condition,
                )
                .await?
            } else {
                UnitService::apply_quantity_delta_in(conn, unit.id, quantity).await?
            };

            MovementService::record_in(
                conn,
                store_id,
                actor_id,
                NewMovement {
                    product_id: movement.product_id,
                    unit_id: Some(unit.id),
                    kind: MovementKind::ConsumptionReversal,
                    quantity_delta: quantity,
                    from_location_id: None,
                    to_location_id: Some(unit.location_id),
                    unit_cost: movement.unit_cost,
                    reference: Some((input.reference_type, input.reference_id)),
                    notes: input.reason.clone(),
                },
            )
            .await?;

            restored.push(unit);
        }

        Ok(restored)
    }

    /// Reintroduce returned goods, possibly at a new condition and location
    pub async fn restock(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        input: RestockInput,
    ) -> AppResult<InventoryUnit> {
        let mut tx = self.db.begin().await?;
        let unit = self.restock_in(&mut tx, store_id, actor_id, input).await?;
        tx.commit().await?;
        Ok(unit)
    }

    /// Targeted restock inside an ambient transaction. The new condition
    /// decides sellability: a "damaged" return comes back as DAMAGED stock.
    pub async fn restock_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        input: RestockInput,
    ) -> AppResult<InventoryUnit> {
        if input.quantity <= 0 {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be positive".to_string(),
                message_es: "La cantidad debe ser positiva".to_string(),
            });
        }

        let condition = input.condition.trim().to_string();
        if condition.is_empty() {
            return Err(AppError::Validation {
                field: "condition".to_string(),
                message: "Condition cannot be empty".to_string(),
                message_es: "La condición no puede estar vacía".to_string(),
            });
        }

        let original = UnitService::get_unit_for_update_in(conn, store_id, input.unit_id).await?;
        CatalogService::ensure_active_location_in(conn, store_id, input.location_id).await?;

        let status = status_for_condition(&condition);

        let unit = if original.is_serialized() {
            if input.quantity != 1 {
                return Err(AppError::Validation {
                    field: "quantity".to_string(),
                    message: "Serialized units restock one at a time".to_string(),
                    message_es: "Las unidades serializadas se reingresan de a una".to_string(),
                });
            }
            if original.quantity == 1 {
                return Err(AppError::Conflict {
                    resource: "unit_id".to_string(),
                    message: "Unit is already in stock".to_string(),
                    message_es: "La unidad ya está en inventario".to_string(),
                });
            }

            UnitService::update_serialized_state_in(
                conn,
                original.id,
                1,
                status,
                input.location_id,
                &condition,
            )
            .await?
        } else {
            let lot = UnitService::find_or_create_lot_in(
                conn,
                store_id,
                original.product_id,
                input.location_id,
                original.unit_cost,
                &condition,
                status,
                None,
            )
            .await?;
            UnitService::apply_quantity_delta_in(conn, lot.id, input.quantity).await?
        };

        MovementService::record_in(
            conn,
            store_id,
            actor_id,
            NewMovement {
                product_id: original.product_id,
                unit_id: Some(unit.id),
                kind: MovementKind::Return,
                quantity_delta: input.quantity,
                from_location_id: None,
                to_location_id: Some(input.location_id),
                unit_cost: Some(original.unit_cost),
                reference: Some((input.reference_type, input.reference_id)),
                notes: None,
            },
        )
        .await?;

        Ok(unit)
    }

    /// Build composite units from component stock
    pub async fn assemble(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        input: AssembleInput,
    ) -> AppResult<InventoryUnit> {
        let mut tx = self.db.begin().await?;
        let unit = self.assemble_in(&mut tx, store_id, actor_id, input).await?;
        tx.commit().await?;
        Ok(unit)
    }

    /// Assembly inside an ambient transaction. Consumes each component from
    /// its oldest sufficient lot, then credits the composite at the blended
    /// component cost. Any missing component fails the whole operation.
    pub async fn assemble_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        input: AssembleInput,
    ) -> AppResult<InventoryUnit> {
        if input.quantity <= 0 {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be positive".to_string(),
                message_es: "La cantidad debe ser positiva".to_string(),
            });
        }

        let product = CatalogService::get_product_in(conn, store_id, input.product_id).await?;
        if !product.is_composite {
            return Err(AppError::Validation {
                field: "product_id".to_string(),
                message: "Product is not composite".to_string(),
                message_es: "El producto no es compuesto".to_string(),
            });
        }
        if product.tracks_serial {
            return Err(AppError::Validation {
                field: "product_id".to_string(),
                message: "Serialized composite products are not supported".to_string(),
                message_es: "Los productos compuestos serializados no están soportados".to_string(),
            });
        }

        CatalogService::ensure_active_location_in(conn, store_id, input.target_location_id).await?;
        CatalogService::ensure_active_location_in(conn, store_id, input.component_location_id)
            .await?;

        let components = CatalogService::get_components_in(conn, product.id).await?;
        if components.is_empty() {
            return Err(AppError::Validation {
                field: "product_id".to_string(),
                message: "Composite product has an empty bill of materials".to_string(),
                message_es: "El producto compuesto tiene una lista de materiales vacía".to_string(),
            });
        }

        let mut total_cost = Decimal::ZERO;

        for component in &components {
            let component_product =
                CatalogService::get_product_in(conn, store_id, component.component_product_id)
                    .await?;
            if component_product.tracks_serial {
                return Err(AppError::Validation {
                    field: "product_id".to_string(),
                    message: "Composite products with serialized components are not supported"
                        .to_string(),
                    message_es: "Los compuestos con componentes serializados no están soportados"
                        .to_string(),
                });
            }

            let needed = component.quantity_per_unit * input.quantity;

            let lot = UnitService::find_available_lot_in(
                conn,
                store_id,
                component_product.id,
                input.component_location_id,
                needed,
            )
            .await?
            .ok_or_else(|| {
                AppError::InsufficientStock(format!(
                    "no lot of component {} holds the {} units required",
                    component_product.sku, needed
                ))
            })?;

            let lot = UnitService::apply_quantity_delta_in(conn, lot.id, -needed).await?;
            total_cost += lot.unit_cost * Decimal::from(needed);

            MovementService::record_in(
                conn,
                store_id,
                actor_id,
                NewMovement {
                    product_id: component_product.id,
                    unit_id: Some(lot.id),
                    kind: MovementKind::AssemblyOut,
                    quantity_delta: -needed,
                    from_location_id: Some(input.component_location_id),
                    to_location_id: None,
                    unit_cost: Some(lot.unit_cost),
                    reference: None,
                    notes: None,
                },
            )
            .await?;
        }

        let unit_cost = blended_unit_cost(total_cost, input.quantity);

        let composite = UnitService::find_or_create_lot_in(
            conn,
            store_id,
            product.id,
            input.target_location_id,
            unit_cost,
            "new",
            UnitStatus::Available,
            None,
        )
        .await?;
        let composite =
            UnitService::apply_quantity_delta_in(conn, composite.id, input.quantity).await?;

        MovementService::record_in(
            conn,
            store_id,
            actor_id,
            NewMovement {
                product_id: product.id,
                unit_id: Some(composite.id),
                kind: MovementKind::AssemblyIn,
                quantity_delta: input.quantity,
                from_location_id: None,
                to_location_id: Some(input.target_location_id),
                unit_cost: Some(unit_cost),
                reference: None,
                notes: None,
            },
        )
        .await?;

        Ok(composite)
    }

    /// Break composite units back into components
    pub async fn disassemble(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        input: DisassembleInput,
    ) -> AppResult<DisassemblyOutcome> {
        let mut tx = self.db.begin().await?;
        let outcome = self
            .disassemble_in(&mut tx, store_id, actor_id, input)
            .await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Disassembly inside an ambient transaction. Components come back at
    /// their catalog default cost: the blended assembly cost is no longer
    /// recoverable per component.
    pub async fn disassemble_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        input: DisassembleInput,
    ) -> AppResult<DisassemblyOutcome> {
        if input.quantity <= 0 {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be positive".to_string(),
                message_es: "La cantidad debe ser positiva".to_string(),
            });
        }

        let composite = UnitService::get_unit_for_update_in(conn, store_id, input.unit_id).await?;
        let product = CatalogService::get_product_in(conn, store_id, composite.product_id).await?;
        if !product.is_composite {
            return Err(AppError::Validation {
                field: "unit_id".to_string(),
                message: "Unit is not composite stock".to_string(),
                message_es: "La unidad no es inventario compuesto".to_string(),
            });
        }
        if composite.status.is_terminal() {
            return Err(AppError::Conflict {
                resource: "unit_id".to_string(),
                message: format!("Unit is {}", composite.status.as_str()),
                message_es: format!("La unidad está {}", composite.status.as_str()),
            });
        }
        if composite.quantity < input.quantity {
            return Err(AppError::InsufficientStock(format!(
                "composite lot holds {} of the {} requested",
                composite.quantity, input.quantity
            )));
        }

        CatalogService::ensure_active_location_in(conn, store_id, input.component_location_id)
            .await?;

        let components = CatalogService::get_components_in(conn, product.id).await?;

        let composite = UnitService::apply_quantity_delta_in(conn, composite.id, -input.quantity)
            .await?;

        MovementService::record_in(
            conn,
            store_id,
            actor_id,
            NewMovement {
                product_id: product.id,
                unit_id: Some(composite.id),
                kind: MovementKind::DisassemblyOut,
                quantity_delta: -input.quantity,
                from_location_id: Some(composite.location_id),
                to_location_id: None,
                unit_cost: Some(composite.unit_cost),
                reference: None,
                notes: None,
            },
        )
        .await?;

        let mut component_units = Vec::with_capacity(components.len());

        for component in &components {
            let component_product =
                CatalogService::get_product_in(conn, store_id, component.component_product_id)
                    .await?;
            let restored = component.quantity_per_unit * input.quantity;

            let lot = UnitService::find_or_create_lot_in(
                conn,
                store_id,
                component_product.id,
                input.component_location_id,
                component_product.default_unit_cost,
                "disassembled",
                UnitStatus::Available,
                None,
            )
            .await?;
            let lot = UnitService::apply_quantity_delta_in(conn, lot.id, restored).await?;

            MovementService::record_in(
                conn,
                store_id,
                actor_id,
                NewMovement {
                    product_id: component_product.id,
                    unit_id: Some(lot.id),
                    kind: MovementKind::DisassemblyIn,
                    quantity_delta: restored,
                    from_location_id: None,
                    to_location_id: Some(input.component_location_id),
                    unit_cost: Some(component_product.default_unit_cost),
                    reference: None,
                    notes: None,
                },
            )
            .await?;

            component_units.push(lot);
        }

        Ok(DisassemblyOutcome {
            composite_unit: composite,
            component_units,
        })
    }

    /// Consume a part against a repair line (quantity defaults to 1)
    pub async fn consume_repair_part(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        input: ConsumeRepairPartInput,
    ) -> AppResult<ConsumptionReceipt> {
        let mut tx = self.db.begin().await?;
        let receipt = self
            .consume_repair_part_in(&mut tx, store_id, actor_id, input)
            .await?;
        tx.commit().await?;
        Ok(receipt)
    }

    /// Repair-part consumption inside an ambient transaction
    pub async fn consume_repair_part_in(
        &self,
        conn: &mut PgConnection,
        store_id: Uuid,
        actor_id: Uuid,
        input: ConsumeRepairPartInput,
    ) -> AppResult<ConsumptionReceipt> {
        self.commit_for_consumption_in(
            conn,
            store_id,
            actor_id,
            CommitConsumptionInput {
                product_id: input.product_id,
                location_id: input.location_id,
                quantity: input.quantity.unwrap_or(1),
                unit_id: input.unit_id,
                reference_type: DocumentKind::RepairLine,
                reference_id: input.repair_line_id,
            },
        )
        .await
    }

    /// Undo a repair line's part consumption
    pub async fn reverse_repair_part(
        &self,
        store_id: Uuid,
        actor_id: Uuid,
        repair_line_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<Vec<InventoryUnit>> {
        let mut tx = self.db.begin().await?;
        let units = self
            .reverse_consumption_in(
                &mut tx,
                store_id,
                actor_id,
                ReverseConsumptionInput {
                    reference_type: DocumentKind::RepairLine,
                    reference_id: repair_line_id,
                    reason,
                },
            )
            .await?;
        tx.commit().await?;
        Ok(units)
    }
}
