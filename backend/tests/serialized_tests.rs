//! Serialized (IMEI-tracked) unit tests
//!
//! Tests for the serialized-stock invariants:
//! - Serials are unique across the whole system
//! - Serialized quantity is always 0 or 1
//! - Consume/reverse round-trips restore status and quantity
//! - Consumed status follows the referencing document kind

use proptest::prelude::*;
use std::collections::HashSet;

/// A serialized unit in the simulation
#[derive(Debug, Clone, PartialEq)]
pub struct SimSerializedUnit {
    pub serial: String,
    pub quantity: i32,
    pub status: &'static str,
    pub location: u32,
}

impl SimSerializedUnit {
    pub fn new(serial: &str, location: u32) -> Self {
        Self {
            serial: serial.to_string(),
            quantity: 1,
            status: "available",
            location,
        }
    }
}

/// Register a serial, enforcing global uniqueness
pub fn register_serial(registry: &mut HashSet<String>, serial: &str) -> Result<(), &'static str> {
    if serial.trim().is_empty() {
        return Err("serial cannot be empty");
    }
    if !registry.insert(serial.to_string()) {
        return Err("duplicate serial");
    }
    Ok(())
}

/// Status a serialized unit takes when consumed against a document kind
pub fn consumed_status(reference_type: &str) -> &'static str {
    match reference_type {
        "repair_line" => "used_in_consumption",
        _ => "sold",
    }
}

/// Consume a serialized unit (quantity 1 -> 0, status leaves AVAILABLE)
pub fn consume(unit: &mut SimSerializedUnit, reference_type: &str) -> Result<(), &'static str> {
    if unit.status != "available" || unit.quantity != 1 {
        return Err("unit is not available");
    }
    unit.quantity = 0;
    unit.status = consumed_status(reference_type);
    Ok(())
}

/// Reverse a consumption (quantity 0 -> 1, status back to AVAILABLE)
pub fn reverse(unit: &mut SimSerializedUnit) {
    unit.quantity = 1;
    unit.status = "available";
}

/// Reintroduce a consumed unit at a new condition (quantity 0 -> 1)
pub fn restock(unit: &mut SimSerializedUnit, condition: &str) -> Result<(), &'static str> {
    if unit.quantity == 1 {
        return Err("unit is already in stock");
    }
    unit.quantity = 1;
    unit.status = match condition {
        "damaged" | "defective" | "for_parts" => "damaged",
        _ => "available",
    };
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test serial uniqueness across the system
    #[test]
    fn test_duplicate_serial_rejected() {
        let mut registry = HashSet::new();

        assert!(register_serial(&mut registry, "SN1").is_ok());
        assert_eq!(register_serial(&mut registry, "SN1"), Err("duplicate serial"));
        // Different serial still accepted
        assert!(register_serial(&mut registry, "SN2").is_ok());
    }

    /// Test empty serial rejected
    #[test]
    fn test_empty_serial_rejected() {
        let mut registry = HashSet::new();
        assert!(register_serial(&mut registry, "").is_err());
        assert!(register_serial(&mut registry, "   ").is_err());
    }

    /// Scenario: add SN1, consume it, reverse the consumption
    #[test]
    fn test_consume_reverse_round_trip() {
        let mut unit = SimSerializedUnit::new("SN1", 1);
        assert_eq!(unit.quantity, 1);
        assert_eq!(unit.status, "available");

        consume(&mut unit, "sale_line").unwrap();
        assert_eq!(unit.quantity, 0);
        assert_eq!(unit.status, "sold");

        reverse(&mut unit);
        assert_eq!(unit.quantity, 1);
        assert_eq!(unit.status, "available");
    }

    /// Test double consumption rejected
    #[test]
    fn test_double_consumption_rejected() {
        let mut unit = SimSerializedUnit::new("SN1", 1);

        consume(&mut unit, "sale_line").unwrap();
        assert_eq!(consume(&mut unit, "sale_line"), Err("unit is not available"));
        // State unchanged by the failed attempt
        assert_eq!(unit.quantity, 0);
        assert_eq!(unit.status, "sold");
    }

    /// Test consumed status follows document kind
    #[test]
    fn test_consumed_status_by_document() {
        assert_eq!(consumed_status("sale_line"), "sold");
        assert_eq!(consumed_status("repair_line"), "used_in_consumption");
        assert_eq!(consumed_status("order"), "sold");
    }

    /// Test transfer re-points the location, quantity unaffected
    #[test]
    fn test_transfer_repoints_location() {
        let mut unit = SimSerializedUnit::new("SN1", 1);

        unit.location = 2;

        assert_eq!(unit.location, 2);
        assert_eq!(unit.quantity, 1);
        assert_eq!(unit.status, "available");
    }

    /// Test consumed unit cannot transfer
    #[test]
    fn test_consumed_unit_cannot_transfer() {
        let mut unit = SimSerializedUnit::new("SN1", 1);
        consume(&mut unit, "sale_line").unwrap();

        // Only AVAILABLE units may move
        let transferable = unit.status == "available" && unit.quantity == 1;
        assert!(!transferable);
    }

    /// Test restock condition decides the returned status
    #[test]
    fn test_restock_condition_routing() {
        let mut sold = SimSerializedUnit::new("SN1", 1);
        consume(&mut sold, "sale_line").unwrap();
        restock(&mut sold, "used").unwrap();
        assert_eq!(sold.quantity, 1);
        assert_eq!(sold.status, "available");

        let mut broken = SimSerializedUnit::new("SN2", 1);
        consume(&mut broken, "sale_line").unwrap();
        restock(&mut broken, "damaged").unwrap();
        assert_eq!(broken.quantity, 1);
        assert_eq!(broken.status, "damaged");
    }

    /// Test restock requires a consumed unit; a second restock double-counts
    #[test]
    fn test_restock_requires_consumed_unit() {
        let mut unit = SimSerializedUnit::new("SN1", 1);

        // Still in stock: nothing to reintroduce
        assert_eq!(restock(&mut unit, "used"), Err("unit is already in stock"));

        consume(&mut unit, "sale_line").unwrap();
        restock(&mut unit, "damaged").unwrap();
        // Back in stock (as damaged goods): restocking again is rejected
        assert_eq!(restock(&mut unit, "used"), Err("unit is already in stock"));
        assert_eq!(unit.quantity, 1);
        assert_eq!(unit.status, "damaged");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for serials
    fn serial_strategy() -> impl Strategy<Value = String> {
        "[A-Z0-9]{8,15}"
    }

    /// Strategy for a sequence of consume/reverse attempts
    fn op_strategy() -> impl Strategy<Value = bool> {
        any::<bool>()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Serialized bound: quantity stays in {0, 1} under any op sequence
        #[test]
        fn prop_serialized_quantity_bounded(ops in prop::collection::vec(op_strategy(), 1..50)) {
            let mut unit = SimSerializedUnit::new("SN1", 1);

            for is_consume in ops {
                if is_consume {
                    let _ = consume(&mut unit, "sale_line");
                } else if unit.quantity == 0 {
                    reverse(&mut unit);
                }

                prop_assert!(unit.quantity == 0 || unit.quantity == 1);
                // Quantity and status always agree
                if unit.quantity == 1 {
                    prop_assert_eq!(unit.status, "available");
                } else {
                    prop_assert!(unit.status != "available");
                }
            }
        }

        /// Registering distinct serials always succeeds; re-registering any
        /// of them always fails
        #[test]
        fn prop_serial_uniqueness(serials in prop::collection::hash_set(serial_strategy(), 1..20)) {
            let mut registry = HashSet::new();

            for serial in &serials {
                prop_assert!(register_serial(&mut registry, serial).is_ok());
            }
            for serial in &serials {
                prop_assert!(register_serial(&mut registry, serial).is_err());
            }
        }

        /// Round-trip: consume then reverse restores the initial state
        #[test]
        fn prop_consume_reverse_restores(serial in serial_strategy(), location in 1..10u32) {
            let mut unit = SimSerializedUnit::new(&serial, location);
            let before = unit.clone();

            consume(&mut unit, "repair_line").unwrap();
            prop_assert_eq!(unit.quantity, 0);
            prop_assert_eq!(unit.status, "used_in_consumption");

            reverse(&mut unit);
            prop_assert_eq!(unit, before);
        }
    }
}
