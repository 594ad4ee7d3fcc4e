//! Physical count reconciliation tests
//!
//! Tests for the count session workflow:
//! - Discrepancy = counted - system, recomputed on every entry
//! - Sessions move IN_PROGRESS -> COMPLETED exactly once
//! - Finalization adjusts every non-zero lot discrepancy, skips serialized
//!   lines, and is all-or-nothing

use proptest::prelude::*;

/// A count line in the simulation
#[derive(Debug, Clone)]
pub struct SimCountLine {
    pub system_quantity: i32,
    pub counted_quantity: Option<i32>,
    pub discrepancy: Option<i32>,
    pub tracks_serial: bool,
}

impl SimCountLine {
    pub fn lot(system_quantity: i32) -> Self {
        Self {
            system_quantity,
            counted_quantity: None,
            discrepancy: None,
            tracks_serial: false,
        }
    }

    pub fn serialized(system_quantity: i32) -> Self {
        Self {
            system_quantity,
            counted_quantity: None,
            discrepancy: None,
            tracks_serial: true,
        }
    }
}

/// Record a counted quantity (last write wins until finalization)
pub fn record_count(
    status: &str,
    line: &mut SimCountLine,
    counted: i32,
) -> Result<(), &'static str> {
    if status != "in_progress" {
        return Err("session is not in progress");
    }
    if counted < 0 {
        return Err("counted quantity cannot be negative");
    }
    line.counted_quantity = Some(counted);
    line.discrepancy = Some(counted - line.system_quantity);
    Ok(())
}

/// Finalize a session: returns the adjustments applied (one per non-zero lot
/// discrepancy) and the resulting status. All-or-nothing: if any adjustment
/// fails, stock and status are left untouched.
pub fn finalize(
    status: &str,
    lines: &[SimCountLine],
    stock: &[i32],
) -> Result<(Vec<i32>, Vec<i32>, &'static str), &'static str> {
    if status != "in_progress" {
        return Err("session is already completed");
    }

    let mut new_stock = stock.to_vec();
    let mut adjustments = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let discrepancy = match line.discrepancy {
            Some(d) if d != 0 => d,
            _ => continue,
        };

        // Serialized discrepancies need a human decision: warn and skip
        if line.tracks_serial {
            continue;
        }

        let next = new_stock[i] + discrepancy;
        if next < 0 {
            // The corresponding lot vanished: the whole finalize rolls back
            return Err("adjustment failed");
        }
        new_stock[i] = next;
        adjustments.push(discrepancy);
    }

    Ok((adjustments, new_stock, "completed"))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test discrepancy computation
    #[test]
    fn test_discrepancy_computation() {
        let mut line = SimCountLine::lot(10);
        record_count("in_progress", &mut line, 8).unwrap();

        assert_eq!(line.counted_quantity, Some(8));
        assert_eq!(line.discrepancy, Some(-2));
    }

    /// Test zero discrepancy
    #[test]
    fn test_zero_discrepancy() {
        let mut line = SimCountLine::lot(10);
        record_count("in_progress", &mut line, 10).unwrap();

        assert_eq!(line.discrepancy, Some(0));
    }

    /// Test overage discrepancy
    #[test]
    fn test_overage_discrepancy() {
        let mut line = SimCountLine::lot(10);
        record_count("in_progress", &mut line, 13).unwrap();

        assert_eq!(line.discrepancy, Some(3));
    }

    /// Test last write wins before finalization
    #[test]
    fn test_last_write_wins() {
        let mut line = SimCountLine::lot(10);
        record_count("in_progress", &mut line, 8).unwrap();
        record_count("in_progress", &mut line, 9).unwrap();

        assert_eq!(line.counted_quantity, Some(9));
        assert_eq!(line.discrepancy, Some(-1));
    }

    /// Test recording rejected on a completed session
    #[test]
    fn test_record_on_completed_session_rejected() {
        let mut line = SimCountLine::lot(10);
        assert!(record_count("completed", &mut line, 8).is_err());
        assert_eq!(line.counted_quantity, None);
    }

    /// Test negative counted quantity rejected
    #[test]
    fn test_negative_count_rejected() {
        let mut line = SimCountLine::lot(10);
        assert!(record_count("in_progress", &mut line, -1).is_err());
    }

    /// Scenario: system 10, counted 8 -> adjustment -2, stock 8, completed
    #[test]
    fn test_finalize_applies_shortage() {
        let mut line = SimCountLine::lot(10);
        record_count("in_progress", &mut line, 8).unwrap();

        let (adjustments, stock, status) = finalize("in_progress", &[line], &[10]).unwrap();

        assert_eq!(adjustments, vec![-2]);
        assert_eq!(stock, vec![8]);
        assert_eq!(status, "completed");
    }

    /// Test uncounted and zero-discrepancy lines produce no adjustment
    #[test]
    fn test_finalize_skips_clean_lines() {
        let mut counted_clean = SimCountLine::lot(5);
        record_count("in_progress", &mut counted_clean, 5).unwrap();
        let uncounted = SimCountLine::lot(7);

        let (adjustments, stock, status) =
            finalize("in_progress", &[counted_clean, uncounted], &[5, 7]).unwrap();

        assert!(adjustments.is_empty());
        assert_eq!(stock, vec![5, 7]);
        assert_eq!(status, "completed");
    }

    /// Test serialized lines are skipped but the session still completes
    #[test]
    fn test_finalize_skips_serialized_lines() {
        let mut serialized = SimCountLine::serialized(1);
        record_count("in_progress", &mut serialized, 0).unwrap();
        let mut lot = SimCountLine::lot(10);
        record_count("in_progress", &mut lot, 9).unwrap();

        let (adjustments, stock, status) =
            finalize("in_progress", &[serialized, lot], &[1, 10]).unwrap();

        // Only the lot line was adjusted
        assert_eq!(adjustments, vec![-1]);
        assert_eq!(stock, vec![1, 9]);
        assert_eq!(status, "completed");
    }

    /// Test finalize is all-or-nothing
    #[test]
    fn test_finalize_all_or_nothing() {
        let mut good = SimCountLine::lot(10);
        record_count("in_progress", &mut good, 8).unwrap();
        // The lot behind this line vanished since the snapshot
        let mut stale = SimCountLine::lot(5);
        record_count("in_progress", &mut stale, 0).unwrap();

        let result = finalize("in_progress", &[good, stale], &[10, 3]);

        // One failing adjustment fails the whole finalize
        assert!(result.is_err());
    }

    /// Test finalize rejected on a completed session
    #[test]
    fn test_finalize_completed_session_rejected() {
        let result = finalize("completed", &[], &[]);
        assert!(result.is_err());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for system quantities
    fn system_strategy() -> impl Strategy<Value = i32> {
        0..=500i32
    }

    /// Strategy for counted quantities
    fn counted_strategy() -> impl Strategy<Value = i32> {
        0..=500i32
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Discrepancy is always counted - system
        #[test]
        fn prop_discrepancy_formula(
            system in system_strategy(),
            counted in counted_strategy()
        ) {
            let mut line = SimCountLine::lot(system);
            record_count("in_progress", &mut line, counted).unwrap();

            prop_assert_eq!(line.discrepancy, Some(counted - system));
        }

        /// Re-recording always reflects the latest count
        #[test]
        fn prop_last_write_wins(
            system in system_strategy(),
            counts in prop::collection::vec(counted_strategy(), 1..10)
        ) {
            let mut line = SimCountLine::lot(system);

            for &count in &counts {
                record_count("in_progress", &mut line, count).unwrap();
            }

            let last = *counts.last().unwrap();
            prop_assert_eq!(line.counted_quantity, Some(last));
            prop_assert_eq!(line.discrepancy, Some(last - system));
        }

        /// Finalizing with accurate counts never adjusts anything
        #[test]
        fn prop_accurate_count_no_adjustments(
            systems in prop::collection::vec(system_strategy(), 1..10)
        ) {
            let mut lines: Vec<SimCountLine> =
                systems.iter().map(|&s| SimCountLine::lot(s)).collect();
            for (line, &s) in lines.iter_mut().zip(&systems) {
                record_count("in_progress", line, s).unwrap();
            }

            let (adjustments, stock, status) =
                finalize("in_progress", &lines, &systems).unwrap();

            prop_assert!(adjustments.is_empty());
            prop_assert_eq!(stock, systems);
            prop_assert_eq!(status, "completed");
        }

        /// After a successful finalize, lot stock equals the counted quantity
        #[test]
        fn prop_finalize_reconciles_to_counted(
            pairs in prop::collection::vec((system_strategy(), counted_strategy()), 1..10)
        ) {
            let systems: Vec<i32> = pairs.iter().map(|(s, _)| *s).collect();
            let mut lines: Vec<SimCountLine> =
                systems.iter().map(|&s| SimCountLine::lot(s)).collect();
            for (line, (_, counted)) in lines.iter_mut().zip(&pairs) {
                record_count("in_progress", line, *counted).unwrap();
            }

            // Stock still matches the snapshot, so every adjustment lands
            let (_, stock, status) = finalize("in_progress", &lines, &systems).unwrap();

            for (i, (_, counted)) in pairs.iter().enumerate() {
                prop_assert_eq!(stock[i], *counted);
            }
            prop_assert_eq!(status, "completed");
        }
    }
}
