//! Property-Based Tests for the Measurement Generator
//!
//! # Test Properties
//!
//! 1. **Bounds**: every sampled field lies within its radio bounds
//! 2. **Monotonic Sequence**: sequence numbers advance by exactly one
//! 3. **Shape Determinism**: equal seeds produce equal values and schema

#![cfg(test)]

use proptest::prelude::*;

use super::measurement::CellId;
use super::sampler::{MeasurementGenerator, MeasurementProfile};

// =============================================================================
// Property Strategies
// =============================================================================

/// Strategy for valid (positive) cell identifiers.
fn cell_id_strategy() -> impl Strategy<Value = CellId> {
    (1u64..=u64::from(u32::MAX)).prop_map(|id| CellId::new(id).unwrap())
}

/// Strategy for the profiles the generator ships with.
fn profile_strategy() -> impl Strategy<Value = MeasurementProfile> {
    prop_oneof![
        Just(MeasurementProfile::default()),
        Just(MeasurementProfile::full_range()),
    ]
}

// =============================================================================
// Bounds Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Property: every generated record lies within the hard bounds.
    #[test]
    fn prop_generated_records_within_bounds(
        cell_id in cell_id_strategy(),
        seed in any::<u64>(),
        profile in profile_strategy(),
    ) {
        let mut generator = MeasurementGenerator::with_seed(cell_id, seed)
            .with_profile(profile)?;

        let record = generator.generate();
        prop_assert!(
            record.is_within_bounds(),
            "out of bounds: {:?} in {:?}",
            record.bound_violations(),
            record
        );
        prop_assert_eq!(record.cell_id, cell_id);
    }
}

// =============================================================================
// Sequence Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: consecutive records carry consecutive sequence numbers.
    #[test]
    fn prop_sequence_strictly_increasing(
        seed in any::<u64>(),
        count in 2usize..200,
    ) {
        let mut generator = MeasurementGenerator::with_seed(CellId::default(), seed);

        let mut previous = generator.generate().sequence_number;
        for _ in 1..count {
            let current = generator.generate().sequence_number;
            prop_assert_eq!(current, previous + 1);
            previous = current;
        }
        prop_assert_eq!(generator.next_sequence_number(), count as u64 + 1);
    }

    /// Property: equal seeds give identical values and identical JSON shape.
    #[test]
    fn prop_seeded_generation_is_reproducible(
        cell_id in cell_id_strategy(),
        seed in any::<u64>(),
    ) {
        let mut a = MeasurementGenerator::with_seed(cell_id, seed);
        let mut b = MeasurementGenerator::with_seed(cell_id, seed);

        let mut ra = a.generate();
        let rb = b.generate();
        ra.timestamp = rb.timestamp;
        prop_assert_eq!(&ra, &rb);

        let ja = serde_json::to_value(&ra).unwrap();
        let jb = serde_json::to_value(&rb).unwrap();
        let keys_a: Vec<&String> = ja.as_object().unwrap().keys().collect();
        let keys_b: Vec<&String> = jb.as_object().unwrap().keys().collect();
        prop_assert_eq!(keys_a, keys_b);
    }
}
