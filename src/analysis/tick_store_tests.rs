//! Tick Store Interpolation Tests
//!
//! Exactness at knots, boundedness between knots, and the coverage guard.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::analysis::error::AnalysisError;
use crate::analysis::tick_store::{PriceSide, TickSeries, TickStore};
use crate::analysis::timestamps::Nanos;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn sample_store() -> TickStore {
    TickStore::from_columns(
        vec![1000, 2000],
        vec![100.0, 102.0],
        vec![1000, 2000],
        vec![100.4, 102.4],
    )
    .unwrap()
}

/// Strictly increasing timestamps with random gaps and prices.
fn random_series(rng: &mut ChaCha8Rng, n: usize) -> (Vec<Nanos>, Vec<f64>) {
    let mut ts = Vec::with_capacity(n);
    let mut px = Vec::with_capacity(n);
    let mut t: Nanos = rng.gen_range(0..1_000_000);
    for _ in 0..n {
        t += rng.gen_range(1..5_000_000);
        ts.push(t);
        px.push(rng.gen_range(50.0..150.0));
    }
    (ts, px)
}

// =============================================================================
// CONCRETE SCENARIO
// =============================================================================

#[test]
fn test_mid_at_midpoint() {
    let store = sample_store();
    assert!((store.price_at(1500, PriceSide::Bid).unwrap() - 101.0).abs() < 1e-12);
    assert!((store.price_at(1500, PriceSide::Ask).unwrap() - 101.4).abs() < 1e-12);
    assert!((store.mid_at(1500).unwrap() - 101.2).abs() < 1e-12);
}

#[test]
fn test_quarter_point_interpolation() {
    let store = sample_store();
    assert!((store.price_at(1250, PriceSide::Bid).unwrap() - 100.5).abs() < 1e-12);
}

// =============================================================================
// EXACTNESS
// =============================================================================

#[test]
fn test_exact_at_every_knot() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let (ts, px) = random_series(&mut rng, 200);
    let series = TickSeries::new(ts.clone(), px.clone()).unwrap();

    for (t, p) in ts.iter().zip(&px) {
        // Bit-for-bit, not approximately.
        assert_eq!(series.price_at(*t, PriceSide::Bid).unwrap(), *p);
    }
}

#[test]
fn test_duplicate_timestamp_first_seen_wins() {
    let series = TickSeries::new(vec![1000, 2000, 2000, 3000], vec![1.0, 2.0, 9.0, 3.0]).unwrap();
    assert_eq!(series.len(), 4);
    assert_eq!(series.price_at(2000, PriceSide::Ask).unwrap(), 2.0);
}

#[test]
fn test_unsorted_input_sorted_stably() {
    let series = TickSeries::new(vec![3000, 1000, 2000, 1000], vec![3.0, 1.0, 2.0, 1.5]).unwrap();
    assert_eq!(series.timestamps(), &[1000, 1000, 2000, 3000]);
    assert_eq!(series.prices(), &[1.0, 1.5, 2.0, 3.0]);
    assert_eq!(series.price_at(1000, PriceSide::Bid).unwrap(), 1.0);
}

// =============================================================================
// MONOTONICITY
// =============================================================================

#[test]
fn test_interpolated_price_between_neighbours() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let (ts, px) = random_series(&mut rng, 100);
    let series = TickSeries::new(ts.clone(), px.clone()).unwrap();

    for i in 0..ts.len() - 1 {
        let (t0, t1) = (ts[i], ts[i + 1]);
        if t1 - t0 < 2 {
            continue;
        }
        let (lo, hi) = if px[i] <= px[i + 1] {
            (px[i], px[i + 1])
        } else {
            (px[i + 1], px[i])
        };
        for _ in 0..10 {
            let t = rng.gen_range(t0 + 1..t1);
            let p = series.price_at(t, PriceSide::Bid).unwrap();
            assert!(p >= lo && p <= hi, "price {} at {} outside [{}, {}]", p, t, lo, hi);
        }
    }
}

// =============================================================================
// COVERAGE GUARD
// =============================================================================

#[test]
fn test_before_first_tick_out_of_range() {
    let store = sample_store();
    match store.mid_at(999) {
        Err(AnalysisError::OutOfRange {
            side,
            timestamp_ns,
            first_ns,
            last_ns,
        }) => {
            assert_eq!(side, PriceSide::Bid);
            assert_eq!(timestamp_ns, 999);
            assert_eq!(first_ns, Some(1000));
            assert_eq!(last_ns, Some(2000));
        }
        other => panic!("expected OutOfRange, got {:?}", other),
    }
}

#[test]
fn test_after_last_tick_out_of_range() {
    let store = sample_store();
    assert!(matches!(
        store.price_at(2001, PriceSide::Ask),
        Err(AnalysisError::OutOfRange { .. })
    ));
}

#[test]
fn test_last_tick_exact_match_resolves() {
    let store = sample_store();
    assert_eq!(store.price_at(2000, PriceSide::Ask).unwrap(), 102.4);
}

#[test]
fn test_empty_store_out_of_range() {
    let store = TickStore::default();
    let err = store.mid_at(0).unwrap_err();
    assert_eq!(err.kind(), "out_of_range");
    assert!(err.to_string().contains("no ticks loaded"));
    assert!(store.coverage().is_none());
}

#[test]
fn test_length_mismatch_is_schema_error() {
    let err = TickStore::from_columns(vec![1, 2], vec![1.0], vec![], vec![]).unwrap_err();
    match err {
        AnalysisError::Schema { context, .. } => assert_eq!(context, "bid.ticks"),
        other => panic!("expected Schema, got {:?}", other),
    }
}

#[test]
fn test_coverage_is_overlap_of_sides() {
    let store = TickStore::from_columns(vec![100, 500], vec![1.0, 1.0], vec![200, 900], vec![2.0, 2.0]).unwrap();
    assert_eq!(store.coverage(), Some((200, 500)));
    assert_eq!(store.tick_counts(), (2, 2));
}
