// Property-based tests for tick interval computation and payload namespacing

use common::poll::{gcd, tick_interval, Payload, PollOutput};
use proptest::prelude::*;

/// *For any* non-empty set of positive intervals, the shared tick interval
/// divides every interval and no larger value does.
#[test]
fn property_tick_interval_is_greatest_common_divisor() {
    proptest!(|(intervals in prop::collection::vec(1u64..10_000u64, 1..8))| {
        let tick = tick_interval(intervals.iter().copied()).unwrap();

        for interval in &intervals {
            prop_assert_eq!(interval % tick, 0, "tick {} does not divide {}", tick, interval);
        }

        let smallest = *intervals.iter().min().unwrap();
        for candidate in (tick + 1)..=smallest {
            prop_assert!(
                intervals.iter().any(|i| i % candidate != 0),
                "{} also divides every interval but tick is {}",
                candidate,
                tick
            );
        }
    });
}

/// *For any* set of intervals, the order pollers were enabled in does not
/// change the shared tick interval.
#[test]
fn property_tick_interval_order_independent() {
    proptest!(|(mut intervals in prop::collection::vec(1u64..5_000u64, 1..8))| {
        let forward = tick_interval(intervals.iter().copied());
        intervals.reverse();
        let backward = tick_interval(intervals.iter().copied());
        prop_assert_eq!(forward, backward);
    });
}

/// *For any* mix of zero and positive intervals, zeros never influence the result.
#[test]
fn property_zero_intervals_are_ignored() {
    proptest!(|(
        positive in prop::collection::vec(1u64..5_000u64, 0..6),
        zeros in 0usize..4
    )| {
        let with_zeros = positive
            .iter()
            .copied()
            .chain(std::iter::repeat(0).take(zeros));
        prop_assert_eq!(tick_interval(with_zeros), tick_interval(positive.iter().copied()));
    });
}

/// *For any* pair of values, gcd is symmetric and divides both.
#[test]
fn property_gcd_symmetric() {
    proptest!(|(a in 1u64..1_000_000u64, b in 1u64..1_000_000u64)| {
        let g = gcd(a, b);
        prop_assert_eq!(g, gcd(b, a));
        prop_assert_eq!(a % g, 0);
        prop_assert_eq!(b % g, 0);
    });
}

/// *For any* two distinct namespaces and one shared discriminator, the
/// namespaced discriminators differ.
#[test]
fn property_namespaces_do_not_collide() {
    proptest!(|(
        left in "[a-z]{1,8}",
        right in "[a-z]{1,8}",
        kind in "[a-zA-Z_]{1,12}"
    )| {
        prop_assume!(left != right);
        let a = Payload::new(kind.clone()).namespaced(&left);
        let b = Payload::new(kind.clone()).namespaced(&right);
        prop_assert_ne!(&a.kind, &b.kind);
        prop_assert!(a.kind.ends_with(&kind));
        prop_assert!(a.kind.starts_with(&left));
    });
}

/// *For any* list of payloads, normalization keeps count and order.
#[test]
fn property_poll_output_preserves_order() {
    proptest!(|(kinds in prop::collection::vec("[a-z]{1,6}", 0..10))| {
        let payloads: Vec<Payload> = kinds.iter().map(|k| Payload::new(k.clone())).collect();
        let normalized = PollOutput::from(payloads).into_payloads();
        let out: Vec<String> = normalized.into_iter().map(|p| p.kind).collect();
        prop_assert_eq!(out, kinds);
    });
}
