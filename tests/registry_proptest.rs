//! Property-based tests for the registry.
//!
//! Events carry integer counts so every sum involved is exact in `f64` and
//! counts can be compared with `==`.

use std::collections::BTreeMap;

use proptest::collection::{btree_map, vec as prop_vec};
use proptest::prelude::*;

use hmsketch::hash::hash;
use hmsketch::{Histogram, Registry};

// =============================================================================
// Generators
// =============================================================================

const KEYS: [&str; 3] = ["job", "region", "status"];
const VALUES: [&str; 3] = ["a", "b", "c"];

/// One `insert` call.
#[derive(Debug, Clone)]
struct Event {
    labels: BTreeMap<String, String>,
    value: f64,
    count: f64,
}

impl Event {
    fn matches(&self, query: &[(&str, &str)]) -> bool {
        query
            .iter()
            .all(|(k, v)| self.labels.get(*k).map(String::as_str) == Some(*v))
    }
}

fn arb_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        (1u32..1000).prop_map(f64::from),
        (1e-3f64..1e9),
        (-1e6f64..-1e-3),
    ]
}

fn arb_labels() -> impl Strategy<Value = BTreeMap<String, String>> {
    btree_map(
        prop::sample::select(KEYS.to_vec()).prop_map(String::from),
        prop::sample::select(VALUES.to_vec()).prop_map(String::from),
        0..=KEYS.len(),
    )
}

fn arb_event() -> impl Strategy<Value = Event> {
    (arb_labels(), arb_value(), 1u32..100).prop_map(|(labels, value, count)| Event {
        labels,
        value,
        count: f64::from(count),
    })
}

fn arb_events() -> impl Strategy<Value = Vec<Event>> {
    prop_vec(arb_event(), 0..40)
}

fn build(events: &[Event]) -> Registry {
    let registry = Registry::new(2);
    for event in events {
        registry.insert(&event.labels, event.value, event.count);
    }
    registry
}

/// Every single-pair query plus every two-pair conjunction over distinct keys.
fn queries() -> Vec<Vec<(&'static str, &'static str)>> {
    let mut queries = vec![vec![]];
    for k in KEYS {
        for v in VALUES {
            queries.push(vec![(k, v)]);
        }
    }
    for (i, k1) in KEYS.iter().enumerate() {
        for k2 in &KEYS[i + 1..] {
            for v1 in VALUES {
                for v2 in VALUES {
                    queries.push(vec![(*k1, v1), (*k2, v2)]);
                }
            }
        }
    }
    queries
}

fn exact_count(events: &[Event], query: &[(&str, &str)]) -> f64 {
    events
        .iter()
        .filter(|e| e.matches(query))
        .map(|e| e.count)
        .sum()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn single_pair_counts_are_exact(events in arb_events()) {
        let registry = build(&events);
        prop_assert_eq!(registry.total_count(), exact_count(&events, &[]));
        for k in KEYS {
            for v in VALUES {
                prop_assert_eq!(registry.count([(k, v)]), exact_count(&events, &[(k, v)]));
            }
        }
    }

    #[test]
    fn conjunction_is_bounded(events in arb_events()) {
        let registry = build(&events);
        for query in queries() {
            let estimate = registry.count(query.iter().copied());
            prop_assert!(estimate >= exact_count(&events, &query));
            for pair in &query {
                prop_assert!(estimate <= registry.count([*pair]));
            }
        }
    }

    #[test]
    fn combine_matches_replay(events in arb_events(), split in any::<prop::sample::Index>()) {
        let at = split.index(events.len() + 1);
        let (left, right) = events.split_at(at);
        let combined = build(left).combine(&build(right));
        let replayed = build(&events);

        prop_assert_eq!(combined.slot_count(), replayed.slot_count());
        for query in queries() {
            prop_assert_eq!(
                combined.count(query.iter().copied()),
                replayed.count(query.iter().copied())
            );
        }
    }

    #[test]
    fn cancel_recovers_window(events in arb_events(), split in any::<prop::sample::Index>()) {
        let at = split.index(events.len() + 1);
        let start = build(&events[..at]);
        let end = build(&events);
        let window = end.cancel(&start);
        let expected = build(&events[at..]);

        for query in queries() {
            prop_assert_eq!(
                window.count(query.iter().copied()),
                expected.count(query.iter().copied())
            );
        }
    }

    #[test]
    fn self_cancel_is_empty(events in arb_events()) {
        let registry = build(&events);
        let empty = registry.cancel(&registry);
        prop_assert_eq!(empty.total_count(), 0.0);
        prop_assert_eq!(empty.slot_count(), registry.slot_count());
        for query in queries() {
            prop_assert_eq!(empty.count(query.iter().copied()), 0.0);
        }
    }

    #[test]
    fn unknown_dimension_is_empty(events in arb_events(), k in 0usize..KEYS.len()) {
        let registry = build(&events);
        let sketch = registry.sketch([(KEYS[k], "a"), ("never", "seen")]);
        prop_assert_eq!(sketch.total(), 0.0);
        prop_assert_eq!(registry.count([("never", "seen")]), 0.0);
    }

    #[test]
    fn snapshot_round_trip(events in arb_events()) {
        let registry = build(&events);
        let bytes = registry.serialize().unwrap();
        let restored: Registry = Registry::deserialize(&bytes).unwrap();

        prop_assert_eq!(restored.slot_count(), registry.slot_count());
        prop_assert_eq!(restored.total_count(), registry.total_count());
        for query in queries() {
            prop_assert_eq!(
                restored.count(query.iter().copied()),
                registry.count(query.iter().copied())
            );
        }
        prop_assert_eq!(restored.serialize().unwrap(), bytes);
    }

    #[test]
    fn truncated_snapshot_is_rejected(events in arb_events(), cut in any::<prop::sample::Index>()) {
        let bytes = build(&events).serialize().unwrap();
        let len = cut.index(bytes.len());
        prop_assert!(Registry::<hmsketch::LogLinear>::deserialize(&bytes[..len]).is_err());
    }

    #[test]
    fn hash_is_deterministic(key in ".{0,16}", value in ".{0,16}") {
        prop_assert_eq!(hash(&key, &value), hash(&key, &value));
    }

    #[test]
    fn hash_separates_key_and_value(key in "[a-z]{1,8}", value in "[a-z]{1,8}") {
        let moved = format!("{}{}", key, &value[..1]);
        prop_assert_ne!(hash(&key, &value), hash(&moved, &value[1..]));
    }
}
