use std::collections::BTreeMap;
use std::ops::Bound;

use proptest::prelude::*;
use tilia::{BPlusTreeMap, TreeError};

/// Branching order used by the randomized tests; small enough that a few
/// hundred operations exercise splits, borrows, and merges.
const ORDER: usize = 8;

fn key_strategy() -> impl Strategy<Value = i64> {
    // Narrow range so sequences collide, hitting the duplicate paths.
    -500_i64..500
}

#[derive(Debug, Clone)]
enum MapOp {
    Insert(i64, i64),
    Upsert(i64, i64),
    Remove(i64),
    Search(i64),
    Contains(i64),
}

fn map_op_strategy() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        4 => (key_strategy(), any::<i64>()).prop_map(|(k, v)| MapOp::Insert(k, v)),
        2 => (key_strategy(), any::<i64>()).prop_map(|(k, v)| MapOp::Upsert(k, v)),
        3 => key_strategy().prop_map(MapOp::Remove),
        2 => key_strategy().prop_map(MapOp::Search),
        1 => key_strategy().prop_map(MapOp::Contains),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// Replays a random operation sequence on both `BPlusTreeMap` and the
    /// standard `BTreeMap` and asserts identical observable behavior.
    #[test]
    fn ops_match_btreemap(ops in prop::collection::vec(map_op_strategy(), 0..2_000)) {
        let mut map: BPlusTreeMap<i64, i64> = BPlusTreeMap::new(ORDER).unwrap();
        let mut model: BTreeMap<i64, i64> = BTreeMap::new();

        for op in &ops {
            match *op {
                MapOp::Insert(k, v) => {
                    let result = map.insert(k, v);
                    if model.contains_key(&k) {
                        prop_assert_eq!(result, Err(TreeError::DuplicateKey), "insert({}, {})", k, v);
                    } else {
                        prop_assert_eq!(result, Ok(()), "insert({}, {})", k, v);
                        model.insert(k, v);
                    }
                }
                MapOp::Upsert(k, v) => {
                    prop_assert_eq!(map.upsert(k, v), model.insert(k, v), "upsert({}, {})", k, v);
                }
                MapOp::Remove(k) => {
                    prop_assert_eq!(map.remove(&k).ok(), model.remove(&k), "remove({})", k);
                }
                MapOp::Search(k) => {
                    prop_assert_eq!(map.search(&k).ok(), model.get(&k), "search({})", k);
                }
                MapOp::Contains(k) => {
                    prop_assert_eq!(map.contains_key(&k), model.contains_key(&k), "contains_key({})", k);
                }
            }
            prop_assert_eq!(map.len(), model.len(), "len mismatch after {:?}", op);
        }

        let entries: Vec<(i64, i64)> = map.iter().map(|(&k, &v)| (k, v)).collect();
        let expected: Vec<(i64, i64)> = model.iter().map(|(&k, &v)| (k, v)).collect();
        prop_assert_eq!(entries, expected, "final iteration mismatch");
    }

    /// Compares range queries against `BTreeMap` for arbitrary bounds.
    #[test]
    fn range_matches_btreemap(
        entries in prop::collection::vec((key_strategy(), any::<i64>()), 0..1_000),
        lo in key_strategy(),
        hi in key_strategy(),
    ) {
        let mut map: BPlusTreeMap<i64, i64> = BPlusTreeMap::new(ORDER).unwrap();
        let mut model: BTreeMap<i64, i64> = BTreeMap::new();
        for &(k, v) in &entries {
            map.upsert(k, v);
            model.insert(k, v);
        }

        let got: Vec<(i64, i64)> = map.range(lo..hi).map(|(&k, &v)| (k, v)).collect();
        if lo <= hi {
            let want: Vec<(i64, i64)> = model.range(lo..hi).map(|(&k, &v)| (k, v)).collect();
            prop_assert_eq!(got, want, "range({}..{})", lo, hi);
        } else {
            // An empty interval yields nothing rather than panicking.
            prop_assert!(got.is_empty(), "range({}..{}) not empty", lo, hi);
        }

        let got: Vec<(i64, i64)> = map.range(lo..).map(|(&k, &v)| (k, v)).collect();
        let want: Vec<(i64, i64)> = model.range(lo..).map(|(&k, &v)| (k, v)).collect();
        prop_assert_eq!(got, want, "range({}..)", lo);

        let got: Vec<(i64, i64)> = map.range(..hi).map(|(&k, &v)| (k, v)).collect();
        let want: Vec<(i64, i64)> = model.range(..hi).map(|(&k, &v)| (k, v)).collect();
        prop_assert_eq!(got, want, "range(..{})", hi);

        let got: Vec<(i64, i64)> = map.range(..).map(|(&k, &v)| (k, v)).collect();
        let want: Vec<(i64, i64)> = model.iter().map(|(&k, &v)| (k, v)).collect();
        prop_assert_eq!(got, want, "range(..)");

        if lo <= hi {
            let got: Vec<(i64, i64)> = map.range(lo..=hi).map(|(&k, &v)| (k, v)).collect();
            let want: Vec<(i64, i64)> = model.range(lo..=hi).map(|(&k, &v)| (k, v)).collect();
            prop_assert_eq!(got, want, "range({}..={})", lo, hi);
        }

        let bounds = (Bound::Excluded(lo), Bound::Unbounded);
        let got: Vec<(i64, i64)> = map.range(bounds).map(|(&k, &v)| (k, v)).collect();
        let want: Vec<(i64, i64)> = model.range(bounds).map(|(&k, &v)| (k, v)).collect();
        prop_assert_eq!(got, want, "range(excluded {}..)", lo);
    }
}

#[test]
fn duplicate_insert_is_rejected() {
    let mut map = BPlusTreeMap::new(4).unwrap();
    map.insert(5, 'a').unwrap();
    assert_eq!(map.insert(5, 'b'), Err(TreeError::DuplicateKey));
    assert_eq!(map.search(&5), Ok(&'a'));
    assert_eq!(map.len(), 1);
}

#[test]
fn upsert_updates_in_place() {
    let mut map = BPlusTreeMap::new(4).unwrap();
    map.insert(5, 'a').unwrap();
    assert_eq!(map.upsert(5, 'b'), Some('a'));
    assert_eq!(map.search(&5), Ok(&'b'));
    assert_eq!(map.len(), 1);
}

#[test]
fn upsert_is_idempotent() {
    let mut map = BPlusTreeMap::new(4).unwrap();
    assert_eq!(map.upsert(7, "x"), None);
    assert_eq!(map.upsert(7, "x"), Some("x"));
    assert_eq!(map.len(), 1);
    assert_eq!(map.search(&7), Ok(&"x"));
}

#[test]
fn search_and_remove_report_missing_keys() {
    let mut map = BPlusTreeMap::new(4).unwrap();
    assert_eq!(map.search(&1), Err(TreeError::KeyNotFound));
    assert_eq!(map.remove(&1), Err(TreeError::KeyNotFound));

    map.insert(1, "one").unwrap();
    assert_eq!(map.remove(&1), Ok("one"));
    assert!(map.is_empty());
}

#[test]
fn rejects_orders_below_three() {
    for order in 0..3 {
        assert_eq!(
            BPlusTreeMap::<i32, i32>::new(order).err(),
            Some(TreeError::InvalidOrder { order }),
        );
    }
    assert!(BPlusTreeMap::<i32, i32>::new(3).is_ok());
}

#[test]
fn range_queries_on_even_keys() {
    let mut map = BPlusTreeMap::new(4).unwrap();
    for key in (0..100).step_by(2) {
        map.insert(key, key).unwrap();
    }

    let window: Vec<i32> = map.range(10..30).map(|(&k, _)| k).collect();
    assert_eq!(window, (10..30).step_by(2).collect::<Vec<_>>());
    assert_eq!(window.len(), 10);

    let head: Vec<i32> = map.range(..5).map(|(&k, _)| k).collect();
    assert_eq!(head, [0, 2, 4]);

    let tail: Vec<i32> = map.range(90..).map(|(&k, _)| k).collect();
    assert_eq!(tail, [90, 92, 94, 96, 98]);

    assert_eq!(map.range(30..30).count(), 0);
}

#[test]
fn delete_inverse_restores_the_original_map() {
    let mut map = BPlusTreeMap::new(4).unwrap();
    for key in (0..60).step_by(3) {
        map.insert(key, key * 2).unwrap();
    }
    let before: Vec<(i32, i32)> = map.iter().map(|(&k, &v)| (k, v)).collect();

    map.insert(1000, 1).unwrap();
    assert_eq!(map.remove(&1000), Ok(1));

    let after: Vec<(i32, i32)> = map.iter().map(|(&k, &v)| (k, v)).collect();
    assert_eq!(after, before);
    assert_eq!(map.len(), 20);
}

#[test]
fn iteration_is_ascending_and_complete() {
    let mut map = BPlusTreeMap::new(6).unwrap();
    for key in (0..500).rev() {
        map.insert(key, key).unwrap();
    }
    assert_eq!(map.len(), 500);
    assert_eq!(map.iter().len(), 500);

    let keys: Vec<i32> = map.keys().copied().collect();
    assert_eq!(keys.len(), 500);
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));

    let values: Vec<i32> = map.values().copied().collect();
    assert_eq!(values, keys);
}

#[test]
fn clear_empties_the_map() {
    let mut map = BPlusTreeMap::new(4).unwrap();
    for key in 0..100 {
        map.insert(key, key).unwrap();
    }
    map.clear();
    assert!(map.is_empty());
    assert_eq!(map.iter().count(), 0);

    map.insert(1, 1).unwrap();
    assert_eq!(map.len(), 1);
}

#[test]
fn for_loop_over_a_reference() {
    let mut map = BPlusTreeMap::new(4).unwrap();
    for key in 1..=5 {
        map.insert(key, key * 10).unwrap();
    }
    let mut total = 0;
    for (&key, &value) in &map {
        total += key + value;
    }
    assert_eq!(total, 15 + 150);
}

#[test]
fn debug_formats_as_a_map() {
    let mut map = BPlusTreeMap::new(4).unwrap();
    map.insert(1, "a").unwrap();
    map.insert(2, "b").unwrap();
    assert_eq!(format!("{map:?}"), r#"{1: "a", 2: "b"}"#);
    assert_eq!(map.order(), 4);
}

#[test]
fn key_transform_normalizes_raw_keys() {
    let mut map = BPlusTreeMap::with_key_transform(4, |raw: &&str| raw.to_ascii_lowercase()).unwrap();
    map.insert("Alpha", 1).unwrap();
    map.insert("beta", 2).unwrap();

    assert_eq!(map.insert("ALPHA", 9), Err(TreeError::DuplicateKey));
    assert_eq!(map.search(&"alpha"), Ok(&1));
    assert_eq!(map.upsert("BETA", 20), Some(2));

    let keys: Vec<String> = map.keys().cloned().collect();
    assert_eq!(keys, ["alpha", "beta"]);
}

#[test]
fn key_transform_collisions_are_duplicates() {
    let mut map = BPlusTreeMap::with_key_transform(4, |raw: &i64| raw / 10).unwrap();
    map.insert(41, "a").unwrap();

    // 41 and 47 land in the same bucket, so they are the same key.
    assert_eq!(map.insert(47, "b"), Err(TreeError::DuplicateKey));
    assert_eq!(map.upsert(49, "c"), Some("a"));
    assert_eq!(map.search(&40), Ok(&"c"));
    assert_eq!(map.len(), 1);
}

#[test]
fn key_transform_applies_to_range_bounds() {
    let mut map = BPlusTreeMap::with_key_transform(4, |raw: &i64| raw / 10).unwrap();
    for raw in [5, 15, 25, 35, 45] {
        map.insert(raw, raw).unwrap();
    }

    // Raw bounds 12..41 transform to stored buckets 1..4.
    let buckets: Vec<i64> = map.range(12..41).map(|(&bucket, _)| bucket).collect();
    assert_eq!(buckets, [1, 2, 3]);
}

#[test]
fn insert_search_round_trip_across_splits() {
    let mut map = BPlusTreeMap::new(4).unwrap();
    for key in 0..1_000 {
        map.insert(key, key * 7).unwrap();
        assert_eq!(map.search(&key), Ok(&(key * 7)));
    }
    for key in 0..1_000 {
        assert_eq!(map.search(&key), Ok(&(key * 7)));
    }
}
