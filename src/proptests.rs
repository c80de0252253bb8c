use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

const LOWER: f64 = -200.0;
const UPPER: f64 = 200.0;

fn validate_index(index: &BucketIndex) {
    let (lower, upper) = index.bounds();
    let count = index.buckets.len();
    assert!(index.width > 0.0, "bucket width must be positive");
    assert!(count >= 1);
    if index.generation > 0 {
        assert_eq!(
            count,
            ((upper - lower) / index.width).ceil() as usize,
            "buckets must cover the domain exactly"
        );
    }

    // Spans tile the identifier array in bucket order.
    let mut next_pos = 0usize;
    let mut prev_value = f64::NEG_INFINITY;
    for (idx, bucket) in index.buckets.iter().enumerate() {
        assert!(bucket.len() <= BUCKET_CAPACITY, "bucket {idx} over capacity");
        assert_eq!(bucket.values().len(), bucket.spans().len());

        for (&value, span) in bucket.values().iter().zip(bucket.spans()) {
            assert!(value > prev_value, "values must be strictly increasing");
            prev_value = value;
            assert_eq!(span.start, next_pos, "spans must be contiguous");
            assert!(span.end > span.start, "spans must be non-empty");
            next_pos = span.end;
            assert_eq!(
                bucket_of(value, lower, index.width, count),
                idx,
                "value {value} stored in the wrong bucket"
            );
        }

        let left = (0..idx).rev().find(|&i| !index.buckets[i].is_empty());
        let right = (idx + 1..count).find(|&i| !index.buckets[i].is_empty());
        assert_eq!(bucket.left, left, "left link of bucket {idx}");
        assert_eq!(bucket.right, right, "right link of bucket {idx}");
    }
    assert_eq!(next_pos, index.ids.len(), "spans must cover every identifier");
}

fn grid_value() -> impl Strategy<Value = f64> {
    // Multiples of 1/8 are exact in binary, so bucket arithmetic is exact too.
    (-1600i32..=1600).prop_map(|k| k as f64 / 8.0)
}

fn value_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        6 => grid_value(),
        // A handful of popular values to force duplicate groups.
        2 => (-4i32..=4).prop_map(|k| k as f64 * 37.5),
        1 => Just(LOWER),
        1 => Just(UPPER),
    ]
}

fn records_strategy() -> impl Strategy<Value = Vec<KeyRecord>> {
    prop::collection::vec(value_strategy(), 0..=300).prop_map(|values| {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| KeyRecord::new(i as Id, v))
            .collect()
    })
}

fn query_point() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => grid_value(),
        4 => LOWER..UPPER,
        1 => -400.0..400.0f64,
    ]
}

#[derive(Clone, Debug, Arbitrary)]
enum Query {
    Nearest(#[proptest(strategy = "query_point()")] f64),
    Range(
        #[proptest(strategy = "query_point()")] f64,
        #[proptest(strategy = "query_point()")] f64,
    ),
}

/// Sorted identifiers of every record whose value is closest to `z`.
fn brute_nearest(records: &[KeyRecord], z: f64) -> Vec<Id> {
    let best = records
        .iter()
        .map(|r| (r.value - z).abs())
        .fold(f64::INFINITY, f64::min);
    let mut ids: Vec<Id> = records
        .iter()
        .filter(|r| (r.value - z).abs() == best)
        .map(|r| r.id)
        .collect();
    ids.sort_unstable();
    ids
}

fn brute_range(records: &[KeyRecord], lower_z: f64, upper_z: f64) -> Vec<Id> {
    let mut hits: Vec<&KeyRecord> = records
        .iter()
        .filter(|r| lower_z <= r.value && r.value <= upper_z)
        .collect();
    hits.sort_by(|a, b| a.value.total_cmp(&b.value).then(a.id.cmp(&b.id)));
    hits.into_iter().map(|r| r.id).collect()
}

fn check_nearest(index: &BucketIndex, records: &[KeyRecord], z: f64) -> Result<(), TestCaseError> {
    let got = index.nearest(z);
    if records.is_empty() {
        prop_assert_eq!(got, Err(IndexError::EmptyIndex));
        return Ok(());
    }

    let got = got.map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert!(!got.is_empty());

    // All returned ids share one value, and it is among the closest values.
    let value = records[got[0] as usize].value;
    let mut got_ids = got.to_vec();
    got_ids.sort_unstable();
    let mut expected_ids: Vec<Id> = records
        .iter()
        .filter(|r| r.value == value)
        .map(|r| r.id)
        .collect();
    expected_ids.sort_unstable();
    prop_assert_eq!(&got_ids, &expected_ids);

    let clamped = z.clamp(LOWER, UPPER);
    let closest = brute_nearest(records, clamped);
    prop_assert!(
        closest.contains(&got[0]),
        "nearest({}) returned value {} which is not among the closest",
        z,
        value
    );
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_queries_match_brute_force(
        records in records_strategy(),
        queries in prop::collection::vec(any::<Query>(), 1..=64),
    ) {
        let index = BucketIndex::build(&records, LOWER, UPPER).unwrap();
        validate_index(&index);
        prop_assert_eq!(index.len(), records.len());

        for query in queries {
            match query {
                Query::Nearest(z) => check_nearest(&index, &records, z)?,
                Query::Range(a, b) => {
                    let got = index.range(a, b);
                    let expected = if a <= b { brute_range(&records, a, b) } else { Vec::new() };
                    prop_assert_eq!(got, expected.as_slice());
                }
            }
        }
    }

    #[test]
    fn prop_every_value_is_its_own_nearest(records in records_strategy()) {
        let index = BucketIndex::build(&records, LOWER, UPPER).unwrap();
        for r in &records {
            let got = index.nearest(r.value).unwrap();
            prop_assert!(got.contains(&r.id));
            prop_assert!(index.range(r.value, r.value).contains(&r.id));
        }
    }

    #[test]
    fn prop_rebuild_idempotent(
        records in records_strategy(),
        points in prop::collection::vec(query_point(), 1..=32),
    ) {
        let mut index = BucketIndex::build(&records, LOWER, UPPER).unwrap();
        let first = index.clone();
        index.set(&records).unwrap();
        validate_index(&index);

        prop_assert_eq!(index.generation(), first.generation() + 1);
        prop_assert_eq!(index.bucket_width(), first.bucket_width());
        prop_assert_eq!(index.ids(), first.ids());
        for z in points {
            prop_assert_eq!(index.nearest(z), first.nearest(z));
            prop_assert_eq!(index.range(z, z + 25.0), first.range(z, z + 25.0));
        }
    }

    #[test]
    fn prop_rejected_rebuild_is_atomic(
        records in records_strategy(),
        next in records_strategy(),
        bad in prop_oneof![UPPER + 0.125..1e6, -1e6..LOWER - 0.125],
        points in prop::collection::vec(query_point(), 1..=16),
    ) {
        let mut index = BucketIndex::build(&records, LOWER, UPPER).unwrap();
        let before = index.clone();

        let mut poisoned = next;
        let at = poisoned.len() / 2;
        poisoned.insert(at, KeyRecord::new(-1, bad));
        let err = index.set(&poisoned).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Range);

        validate_index(&index);
        prop_assert_eq!(index.generation(), before.generation());
        prop_assert_eq!(index.ids(), before.ids());
        for z in points {
            prop_assert_eq!(index.nearest(z), before.nearest(z));
        }
    }

    #[test]
    fn prop_reject_policy(records in records_strategy(), z in query_point()) {
        let config = Config::default().query_bounds(QueryBounds::Reject);
        let index = BucketIndex::build_with_config(&records, LOWER, UPPER, config).unwrap();
        if (LOWER..=UPPER).contains(&z) {
            check_nearest(&index, &records, z)?;
        } else {
            prop_assert!(
                matches!(index.nearest(z), Err(IndexError::QueryOutOfDomain { .. })),
                "{} should be rejected",
                z
            );
        }
    }
}

#[test]
fn exhaustive_small_grid() {
    // Every subset of a small grid, queried at every half step.
    let grid = [-2.0, -1.0, -0.5, 0.0, 0.5, 1.0, 2.0];
    for mask in 0u32..(1 << grid.len()) {
        let records: Vec<KeyRecord> = grid
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(i, &v)| KeyRecord::new(i as Id, v))
            .collect();
        let index = BucketIndex::build(&records, -2.0, 2.0).unwrap();
        validate_index(&index);

        for step in -8..=8 {
            let z = step as f64 / 4.0;
            if records.is_empty() {
                assert_eq!(index.nearest(z), Err(IndexError::EmptyIndex));
            } else {
                let got = index.nearest(z).unwrap();
                assert_eq!(got.len(), 1);
                assert!(brute_nearest(&records, z).contains(&got[0]), "mask {mask:b}, z {z}");
            }
            for upper_step in step..=8 {
                let b = upper_step as f64 / 4.0;
                assert_eq!(index.range(z, b), brute_range(&records, z, b).as_slice());
            }
        }
    }
}
