//! Bucket partitioner: picks the bucket width for a batch and lays the batch
//! out into buckets plus the identifier array.

use tracing::debug;

use crate::bucket::{Bucket, BUCKET_CAPACITY};
use crate::error::IndexError;
use crate::{Id, KeyRecord};

/// One fully built generation, ready to be swapped into an index.
pub(crate) struct Partition {
    pub(crate) width: f64,
    pub(crate) buckets: Vec<Bucket>,
    pub(crate) ids: Vec<Id>,
}

/// Width such that no half-open interval of that width holds more than
/// [`BUCKET_CAPACITY`] of the given distinct, ascending values.
///
/// Falls back to the whole domain when there are too few values to need more
/// than one bucket, or when the windows degenerate to zero width.
pub(crate) fn bucket_width(distinct: &[f64], domain: f64) -> f64 {
    if distinct.len() < BUCKET_CAPACITY {
        return domain;
    }
    let width = distinct
        .windows(BUCKET_CAPACITY)
        .map(|w| w[BUCKET_CAPACITY - 1] - w[0])
        .fold(f64::INFINITY, f64::min);
    if width > 0.0 {
        width
    } else {
        domain
    }
}

/// Bucket holding `value`, clamped to `[0, count)`.
#[inline]
pub(crate) fn bucket_of(value: f64, lower: f64, width: f64, count: usize) -> usize {
    let raw = ((value - lower) / width).floor();
    let last = count - 1;
    if raw <= 0.0 {
        0
    } else if raw >= last as f64 {
        last
    } else {
        raw as usize
    }
}

/// Build a fresh generation from `records` over `[lower, upper]`.
///
/// Bounds are validated by the caller. Nothing is shared with any previous
/// generation, so a failure here leaves the caller's state untouched.
pub(crate) fn partition(
    records: &[KeyRecord],
    lower: f64,
    upper: f64,
    max_buckets: usize,
) -> Result<Partition, IndexError> {
    if let Some(bad) = records
        .iter()
        .find(|r| !(lower..=upper).contains(&r.value))
    {
        return Err(IndexError::OutOfRange {
            id: bad.id,
            value: bad.value,
            lower,
            upper,
        });
    }

    // Stable: equal values keep their input order.
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| a.value.total_cmp(&b.value));

    let mut distinct: Vec<f64> = sorted.iter().map(|r| r.value).collect();
    distinct.dedup();

    let domain = upper - lower;
    let width = if sorted.len() < BUCKET_CAPACITY {
        domain
    } else {
        bucket_width(&distinct, domain)
    };

    let required = (domain / width).ceil();
    if required > max_buckets as f64 {
        return Err(IndexError::TooManyBuckets {
            width,
            required,
            limit: max_buckets,
        });
    }
    let count = (required as usize).max(1);

    let mut buckets = vec![Bucket::default(); count];
    let mut ids = Vec::with_capacity(sorted.len());
    for (pos, record) in sorted.iter().enumerate() {
        let idx = bucket_of(record.value, lower, width, count);
        buckets[idx].push(idx, record.value, pos)?;
        ids.push(record.id);
    }

    link_neighbors(&mut buckets);

    debug!(
        records = sorted.len(),
        distinct = distinct.len(),
        width,
        buckets = count,
        "partitioned batch"
    );

    Ok(Partition {
        width,
        buckets,
        ids,
    })
}

/// Point every bucket at the nearest non-empty bucket on each side.
fn link_neighbors(buckets: &mut [Bucket]) {
    let mut left = None;
    for (idx, bucket) in buckets.iter_mut().enumerate() {
        bucket.left = left;
        if !bucket.is_empty() {
            left = Some(idx);
        }
    }

    let mut right = None;
    for (idx, bucket) in buckets.iter_mut().enumerate().rev() {
        bucket.right = right;
        if !bucket.is_empty() {
            right = Some(idx);
        }
    }
}
