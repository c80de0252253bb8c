//! # bucket-index
//!
//! A bucketed index over a bounded one-dimensional domain of real-valued keys,
//! each tagged with an integer identifier. It answers nearest-value and range
//! queries in O(1) bucket lookups plus a scan of at most [`BUCKET_CAPACITY`]
//! values.
//!
//! The index is rebuilt wholesale from a batch. The bucket width is chosen from
//! the batch so that no bucket ever holds more than [`BUCKET_CAPACITY`]
//! distinct values; empty buckets keep links to their nearest non-empty
//! neighbors.
//!
//! ## Example
//!
//! ```rust
//! use bucket_index::{BucketIndex, KeyRecord};
//!
//! let records: Vec<KeyRecord> = [(0, -150.0), (1, -50.0), (2, 0.0), (3, 50.0), (4, 150.0)]
//!     .into_iter()
//!     .map(KeyRecord::from)
//!     .collect();
//!
//! let index = BucketIndex::build(&records, -200.0, 200.0)?;
//! assert_eq!(index.nearest(10.0)?, &[2]);
//! assert_eq!(index.range(-60.0, 60.0), &[1, 2, 3]);
//! # Ok::<(), bucket_index::IndexError>(())
//! ```

mod bucket;
pub mod config;
pub mod error;
mod partition;
pub mod shared;

pub use bucket::BUCKET_CAPACITY;
pub use config::{Config, QueryBounds};
pub use error::{ErrorKind, IndexError, InvariantViolation};
pub use shared::SharedIndex;

use rayon::prelude::*;
use tracing::warn;

use crate::bucket::Bucket;
use crate::partition::{bucket_of, partition};

/// External identifier attached to every key.
pub type Id = i64;

/// One input record: an identifier and its key value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyRecord {
    /// Identifier.
    pub id: Id,
    /// Key value; must lie within the index bounds.
    pub value: f64,
}

impl KeyRecord {
    /// Create a record.
    pub fn new(id: Id, value: f64) -> Self {
        Self { id, value }
    }
}

impl From<(Id, f64)> for KeyRecord {
    fn from((id, value): (Id, f64)) -> Self {
        Self { id, value }
    }
}

// =============================================================================
// BucketIndex
// =============================================================================

/// Nearest-value and range index over `[lower, upper]`.
///
/// Query results borrow the index: they stay valid until the next
/// [`set`](Self::set), which needs `&mut self`.
#[derive(Clone)]
pub struct BucketIndex {
    lower: f64,
    upper: f64,
    config: Config,
    /// Bucket width (`deltaZ`).
    width: f64,
    buckets: Vec<Bucket>,
    /// Identifiers, ascending by value.
    ids: Vec<Id>,
    generation: u64,
}

impl BucketIndex {
    /// Create an empty index over `[lower, upper]`.
    pub fn new(lower: f64, upper: f64) -> Result<Self, IndexError> {
        Self::with_config(lower, upper, Config::default())
    }

    /// Create an empty index with the given configuration.
    pub fn with_config(lower: f64, upper: f64, config: Config) -> Result<Self, IndexError> {
        if !(lower.is_finite() && upper.is_finite() && lower < upper) {
            warn!(lower, upper, "refusing invalid bounds");
            return Err(IndexError::InvalidBounds { lower, upper });
        }
        Ok(Self {
            lower,
            upper,
            config,
            width: upper - lower,
            buckets: vec![Bucket::default()],
            ids: Vec::new(),
            generation: 0,
        })
    }

    /// Build an index over `[lower, upper]` from `records`.
    pub fn build(records: &[KeyRecord], lower: f64, upper: f64) -> Result<Self, IndexError> {
        Self::build_with_config(records, lower, upper, Config::default())
    }

    /// Build an index with the given configuration.
    pub fn build_with_config(
        records: &[KeyRecord],
        lower: f64,
        upper: f64,
        config: Config,
    ) -> Result<Self, IndexError> {
        let mut index = Self::with_config(lower, upper, config)?;
        index.set(records)?;
        Ok(index)
    }

    /// Rebuild the index from `records`, discarding the current generation.
    ///
    /// On error the current generation is left untouched.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(records = records.len(), generation = self.generation + 1)
    )]
    pub fn set(&mut self, records: &[KeyRecord]) -> Result<(), IndexError> {
        let next = partition(records, self.lower, self.upper, self.config.max_buckets)
            .inspect_err(|err| warn!(%err, "rebuild rejected"))?;

        self.width = next.width;
        self.buckets = next.buckets;
        self.ids = next.ids;
        self.generation += 1;
        Ok(())
    }

    #[inline]
    fn bucket_of(&self, z: f64) -> usize {
        bucket_of(z, self.lower, self.width, self.buckets.len())
    }

    /// Apply the out-of-domain policy to a nearest-lookup point.
    fn admit(&self, z: f64) -> Result<f64, IndexError> {
        let outside = IndexError::QueryOutOfDomain {
            z,
            lower: self.lower,
            upper: self.upper,
        };
        if z.is_nan() {
            return Err(outside);
        }
        if (self.lower..=self.upper).contains(&z) {
            return Ok(z);
        }
        match self.config.query_bounds {
            QueryBounds::Clamp => Ok(z.clamp(self.lower, self.upper)),
            QueryBounds::Reject => Err(outside),
        }
    }

    /// Identifiers whose value is closest to `z`.
    ///
    /// Every identifier sharing the winning value is returned. When two values
    /// are equally close, the in-bucket candidate wins against a neighbor
    /// bucket, the lower value wins within a bucket, and the right neighbor wins
    /// when `z` falls into an empty bucket.
    pub fn nearest(&self, z: f64) -> Result<&[Id], IndexError> {
        let z = self.admit(z)?;
        let bucket = &self.buckets[self.bucket_of(z)];

        let span = if bucket.is_empty() {
            match (bucket.left, bucket.right) {
                (Some(l), Some(r)) => {
                    let (l, r) = (&self.buckets[l], &self.buckets[r]);
                    if z - l.last_value() < r.first_value() - z {
                        l.last_span()
                    } else {
                        r.first_span()
                    }
                }
                (Some(l), None) => self.buckets[l].last_span(),
                (None, Some(r)) => self.buckets[r].first_span(),
                (None, None) => return Err(IndexError::EmptyIndex),
            }
        } else if z < bucket.first_value() {
            match bucket.left.map(|l| &self.buckets[l]) {
                Some(l) if z - l.last_value() < bucket.first_value() - z => l.last_span(),
                _ => bucket.first_span(),
            }
        } else if z > bucket.last_value() {
            match bucket.right.map(|r| &self.buckets[r]) {
                Some(r) if r.first_value() - z < z - bucket.last_value() => r.first_span(),
                _ => bucket.last_span(),
            }
        } else {
            bucket.spans()[bucket.closest_slot(z)].clone()
        };

        Ok(&self.ids[span])
    }

    /// Run [`nearest`](Self::nearest) for every point in `zs` in parallel.
    pub fn nearest_batch(&self, zs: &[f64]) -> Vec<Result<&[Id], IndexError>> {
        zs.par_iter().map(|&z| self.nearest(z)).collect()
    }

    /// Identifiers whose value lies in `[lower_z, upper_z]`, ascending by value.
    ///
    /// Returns an empty slice when nothing matches, when `lower_z > upper_z`, or
    /// when either bound is NaN.
    pub fn range(&self, lower_z: f64, upper_z: f64) -> &[Id] {
        if !(lower_z <= upper_z) {
            return &[];
        }

        let first = &self.buckets[self.bucket_of(lower_z)];
        let start = match first.lower_bound(lower_z) {
            slot if slot < first.len() => first.spans()[slot].start,
            _ => match first.right {
                Some(r) => self.buckets[r].first_span().start,
                None => return &[],
            },
        };

        let last = &self.buckets[self.bucket_of(upper_z)];
        let end = match last.upper_bound(upper_z) {
            0 => match last.left {
                Some(l) => self.buckets[l].last_span().end,
                None => return &[],
            },
            n => last.spans()[n - 1].end,
        };

        if end <= start {
            return &[];
        }
        &self.ids[start..end]
    }

    /// Number of indexed records.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Domain bounds `(lower, upper)`.
    pub fn bounds(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    /// Width of every bucket.
    pub fn bucket_width(&self) -> f64 {
        self.width
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of successful builds so far; `0` for a fresh, empty index.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// All identifiers, ascending by value.
    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    /// Distinct values with their identifiers, ascending by value.
    pub fn groups(&self) -> Groups<'_> {
        Groups {
            index: self,
            bucket: 0,
            slot: 0,
        }
    }

    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.buckets.iter().map(Bucket::memory_usage).sum::<usize>()
            + (self.buckets.capacity() - self.buckets.len()) * std::mem::size_of::<Bucket>()
            + self.ids.capacity() * std::mem::size_of::<Id>()
    }
}

impl std::fmt::Debug for BucketIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.groups()).finish()
    }
}

/// Iterator over `(value, ids)` groups; see [`BucketIndex::groups`].
pub struct Groups<'a> {
    index: &'a BucketIndex,
    bucket: usize,
    slot: usize,
}

impl<'a> Iterator for Groups<'a> {
    type Item = (f64, &'a [Id]);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(bucket) = self.index.buckets.get(self.bucket) {
            if self.slot < bucket.len() {
                let slot = self.slot;
                self.slot += 1;
                let span = bucket.spans()[slot].clone();
                return Some((bucket.values()[slot], &self.index.ids[span]));
            }
            // Jump straight to the next non-empty bucket.
            self.bucket = bucket.right.unwrap_or(self.index.buckets.len());
            self.slot = 0;
        }
        None
    }
}


#[cfg(test)]
mod proptests;
