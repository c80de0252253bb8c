//! Errors returned while building or querying a [`BucketIndex`](crate::BucketIndex).

use thiserror::Error;

use crate::Id;

/// Coarse classification of an [`IndexError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid bounds or limits; the build was refused.
    Configuration,
    /// A record or query lies outside the configured domain.
    Range,
    /// A structural invariant broke during the build. This is a defect.
    InternalInvariant,
    /// A nearest lookup ran against an index holding no records.
    EmptyIndex,
}

/// Errors returned by [`BucketIndex`](crate::BucketIndex).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    /// Bounds are not finite or `upper <= lower`.
    #[error("invalid bounds: lower {lower}, upper {upper} (need finite lower < upper)")]
    InvalidBounds {
        /// Requested lower bound.
        lower: f64,
        /// Requested upper bound.
        upper: f64,
    },
    /// The chosen bucket width would need more buckets than allowed.
    #[error("bucket width {width} needs {required} buckets, limit is {limit}")]
    TooManyBuckets {
        /// Bucket width computed from the batch.
        width: f64,
        /// Buckets needed to cover the domain at that width.
        required: f64,
        /// Configured maximum.
        limit: usize,
    },
    /// A record value lies outside `[lower, upper]` or is NaN.
    #[error("record {id} has value {value} outside [{lower}, {upper}]")]
    OutOfRange {
        /// Identifier of the offending record.
        id: Id,
        /// Its value.
        value: f64,
        /// Domain lower bound.
        lower: f64,
        /// Domain upper bound.
        upper: f64,
    },
    /// A query point lies outside the domain and the index rejects such queries.
    #[error("query {z} lies outside [{lower}, {upper}]")]
    QueryOutOfDomain {
        /// The query point.
        z: f64,
        /// Domain lower bound.
        lower: f64,
        /// Domain upper bound.
        upper: f64,
    },
    /// Nearest lookup on an index with no records.
    #[error("index holds no records")]
    EmptyIndex,
    /// Internal invariant violation.
    #[error("internal invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl IndexError {
    /// Map this error onto its [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidBounds { .. } | Self::TooManyBuckets { .. } => ErrorKind::Configuration,
            Self::OutOfRange { .. } | Self::QueryOutOfDomain { .. } => ErrorKind::Range,
            Self::EmptyIndex => ErrorKind::EmptyIndex,
            Self::Invariant(_) => ErrorKind::InternalInvariant,
        }
    }
}

/// Structural defects detected while filling buckets.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    /// A new distinct value arrived at a bucket that is already full.
    #[error("bucket {bucket} is full, cannot hold value {value}")]
    CapacityOverflow {
        /// Bucket index.
        bucket: usize,
        /// Value that did not fit.
        value: f64,
    },
    /// A value arrived below the bucket's largest value.
    #[error("bucket {bucket} received {value} after {last}")]
    Unordered {
        /// Bucket index.
        bucket: usize,
        /// Value pushed.
        value: f64,
        /// Largest value already held.
        last: f64,
    },
    /// A duplicate value arrived at a position that does not extend its span.
    #[error("bucket {bucket}: span for {value} ends at {expected}, got position {got}")]
    NonContiguousSpan {
        /// Bucket index.
        bucket: usize,
        /// Duplicated value.
        value: f64,
        /// Position that would have extended the span.
        expected: usize,
        /// Position actually pushed.
        got: usize,
    },
}
