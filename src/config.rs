//! Index configuration.

/// How [`BucketIndex::nearest`](crate::BucketIndex::nearest) treats query points
/// outside `[lower, upper]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryBounds {
    /// Clamp the query point into the domain. Every stored value lies inside the
    /// domain, so the answer is still the true nearest value.
    #[default]
    Clamp,
    /// Fail with [`IndexError::QueryOutOfDomain`](crate::IndexError::QueryOutOfDomain).
    Reject,
}

/// Configuration for a [`BucketIndex`](crate::BucketIndex).
#[derive(Debug, Clone)]
pub struct Config {
    /// Out-of-domain policy for nearest lookups.
    pub query_bounds: QueryBounds,
    /// Upper limit on the number of buckets a build may allocate.
    pub max_buckets: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query_bounds: QueryBounds::Clamp,
            max_buckets: 1 << 24,
        }
    }
}

impl Config {
    /// Set the out-of-domain policy.
    pub fn query_bounds(mut self, policy: QueryBounds) -> Self {
        self.query_bounds = policy;
        self
    }

    /// Set the bucket limit.
    pub fn max_buckets(mut self, limit: usize) -> Self {
        self.max_buckets = limit;
        self
    }
}
