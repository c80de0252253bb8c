//! Publishing index generations to concurrent readers.
//!
//! Readers grab an [`Arc`] snapshot and query it without holding any lock.
//! A rebuild constructs the next generation off to the side and swaps it in,
//! so readers never observe a half-built index.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::{BucketIndex, IndexError, KeyRecord};

/// A [`BucketIndex`] shared between readers and a rebuilder.
pub struct SharedIndex {
    current: RwLock<Arc<BucketIndex>>,
    /// Serializes rebuilds; readers never take it.
    rebuild: Mutex<()>,
}

impl SharedIndex {
    pub fn new(index: BucketIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
            rebuild: Mutex::new(()),
        }
    }

    /// The generation currently published.
    pub fn snapshot(&self) -> Arc<BucketIndex> {
        self.current.read().clone()
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation()
    }

    /// Build a new generation from `records` and publish it.
    ///
    /// Bounds and configuration carry over from the current generation. On
    /// error nothing is published. Returns the new generation number.
    pub fn rebuild(&self, records: &[KeyRecord]) -> Result<u64, IndexError> {
        let _guard = self.rebuild.lock();
        let current = self.snapshot();

        let (lower, upper) = current.bounds();
        let mut next = BucketIndex::with_config(lower, upper, current.config().clone())?;
        next.generation = current.generation;
        next.set(records)?;

        let generation = next.generation;
        *self.current.write() = Arc::new(next);
        debug!(generation, "published index generation");
        Ok(generation)
    }
}

impl From<BucketIndex> for SharedIndex {
    fn from(index: BucketIndex) -> Self {
        Self::new(index)
    }
}
