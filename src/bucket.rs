//! Fixed-capacity buckets.
//!
//! A bucket owns up to [`BUCKET_CAPACITY`] distinct values in ascending order.
//! Each value carries the span of identifier-array positions holding every
//! identifier with exactly that value, so duplicates cost one span rather than
//! one slot each.

use std::ops::Range;

use smallvec::SmallVec;

use crate::error::InvariantViolation;

/// Maximum number of distinct values a single bucket holds.
pub const BUCKET_CAPACITY: usize = 5;

#[derive(Clone, Debug, Default)]
pub(crate) struct Bucket {
    /// Distinct values, strictly increasing.
    values: SmallVec<[f64; BUCKET_CAPACITY]>,
    /// Identifier-array positions per value (half-open).
    spans: SmallVec<[Range<usize>; BUCKET_CAPACITY]>,
    /// Nearest non-empty bucket to the left.
    pub(crate) left: Option<usize>,
    /// Nearest non-empty bucket to the right.
    pub(crate) right: Option<usize>,
}

impl Bucket {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub(crate) fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub(crate) fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }

    // Callers check `is_empty` before reaching for either end.

    #[inline]
    pub(crate) fn first_value(&self) -> f64 {
        debug_assert!(!self.is_empty());
        self.values[0]
    }

    #[inline]
    pub(crate) fn last_value(&self) -> f64 {
        debug_assert!(!self.is_empty());
        self.values[self.values.len() - 1]
    }

    #[inline]
    pub(crate) fn first_span(&self) -> Range<usize> {
        debug_assert!(!self.is_empty());
        self.spans[0].clone()
    }

    #[inline]
    pub(crate) fn last_span(&self) -> Range<usize> {
        debug_assert!(!self.is_empty());
        self.spans[self.spans.len() - 1].clone()
    }

    /// Record that identifier-array position `pos` holds `value`.
    ///
    /// Positions must arrive in ascending value order. A value equal to the last
    /// one extends its span, which requires `pos` to sit right at the span end.
    /// `index` is the bucket's own index, used only for error reporting.
    pub(crate) fn push(
        &mut self,
        index: usize,
        value: f64,
        pos: usize,
    ) -> Result<(), InvariantViolation> {
        if let (Some(&last), Some(span)) = (self.values.last(), self.spans.last_mut()) {
            if value == last {
                if pos != span.end {
                    return Err(InvariantViolation::NonContiguousSpan {
                        bucket: index,
                        value,
                        expected: span.end,
                        got: pos,
                    });
                }
                span.end += 1;
                return Ok(());
            }
            if value < last {
                return Err(InvariantViolation::Unordered {
                    bucket: index,
                    value,
                    last,
                });
            }
        }

        if self.values.len() == BUCKET_CAPACITY {
            return Err(InvariantViolation::CapacityOverflow {
                bucket: index,
                value,
            });
        }
        self.values.push(value);
        self.spans.push(pos..pos + 1);
        Ok(())
    }

    /// Slot of the value closest to `z`; ties go to the lower value.
    pub(crate) fn closest_slot(&self, z: f64) -> usize {
        debug_assert!(!self.is_empty());
        let mut best = 0;
        let mut best_dist = (self.values[0] - z).abs();
        for (slot, &v) in self.values.iter().enumerate().skip(1) {
            let dist = (v - z).abs();
            if dist < best_dist {
                best = slot;
                best_dist = dist;
            }
        }
        best
    }

    /// Slot of the first value `>= z`, or `len()` if there is none.
    #[inline]
    pub(crate) fn lower_bound(&self, z: f64) -> usize {
        self.values.partition_point(|&v| v < z)
    }

    /// Number of values `<= z`.
    #[inline]
    pub(crate) fn upper_bound(&self, z: f64) -> usize {
        self.values.partition_point(|&v| v <= z)
    }

    pub(crate) fn memory_usage(&self) -> usize {
        let mut bytes = std::mem::size_of::<Self>();
        if self.values.spilled() {
            bytes += self.values.capacity() * std::mem::size_of::<f64>();
        }
        if self.spans.spilled() {
            bytes += self.spans.capacity() * std::mem::size_of::<Range<usize>>();
        }
        bytes
    }
}
