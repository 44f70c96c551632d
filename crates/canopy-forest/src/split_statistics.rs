//! Per-candidate left/right statistics for one split evaluation.

use std::ops::Range;

use crate::error::ForestError;
use crate::histogram::HistogramStatistics;
use crate::sample::LabeledSample;
use crate::weak_learner::Direction;

/// One left/right histogram pair per split candidate.
///
/// Index `i` holds the class histograms of the samples that candidate `i`
/// sends LEFT and RIGHT. Sized exactly to the candidate count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitStatistics {
    left: Vec<HistogramStatistics>,
    right: Vec<HistogramStatistics>,
}

impl SplitStatistics {
    /// Create `num_of_candidates` pairs, each a copy of the empty `prototype`.
    #[must_use]
    pub fn new(num_of_candidates: usize, prototype: &HistogramStatistics) -> Self {
        Self {
            left: vec![prototype.clone(); num_of_candidates],
            right: vec![prototype.clone(); num_of_candidates],
        }
    }

    /// Return the number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Return `true` if there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Return the LEFT statistics of candidate `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::CandidateIndexOutOfRange`] if `index >= len()`.
    pub fn left(&self, index: usize) -> Result<&HistogramStatistics, ForestError> {
        let len = self.len();
        self.left
            .get(index)
            .ok_or(ForestError::CandidateIndexOutOfRange { index, len })
    }

    /// Return the RIGHT statistics of candidate `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::CandidateIndexOutOfRange`] if `index >= len()`.
    pub fn right(&self, index: usize) -> Result<&HistogramStatistics, ForestError> {
        let len = self.len();
        self.right
            .get(index)
            .ok_or(ForestError::CandidateIndexOutOfRange { index, len })
    }

    /// Mutable access to the LEFT statistics of candidate `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::CandidateIndexOutOfRange`] if `index >= len()`.
    pub fn left_mut(&mut self, index: usize) -> Result<&mut HistogramStatistics, ForestError> {
        let len = self.len();
        self.left
            .get_mut(index)
            .ok_or(ForestError::CandidateIndexOutOfRange { index, len })
    }

    /// Mutable access to the RIGHT statistics of candidate `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::CandidateIndexOutOfRange`] if `index >= len()`.
    pub fn right_mut(&mut self, index: usize) -> Result<&mut HistogramStatistics, ForestError> {
        let len = self.len();
        self.right
            .get_mut(index)
            .ok_or(ForestError::CandidateIndexOutOfRange { index, len })
    }

    /// Merge `other` into this container, candidate by candidate.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::SplitStatisticsSizeMismatch`] | candidate counts differ |
    /// | [`ForestError::HistogramSizeMismatch`] | a histogram pair has different bin counts |
    pub fn accumulate(&mut self, other: &Self) -> Result<(), ForestError> {
        if self.len() != other.len() {
            return Err(ForestError::SplitStatisticsSizeMismatch {
                left: self.len(),
                right: other.len(),
            });
        }
        for (mine, theirs) in self.left.iter_mut().zip(&other.left) {
            mine.merge(theirs)?;
        }
        for (mine, theirs) in self.right.iter_mut().zip(&other.right) {
            mine.merge(theirs)?;
        }
        Ok(())
    }

    /// Close the lazy-accumulation burst of every histogram.
    pub fn finish_all(&mut self) {
        self.left
            .iter_mut()
            .chain(self.right.iter_mut())
            .for_each(HistogramStatistics::finish_lazy_accumulation);
    }

    /// Split the container into up to `num_of_shards` contiguous, disjoint windows.
    ///
    /// Shard `w` covers candidates `[w·N/W, (w+1)·N/W)`. Empty windows are
    /// skipped, so fewer shards come back when there are fewer candidates
    /// than requested shards. A shard count of zero is treated as one.
    pub fn shards_mut(&mut self, num_of_shards: usize) -> Vec<SplitStatisticsShard<'_>> {
        let n = self.len();
        let num_of_shards = num_of_shards.max(1);
        let mut shards = Vec::with_capacity(num_of_shards.min(n));

        let mut left_rest: &mut [HistogramStatistics] = &mut self.left;
        let mut right_rest: &mut [HistogramStatistics] = &mut self.right;
        let mut begin = 0;
        for w in 0..num_of_shards {
            let end = (w + 1) * n / num_of_shards;
            let (left, l_rest) = std::mem::take(&mut left_rest).split_at_mut(end - begin);
            let (right, r_rest) = std::mem::take(&mut right_rest).split_at_mut(end - begin);
            left_rest = l_rest;
            right_rest = r_rest;
            if end > begin {
                shards.push(SplitStatisticsShard {
                    offset: begin,
                    left,
                    right,
                });
            }
            begin = end;
        }
        shards
    }

    /// The whole container as a single shard.
    pub fn as_shard(&mut self) -> SplitStatisticsShard<'_> {
        SplitStatisticsShard {
            offset: 0,
            left: &mut self.left,
            right: &mut self.right,
        }
    }
}

/// A mutable window over a contiguous candidate range of [`SplitStatistics`].
///
/// Accessors take global candidate indices, so a weak learner fills a shard
/// exactly as it would fill the full container.
#[derive(Debug)]
pub struct SplitStatisticsShard<'a> {
    offset: usize,
    left: &'a mut [HistogramStatistics],
    right: &'a mut [HistogramStatistics],
}

impl SplitStatisticsShard<'_> {
    /// Global candidate indices covered by this shard.
    #[must_use]
    pub fn candidates(&self) -> Range<usize> {
        self.offset..self.offset + self.left.len()
    }

    /// Lazily accumulate `sample` into the `direction` bucket of candidate `index`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::CandidateIndexOutOfRange`] | `index` is outside this shard |
    /// | [`ForestError::LabelOutOfRange`] | the sample's label has no bin |
    #[inline]
    pub fn lazy_accumulate<S: LabeledSample + ?Sized>(
        &mut self,
        index: usize,
        direction: Direction,
        sample: &S,
    ) -> Result<(), ForestError> {
        let bucket = match direction {
            Direction::Left => &mut *self.left,
            Direction::Right => &mut *self.right,
        };
        let len = self.offset + bucket.len();
        index
            .checked_sub(self.offset)
            .and_then(|local| bucket.get_mut(local))
            .ok_or(ForestError::CandidateIndexOutOfRange { index, len })?
            .lazy_accumulate_sample(sample)
    }

    /// Close the lazy-accumulation burst of every histogram in this shard.
    pub fn finish(&mut self) {
        self.left
            .iter_mut()
            .chain(self.right.iter_mut())
            .for_each(HistogramStatistics::finish_lazy_accumulation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::FeatureSample;

    fn filled(n: usize) -> SplitStatistics {
        let mut stats = SplitStatistics::new(n, &HistogramStatistics::new(2));
        for i in 0..n {
            for _ in 0..i {
                stats.left_mut(i).unwrap().accumulate(0).unwrap();
            }
            stats.right_mut(i).unwrap().accumulate(1).unwrap();
        }
        stats
    }

    #[test]
    fn accumulate_merges_elementwise() {
        let mut a = filled(4);
        let b = filled(4);
        a.accumulate(&b).unwrap();
        for i in 0..4 {
            assert_eq!(a.left(i).unwrap().num_of_samples(), 2 * i);
            assert_eq!(a.right(i).unwrap().num_of_samples(), 2);
        }
    }

    #[test]
    fn accumulate_length_mismatch_error() {
        let mut a = filled(3);
        let err = a.accumulate(&filled(4)).unwrap_err();
        assert!(matches!(
            err,
            ForestError::SplitStatisticsSizeMismatch { left: 3, right: 4 }
        ));
    }

    #[test]
    fn index_out_of_range_error() {
        let stats = filled(2);
        assert!(matches!(
            stats.left(2).unwrap_err(),
            ForestError::CandidateIndexOutOfRange { index: 2, len: 2 }
        ));
    }

    #[test]
    fn shards_cover_all_candidates_disjointly() {
        let mut stats = filled(10);
        let shards = stats.shards_mut(3);
        let ranges: Vec<Range<usize>> = shards.iter().map(|s| s.candidates()).collect();
        assert_eq!(ranges, vec![0..3, 3..6, 6..10]);
    }

    #[test]
    fn more_shards_than_candidates_skips_empty_windows() {
        let mut stats = filled(2);
        let shards = stats.shards_mut(8);
        let covered: usize = shards.iter().map(|s| s.candidates().len()).sum();
        assert_eq!(shards.len(), 2);
        assert_eq!(covered, 2);
    }

    #[test]
    fn shard_writes_use_global_indices() {
        let mut stats = SplitStatistics::new(4, &HistogramStatistics::new(2));
        let sample = FeatureSample::new(vec![], 1);
        {
            let mut shards = stats.shards_mut(2);
            let second = &mut shards[1];
            second.lazy_accumulate(3, Direction::Left, &sample).unwrap();
            assert!(second.lazy_accumulate(0, Direction::Left, &sample).is_err());
            second.finish();
        }
        assert_eq!(stats.left(3).unwrap().counts(), &[0, 1]);
        assert_eq!(stats.left(3).unwrap().num_of_samples(), 1);
        assert_eq!(stats.left(0).unwrap().num_of_samples(), 0);
    }
}
