//! The weak-learner contract: candidate generation, split scoring, and
//! in-place partitioning.
//!
//! A variant implements [`WeakLearner`] by generating candidates and filling
//! one [`SplitStatisticsShard`]. Sequential and fork-join evaluation,
//! information gain, best-candidate selection, and partitioning are shared
//! by every variant.

use rand::Rng;
use tracing::trace;

use crate::error::ForestError;
use crate::histogram::HistogramStatistics;
use crate::sample::LabeledSample;
use crate::split_statistics::{SplitStatistics, SplitStatisticsShard};

/// Side of a binary split a sample is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    /// The left child.
    Left,
    /// The right child.
    Right,
}

/// A materialized split: a predicate that routes samples LEFT or RIGHT.
///
/// Evaluation must be deterministic; [`partition`] verifies it.
pub trait SplitPoint<S: ?Sized> {
    /// Route one sample.
    fn evaluate(&self, sample: &S) -> Direction;
}

/// The candidate splits generated for one node, addressed by a flat index.
pub trait SplitCandidates<P> {
    /// Return the number of candidates.
    fn len(&self) -> usize;

    /// Return `true` if no candidate was generated.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize candidate `index` as a split point.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::CandidateIndexOutOfRange`] if `index >= len()`.
    fn split_point(&self, index: usize) -> Result<P, ForestError>;
}

/// A pluggable strategy that proposes candidate splits and evaluates them.
///
/// The trainer is generic over this trait and never inspects features
/// itself. Implementations must draw all randomness from the generator they
/// are handed, so candidates are fully determined by generator state and the
/// sample range.
pub trait WeakLearner<S: LabeledSample + Sync>: Sync {
    /// The split predicate stored in trained nodes.
    type SplitPoint: SplitPoint<S>;
    /// The node-local candidate set.
    type Candidates: SplitCandidates<Self::SplitPoint> + Sync;

    /// Number of class labels; every histogram gets this many bins.
    fn num_of_classes(&self) -> usize;

    /// Draw a fresh set of candidate splits for `samples`.
    ///
    /// # Errors
    ///
    /// Implementations return an error when the range cannot be used to
    /// generate candidates.
    fn sample_split_points<R: Rng + ?Sized>(
        &self,
        samples: &[S],
        rng: &mut R,
    ) -> Result<Self::Candidates, ForestError>;

    /// Scan every sample against the candidates covered by `shard` and
    /// lazily accumulate each sample into its LEFT or RIGHT bucket.
    ///
    /// Must not touch candidates outside `shard.candidates()`. The caller
    /// closes the buckets.
    ///
    /// # Errors
    ///
    /// Propagates histogram and candidate-index errors.
    fn accumulate_split_statistics(
        &self,
        samples: &[S],
        candidates: &Self::Candidates,
        shard: &mut SplitStatisticsShard<'_>,
    ) -> Result<(), ForestError>;

    /// Create an empty histogram sized for this learner's classes.
    fn create_statistics(&self) -> HistogramStatistics {
        HistogramStatistics::new(self.num_of_classes())
    }

    /// Compute the class histogram of a sample range.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::LabelOutOfRange`] if a label has no bin.
    fn compute_statistics(&self, samples: &[S]) -> Result<HistogramStatistics, ForestError> {
        let mut statistics = self.create_statistics();
        statistics.accumulate_samples(samples)?;
        Ok(statistics)
    }

    /// Single-pass split statistics for every candidate.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`accumulate_split_statistics`](Self::accumulate_split_statistics).
    fn compute_split_statistics(
        &self,
        samples: &[S],
        candidates: &Self::Candidates,
    ) -> Result<SplitStatistics, ForestError> {
        let mut split_statistics = SplitStatistics::new(candidates.len(), &self.create_statistics());
        self.accumulate_split_statistics(samples, candidates, &mut split_statistics.as_shard())?;
        split_statistics.finish_all();
        Ok(split_statistics)
    }

    /// Fork-join split statistics, sharded by candidate.
    ///
    /// The candidate set is cut into `num_of_workers` contiguous windows;
    /// each worker scans the full sample range against its own window and
    /// writes only its own buckets. Returns after every worker has joined.
    /// `num_of_workers == 0` uses the current rayon pool size.
    ///
    /// # Errors
    ///
    /// Returns the error of the lowest-indexed failing worker.
    fn compute_split_statistics_parallel(
        &self,
        samples: &[S],
        candidates: &Self::Candidates,
        num_of_workers: usize,
    ) -> Result<SplitStatistics, ForestError> {
        let num_of_workers = if num_of_workers == 0 {
            rayon::current_num_threads()
        } else {
            num_of_workers
        };

        let mut split_statistics = SplitStatistics::new(candidates.len(), &self.create_statistics());
        let mut shards = split_statistics.shards_mut(num_of_workers);
        let mut results: Vec<Result<(), ForestError>> = shards.iter().map(|_| Ok(())).collect();
        trace!(
            num_of_workers,
            num_of_shards = shards.len(),
            num_of_candidates = candidates.len(),
            "evaluating split candidates in parallel"
        );

        rayon::scope(|scope| {
            for (shard, result) in shards.iter_mut().zip(results.iter_mut()) {
                scope.spawn(move |_| {
                    *result = self
                        .accumulate_split_statistics(samples, candidates, shard)
                        .map(|()| shard.finish());
                });
            }
        });
        drop(shards);

        results.into_iter().collect::<Result<(), _>>()?;
        Ok(split_statistics)
    }

    /// Entropy reduction of splitting `current` into `left` and `right`.
    ///
    /// `H(current) - |L|/|C|·H(left) - |R|/|C|·H(right)`; zero for an empty parent.
    fn compute_information_gain(
        &self,
        current: &HistogramStatistics,
        left: &HistogramStatistics,
        right: &HistogramStatistics,
    ) -> f64 {
        information_gain(current, left, right)
    }

    /// Linear scan for the candidate with the highest information gain.
    ///
    /// Ties go to the lowest index. With no candidates the result is
    /// `(0, -inf)`, which every gain floor rejects.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::CandidateIndexOutOfRange`] only if the
    /// container is internally inconsistent.
    fn find_best_split_point_tuple(
        &self,
        current: &HistogramStatistics,
        split_statistics: &SplitStatistics,
    ) -> Result<(usize, f64), ForestError> {
        let mut best_index = 0;
        let mut best_gain = f64::NEG_INFINITY;
        for index in 0..split_statistics.len() {
            let gain = self.compute_information_gain(
                current,
                split_statistics.left(index)?,
                split_statistics.right(index)?,
            );
            if gain > best_gain {
                best_index = index;
                best_gain = gain;
            }
        }
        Ok((best_index, best_gain))
    }

    /// Reorder `samples` in place so LEFT samples precede the returned boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PartitionInvariant`] if verification finds a
    /// sample on the wrong side.
    fn partition(&self, samples: &mut [S], split_point: &Self::SplitPoint) -> Result<usize, ForestError> {
        partition(samples, split_point)
    }
}

/// Entropy reduction of splitting `current` into `left` and `right`.
#[must_use]
pub fn information_gain(
    current: &HistogramStatistics,
    left: &HistogramStatistics,
    right: &HistogramStatistics,
) -> f64 {
    let n = current.num_of_samples();
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let left_weight = left.num_of_samples() as f64 / n;
    let right_weight = right.num_of_samples() as f64 / n;
    current.entropy() - left_weight * left.entropy() - right_weight * right.entropy()
}

/// Two-pointer in-place partition around `split_point`, then verification.
///
/// After the call, `samples[..boundary]` evaluate LEFT and
/// `samples[boundary..]` evaluate RIGHT. Samples already on their side are
/// never moved, so partitioning a partitioned range is a no-op.
///
/// # Errors
///
/// Returns [`ForestError::PartitionInvariant`] if the predicate routes a
/// sample differently on the verification pass.
pub fn partition<S, P>(samples: &mut [S], split_point: &P) -> Result<usize, ForestError>
where
    P: SplitPoint<S> + ?Sized,
{
    let mut lo = 0;
    let mut hi = samples.len();
    loop {
        while lo < hi && split_point.evaluate(&samples[lo]) == Direction::Left {
            lo += 1;
        }
        while lo < hi && split_point.evaluate(&samples[hi - 1]) == Direction::Right {
            hi -= 1;
        }
        if lo >= hi {
            break;
        }
        samples.swap(lo, hi - 1);
        lo += 1;
        hi -= 1;
    }
    let boundary = lo;

    for (position, sample) in samples.iter().enumerate() {
        let expected = if position < boundary {
            Direction::Left
        } else {
            Direction::Right
        };
        if split_point.evaluate(sample) != expected {
            return Err(ForestError::PartitionInvariant { position, boundary });
        }
    }

    Ok(boundary)
}
