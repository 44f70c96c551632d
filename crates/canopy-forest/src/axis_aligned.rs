//! Axis-aligned threshold splits over dense feature vectors.

use rand::Rng;

use crate::error::ForestError;
use crate::sample::FeatureSample;
use crate::split_statistics::SplitStatisticsShard;
use crate::weak_learner::{Direction, SplitCandidates, SplitPoint, WeakLearner};

/// `feature < threshold` goes LEFT; a missing feature goes RIGHT.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AxisAlignedSplitPoint {
    feature: usize,
    threshold: f64,
}

impl AxisAlignedSplitPoint {
    /// Create a split on one coordinate.
    #[must_use]
    pub fn new(feature: usize, threshold: f64) -> Self {
        Self { feature, threshold }
    }

    /// Return the thresholded coordinate.
    #[must_use]
    pub fn feature(&self) -> usize {
        self.feature
    }

    /// Return the threshold.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl SplitPoint<FeatureSample> for AxisAlignedSplitPoint {
    #[inline]
    fn evaluate(&self, sample: &FeatureSample) -> Direction {
        match sample.feature(self.feature) {
            Some(value) if value < self.threshold => Direction::Left,
            _ => Direction::Right,
        }
    }
}

/// Candidates for one node, `num_of_thresholds` per sampled feature.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisAlignedCandidates {
    split_points: Vec<AxisAlignedSplitPoint>,
}

impl SplitCandidates<AxisAlignedSplitPoint> for AxisAlignedCandidates {
    fn len(&self) -> usize {
        self.split_points.len()
    }

    fn split_point(&self, index: usize) -> Result<AxisAlignedSplitPoint, ForestError> {
        self.split_points
            .get(index)
            .copied()
            .ok_or(ForestError::CandidateIndexOutOfRange {
                index,
                len: self.split_points.len(),
            })
    }
}

/// Weak learner that thresholds one randomly chosen coordinate.
///
/// Each node draws `num_of_features` coordinates uniformly from
/// `0..num_of_dimensions` and, for each, `num_of_thresholds` thresholds
/// uniformly between the coordinate's minimum and maximum over the range.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AxisAlignedWeakLearner {
    num_of_classes: usize,
    num_of_dimensions: usize,
    num_of_features: usize,
    num_of_thresholds: usize,
}

impl AxisAlignedWeakLearner {
    /// Create a learner.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::ZeroClasses`] | `num_of_classes` is 0 |
    /// | [`ForestError::ZeroCandidates`] | any other count is 0 |
    pub fn new(
        num_of_classes: usize,
        num_of_dimensions: usize,
        num_of_features: usize,
        num_of_thresholds: usize,
    ) -> Result<Self, ForestError> {
        if num_of_classes == 0 {
            return Err(ForestError::ZeroClasses);
        }
        for (parameter, value) in [
            ("num_of_dimensions", num_of_dimensions),
            ("num_of_features", num_of_features),
            ("num_of_thresholds", num_of_thresholds),
        ] {
            if value == 0 {
                return Err(ForestError::ZeroCandidates { parameter });
            }
        }
        Ok(Self {
            num_of_classes,
            num_of_dimensions,
            num_of_features,
            num_of_thresholds,
        })
    }

    /// Return the feature-vector length candidates are drawn from.
    #[must_use]
    pub fn num_of_dimensions(&self) -> usize {
        self.num_of_dimensions
    }

    /// Return the number of coordinates sampled per node.
    #[must_use]
    pub fn num_of_features(&self) -> usize {
        self.num_of_features
    }

    /// Return the number of thresholds per coordinate.
    #[must_use]
    pub fn num_of_thresholds(&self) -> usize {
        self.num_of_thresholds
    }
}

/// Finite min/max of one coordinate over `samples`, `(0, 0)` if none.
fn feature_range(samples: &[FeatureSample], feature: usize) -> (f64, f64) {
    let (lo, hi) = samples
        .iter()
        .filter_map(|s| s.feature(feature))
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo <= hi { (lo, hi) } else { (0.0, 0.0) }
}

/// Uniform threshold in `[lo, hi]`.
///
/// `gen_range` rejects ranges whose width overflows `f64`; those are
/// sampled by interpolating between the endpoints instead.
fn sample_threshold<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if (hi - lo).is_finite() {
        rng.gen_range(lo..=hi)
    } else {
        let t: f64 = rng.r#gen();
        (lo * (1.0 - t) + hi * t).clamp(lo, hi)
    }
}

impl WeakLearner<FeatureSample> for AxisAlignedWeakLearner {
    type SplitPoint = AxisAlignedSplitPoint;
    type Candidates = AxisAlignedCandidates;

    fn num_of_classes(&self) -> usize {
        self.num_of_classes
    }

    fn sample_split_points<R: Rng + ?Sized>(
        &self,
        samples: &[FeatureSample],
        rng: &mut R,
    ) -> Result<AxisAlignedCandidates, ForestError> {
        let mut split_points = Vec::with_capacity(self.num_of_features * self.num_of_thresholds);
        for _ in 0..self.num_of_features {
            let feature = rng.gen_range(0..self.num_of_dimensions);
            let (lo, hi) = feature_range(samples, feature);
            for _ in 0..self.num_of_thresholds {
                let threshold = sample_threshold(rng, lo, hi);
                split_points.push(AxisAlignedSplitPoint::new(feature, threshold));
            }
        }
        Ok(AxisAlignedCandidates { split_points })
    }

    fn accumulate_split_statistics(
        &self,
        samples: &[FeatureSample],
        candidates: &AxisAlignedCandidates,
        shard: &mut SplitStatisticsShard<'_>,
    ) -> Result<(), ForestError> {
        let window = shard.candidates();
        let split_points = &candidates.split_points[window.clone()];
        for sample in samples {
            for (index, split_point) in window.clone().zip(split_points) {
                shard.lazy_accumulate(index, split_point.evaluate(sample), sample)?;
            }
        }
        Ok(())
    }
}
