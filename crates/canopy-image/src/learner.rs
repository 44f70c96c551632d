//! Pixel-difference weak learner.
//!
//! A feature compares two pixels at fixed offsets from the sample position;
//! a split thresholds that difference.

use std::ops::Range;

use canopy_forest::{
    Direction, ForestError, SplitCandidates, SplitPoint, SplitStatisticsShard, WeakLearner,
};
use rand::Rng;

use crate::ImageError;
use crate::sample::ImageSample;

/// Candidate-generation configuration for [`ImageWeakLearner`].
///
/// # Defaults
///
/// | Parameter                  | Default          |
/// |----------------------------|------------------|
/// | `num_of_thresholds`        | 200              |
/// | `num_of_features`          | 200              |
/// | `offset_x_range`           | `3..=15`         |
/// | `offset_y_range`           | `3..=15`         |
/// | `threshold_range`          | `-300.0..=300.0` |
/// | `adaptive_threshold_range` | `true`           |
/// | `binary_images`            | `true`           |
///
/// With `binary_images` set, every feature gets exactly the thresholds
/// `-0.5` and `+0.5` and the other threshold settings are ignored.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageWeakLearnerParameters {
    num_of_thresholds: usize,
    num_of_features: usize,
    offset_x_range: (i16, i16),
    offset_y_range: (i16, i16),
    threshold_range: (f64, f64),
    adaptive_threshold_range: bool,
    binary_images: bool,
}

impl Default for ImageWeakLearnerParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWeakLearnerParameters {
    /// Create parameters with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            num_of_thresholds: 200,
            num_of_features: 200,
            offset_x_range: (3, 15),
            offset_y_range: (3, 15),
            threshold_range: (-300.0, 300.0),
            adaptive_threshold_range: true,
            binary_images: true,
        }
    }

    // --- Setters ---

    /// Thresholds drawn per feature when `binary_images` is off.
    #[must_use]
    pub fn with_num_of_thresholds(mut self, n: usize) -> Self {
        self.num_of_thresholds = n;
        self
    }

    /// Features drawn per node.
    #[must_use]
    pub fn with_num_of_features(mut self, n: usize) -> Self {
        self.num_of_features = n;
        self
    }

    /// Inclusive range of horizontal offset magnitudes.
    #[must_use]
    pub fn with_offset_x_range(mut self, low: i16, high: i16) -> Self {
        self.offset_x_range = (low, high);
        self
    }

    /// Inclusive range of vertical offset magnitudes.
    #[must_use]
    pub fn with_offset_y_range(mut self, low: i16, high: i16) -> Self {
        self.offset_y_range = (low, high);
        self
    }

    /// Threshold range used when the adaptive range is off or has no data.
    #[must_use]
    pub fn with_threshold_range(mut self, low: f64, high: f64) -> Self {
        self.threshold_range = (low, high);
        self
    }

    /// Draw thresholds between the observed min and max response.
    #[must_use]
    pub fn with_adaptive_threshold_range(mut self, adaptive: bool) -> Self {
        self.adaptive_threshold_range = adaptive;
        self
    }

    /// Use the fixed `{-0.5, +0.5}` thresholds.
    #[must_use]
    pub fn with_binary_images(mut self, binary: bool) -> Self {
        self.binary_images = binary;
        self
    }

    // --- Getters ---

    /// Return the number of thresholds per feature.
    #[must_use]
    pub fn num_of_thresholds(&self) -> usize {
        self.num_of_thresholds
    }

    /// Return the number of features per node.
    #[must_use]
    pub fn num_of_features(&self) -> usize {
        self.num_of_features
    }

    /// Return the horizontal offset range.
    #[must_use]
    pub fn offset_x_range(&self) -> (i16, i16) {
        self.offset_x_range
    }

    /// Return the vertical offset range.
    #[must_use]
    pub fn offset_y_range(&self) -> (i16, i16) {
        self.offset_y_range
    }

    /// Return the configured threshold range.
    #[must_use]
    pub fn threshold_range(&self) -> (f64, f64) {
        self.threshold_range
    }

    /// Return whether the threshold range adapts to the data.
    #[must_use]
    pub fn adaptive_threshold_range(&self) -> bool {
        self.adaptive_threshold_range
    }

    /// Return whether binary thresholds are used.
    #[must_use]
    pub fn binary_images(&self) -> bool {
        self.binary_images
    }

    /// Check counts and ranges.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ImageError::ZeroCandidates`] | a count is 0 |
    /// | [`ImageError::InvalidOffsetRange`] | an offset range is negative or inverted |
    /// | [`ImageError::InvalidThresholdRange`] | the threshold range is inverted or its width is not finite |
    pub fn validate(&self) -> Result<(), ImageError> {
        if self.num_of_features == 0 {
            return Err(ImageError::ZeroCandidates {
                parameter: "num_of_features",
            });
        }
        if !self.binary_images && self.num_of_thresholds == 0 {
            return Err(ImageError::ZeroCandidates {
                parameter: "num_of_thresholds",
            });
        }
        for (axis, (low, high)) in [("x", self.offset_x_range), ("y", self.offset_y_range)] {
            if low < 0 || low > high {
                return Err(ImageError::InvalidOffsetRange { axis, low, high });
            }
        }
        let (low, high) = self.threshold_range;
        if !(low <= high && (high - low).is_finite()) {
            return Err(ImageError::InvalidThresholdRange { low, high });
        }
        Ok(())
    }
}

/// Two pixel offsets relative to the sample position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ImageFeature {
    offset_x1: i16,
    offset_y1: i16,
    offset_x2: i16,
    offset_y2: i16,
}

impl ImageFeature {
    /// Create a feature from two `(dx, dy)` offsets.
    #[must_use]
    pub fn new(offset_x1: i16, offset_y1: i16, offset_x2: i16, offset_y2: i16) -> Self {
        Self {
            offset_x1,
            offset_y1,
            offset_x2,
            offset_y2,
        }
    }

    /// Return the first offset.
    #[must_use]
    pub fn first_offset(&self) -> (i16, i16) {
        (self.offset_x1, self.offset_y1)
    }

    /// Return the second offset.
    #[must_use]
    pub fn second_offset(&self) -> (i16, i16) {
        (self.offset_x2, self.offset_y2)
    }

    /// `pixel(first) - pixel(second)`, with pixels outside the image read as 0.
    #[inline]
    #[must_use]
    pub fn response(&self, sample: &ImageSample<'_>) -> f64 {
        let a = i32::from(sample.pixel_at(self.offset_x1, self.offset_y1));
        let b = i32::from(sample.pixel_at(self.offset_x2, self.offset_y2));
        f64::from(a - b)
    }
}

/// A feature and a threshold; `response < threshold` goes LEFT.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageSplitPoint {
    feature: ImageFeature,
    threshold: f64,
}

impl ImageSplitPoint {
    /// Create a split point.
    #[must_use]
    pub fn new(feature: ImageFeature, threshold: f64) -> Self {
        Self { feature, threshold }
    }

    /// Return the feature.
    #[must_use]
    pub fn feature(&self) -> ImageFeature {
        self.feature
    }

    /// Return the threshold.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl SplitPoint<ImageSample<'_>> for ImageSplitPoint {
    #[inline]
    fn evaluate(&self, sample: &ImageSample<'_>) -> Direction {
        if self.feature.response(sample) < self.threshold {
            Direction::Left
        } else {
            Direction::Right
        }
    }
}

/// Sampled features, each with its own list of thresholds.
///
/// Candidates are numbered feature by feature: feature `f` owns the flat
/// indices `bounds[f]..bounds[f + 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSplitPointCandidates {
    features: Vec<ImageFeature>,
    thresholds: Vec<f64>,
    bounds: Vec<usize>,
}

impl ImageSplitPointCandidates {
    fn with_capacity(num_of_features: usize, num_of_candidates: usize) -> Self {
        let mut bounds = Vec::with_capacity(num_of_features + 1);
        bounds.push(0);
        Self {
            features: Vec::with_capacity(num_of_features),
            thresholds: Vec::with_capacity(num_of_candidates),
            bounds,
        }
    }

    fn push(&mut self, feature: ImageFeature, thresholds: impl IntoIterator<Item = f64>) {
        self.features.push(feature);
        self.thresholds.extend(thresholds);
        self.bounds.push(self.thresholds.len());
    }

    /// Return the sampled features.
    #[must_use]
    pub fn features(&self) -> &[ImageFeature] {
        &self.features
    }

    /// Return the thresholds of feature `f`, or `None` if out of range.
    #[must_use]
    pub fn thresholds(&self, f: usize) -> Option<&[f64]> {
        let range = *self.bounds.get(f)?..*self.bounds.get(f + 1)?;
        self.thresholds.get(range)
    }

    /// Feature ranges overlapping `window`, clipped to it.
    fn segments(&self, window: &Range<usize>) -> Vec<(ImageFeature, Range<usize>)> {
        self.features
            .iter()
            .zip(self.bounds.windows(2))
            .filter_map(|(&feature, bound)| {
                let start = bound[0].max(window.start);
                let end = bound[1].min(window.end);
                (start < end).then_some((feature, start..end))
            })
            .collect()
    }
}

impl SplitCandidates<ImageSplitPoint> for ImageSplitPointCandidates {
    fn len(&self) -> usize {
        self.thresholds.len()
    }

    fn split_point(&self, index: usize) -> Result<ImageSplitPoint, ForestError> {
        let len = self.len();
        let threshold = *self
            .thresholds
            .get(index)
            .ok_or(ForestError::CandidateIndexOutOfRange { index, len })?;
        // bounds[0] == 0 <= index, so the partition point is at least 1.
        let f = self.bounds.partition_point(|&bound| bound <= index) - 1;
        let feature = *self
            .features
            .get(f)
            .ok_or(ForestError::CandidateIndexOutOfRange { index, len })?;
        Ok(ImageSplitPoint::new(feature, threshold))
    }
}

/// Weak learner over [`ImageSample`]s using pixel-difference features.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageWeakLearner {
    parameters: ImageWeakLearnerParameters,
    num_of_classes: usize,
}

impl ImageWeakLearner {
    /// Create a learner for `num_of_classes` labels.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::ZeroClasses`] for zero classes, or any error of
    /// [`ImageWeakLearnerParameters::validate`].
    pub fn new(
        parameters: ImageWeakLearnerParameters,
        num_of_classes: usize,
    ) -> Result<Self, ImageError> {
        if num_of_classes == 0 {
            return Err(ImageError::ZeroClasses);
        }
        parameters.validate()?;
        Ok(Self {
            parameters,
            num_of_classes,
        })
    }

    /// Return the candidate-generation parameters.
    #[must_use]
    pub fn parameters(&self) -> &ImageWeakLearnerParameters {
        &self.parameters
    }

    fn sample_offset<R: Rng + ?Sized>(rng: &mut R, (low, high): (i16, i16)) -> i16 {
        let magnitude = rng.gen_range(low..=high);
        if rng.gen_bool(0.5) { -magnitude } else { magnitude }
    }

    fn sample_feature<R: Rng + ?Sized>(&self, rng: &mut R) -> ImageFeature {
        let x = self.parameters.offset_x_range;
        let y = self.parameters.offset_y_range;
        let offset_x1 = Self::sample_offset(rng, x);
        let offset_y1 = Self::sample_offset(rng, y);
        let offset_x2 = Self::sample_offset(rng, x);
        let offset_y2 = Self::sample_offset(rng, y);
        ImageFeature::new(offset_x1, offset_y1, offset_x2, offset_y2)
    }

    /// Threshold bounds for `feature` over `samples`.
    fn threshold_range(&self, feature: &ImageFeature, samples: &[ImageSample<'_>]) -> (f64, f64) {
        if !self.parameters.adaptive_threshold_range || samples.is_empty() {
            return self.parameters.threshold_range;
        }
        samples
            .iter()
            .map(|s| feature.response(s))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
    }
}

impl<'a> WeakLearner<ImageSample<'a>> for ImageWeakLearner {
    type SplitPoint = ImageSplitPoint;
    type Candidates = ImageSplitPointCandidates;

    fn num_of_classes(&self) -> usize {
        self.num_of_classes
    }

    fn sample_split_points<R: Rng + ?Sized>(
        &self,
        samples: &[ImageSample<'a>],
        rng: &mut R,
    ) -> Result<ImageSplitPointCandidates, ForestError> {
        let num_of_features = self.parameters.num_of_features;
        let per_feature = if self.parameters.binary_images {
            2
        } else {
            self.parameters.num_of_thresholds
        };
        let mut candidates =
            ImageSplitPointCandidates::with_capacity(num_of_features, num_of_features * per_feature);

        for _ in 0..num_of_features {
            let feature = self.sample_feature(rng);
            if self.parameters.binary_images {
                candidates.push(feature, [-0.5, 0.5]);
            } else {
                let (lo, hi) = self.threshold_range(&feature, samples);
                let thresholds: Vec<f64> = (0..per_feature).map(|_| rng.gen_range(lo..=hi)).collect();
                candidates.push(feature, thresholds);
            }
        }
        Ok(candidates)
    }

    fn accumulate_split_statistics(
        &self,
        samples: &[ImageSample<'a>],
        candidates: &ImageSplitPointCandidates,
        shard: &mut SplitStatisticsShard<'_>,
    ) -> Result<(), ForestError> {
        let segments = candidates.segments(&shard.candidates());
        for sample in samples {
            for (feature, range) in &segments {
                let response = feature.response(sample);
                for index in range.clone() {
                    let direction = if response < candidates.thresholds[index] {
                        Direction::Left
                    } else {
                        Direction::Right
                    };
                    shard.lazy_accumulate(index, direction, sample)?;
                }
            }
        }
        Ok(())
    }
}
