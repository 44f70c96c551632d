//! Class histograms: the per-node sufficient statistic.
//!
//! A histogram counts samples per class label. Entropy uses the natural
//! logarithm, so a uniform histogram over `k` classes has entropy `ln(k)`.

use crate::error::ForestError;
use crate::sample::LabeledSample;

/// A histogram over the class labels of a set of samples.
///
/// Counts can be accumulated eagerly ([`accumulate`](Self::accumulate)),
/// which keeps the sample total current, or lazily
/// ([`lazy_accumulate`](Self::lazy_accumulate)), which only touches the bin
/// and requires one [`finish_lazy_accumulation`](Self::finish_lazy_accumulation)
/// call after the burst.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HistogramStatistics {
    histogram: Vec<usize>,
    num_of_samples: usize,
}

impl HistogramStatistics {
    /// Create an empty histogram with one bin per class.
    #[must_use]
    pub fn new(num_of_classes: usize) -> Self {
        Self {
            histogram: vec![0; num_of_classes],
            num_of_samples: 0,
        }
    }

    /// Create a histogram from explicit per-class counts.
    #[must_use]
    pub fn from_counts(histogram: Vec<usize>) -> Self {
        let num_of_samples = histogram.iter().sum();
        Self {
            histogram,
            num_of_samples,
        }
    }

    /// Increment the bin for `label` without updating the sample total.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::LabelOutOfRange`] if `label` has no bin.
    #[inline]
    pub fn lazy_accumulate(&mut self, label: usize) -> Result<(), ForestError> {
        let num_of_bins = self.histogram.len();
        let bin = self
            .histogram
            .get_mut(label)
            .ok_or(ForestError::LabelOutOfRange { label, num_of_bins })?;
        *bin += 1;
        Ok(())
    }

    /// Lazily accumulate the label of one sample.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::LabelOutOfRange`] if the sample's label has no bin.
    #[inline]
    pub fn lazy_accumulate_sample<S: LabeledSample + ?Sized>(
        &mut self,
        sample: &S,
    ) -> Result<(), ForestError> {
        self.lazy_accumulate(sample.label())
    }

    /// Recompute the sample total from the bins.
    ///
    /// Must be called once after a burst of lazy accumulation.
    pub fn finish_lazy_accumulation(&mut self) {
        self.num_of_samples = self.histogram.iter().sum();
    }

    /// Increment the bin for `label` and the sample total.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::LabelOutOfRange`] if `label` has no bin.
    pub fn accumulate(&mut self, label: usize) -> Result<(), ForestError> {
        self.lazy_accumulate(label)?;
        self.num_of_samples += 1;
        Ok(())
    }

    /// Accumulate the labels of a range of samples and close the burst.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::LabelOutOfRange`] on the first label without a bin.
    pub fn accumulate_samples<'a, S, I>(&mut self, samples: I) -> Result<(), ForestError>
    where
        S: LabeledSample + 'a,
        I: IntoIterator<Item = &'a S>,
    {
        for sample in samples {
            self.lazy_accumulate_sample(sample)?;
        }
        self.finish_lazy_accumulation();
        Ok(())
    }

    /// Add the bin counts and sample total of `other` to this histogram.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::HistogramSizeMismatch`] if the bin counts differ.
    pub fn merge(&mut self, other: &Self) -> Result<(), ForestError> {
        if self.histogram.len() != other.histogram.len() {
            return Err(ForestError::HistogramSizeMismatch {
                left: self.histogram.len(),
                right: other.histogram.len(),
            });
        }
        for (bin, &count) in self.histogram.iter_mut().zip(&other.histogram) {
            *bin += count;
        }
        self.num_of_samples += other.num_of_samples;
        Ok(())
    }

    /// Merge several histograms into this one, recomputing the total from the bins.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::HistogramSizeMismatch`] if any bin count differs;
    /// the histogram is left untouched in that case.
    pub fn merge_all<'a, I>(&mut self, others: I) -> Result<(), ForestError>
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let others: Vec<&Self> = others.into_iter().collect();
        if let Some(other) = others
            .iter()
            .find(|other| other.histogram.len() != self.histogram.len())
        {
            return Err(ForestError::HistogramSizeMismatch {
                left: self.histogram.len(),
                right: other.histogram.len(),
            });
        }
        for other in others {
            for (bin, &count) in self.histogram.iter_mut().zip(&other.histogram) {
                *bin += count;
            }
        }
        self.finish_lazy_accumulation();
        Ok(())
    }

    /// Return the number of samples contributing to the histogram.
    #[must_use]
    pub fn num_of_samples(&self) -> usize {
        self.num_of_samples
    }

    /// Return the number of class bins.
    #[must_use]
    pub fn num_of_bins(&self) -> usize {
        self.histogram.len()
    }

    /// Return the per-class counts.
    #[must_use]
    pub fn counts(&self) -> &[usize] {
        &self.histogram
    }

    /// Shannon entropy of the normalized bin frequencies, in nats.
    ///
    /// Zero for an empty histogram or one with a single non-empty bin.
    #[must_use]
    pub fn entropy(&self) -> f64 {
        if self.num_of_samples == 0 {
            return 0.0;
        }
        let n = self.num_of_samples as f64;
        self.histogram
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / n;
                p * (n / c as f64).ln()
            })
            .sum()
    }

    /// Return the index of the largest bin; ties go to the lowest index.
    #[must_use]
    pub fn get_max_bin(&self) -> usize {
        let mut max_bin = 0;
        for (bin, &count) in self.histogram.iter().enumerate() {
            if count > self.histogram[max_bin] {
                max_bin = bin;
            }
        }
        max_bin
    }

    /// Normalized class frequencies. All zeros for an empty histogram.
    #[must_use]
    pub fn probabilities(&self) -> Vec<f64> {
        if self.num_of_samples == 0 {
            return vec![0.0; self.histogram.len()];
        }
        let n = self.num_of_samples as f64;
        self.histogram.iter().map(|&c| c as f64 / n).collect()
    }
}
