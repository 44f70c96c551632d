/// A training sample that carries a zero-based class label.
///
/// Weak learners extend this with whatever feature accessors they need; the
/// trainer itself only ever reads the label and swaps samples in place.
pub trait LabeledSample {
    /// Return the zero-based class label of this sample.
    fn label(&self) -> usize;
}

impl<T: LabeledSample + ?Sized> LabeledSample for &T {
    fn label(&self) -> usize {
        (**self).label()
    }
}

/// A sample with a dense feature vector, used by
/// [`AxisAlignedWeakLearner`](crate::AxisAlignedWeakLearner).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureSample {
    features: Vec<f64>,
    label: usize,
}

impl FeatureSample {
    /// Create a sample from its feature values and class label.
    #[must_use]
    pub fn new(features: Vec<f64>, label: usize) -> Self {
        Self { features, label }
    }

    /// Return the feature values.
    #[must_use]
    pub fn features(&self) -> &[f64] {
        &self.features
    }

    /// Return a single feature value, or `None` past the end of the vector.
    #[must_use]
    pub fn feature(&self, index: usize) -> Option<f64> {
        self.features.get(index).copied()
    }
}

impl LabeledSample for FeatureSample {
    fn label(&self) -> usize {
        self.label
    }
}
