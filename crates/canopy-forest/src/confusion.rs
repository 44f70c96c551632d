//! Confusion matrix and per-class metrics for evaluating a trained forest.

use std::fmt;

use crate::error::ForestError;

/// Counts of (true label, predicted label) pairs.
///
/// Stored row-major: row `t` holds the predictions made for samples whose
/// true label is `t`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConfusionMatrix {
    counts: Vec<usize>,
    num_of_classes: usize,
}

/// Precision, recall, and F1 of one class.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClassMetrics {
    /// The class label.
    pub class: usize,
    /// TP / (TP + FP); 0 when the class was never predicted.
    pub precision: f64,
    /// TP / (TP + FN); 0 when the class never occurs.
    pub recall: f64,
    /// Harmonic mean of precision and recall; 0 when both are 0.
    pub f1: f64,
    /// Number of samples whose true label is this class.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Create an empty matrix.
    #[must_use]
    pub fn new(num_of_classes: usize) -> Self {
        Self {
            counts: vec![0; num_of_classes * num_of_classes],
            num_of_classes,
        }
    }

    /// Build a matrix from paired true and predicted labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::EmptyEvaluation`] | no labels were given |
    /// | [`ForestError::PredictionCountMismatch`] | the slices differ in length |
    /// | [`ForestError::LabelOutOfRange`] | a label is `>= num_of_classes` |
    pub fn from_labels(
        true_labels: &[usize],
        predicted: &[usize],
        num_of_classes: usize,
    ) -> Result<Self, ForestError> {
        if true_labels.is_empty() {
            return Err(ForestError::EmptyEvaluation);
        }
        if true_labels.len() != predicted.len() {
            return Err(ForestError::PredictionCountMismatch {
                expected: true_labels.len(),
                got: predicted.len(),
            });
        }
        let mut matrix = Self::new(num_of_classes);
        for (&t, &p) in true_labels.iter().zip(predicted) {
            matrix.record(t, p)?;
        }
        Ok(matrix)
    }

    /// Count one prediction.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::LabelOutOfRange`] if either label has no row/column.
    pub fn record(&mut self, true_label: usize, predicted: usize) -> Result<(), ForestError> {
        let k = self.num_of_classes;
        for label in [true_label, predicted] {
            if label >= k {
                return Err(ForestError::LabelOutOfRange {
                    label,
                    num_of_bins: k,
                });
            }
        }
        self.counts[true_label * k + predicted] += 1;
        Ok(())
    }

    /// Number of samples with `true_label` predicted as `predicted`.
    #[must_use]
    pub fn count(&self, true_label: usize, predicted: usize) -> usize {
        if true_label >= self.num_of_classes || predicted >= self.num_of_classes {
            return 0;
        }
        self.counts[true_label * self.num_of_classes + predicted]
    }

    /// Total number of recorded predictions.
    #[must_use]
    pub fn num_of_samples(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Fraction of predictions on the diagonal; 0 for an empty matrix.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total = self.num_of_samples();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.num_of_classes).map(|c| self.count(c, c)).sum();
        correct as f64 / total as f64
    }

    /// Per-class precision, recall, F1, and support.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        let k = self.num_of_classes;
        (0..k)
            .map(|c| {
                let tp = self.count(c, c);
                let predicted: usize = (0..k).map(|t| self.count(t, c)).sum();
                let support: usize = (0..k).map(|p| self.count(c, p)).sum();
                let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Matrix rows, one per true label.
    pub fn rows(&self) -> impl Iterator<Item = &[usize]> {
        self.counts.chunks(self.num_of_classes.max(1))
    }

    /// Return the number of classes.
    #[must_use]
    pub fn num_of_classes(&self) -> usize {
        self.num_of_classes
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "true\\pred")?;
        for p in 0..self.num_of_classes {
            write!(f, " {p:>8}")?;
        }
        writeln!(f)?;
        for (t, row) in self.rows().enumerate() {
            write!(f, "{t:>10}")?;
            for count in row {
                write!(f, " {count:>8}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions() {
        let labels = vec![0, 0, 1, 1, 2, 2];
        let cm = ConfusionMatrix::from_labels(&labels, &labels, 3).unwrap();
        assert!((cm.accuracy() - 1.0).abs() < f64::EPSILON);
        for m in cm.class_metrics() {
            assert!((m.f1 - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn known_confusion_matrix() {
        let true_labels = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];
        let predicted = vec![0, 0, 1, 1, 1, 2, 2, 2, 0];
        let cm = ConfusionMatrix::from_labels(&true_labels, &predicted, 3).unwrap();
        let metrics = cm.class_metrics();

        assert!((metrics[0].precision - 2.0 / 3.0).abs() < 1e-10);
        assert!((metrics[0].recall - 2.0 / 3.0).abs() < 1e-10);
        assert_eq!(metrics[0].support, 3);
        assert_eq!(cm.count(0, 1), 1);
        assert!((cm.accuracy() - 6.0 / 9.0).abs() < 1e-10);
    }

    #[test]
    fn empty_labels_error() {
        let err = ConfusionMatrix::from_labels(&[], &[], 3).unwrap_err();
        assert!(matches!(err, ForestError::EmptyEvaluation));
    }

    #[test]
    fn length_mismatch_error() {
        let err = ConfusionMatrix::from_labels(&[0, 1], &[0], 2).unwrap_err();
        assert!(matches!(
            err,
            ForestError::PredictionCountMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn out_of_range_label_error() {
        let mut cm = ConfusionMatrix::new(2);
        let err = cm.record(0, 2).unwrap_err();
        assert!(matches!(err, ForestError::LabelOutOfRange { label: 2, .. }));
        assert_eq!(cm.num_of_samples(), 0);
    }

    #[test]
    fn rows_and_display() {
        let cm = ConfusionMatrix::from_labels(&[0, 0, 1, 1], &[0, 1, 0, 1], 2).unwrap();
        let rows: Vec<&[usize]> = cm.rows().collect();
        assert_eq!(rows, vec![&[1, 1][..], &[1, 1][..]]);
        assert!(format!("{cm}").contains("true\\pred"));
    }

    #[test]
    fn zero_support_class_metrics() {
        let labels = vec![0, 0, 1, 1];
        let cm = ConfusionMatrix::from_labels(&labels, &labels, 3).unwrap();
        let metrics = cm.class_metrics();
        assert_eq!(metrics[2].support, 0);
        assert_eq!(metrics[2].recall, 0.0);
        assert_eq!(metrics[2].precision, 0.0);
    }
}
