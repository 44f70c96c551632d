use std::path::PathBuf;

/// Errors from forest training, evaluation, and persistence.
///
/// Every variant aborts the enclosing call; training never returns a
/// partially grown tree.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when tree_depth is zero or cannot be addressed by the node arena.
    #[error("tree_depth must be in [1, {max}], got {tree_depth}")]
    InvalidTreeDepth {
        /// The invalid tree_depth value provided.
        tree_depth: usize,
        /// The largest supported depth.
        max: usize,
    },

    /// Returned when the node arena for a tree cannot be allocated.
    #[error("cannot allocate {capacity} nodes for a tree of depth {tree_depth}")]
    TreeAllocation {
        /// The requested tree depth.
        tree_depth: usize,
        /// Number of arena slots requested.
        capacity: usize,
        /// The underlying allocation error.
        source: std::collections::TryReserveError,
    },

    /// Returned when num_of_trees is zero.
    #[error("num_of_trees must be at least 1, got {num_of_trees}")]
    InvalidTreeCount {
        /// The invalid num_of_trees value provided.
        num_of_trees: usize,
    },

    /// Returned when minimum_information_gain is NaN or infinite.
    #[error("minimum_information_gain must be finite, got {value}")]
    InvalidMinimumGain {
        /// The invalid gain floor.
        value: f64,
    },

    /// Returned when a weak learner is configured with zero classes.
    #[error("num_of_classes must be at least 1")]
    ZeroClasses,

    /// Returned when a weak learner is configured to generate zero candidates.
    #[error("{parameter} must be at least 1")]
    ZeroCandidates {
        /// Name of the offending parameter.
        parameter: &'static str,
    },

    /// Returned when a label is accumulated into a histogram that has no bin for it.
    #[error("label {label} is out of range for a histogram with {num_of_bins} bins")]
    LabelOutOfRange {
        /// The offending label.
        label: usize,
        /// Number of bins in the histogram.
        num_of_bins: usize,
    },

    /// Returned when two histograms with different bin counts are merged.
    #[error("cannot merge histograms with {left} and {right} bins")]
    HistogramSizeMismatch {
        /// Bin count of the receiving histogram.
        left: usize,
        /// Bin count of the merged histogram.
        right: usize,
    },

    /// Returned when two split statistics containers with different lengths are merged.
    #[error("cannot merge split statistics for {left} and {right} candidates")]
    SplitStatisticsSizeMismatch {
        /// Candidate count of the receiving container.
        left: usize,
        /// Candidate count of the merged container.
        right: usize,
    },

    /// Returned when a candidate index does not address a generated split point.
    #[error("candidate index {index} is out of range for {len} candidates")]
    CandidateIndexOutOfRange {
        /// The requested candidate index.
        index: usize,
        /// Number of candidates available.
        len: usize,
    },

    /// Returned when post-partition verification finds a sample on the wrong side.
    ///
    /// This means the split predicate did not evaluate consistently for the
    /// same sample.
    #[error("partition invariant violated: sample at position {position} is on the wrong side of boundary {boundary}")]
    PartitionInvariant {
        /// Position (relative to the partitioned range) of the misplaced sample.
        position: usize,
        /// The boundary returned by the two-pointer pass.
        boundary: usize,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },

    /// Returned when a confusion matrix is built from zero labels.
    #[error("cannot evaluate an empty set of predictions")]
    EmptyEvaluation,

    /// Returned when true and predicted label slices differ in length.
    #[error("expected {expected} predictions, got {got}")]
    PredictionCountMismatch {
        /// Number of true labels.
        expected: usize,
        /// Number of predicted labels.
        got: usize,
    },
}
