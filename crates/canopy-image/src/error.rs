//! Error types for canopy-image.

use std::path::PathBuf;

/// Errors from image loading, sampling configuration, and weak-learner setup.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Returned when an input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when a matrix file has zero rows or zero columns.
    #[error("empty matrix in {path}")]
    EmptyMatrix {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a matrix row has a different number of columns than the first row.
    #[error("inconsistent row length in {path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index.
        row_index: usize,
        /// Column count of the first row.
        expected: usize,
        /// Column count of this row.
        got: usize,
    },

    /// Returned when a matrix cell is not a 16-bit signed integer.
    #[error("invalid value in {path}: row {row_index}, column {col_index}, raw value \"{raw}\"")]
    InvalidValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index.
        row_index: usize,
        /// Zero-based column index.
        col_index: usize,
        /// The raw string value that failed to parse.
        raw: String,
    },

    /// Returned when data and label matrices have different dimensions.
    #[error("data is {data_width}x{data_height} but labels are {label_width}x{label_height}")]
    DimensionMismatch {
        /// Width of the data matrix.
        data_width: usize,
        /// Height of the data matrix.
        data_height: usize,
        /// Width of the label matrix.
        label_width: usize,
        /// Height of the label matrix.
        label_height: usize,
    },

    /// Returned when a pixel buffer does not hold `width * height` values.
    #[error("expected {expected} pixels for the given dimensions, got {got}")]
    PixelCountMismatch {
        /// `width * height`.
        expected: usize,
        /// Length of the provided buffer.
        got: usize,
    },

    /// Returned when a sample provider is built without images.
    #[error("image list is empty")]
    EmptyImageList,

    /// Returned when an image list row does not have exactly two paths.
    #[error("image list {path}: row {row_index} must hold data_path,label_path")]
    MalformedImageList {
        /// Path to the image list.
        path: PathBuf,
        /// Zero-based row index.
        row_index: usize,
    },

    /// Returned when a sampling fraction is not a positive finite number.
    #[error("{parameter} must be positive and finite, got {value}")]
    InvalidFraction {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// The invalid value.
        value: f64,
    },

    /// Returned when an offset range has `low > high` or a negative bound.
    #[error("{axis} offset range must satisfy 0 <= low <= high, got [{low}, {high}]")]
    InvalidOffsetRange {
        /// `"x"` or `"y"`.
        axis: &'static str,
        /// Lower bound.
        low: i16,
        /// Upper bound.
        high: i16,
    },

    /// Returned when the threshold range has `low > high` or a non-finite width.
    #[error("threshold range must satisfy low <= high with a finite width, got [{low}, {high}]")]
    InvalidThresholdRange {
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },

    /// Returned when a weak learner is configured to generate zero candidates.
    #[error("{parameter} must be at least 1")]
    ZeroCandidates {
        /// Name of the offending parameter.
        parameter: &'static str,
    },

    /// Returned when a weak learner is configured with zero classes.
    #[error("num_of_classes must be at least 1")]
    ZeroClasses,
}
