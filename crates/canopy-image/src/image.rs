//! Labelled single-channel images and their CSV matrix reader.

use std::path::Path;

use tracing::{debug, instrument};

use crate::ImageError;

/// Pixel intensity type.
pub type Pixel = i16;

/// Per-pixel class label type.
pub type Label = i16;

/// A single-channel image with one class label per pixel.
///
/// Data and labels are stored row-major; `(x, y)` addresses column `x` of
/// row `y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: usize,
    height: usize,
    data: Vec<Pixel>,
    labels: Vec<Label>,
}

impl Image {
    /// Create an image from row-major pixel and label buffers.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::PixelCountMismatch`] if either buffer does not
    /// hold `width * height` values.
    pub fn new(
        width: usize,
        height: usize,
        data: Vec<Pixel>,
        labels: Vec<Label>,
    ) -> Result<Self, ImageError> {
        let expected = width * height;
        for got in [data.len(), labels.len()] {
            if got != expected {
                return Err(ImageError::PixelCountMismatch { expected, got });
            }
        }
        Ok(Self {
            width,
            height,
            data,
            labels,
        })
    }

    /// Create an image from equally sized data and label matrices.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ImageError::DimensionMismatch`] | the matrices differ in shape |
    /// | [`ImageError::PixelCountMismatch`] | a matrix is ragged |
    pub fn from_matrices(
        data: Matrix<Pixel>,
        labels: Matrix<Label>,
    ) -> Result<Self, ImageError> {
        if data.width != labels.width || data.height != labels.height {
            return Err(ImageError::DimensionMismatch {
                data_width: data.width,
                data_height: data.height,
                label_width: labels.width,
                label_height: labels.height,
            });
        }
        Self::new(data.width, data.height, data.values, labels.values)
    }

    /// Load an image from two headerless CSV integer matrices.
    ///
    /// Each CSV row is one image row.
    ///
    /// # Errors
    ///
    /// Any error of [`read_matrix`] for either file, or
    /// [`ImageError::DimensionMismatch`] if their shapes differ.
    #[instrument(skip_all, fields(data = %data_path.as_ref().display(), labels = %label_path.as_ref().display()))]
    pub fn from_csv(
        data_path: impl AsRef<Path>,
        label_path: impl AsRef<Path>,
    ) -> Result<Self, ImageError> {
        let data = read_matrix(data_path.as_ref())?;
        let labels = read_matrix(label_path.as_ref())?;
        let image = Self::from_matrices(data, labels)?;
        debug!(width = image.width, height = image.height, "image loaded");
        Ok(image)
    }

    /// Return the number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Return the number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel at `(x, y)`, or `None` outside the image.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<Pixel> {
        (x < self.width && y < self.height).then(|| self.data[y * self.width + x])
    }

    /// Label at `(x, y)`, or `None` outside the image.
    #[must_use]
    pub fn label(&self, x: usize, y: usize) -> Option<Label> {
        (x < self.width && y < self.height).then(|| self.labels[y * self.width + x])
    }

    /// Row-major label buffer.
    #[must_use]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }
}

/// A dense row-major matrix read from CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix<T> {
    width: usize,
    height: usize,
    values: Vec<T>,
}

impl<T> Matrix<T> {
    /// Build a matrix from rows of equal length.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::PixelCountMismatch`] if the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, ImageError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            return Err(ImageError::PixelCountMismatch {
                expected: width,
                got: row.len(),
            });
        }
        let values: Vec<T> = rows.into_iter().flatten().collect();
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Return the number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Return the number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }
}

/// Read a headerless CSV matrix of 16-bit integers.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ImageError::FileNotFound`] | file doesn't exist or is unreadable |
/// | [`ImageError::CsvParse`] | malformed CSV record |
/// | [`ImageError::EmptyMatrix`] | zero rows or zero columns |
/// | [`ImageError::InconsistentRowLength`] | a row differs in length from the first |
/// | [`ImageError::InvalidValue`] | a cell is not an `i16` |
pub fn read_matrix(path: &Path) -> Result<Matrix<i16>, ImageError> {
    let file = std::fs::File::open(path).map_err(|e| ImageError::FileNotFound {
        path: path.to_path_buf(),
        source: e,
    })?;

    // flexible(true) so ragged rows reach the InconsistentRowLength check.
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut width = None;
    let mut height = 0;
    let mut values = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| ImageError::CsvParse {
            path: path.to_path_buf(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        })?;

        let expected = *width.get_or_insert(record.len());
        if record.len() != expected {
            return Err(ImageError::InconsistentRowLength {
                path: path.to_path_buf(),
                row_index,
                expected,
                got: record.len(),
            });
        }

        for (col_index, raw) in record.iter().enumerate() {
            let value: i16 = raw.parse().map_err(|_| ImageError::InvalidValue {
                path: path.to_path_buf(),
                row_index,
                col_index,
                raw: raw.to_string(),
            })?;
            values.push(value);
        }
        height += 1;
    }

    let width = width.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(ImageError::EmptyMatrix {
            path: path.to_path_buf(),
        });
    }
    debug!(width, height, "read CSV matrix");
    Ok(Matrix {
        width,
        height,
        values,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn reads_matrix_row_major() {
        let f = csv_file("1,2,3\n4,5,6\n");
        let m = read_matrix(f.path()).unwrap();
        assert_eq!((m.width(), m.height()), (3, 2));
        assert_eq!(m.values, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn from_csv_addresses_column_then_row() {
        let data = csv_file("10,11\n12,13\n14,15\n");
        let labels = csv_file("0,1\n1,0\n0,0\n");
        let image = Image::from_csv(data.path(), labels.path()).unwrap();
        assert_eq!((image.width(), image.height()), (2, 3));
        assert_eq!(image.pixel(1, 0), Some(11));
        assert_eq!(image.pixel(0, 2), Some(14));
        assert_eq!(image.label(0, 1), Some(1));
        assert_eq!(image.pixel(2, 0), None);
    }

    #[test]
    fn dimension_mismatch_error() {
        let data = csv_file("1,2\n3,4\n");
        let labels = csv_file("0,0,0\n0,0,0\n");
        let err = Image::from_csv(data.path(), labels.path()).unwrap_err();
        assert!(matches!(
            err,
            ImageError::DimensionMismatch { data_width: 2, label_width: 3, .. }
        ));
    }

    #[test]
    fn ragged_rows_error() {
        let f = csv_file("1,2,3\n4,5\n");
        let err = read_matrix(f.path()).unwrap_err();
        assert!(matches!(
            err,
            ImageError::InconsistentRowLength { row_index: 1, expected: 3, got: 2, .. }
        ));
    }

    #[test]
    fn out_of_range_value_error() {
        let f = csv_file("1,40000\n");
        let err = read_matrix(f.path()).unwrap_err();
        assert!(matches!(err, ImageError::InvalidValue { col_index: 1, .. }));
    }

    #[test]
    fn empty_file_error() {
        let f = csv_file("");
        let err = read_matrix(f.path()).unwrap_err();
        assert!(matches!(err, ImageError::EmptyMatrix { .. }));
    }

    #[test]
    fn missing_file_error() {
        let err = read_matrix(Path::new("/nonexistent/canopy/matrix.csv")).unwrap_err();
        assert!(matches!(err, ImageError::FileNotFound { .. }));
    }

    #[test]
    fn buffer_length_error() {
        let err = Image::new(2, 2, vec![0; 4], vec![0; 3]).unwrap_err();
        assert!(matches!(err, ImageError::PixelCountMismatch { expected: 4, got: 3 }));
    }
}
