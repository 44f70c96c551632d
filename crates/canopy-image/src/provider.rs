//! Image bagging and per-image pixel subsampling.

use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, info, instrument};

use crate::ImageError;
use crate::image::{Image, Label};
use crate::sample::ImageSample;

/// Sampling configuration for [`ImageSampleProvider`].
///
/// # Defaults
///
/// | Parameter                    | Default      |
/// |------------------------------|--------------|
/// | `samples_per_image_fraction` | 0.1          |
/// | `bagging_fraction`           | 1.0          |
/// | `background_label`           | `i16::MAX`   |
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageParameters {
    samples_per_image_fraction: f64,
    bagging_fraction: f64,
    background_label: Label,
}

impl Default for ImageParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageParameters {
    /// Create parameters with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples_per_image_fraction: 0.1,
            bagging_fraction: 1.0,
            background_label: Label::MAX,
        }
    }

    /// Fraction of `width * height` pixels drawn per bagged image. Values
    /// `>= 1` take every non-background pixel.
    #[must_use]
    pub fn with_samples_per_image_fraction(mut self, fraction: f64) -> Self {
        self.samples_per_image_fraction = fraction;
        self
    }

    /// Number of bagged images as a fraction of the image count.
    #[must_use]
    pub fn with_bagging_fraction(mut self, fraction: f64) -> Self {
        self.bagging_fraction = fraction;
        self
    }

    /// Labels at or above this value are background and never sampled.
    #[must_use]
    pub fn with_background_label(mut self, background_label: Label) -> Self {
        self.background_label = background_label;
        self
    }

    /// Return the per-image sampling fraction.
    #[must_use]
    pub fn samples_per_image_fraction(&self) -> f64 {
        self.samples_per_image_fraction
    }

    /// Return the bagging fraction.
    #[must_use]
    pub fn bagging_fraction(&self) -> f64 {
        self.bagging_fraction
    }

    /// Return the background label bound.
    #[must_use]
    pub fn background_label(&self) -> Label {
        self.background_label
    }

    /// Check both fractions are positive and finite.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidFraction`] naming the offending parameter.
    pub fn validate(&self) -> Result<(), ImageError> {
        for (parameter, value) in [
            ("samples_per_image_fraction", self.samples_per_image_fraction),
            ("bagging_fraction", self.bagging_fraction),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ImageError::InvalidFraction { parameter, value });
            }
        }
        Ok(())
    }

    fn is_foreground(&self, label: Label) -> bool {
        label < self.background_label
    }
}

/// Owns a set of images and draws training samples from them.
#[derive(Debug, Clone)]
pub struct ImageSampleProvider {
    images: Vec<Image>,
    parameters: ImageParameters,
}

impl ImageSampleProvider {
    /// Create a provider over in-memory images.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ImageError::EmptyImageList`] | `images` is empty |
    /// | [`ImageError::InvalidFraction`] | a fraction is not positive and finite |
    pub fn new(images: Vec<Image>, parameters: ImageParameters) -> Result<Self, ImageError> {
        if images.is_empty() {
            return Err(ImageError::EmptyImageList);
        }
        parameters.validate()?;
        Ok(Self { images, parameters })
    }

    /// Load every image named in a headerless `data_path,label_path` CSV list.
    ///
    /// Relative paths are resolved against the directory of the list file.
    ///
    /// # Errors
    ///
    /// Any error of [`read_image_list`], [`Image::from_csv`], or [`new`](Self::new).
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn from_image_list(path: &Path, parameters: ImageParameters) -> Result<Self, ImageError> {
        let images = read_image_list(path)?
            .into_iter()
            .map(|(data, labels)| Image::from_csv(data, labels))
            .collect::<Result<Vec<_>, _>>()?;
        info!(n_images = images.len(), "images loaded");
        Self::new(images, parameters)
    }

    /// Return the images.
    #[must_use]
    pub fn images(&self) -> &[Image] {
        &self.images
    }

    /// Return the sampling parameters.
    #[must_use]
    pub fn parameters(&self) -> &ImageParameters {
        &self.parameters
    }

    /// One more than the largest foreground label across all images.
    #[must_use]
    pub fn num_of_classes(&self) -> usize {
        self.images
            .iter()
            .flat_map(|image| image.labels().iter().copied())
            .filter(|&label| label >= 0 && self.parameters.is_foreground(label))
            .max()
            .map_or(0, |max| max as usize + 1)
    }

    /// Draw `round(bagging_fraction * n_images)` image indices with replacement, sorted.
    pub fn sample_bag<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        let n_images = self.images.len();
        let bag_size = (self.parameters.bagging_fraction * n_images as f64).round() as usize;
        let mut bag: Vec<usize> = (0..bag_size).map(|_| rng.gen_range(0..n_images)).collect();
        bag.sort_unstable();
        debug!(bag_size, "image bag drawn");
        bag
    }

    /// Extract foreground pixel samples from each bagged image.
    ///
    /// With a fraction below 1, `round(fraction * width * height)` pixels are
    /// drawn per image without replacement (capped at the foreground count);
    /// otherwise every foreground pixel is taken. An image that appears twice
    /// in the bag is sampled twice. Bag entries that do not index an image are
    /// skipped.
    pub fn load_samples<R: Rng + ?Sized>(&self, bag: &[usize], rng: &mut R) -> Vec<ImageSample<'_>> {
        let mut samples = Vec::new();
        for image in bag.iter().filter_map(|&i| self.images.get(i)) {
            let mut foreground = self.foreground_samples(image);
            let fraction = self.parameters.samples_per_image_fraction;
            if fraction < 1.0 {
                let wanted = (fraction * (image.width() * image.height()) as f64).round() as usize;
                let n = wanted.min(foreground.len());
                // Partial Fisher-Yates: the last n slots end up a uniform draw.
                let len = foreground.len();
                for i in 0..n {
                    let j = rng.gen_range(0..len - i);
                    foreground.swap(j, len - 1 - i);
                }
                samples.extend_from_slice(&foreground[len - n..]);
            } else {
                samples.append(&mut foreground);
            }
        }
        debug!(n_samples = samples.len(), bag_size = bag.len(), "samples loaded");
        samples
    }

    /// Draw a bag and load its samples.
    pub fn load_sample_bag<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<ImageSample<'_>> {
        let bag = self.sample_bag(rng);
        self.load_samples(&bag, rng)
    }

    /// Every foreground pixel of every image, in image then row-major order.
    #[must_use]
    pub fn all_samples(&self) -> Vec<ImageSample<'_>> {
        self.images
            .iter()
            .flat_map(|image| self.foreground_samples(image))
            .collect()
    }

    fn foreground_samples<'a>(&self, image: &'a Image) -> Vec<ImageSample<'a>> {
        (0..image.height())
            .flat_map(|y| (0..image.width()).map(move |x| (x, y)))
            .filter_map(|(x, y)| ImageSample::new(image, x, y))
            .filter(|s| self.parameters.is_foreground(s.raw_label()))
            .collect()
    }
}

/// Read a headerless CSV list of `data_path,label_path` rows.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ImageError::FileNotFound`] | the list is unreadable |
/// | [`ImageError::CsvParse`] | malformed CSV record |
/// | [`ImageError::MalformedImageList`] | a row does not hold exactly two fields |
/// | [`ImageError::EmptyImageList`] | the list has no rows |
pub fn read_image_list(path: &Path) -> Result<Vec<(PathBuf, PathBuf)>, ImageError> {
    let file = std::fs::File::open(path).map_err(|e| ImageError::FileNotFound {
        path: path.to_path_buf(),
        source: e,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut entries = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| ImageError::CsvParse {
            path: path.to_path_buf(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        })?;
        let (Some(data), Some(labels), 2) = (record.get(0), record.get(1), record.len()) else {
            return Err(ImageError::MalformedImageList {
                path: path.to_path_buf(),
                row_index,
            });
        };
        entries.push((base.join(data), base.join(labels)));
    }

    if entries.is_empty() {
        return Err(ImageError::EmptyImageList);
    }
    Ok(entries)
}
