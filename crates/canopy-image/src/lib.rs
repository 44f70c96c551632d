//! Per-pixel image labelling on top of `canopy-forest`.
//!
//! Images are read from headerless CSV matrices. [`ImageSampleProvider`]
//! bags images and subsamples foreground pixels; [`ImageWeakLearner`] splits
//! them on thresholded differences of two offset pixels.

mod error;
mod image;
mod learner;
mod provider;
mod sample;

pub use error::ImageError;
pub use image::{Image, Label, Matrix, Pixel, read_matrix};
pub use learner::{
    ImageFeature, ImageSplitPoint, ImageSplitPointCandidates, ImageWeakLearner,
    ImageWeakLearnerParameters,
};
pub use provider::{ImageParameters, ImageSampleProvider, read_image_list};
pub use sample::ImageSample;
