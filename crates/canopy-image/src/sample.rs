use canopy_forest::LabeledSample;

use crate::image::{Image, Label, Pixel};

/// One pixel of interest in a borrowed image.
///
/// Samples are small `Copy` handles, so the trainer can reorder them freely
/// without touching pixel data.
#[derive(Debug, Clone, Copy)]
pub struct ImageSample<'a> {
    image: &'a Image,
    x: usize,
    y: usize,
}

impl<'a> ImageSample<'a> {
    /// Create a sample at `(x, y)`, or `None` if the position is outside `image`.
    #[must_use]
    pub fn new(image: &'a Image, x: usize, y: usize) -> Option<Self> {
        (x < image.width() && y < image.height()).then_some(Self { image, x, y })
    }

    /// Return the image this sample points into.
    #[must_use]
    pub fn image(&self) -> &'a Image {
        self.image
    }

    /// Return the column.
    #[must_use]
    pub fn x(&self) -> usize {
        self.x
    }

    /// Return the row.
    #[must_use]
    pub fn y(&self) -> usize {
        self.y
    }

    /// Raw label of the pixel.
    #[must_use]
    pub fn raw_label(&self) -> Label {
        self.image.label(self.x, self.y).unwrap_or(Label::MAX)
    }

    /// Pixel at the relative offset `(dx, dy)`; 0 outside the image.
    #[inline]
    #[must_use]
    pub fn pixel_at(&self, dx: i16, dy: i16) -> Pixel {
        let x = self.x.checked_add_signed(isize::from(dx));
        let y = self.y.checked_add_signed(isize::from(dy));
        match (x, y) {
            (Some(x), Some(y)) => self.image.pixel(x, y).unwrap_or(0),
            _ => 0,
        }
    }
}

impl PartialEq for ImageSample<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.image, other.image) && self.x == other.x && self.y == other.y
    }
}

impl Eq for ImageSample<'_> {}

impl LabeledSample for ImageSample<'_> {
    /// Negative labels map to `usize::MAX`, which no histogram has a bin for.
    fn label(&self) -> usize {
        usize::try_from(self.raw_label()).unwrap_or(usize::MAX)
    }
}
