//! Image decoding.
//!
//! Decoding is a pure function of the input bytes. Bytes that do not form
//! a supported image yield `None`; that is a normal outcome, not an error.

use std::fmt;
use std::sync::Arc;

use image::{ColorType, DynamicImage};

/// A decoded in-memory image.
///
/// Cloning is cheap; the pixel buffer is shared.
#[derive(Clone)]
pub struct ImageAsset {
    image: Arc<DynamicImage>,
}

impl ImageAsset {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel layout of the decoded buffer.
    pub fn color_type(&self) -> ColorType {
        self.image.color()
    }

    /// Raw pixel bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_bytes()
    }

    /// Borrow the underlying image.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

impl PartialEq for ImageAsset {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
            || (self.width() == other.width()
                && self.height() == other.height()
                && self.color_type() == other.color_type()
                && self.as_bytes() == other.as_bytes())
    }
}

impl Eq for ImageAsset {}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("color_type", &self.color_type())
            .finish()
    }
}

/// Decode image bytes, sniffing the format from the content.
pub fn decode(bytes: &[u8]) -> Option<ImageAsset> {
    image::load_from_memory(bytes).ok().map(ImageAsset::new)
}
