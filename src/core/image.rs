//! Decoded raster images with shape, format and statistics
//!
//! **Why**: The texture tracker, the edit runner and the colormap all need the
//! same immutable view of a decoded frame: a row-major, channel-interleaved
//! buffer plus its width/height/channel layout and precomputed min/max.
//!
//! **Used by**: Decoder (construction), ImageCache (sharing), Sequence
//! (materialization), TextureRegion (sub-rect upload), edit backends (inputs)
//!
//! # Pixel Storage
//!
//! - `PixelData::U8`: LDR formats (PNG, JPEG, 8-bit TIFF), 1 byte per sample
//! - `PixelData::F32`: HDR / 16-bit / edited images, 4 bytes per sample
//!
//! # Ownership
//!
//! An [`ImageHandle`] tags whether the image is exclusively owned by a
//! sequence or shared with the decode cache. Both variants hold an `Arc`, so
//! dropping a handle can never free an image the cache still serves.

use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::core::rect::Rect;

/// Per-sample element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    U8,
    F32,
}

impl ElementType {
    /// Size of one sample in bytes
    pub fn size(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::F32 => 4,
        }
    }
}

/// Channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    R,
    Rg,
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::R => 1,
            PixelFormat::Rg => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }

    pub fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(PixelFormat::R),
            2 => Some(PixelFormat::Rg),
            3 => Some(PixelFormat::Rgb),
            4 => Some(PixelFormat::Rgba),
            _ => None,
        }
    }
}

/// Pixel buffer, row-major and channel-interleaved
#[derive(Debug, Clone)]
pub enum PixelData {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

impl PixelData {
    pub fn len(&self) -> usize {
        match self {
            PixelData::U8(v) => v.len(),
            PixelData::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            PixelData::U8(_) => ElementType::U8,
            PixelData::F32(_) => ElementType::F32,
        }
    }
}

/// Image loading and construction errors
#[derive(Debug)]
pub enum ImageError {
    NotFound(String),
    Io(String),
    Decode(String),
    UnsupportedLayout(String),
    BufferSize { expected: usize, actual: usize },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::NotFound(p) => write!(f, "File not found: {}", p),
            ImageError::Io(e) => write!(f, "IO error: {}", e),
            ImageError::Decode(e) => write!(f, "Decode error: {}", e),
            ImageError::UnsupportedLayout(e) => write!(f, "Unsupported layout: {}", e),
            ImageError::BufferSize { expected, actual } => write!(
                f,
                "Buffer size mismatch: expected {} samples, got {}",
                expected, actual
            ),
        }
    }
}

impl std::error::Error for ImageError {}

/// Immutable decoded raster
#[derive(Debug)]
pub struct Image {
    data: PixelData,
    width: usize,
    height: usize,
    format: PixelFormat,
    min: f32,
    max: f32,
}

impl Image {
    /// Wrap a pixel buffer, validating its length and computing min/max.
    pub fn new(data: PixelData, width: usize, height: usize, format: PixelFormat) -> Result<Self, ImageError> {
        let expected = width * height * format.channels();
        if data.len() != expected {
            return Err(ImageError::BufferSize {
                expected,
                actual: data.len(),
            });
        }

        let (min, max) = match &data {
            PixelData::U8(v) => min_max(v.iter().map(|&s| s as f32)),
            PixelData::F32(v) => min_max(v.iter().copied()),
        };

        Ok(Self {
            data,
            width,
            height,
            format,
            min,
            max,
        })
    }

    /// Build a float image from an edit backend's output.
    pub fn from_f32(pixels: Vec<f32>, width: usize, height: usize, channels: usize) -> Result<Self, ImageError> {
        let format = PixelFormat::from_channels(channels)
            .ok_or_else(|| ImageError::UnsupportedLayout(format!("{} channels", channels)))?;
        Self::new(PixelData::F32(pixels), width, height, format)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn data(&self) -> &PixelData {
        &self.data
    }

    /// Image extent as a rect `[0, w) x [0, h)`
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Raw sample bytes in native endianness (GPU upload source)
    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            PixelData::U8(v) => v.as_slice(),
            PixelData::F32(v) => bytemuck::cast_slice(v.as_slice()),
        }
    }

    /// Samples as f32. U8 values keep their 0..255 range.
    pub fn to_f32(&self) -> Cow<'_, [f32]> {
        match &self.data {
            PixelData::U8(v) => Cow::Owned(v.iter().map(|&s| s as f32).collect()),
            PixelData::F32(v) => Cow::Borrowed(v.as_slice()),
        }
    }

    /// Memory size in bytes
    pub fn mem(&self) -> usize {
        self.data.len() * self.element_type().size()
    }

    /// Channel values of one pixel, `None` outside the image.
    pub fn sample(&self, x: i32, y: i32) -> Option<Vec<f32>> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        let c = self.channels();
        let start = (y as usize * self.width + x as usize) * c;
        Some(match &self.data {
            PixelData::U8(v) => v[start..start + c].iter().map(|&s| s as f32).collect(),
            PixelData::F32(v) => v[start..start + c].to_vec(),
        })
    }

    /// Min/max of all samples inside `rect` (clipped to the image).
    pub fn region_min_max(&self, rect: Rect) -> Option<(f32, f32)> {
        let r = rect.clip(self.bounds());
        if r.is_empty() {
            return None;
        }
        let c = self.channels();
        let row_range = |y: i32| {
            let start = (y as usize * self.width + r.min.x as usize) * c;
            start..start + r.width() as usize * c
        };
        let (min, max) = match &self.data {
            PixelData::U8(v) => min_max((r.min.y..r.max.y).flat_map(|y| v[row_range(y)].iter().map(|&s| s as f32))),
            PixelData::F32(v) => min_max((r.min.y..r.max.y).flat_map(|y| v[row_range(y)].iter().copied())),
        };
        Some((min, max))
    }
}

/// Min/max over finite samples; `(0, 0)` when there are none.
fn min_max(samples: impl Iterator<Item = f32>) -> (f32, f32) {
    let (min, max) = samples
        .filter(|s| s.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
    if min > max { (0.0, 0.0) } else { (min, max) }
}

/// Image reference tagged with its ownership
///
/// `Owned`: produced for one sequence (fresh decode without cache, edit
/// output). `Cached`: shared with the decode cache, evicted only by the cache.
#[derive(Debug, Clone)]
pub enum ImageHandle {
    Owned(Arc<Image>),
    Cached(Arc<Image>),
}

impl ImageHandle {
    pub fn owned(image: Image) -> Self {
        ImageHandle::Owned(Arc::new(image))
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, ImageHandle::Cached(_))
    }

    /// True when both handles point at the same decoded image
    pub fn ptr_eq(&self, other: &ImageHandle) -> bool {
        Arc::ptr_eq(self.arc(), other.arc())
    }

    fn arc(&self) -> &Arc<Image> {
        match self {
            ImageHandle::Owned(a) | ImageHandle::Cached(a) => a,
        }
    }
}

impl Deref for ImageHandle {
    type Target = Image;

    fn deref(&self) -> &Image {
        self.arc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: Buffer length validation
    /// Validates: Mismatched sample count is rejected
    #[test]
    fn test_buffer_size_mismatch() {
        let res = Image::new(PixelData::U8(vec![0; 5]), 2, 2, PixelFormat::R);
        assert!(matches!(res, Err(ImageError::BufferSize { expected: 4, actual: 5 })));
    }

    /// Test: Statistics ignore non-finite samples
    #[test]
    fn test_min_max_statistics() {
        let img = Image::from_f32(vec![1.0, -2.0, f32::NAN, 7.5], 2, 2, 1).unwrap();
        assert_eq!(img.min(), -2.0);
        assert_eq!(img.max(), 7.5);

        let img = Image::new(PixelData::U8(vec![3, 200, 17]), 1, 1, PixelFormat::Rgb).unwrap();
        assert_eq!((img.min(), img.max()), (3.0, 200.0));
    }

    #[test]
    fn test_sample_and_bytes() {
        let img = Image::new(PixelData::U8((0..12).collect()), 2, 2, PixelFormat::Rgb).unwrap();
        assert_eq!(img.sample(1, 1), Some(vec![9.0, 10.0, 11.0]));
        assert_eq!(img.sample(2, 0), None);
        assert_eq!(img.sample(-1, 0), None);
        assert_eq!(img.bytes().len(), 12);

        let img = Image::from_f32(vec![0.5; 8], 2, 2, 2).unwrap();
        assert_eq!(img.bytes().len(), 32);
        assert_eq!(img.element_type(), ElementType::F32);
        assert_eq!(img.format(), PixelFormat::Rg);
    }

    /// Test: Region statistics are clipped to the image
    #[test]
    fn test_region_min_max() {
        // 3x2 single channel: row0 = 0 1 2, row1 = 3 4 5
        let img = Image::from_f32((0..6).map(|v| v as f32).collect(), 3, 2, 1).unwrap();
        assert_eq!(img.region_min_max(Rect::new(1, 0, 3, 2)), Some((1.0, 5.0)));
        assert_eq!(img.region_min_max(Rect::new(-5, 1, 1, 9)), Some((3.0, 3.0)));
        assert_eq!(img.region_min_max(Rect::new(10, 10, 12, 12)), None);
    }

    /// Test: Ownership tag survives cloning
    #[test]
    fn test_handle_ownership() {
        let img = Arc::new(Image::from_f32(vec![0.0], 1, 1, 1).unwrap());
        let cached = ImageHandle::Cached(Arc::clone(&img));
        let other = cached.clone();
        assert!(other.is_cached());
        assert!(other.ptr_eq(&cached));

        let owned = ImageHandle::owned(Image::from_f32(vec![0.0], 1, 1, 1).unwrap());
        assert!(!owned.is_cached());
        assert!(!owned.ptr_eq(&cached));
        assert_eq!(owned.width(), 1);
    }

    #[test]
    fn test_unsupported_channel_count() {
        assert!(matches!(
            Image::from_f32(vec![0.0; 5], 1, 1, 5),
            Err(ImageError::UnsupportedLayout(_))
        ));
    }
}
