//! Image decoding and the load boundary used by sequences
//!
//! **Why**: Sequences must treat a missing or corrupt source as "currently
//! unloadable", never as a fatal error. The decoder reports what went wrong,
//! the loader logs it and hands back `None`.
//!
//! **Used by**: Session (one shared loader), Sequence (frame materialization)
//!
//! # Layout Mapping
//!
//! - 8-bit L / LA / RGB / RGBA → `U8` R / RG / RGB / RGBA
//! - 16-bit L / LA / RGB / RGBA → `F32`, integer values preserved (0..65535)
//! - 32-bit float RGB / RGBA (EXR, HDR) → `F32` RGB / RGBA
//! - anything else → `U8` RGBA
//!
//! The identifier `"-"` reads stdin once; later loads reuse those bytes.

use std::io::Read;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use image::DynamicImage;
use log::{debug, warn};

use crate::core::cache::ImageCache;
use crate::core::image::{Image, ImageError, ImageHandle, PixelData, PixelFormat};

/// Identifier for "read the image from standard input"
pub const STDIN_ID: &str = "-";

/// Decode backend
pub trait Decoder: Send + Sync {
    fn decode(&self, id: &str) -> Result<Image, ImageError>;
}

/// Decoder backed by the `image` crate
#[derive(Debug, Default)]
pub struct ImageDecoder {
    stdin: OnceLock<Vec<u8>>,
}

impl ImageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn stdin_bytes(&self) -> Result<&[u8], ImageError> {
        if let Some(bytes) = self.stdin.get() {
            return Ok(bytes.as_slice());
        }
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| ImageError::Io(e.to_string()))?;
        debug!("Read {} bytes from stdin", buf.len());
        Ok(self.stdin.get_or_init(|| buf).as_slice())
    }
}

impl Decoder for ImageDecoder {
    fn decode(&self, id: &str) -> Result<Image, ImageError> {
        let img = if id == STDIN_ID {
            image::load_from_memory(self.stdin_bytes()?).map_err(|e| ImageError::Decode(e.to_string()))?
        } else {
            let path = Path::new(id);
            if !path.exists() {
                return Err(ImageError::NotFound(id.to_string()));
            }
            image::open(path).map_err(|e| ImageError::Decode(e.to_string()))?
        };
        from_dynamic(img)
    }
}

/// Convert a decoded `DynamicImage` keeping its channel count where possible.
pub fn from_dynamic(img: DynamicImage) -> Result<Image, ImageError> {
    let w = img.width() as usize;
    let h = img.height() as usize;

    let widen = |v: Vec<u16>| PixelData::F32(v.into_iter().map(|s| s as f32).collect());

    let (data, format) = match img {
        DynamicImage::ImageLuma8(b) => (PixelData::U8(b.into_raw()), PixelFormat::R),
        DynamicImage::ImageLumaA8(b) => (PixelData::U8(b.into_raw()), PixelFormat::Rg),
        DynamicImage::ImageRgb8(b) => (PixelData::U8(b.into_raw()), PixelFormat::Rgb),
        DynamicImage::ImageRgba8(b) => (PixelData::U8(b.into_raw()), PixelFormat::Rgba),
        DynamicImage::ImageLuma16(b) => (widen(b.into_raw()), PixelFormat::R),
        DynamicImage::ImageLumaA16(b) => (widen(b.into_raw()), PixelFormat::Rg),
        DynamicImage::ImageRgb16(b) => (widen(b.into_raw()), PixelFormat::Rgb),
        DynamicImage::ImageRgba16(b) => (widen(b.into_raw()), PixelFormat::Rgba),
        DynamicImage::ImageRgb32F(b) => (PixelData::F32(b.into_raw()), PixelFormat::Rgb),
        DynamicImage::ImageRgba32F(b) => (PixelData::F32(b.into_raw()), PixelFormat::Rgba),
        other => (PixelData::U8(other.to_rgba8().into_raw()), PixelFormat::Rgba),
    };

    Image::new(data, w, h, format)
}

/// Decoder plus optional shared cache
///
/// With a cache every loaded image is `Cached`; without one each load is a
/// fresh `Owned` decode.
#[derive(Clone)]
pub struct ImageLoader {
    decoder: Arc<dyn Decoder>,
    cache: Option<Arc<ImageCache>>,
}

impl ImageLoader {
    pub fn new(decoder: Arc<dyn Decoder>, cache: Option<Arc<ImageCache>>) -> Self {
        Self { decoder, cache }
    }

    pub fn cache(&self) -> Option<&Arc<ImageCache>> {
        self.cache.as_ref()
    }

    /// Load `id`, logging and returning `None` when it cannot be decoded.
    pub fn load(&self, id: &str) -> Option<ImageHandle> {
        let result = match &self.cache {
            Some(cache) => cache
                .get_or_load(id, || self.decoder.decode(id))
                .map(ImageHandle::Cached),
            None => self.decoder.decode(id).map(ImageHandle::owned),
        };

        match result {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Cannot load {}: {}", id, e);
                None
            }
        }
    }
}
