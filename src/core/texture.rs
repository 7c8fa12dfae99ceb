//! Incremental texture streaming for the current frame
//!
//! **Why**: Large float frames are expensive to push to the GPU. Only the
//! part of the image that has ever been visible for the current frame is
//! uploaded, and panning inside that part costs nothing.
//!
//! **Used by**: Session (per-sequence region + target), app viewer
//!
//! # Region Policy
//!
//! The loaded rect only grows within a frame. When a request is not covered
//! the rect becomes `union(loaded, request)` expanded by `margin` and clipped
//! to the image; the whole loaded rect is then uploaded with the image row
//! length as pitch. A frame change or [`TextureRegion::invalidate`] resets
//! it to empty and forces the next upload.
//!
//! GPU errors leave the bookkeeping as is and keep `force_reupload` set, so
//! the next frame retries.

use std::fmt;

use log::{debug, error, trace};

use crate::core::image::{ElementType, Image, PixelFormat};
use crate::core::rect::Rect;

/// Over-fetch margin in pixels around a newly visible area
pub const DEFAULT_MARGIN: i32 = 128;

/// Storage description of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: usize,
    pub height: usize,
    pub element: ElementType,
    pub format: PixelFormat,
}

impl TextureDesc {
    pub fn of(image: &Image) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            element: image.element_type(),
            format: image.format(),
        }
    }

    /// Bytes per pixel
    pub fn pixel_size(&self) -> usize {
        self.element.size() * self.format.channels()
    }
}

/// GPU texture errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    /// Texture object could not be allocated
    Create(String),
    /// GL reported an error for a call
    Gl { call: String, code: u32, name: &'static str },
    /// Upload before any `create`
    NotCreated,
    /// Source slice shorter than the region needs
    ShortData { expected: usize, actual: usize },
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::Create(e) => write!(f, "Texture creation failed: {}", e),
            TextureError::Gl { call, code, name } => write!(f, "{} (0x{:04x}) in {}", name, code, call),
            TextureError::NotCreated => write!(f, "Texture not created"),
            TextureError::ShortData { expected, actual } => {
                write!(f, "Upload data too short: need {} bytes, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for TextureError {}

/// GPU texture resource owned by one sequence
pub trait TextureTarget {
    /// (Re)allocate storage for `desc`. Contents become undefined.
    fn create(&mut self, desc: &TextureDesc) -> Result<(), TextureError>;

    /// Upload `region` from `data`, whose rows are `row_pitch` pixels apart.
    /// `data` starts at the region's first pixel.
    fn upload_sub_region(&mut self, region: Rect, row_pitch: usize, data: &[u8]) -> Result<(), TextureError>;

    /// Native handle for drawing (GL texture name)
    fn handle(&self) -> Option<u32>;
}

/// Creates texture targets for new sequences
pub trait TextureFactory {
    fn create_target(&self) -> Box<dyn TextureTarget>;
}

/// Tracks which part of the current image is resident in a texture
#[derive(Debug, Clone)]
pub struct TextureRegion {
    loaded: Rect,
    desc: Option<TextureDesc>,
    force_reupload: bool,
    /// Frame the loaded rect belongs to
    frame: Option<usize>,
    /// Frame of the last successful upload
    loaded_frame: Option<usize>,
    margin: i32,
}

impl Default for TextureRegion {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN)
    }
}

impl TextureRegion {
    pub fn new(margin: i32) -> Self {
        Self {
            loaded: Rect::EMPTY,
            desc: None,
            force_reupload: true,
            frame: None,
            loaded_frame: None,
            margin: margin.max(0),
        }
    }

    pub fn loaded(&self) -> Rect {
        self.loaded
    }

    pub fn loaded_frame(&self) -> Option<usize> {
        self.loaded_frame
    }

    pub fn force_reupload(&self) -> bool {
        self.force_reupload
    }

    pub fn margin(&self) -> i32 {
        self.margin
    }

    pub fn set_margin(&mut self, margin: i32) {
        self.margin = margin.max(0);
    }

    /// Forget everything uploaded; the next request uploads again.
    pub fn invalidate(&mut self) {
        self.loaded = Rect::EMPTY;
        self.force_reupload = true;
        self.frame = None;
        self.loaded_frame = None;
    }

    /// Make `requested` (image pixels) of `image` resident for `frame`.
    ///
    /// Returns true when an upload happened.
    pub fn ensure_visible(
        &mut self,
        frame: usize,
        image: &Image,
        requested: Rect,
        target: &mut dyn TextureTarget,
    ) -> bool {
        if self.frame.is_some_and(|f| f != frame) {
            trace!("Frame changed {:?} -> {}, resetting texture region", self.frame, frame);
            self.invalidate();
        }
        self.frame = Some(frame);

        let bounds = image.bounds();
        let requested = requested.clip(bounds);
        self.loaded = self.loaded.clip(bounds);

        let desc = TextureDesc::of(image);
        let covered = self.loaded.contains(requested);
        if covered && !self.force_reupload && self.desc == Some(desc) {
            return false;
        }
        if !covered {
            self.loaded = self.loaded.union(requested).expand(self.margin).clip(bounds);
            self.force_reupload = true;
        }

        if self.desc != Some(desc) {
            if let Err(e) = target.create(&desc) {
                error!("Texture create {}x{} failed: {}", desc.width, desc.height, e);
                self.desc = None;
                return false;
            }
            debug!(
                "Created texture {}x{} {:?} {:?}",
                desc.width, desc.height, desc.element, desc.format
            );
            self.desc = Some(desc);
        }

        let region = self.loaded;
        if region.is_empty() {
            return false;
        }

        let pixel = desc.pixel_size();
        let w = image.width();
        let start = (region.min.y as usize * w + region.min.x as usize) * pixel;
        let end = ((region.max.y as usize - 1) * w + region.max.x as usize) * pixel;
        let bytes = image.bytes();

        if let Err(e) = target.upload_sub_region(region, w, &bytes[start..end]) {
            error!("Texture upload of {:?} failed: {}", region, e);
            return false;
        }

        debug!(
            "Uploaded frame {} region ({},{})-({},{})",
            frame, region.min.x, region.min.y, region.max.x, region.max.y
        );
        self.force_reupload = false;
        self.loaded_frame = Some(frame);
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::image::PixelData;

    /// Recording texture target
    #[derive(Debug, Default)]
    pub(crate) struct MockTarget {
        pub creates: Vec<TextureDesc>,
        pub uploads: Vec<(Rect, usize, usize)>,
        pub fail_uploads: bool,
    }

    impl TextureTarget for MockTarget {
        fn create(&mut self, desc: &TextureDesc) -> Result<(), TextureError> {
            self.creates.push(*desc);
            Ok(())
        }

        fn upload_sub_region(&mut self, region: Rect, row_pitch: usize, data: &[u8]) -> Result<(), TextureError> {
            if self.fail_uploads {
                return Err(TextureError::Gl {
                    call: "tex_sub_image_2d".into(),
                    code: 0x0501,
                    name: "GL_INVALID_VALUE",
                });
            }
            self.uploads.push((region, row_pitch, data.len()));
            Ok(())
        }

        fn handle(&self) -> Option<u32> {
            (!self.creates.is_empty()).then_some(1)
        }
    }

    fn image(w: usize, h: usize) -> Image {
        Image::new(PixelData::U8(vec![0; w * h]), w, h, PixelFormat::R).unwrap()
    }

    /// Test: Idempotent visibility
    /// Validates: Same request twice uploads once
    #[test]
    fn test_idempotent_visibility() {
        let img = image(1000, 1000);
        let mut region = TextureRegion::new(128);
        let mut target = MockTarget::default();
        let r = Rect::new(100, 100, 200, 200);

        assert!(region.ensure_visible(1, &img, r, &mut target));
        assert!(!region.ensure_visible(1, &img, r, &mut target));
        assert_eq!(target.uploads.len(), 1);
        assert_eq!(target.creates.len(), 1);
        assert_eq!(region.loaded_frame(), Some(1));
    }

    /// Test: Containment short-circuit
    #[test]
    fn test_contained_request_no_upload() {
        let img = image(1000, 1000);
        let mut region = TextureRegion::new(128);
        let mut target = MockTarget::default();

        region.ensure_visible(1, &img, Rect::new(100, 100, 500, 500), &mut target);
        assert!(!region.ensure_visible(1, &img, Rect::new(0, 0, 600, 600), &mut target));
        assert!(!region.ensure_visible(1, &img, Rect::new(200, 300, 210, 310), &mut target));
        assert_eq!(target.uploads.len(), 1);
    }

    /// Test: Margin growth clipped at the image edge
    #[test]
    fn test_margin_growth_clips() {
        let img = image(300, 200);
        let mut region = TextureRegion::new(128);
        let mut target = MockTarget::default();

        region.ensure_visible(1, &img, Rect::new(100, 50, 150, 80), &mut target);
        assert_eq!(region.loaded(), Rect::new(0, 0, 278, 200));

        // Growing unions with the previous rect before expanding
        region.ensure_visible(1, &img, Rect::new(280, 10, 290, 20), &mut target);
        assert_eq!(region.loaded(), Rect::new(0, 0, 300, 200));
        assert_eq!(target.uploads.len(), 2);
    }

    /// Test: Maximum margin
    /// Validates: Loaded rect clips to the whole image, one upload
    #[test]
    fn test_max_margin_covers_image() {
        let img = image(100, 100);
        let mut region = TextureRegion::new(i32::MAX);
        let mut target = MockTarget::default();

        assert!(region.ensure_visible(1, &img, Rect::new(10, 10, 20, 20), &mut target));
        assert_eq!(region.loaded(), Rect::from_size(100, 100));
        assert!(!region.ensure_visible(1, &img, Rect::new(90, 90, 100, 100), &mut target));
        assert_eq!(target.uploads.len(), 1);
    }

    /// Test: Frame change resets coverage
    #[test]
    fn test_frame_change_invalidates() {
        let img = image(100, 100);
        let mut region = TextureRegion::new(0);
        let mut target = MockTarget::default();
        let r = Rect::new(0, 0, 100, 100);

        region.ensure_visible(1, &img, r, &mut target);
        assert!(region.ensure_visible(2, &img, Rect::new(10, 10, 20, 20), &mut target));
        assert_eq!(region.loaded(), Rect::new(10, 10, 20, 20));
        assert_eq!(region.loaded_frame(), Some(2));
        assert_eq!(target.uploads.len(), 2);
        // Same desc, no re-create
        assert_eq!(target.creates.len(), 1);
    }

    /// Test: Explicit invalidation forces upload of a covered request
    #[test]
    fn test_invalidate_forces_upload() {
        let img = image(64, 64);
        let mut region = TextureRegion::new(0);
        let mut target = MockTarget::default();
        let r = Rect::new(0, 0, 64, 64);

        region.ensure_visible(3, &img, r, &mut target);
        region.invalidate();
        assert!(region.force_reupload());
        assert!(region.ensure_visible(3, &img, r, &mut target));
        assert_eq!(target.uploads.len(), 2);
    }

    /// Test: Out-of-bounds request
    /// Validates: Clips to empty and never uploads
    #[test]
    fn test_out_of_bounds_no_upload() {
        let img = image(100, 100);
        let mut region = TextureRegion::new(128);
        let mut target = MockTarget::default();

        assert!(!region.ensure_visible(1, &img, Rect::new(-500, -500, -100, -100), &mut target));
        assert!(!region.ensure_visible(1, &img, Rect::new(200, 0, 300, 50), &mut target));
        assert!(target.uploads.is_empty());
        assert!(region.loaded().is_empty());
    }

    /// Test: Row pitch and data window
    /// Validates: Upload honors the full image row length
    #[test]
    fn test_row_pitch_and_slice() {
        let img = Image::from_f32(vec![0.0; 50 * 40 * 3], 50, 40, 3).unwrap();
        let mut region = TextureRegion::new(0);
        let mut target = MockTarget::default();

        region.ensure_visible(1, &img, Rect::new(10, 5, 20, 8), &mut target);
        let (rect, pitch, len) = target.uploads[0];
        assert_eq!(rect, Rect::new(10, 5, 20, 8));
        assert_eq!(pitch, 50);
        // two full rows plus the last partial row, 12 bytes per pixel
        assert_eq!(len, (2 * 50 + 10) * 12);
    }

    /// Test: Desc change recreates the texture
    #[test]
    fn test_recreate_on_desc_change() {
        let mut region = TextureRegion::new(0);
        let mut target = MockTarget::default();
        let r = Rect::new(0, 0, 8, 8);

        region.ensure_visible(1, &image(8, 8), r, &mut target);
        region.ensure_visible(2, &image(8, 8), r, &mut target);
        region.ensure_visible(3, &image(16, 8), r, &mut target);
        assert_eq!(target.creates.len(), 2);
        assert_eq!(target.creates[1].width, 16);
    }

    /// Test: Failed upload retries next time
    #[test]
    fn test_upload_error_keeps_force() {
        let img = image(32, 32);
        let mut region = TextureRegion::new(0);
        let mut target = MockTarget {
            fail_uploads: true,
            ..Default::default()
        };
        let r = Rect::new(0, 0, 16, 16);

        assert!(!region.ensure_visible(1, &img, r, &mut target));
        assert!(region.force_reupload());
        assert_eq!(region.loaded(), r);

        target.fail_uploads = false;
        assert!(region.ensure_visible(1, &img, r, &mut target));
        assert!(!region.force_reupload());
    }
}
