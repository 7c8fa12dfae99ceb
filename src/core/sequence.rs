//! Sequence: one glob-resolved collection plus its display state
//!
//! **Why**: The image shown for a sequence depends on the player frame, the
//! optional edit program and what the texture already holds. Keeping those in
//! one state machine makes "what must be reloaded" a single decision.
//!
//! **Used by**: Session (owns all sequences; resolves player/edit lookups)
//!
//! # Frame State
//!
//! ```text
//! NoImage ──load──> RawLoaded ──edit ok──> Edited
//!    ^                  │                     │
//!    └── forget() ──────┴─────────────────────┘
//!        (frame change, edit change, glob reload, file changed)
//! ```
//!
//! A failed edit drops back to `RawLoaded` and is not retried until the
//! next `forget()`, or until one of its inputs moves to another frame or is
//! forgotten itself (every `forget()` bumps the sequence generation).

use log::{debug, trace};

use crate::core::collection::ImageCollection;
use crate::core::decode::ImageLoader;
use crate::core::image::ImageHandle;
use crate::core::texture::{TextureRegion, TextureTarget};
use crate::edit::EditKind;

/// Default size of the editable glob text
pub const DEFAULT_GLOB_CAPACITY: usize = 4096;

/// Edit program attached to a sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditProgram {
    pub text: String,
    pub kind: EditKind,
}

impl EditProgram {
    pub fn new(text: impl Into<String>, kind: EditKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Materialized image of the current frame
#[derive(Debug, Clone, Default)]
pub enum FrameState {
    #[default]
    NoImage,
    RawLoaded(ImageHandle),
    Edited { raw: ImageHandle, edited: ImageHandle },
}

impl FrameState {
    pub fn raw(&self) -> Option<&ImageHandle> {
        match self {
            FrameState::NoImage => None,
            FrameState::RawLoaded(raw) | FrameState::Edited { raw, .. } => Some(raw),
        }
    }

    /// Edited image if any, else the raw one
    pub fn current(&self) -> Option<&ImageHandle> {
        match self {
            FrameState::NoImage => None,
            FrameState::RawLoaded(raw) => Some(raw),
            FrameState::Edited { edited, .. } => Some(edited),
        }
    }

    pub fn is_edited(&self) -> bool {
        matches!(self, FrameState::Edited { .. })
    }
}

pub struct Sequence {
    glob: String,
    glob_capacity: usize,
    collection: ImageCollection,
    pub player: usize,
    pub view: usize,
    pub colormap: usize,
    edit: Option<EditProgram>,
    state: FrameState,
    /// Frame the state was materialized for
    state_frame: Option<usize>,
    /// Bumped by every `forget`, so dependents notice reloaded inputs
    generation: u64,
    /// (sequence, frame, generation) of each input the edited image was computed from
    pub(crate) edit_inputs: Vec<(usize, usize, u64)>,
    pub(crate) edit_failed: bool,
    pub(crate) region: TextureRegion,
    pub(crate) texture: Option<Box<dyn TextureTarget>>,
}

impl Sequence {
    pub fn new(glob_capacity: usize, margin: i32) -> Self {
        Self {
            glob: String::new(),
            glob_capacity: glob_capacity.max(1),
            collection: ImageCollection::default(),
            player: 0,
            view: 0,
            colormap: 0,
            edit: None,
            state: FrameState::NoImage,
            state_frame: None,
            generation: 0,
            edit_inputs: Vec::new(),
            edit_failed: false,
            region: TextureRegion::new(margin),
            texture: None,
        }
    }

    pub fn glob(&self) -> &str {
        &self.glob
    }

    /// Replace the glob text, truncated to the buffer capacity.
    pub fn set_glob_text(&mut self, text: &str) {
        let mut end = text.len().min(self.glob_capacity);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        self.glob = text[..end].to_string();
    }

    /// Resolve the glob again. Returns the number of files found.
    pub fn load_filenames(&mut self) -> usize {
        self.collection = ImageCollection::resolve(&self.glob);
        self.forget();
        debug!("Sequence '{}': {} file(s)", self.glob, self.collection.len());
        self.collection.len()
    }

    pub fn set_collection(&mut self, collection: ImageCollection) {
        self.glob = collection.pattern().to_string();
        self.collection = collection;
        self.forget();
    }

    pub fn collection(&self) -> &ImageCollection {
        &self.collection
    }

    /// A sequence without files is inert.
    pub fn is_valid(&self) -> bool {
        !self.collection.is_empty()
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    pub fn edit(&self) -> Option<&EditProgram> {
        self.edit.as_ref()
    }

    /// Attach or clear the edit program. Any change drops the current image.
    pub fn set_edit(&mut self, edit: Option<EditProgram>) {
        let edit = edit.filter(|e| !e.text.trim().is_empty());
        if self.edit != edit {
            self.edit = edit;
            self.forget();
        }
    }

    pub fn has_edit(&self) -> bool {
        self.edit.is_some()
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    pub(crate) fn set_state(&mut self, state: FrameState) {
        self.state = state;
        self.region.invalidate();
    }

    /// Counter identifying the current collection and materialized image
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn region(&self) -> &TextureRegion {
        &self.region
    }

    pub fn set_margin(&mut self, margin: i32) {
        self.region.set_margin(margin);
    }

    /// Native texture handle for drawing
    pub fn texture_handle(&self) -> Option<u32> {
        self.texture.as_ref().and_then(|t| t.handle())
    }

    /// Drop the materialized image and everything uploaded from it.
    pub fn forget(&mut self) {
        if !matches!(self.state, FrameState::NoImage) {
            trace!("Sequence '{}': forget image", self.glob);
        }
        self.state = FrameState::NoImage;
        self.state_frame = None;
        self.generation = self.generation.wrapping_add(1);
        self.edit_inputs.clear();
        self.edit_failed = false;
        self.region.invalidate();
    }

    /// Forget if the materialized image belongs to another frame.
    pub fn sync_frame(&mut self, frame: usize) {
        if self.state_frame.is_some_and(|f| f != frame) {
            self.forget();
        }
    }

    /// Ensure at least `RawLoaded` for `frame` and return the raw image.
    pub fn load_raw(&mut self, frame: usize, loader: &ImageLoader) -> Option<ImageHandle> {
        if !self.is_valid() {
            return None;
        }
        self.sync_frame(frame);
        if let Some(raw) = self.state.raw() {
            return Some(raw.clone());
        }
        let id = self.collection.get(frame)?;
        let raw = loader.load(id)?;
        self.state = FrameState::RawLoaded(raw.clone());
        self.state_frame = Some(frame);
        self.region.invalidate();
        Some(raw)
    }

    /// Window title for sequence number `index` at `frame`
    pub fn title(&self, index: usize, frame: usize) -> String {
        if !self.is_valid() {
            return format!("(the sequence '{}' contains no images)", self.glob);
        }
        let filename = self.collection.get(frame).unwrap_or("");
        let mut title = format!("#{} [{}/{}] {}", index, frame, self.collection.len(), filename);
        match self.state.current() {
            Some(img) => {
                title.push_str(&format!(
                    " ({}x{}x{}) [{}..{}]",
                    img.width(),
                    img.height(),
                    img.channels(),
                    img.min(),
                    img.max()
                ));
                if self.state.is_edited() {
                    title.push_str(" (EDITED)");
                }
            }
            None => title.push_str(" cannot be loaded"),
        }
        title
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::decode::{Decoder, ImageLoader};
    use crate::core::image::{Image, ImageError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Decoder producing a 4x2 image whose pixels hold the frame number
    #[derive(Default)]
    pub(crate) struct FrameDecoder {
        pub calls: AtomicUsize,
    }

    impl Decoder for FrameDecoder {
        fn decode(&self, id: &str) -> Result<Image, ImageError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let n: f32 = id
                .trim_start_matches(|c: char| !c.is_ascii_digit())
                .parse()
                .map_err(|_| ImageError::NotFound(id.to_string()))?;
            Image::from_f32(vec![n; 8], 4, 2, 1)
        }
    }

    fn sequence(names: &[&str]) -> Sequence {
        let mut seq = Sequence::new(DEFAULT_GLOB_CAPACITY, 0);
        seq.set_collection(ImageCollection::from_filenames(
            "f*",
            names.iter().map(|s| s.to_string()).collect(),
        ));
        seq
    }

    /// Test: Raw load is memoized per frame
    #[test]
    fn test_load_raw_per_frame() {
        let decoder = Arc::new(FrameDecoder::default());
        let loader = ImageLoader::new(decoder.clone(), None);
        let mut seq = sequence(&["f1", "f2"]);

        let a = seq.load_raw(1, &loader).unwrap();
        let b = seq.load_raw(1, &loader).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(decoder.calls.load(Ordering::Relaxed), 1);

        let c = seq.load_raw(2, &loader).unwrap();
        assert_eq!(c.max(), 2.0);
        assert_eq!(decoder.calls.load(Ordering::Relaxed), 2);
    }

    /// Test: Empty collection is inert
    #[test]
    fn test_invalid_sequence() {
        let loader = ImageLoader::new(Arc::new(FrameDecoder::default()), None);
        let mut seq = sequence(&[]);
        assert!(!seq.is_valid());
        assert!(seq.load_raw(1, &loader).is_none());
        assert_eq!(seq.title(0, 1), "(the sequence 'f*' contains no images)");
    }

    #[test]
    fn test_title() {
        let loader = ImageLoader::new(Arc::new(FrameDecoder::default()), None);
        let mut seq = sequence(&["f1", "f2", "bad"]);
        assert_eq!(seq.title(0, 1), "#0 [1/3] bad cannot be loaded");

        seq.load_raw(2, &loader);
        assert_eq!(seq.title(3, 2), "#3 [2/3] f1 (4x2x1) [1..1]");
    }

    /// Test: Edit change drops the image
    #[test]
    fn test_set_edit_forgets() {
        let loader = ImageLoader::new(Arc::new(FrameDecoder::default()), None);
        let mut seq = sequence(&["f1"]);
        seq.load_raw(1, &loader);
        assert!(seq.state().raw().is_some());

        seq.set_edit(Some(EditProgram::new("0 x", EditKind::Expression)));
        assert!(matches!(seq.state(), FrameState::NoImage));
        assert!(seq.region().force_reupload());

        // Blank programs count as no edit
        seq.set_edit(Some(EditProgram::new("   ", EditKind::Expression)));
        assert!(!seq.has_edit());
    }

    /// Test: Forget bumps the generation
    #[test]
    fn test_forget_bumps_generation() {
        let mut seq = sequence(&["f1"]);
        let before = seq.generation();
        seq.forget();
        assert_ne!(seq.generation(), before);
        let before = seq.generation();
        seq.set_collection(ImageCollection::from_filenames("f*", vec!["f2".into()]));
        assert_ne!(seq.generation(), before);
    }

    #[test]
    fn test_glob_capacity_truncates_on_char_boundary() {
        let mut seq = Sequence::new(5, 0);
        seq.set_glob_text("ab\u{e9}cd");
        assert_eq!(seq.glob(), "ab\u{e9}c");
        seq.set_glob_text("abcdéf");
        assert_eq!(seq.glob(), "abcd");
    }
}
