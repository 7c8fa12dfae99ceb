//! Session: every sequence, player, view, colormap and window of one viewer
//!
//! **Why**: Sequences reference each other (edit inputs, shared players) and
//! need their own index for titles. One owner with index-based links keeps
//! those cross references explicit instead of global.
//!
//! **Used by**: app (UI), main (`--list`)
//!
//! # Argument Grammar
//!
//! ```text
//! seqview a/*.png nv b/*.png np c/*.exr nw d/%04d.tif
//!         │       │  │        │  │        │  └─ window 1, view 1, player 1
//!         │       │  │        │  │        └──── new window
//!         │       │  │        │  └───────────── view 1, player 1
//!         │       │  │        └──────────────── new player
//!         │       │  └───────────────────────── view 1, player 0
//!         │       └──────────────────────────── new view
//!         └──────────────────────────────────── view 0, player 0, window 0
//! ```
//!
//! # Image Pipeline
//!
//! ```text
//! current_image(i)
//!   ├── raw_image(i)      player frame -> collection id -> loader (cache)
//!   └── edit program?     raw images of the inputs -> EditRegistry
//!                         failure: warn, show the raw image
//! ensure_visible(i, rect)
//!   └── TextureRegion::ensure_visible(frame, image, rect, target)
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::Settings;
use crate::core::cache::ImageCache;
use crate::core::cache_man::CacheManager;
use crate::core::collection::{ImageCollection, watch_paths};
use crate::core::colormap::Colormap;
use crate::core::decode::{ImageDecoder, ImageLoader};
use crate::core::image::{Image, ImageHandle};
use crate::core::player::Player;
use crate::core::rect::Rect;
use crate::core::sequence::{EditProgram, FrameState, Sequence};
use crate::core::texture::TextureFactory;
use crate::core::view::View;
use crate::core::watch::FileWatcher;
use crate::edit::{EditError, EditRegistry, check_indices, parse_program};

/// Argument starting a new view
pub const NEW_VIEW: &str = "nv";
/// Argument starting a new player
pub const NEW_PLAYER: &str = "np";
/// Argument starting a new window
pub const NEW_WINDOW: &str = "nw";

/// One viewer window cycling through its sequences
#[derive(Debug, Clone)]
pub struct Window {
    pub sequences: Vec<usize>,
    pub current: usize,
    pub opened: bool,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            sequences: Vec::new(),
            current: 0,
            opened: true,
        }
    }
}

impl Window {
    pub fn current_sequence(&self) -> Option<usize> {
        self.sequences.get(self.current).copied()
    }

    pub fn next_sequence(&mut self) {
        if !self.sequences.is_empty() {
            self.current = (self.current + 1) % self.sequences.len();
        }
    }

    pub fn prev_sequence(&mut self) {
        if !self.sequences.is_empty() {
            self.current = (self.current + self.sequences.len() - 1) % self.sequences.len();
        }
    }
}

pub struct Session {
    sequences: Vec<Sequence>,
    players: Vec<Player>,
    views: Vec<View>,
    colormaps: Vec<Colormap>,
    windows: Vec<Window>,

    // Targets for new sequences
    current_view: usize,
    current_player: usize,
    current_window: usize,

    loader: ImageLoader,
    registry: EditRegistry,
    settings: Settings,
    watcher: Option<FileWatcher>,
}

impl Session {
    /// Session with the image-crate decoder, the shared cache and the file
    /// watcher as configured.
    pub fn new(settings: Settings) -> Self {
        let cache = settings.cache_enabled.then(|| {
            let manager = CacheManager::new(settings.mem_fraction(), settings.reserve_system_memory_gb as f64);
            Arc::new(ImageCache::new(settings.cache_capacity, Arc::new(manager)))
        });
        let loader = ImageLoader::new(Arc::new(ImageDecoder::new()), cache.clone());

        let watcher = if settings.watch_files {
            let interval = Duration::from_millis(settings.watch_interval_ms);
            match FileWatcher::spawn(interval, cache) {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!("File watching disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut session = Self::with_loader(settings, loader, EditRegistry::default());
        session.watcher = watcher;
        session
    }

    /// Session without a watcher, for custom decoders and tests.
    pub fn with_loader(settings: Settings, loader: ImageLoader, registry: EditRegistry) -> Self {
        let player = Player::new(settings.fps, settings.looping);
        Self {
            sequences: Vec::new(),
            players: vec![player],
            views: vec![View::default()],
            colormaps: Vec::new(),
            windows: vec![Window::default()],
            current_view: 0,
            current_player: 0,
            current_window: 0,
            loader,
            registry,
            settings,
            watcher: None,
        }
    }

    /// Apply command-line items: `nv`, `np`, `nw` or a sequence glob.
    pub fn from_items<S: AsRef<str>>(&mut self, items: &[S]) {
        for item in items {
            match item.as_ref() {
                NEW_VIEW => {
                    self.new_view();
                }
                NEW_PLAYER => {
                    self.new_player();
                }
                NEW_WINDOW => {
                    self.new_window();
                }
                glob => {
                    self.add_sequence(glob);
                }
            }
        }
    }

    pub fn new_view(&mut self) -> usize {
        self.views.push(View::default());
        self.current_view = self.views.len() - 1;
        self.current_view
    }

    pub fn new_player(&mut self) -> usize {
        self.players.push(Player::new(self.settings.fps, self.settings.looping));
        self.current_player = self.players.len() - 1;
        self.current_player
    }

    pub fn new_window(&mut self) -> usize {
        self.windows.push(Window::default());
        self.current_window = self.windows.len() - 1;
        self.current_window
    }

    /// Resolve `glob` into a new sequence attached to the current view,
    /// player and window.
    pub fn add_sequence(&mut self, glob: &str) -> usize {
        let mut seq = Sequence::new(self.settings.glob_capacity, self.settings.texture_margin);
        seq.set_glob_text(glob);
        let count = seq.load_filenames();
        if count == 0 {
            warn!("The sequence '{}' contains no images", glob);
        }
        self.attach(seq)
    }

    /// Add an already resolved collection as a new sequence.
    pub fn add_collection(&mut self, collection: ImageCollection) -> usize {
        let mut seq = Sequence::new(self.settings.glob_capacity, self.settings.texture_margin);
        seq.set_collection(collection);
        self.attach(seq)
    }

    fn attach(&mut self, mut seq: Sequence) -> usize {
        let index = self.sequences.len();
        seq.view = self.current_view;
        seq.player = self.current_player;
        seq.colormap = self.colormaps.len();
        self.colormaps.push(Colormap::default());
        self.sequences.push(seq);

        if let Some(window) = self.windows.get_mut(self.current_window) {
            window.sequences.push(index);
        }
        self.reconfigure_player(self.current_player);
        self.refresh_watch();
        debug!(
            "Sequence #{} -> view {}, player {}, window {}",
            index, self.current_view, self.current_player, self.current_window
        );
        index
    }

    /// Replace the glob of sequence `idx` and resolve it again.
    pub fn set_glob(&mut self, idx: usize, glob: &str) {
        let Some(seq) = self.sequences.get_mut(idx) else {
            return;
        };
        seq.set_glob_text(glob);
        self.reload(idx);
    }

    /// Re-resolve the glob of sequence `idx`.
    pub fn reload(&mut self, idx: usize) {
        let Some(seq) = self.sequences.get_mut(idx) else {
            return;
        };
        let count = seq.load_filenames();
        let player = seq.player;
        info!("Sequence #{} '{}': {} image(s)", idx, seq.glob(), count);
        self.reconfigure_player(player);
        self.refresh_watch();
    }

    /// Bounds of `player` follow the longest sequence attached to it.
    fn reconfigure_player(&mut self, player: usize) {
        let max_len = self
            .sequences
            .iter()
            .filter(|s| s.player == player)
            .map(Sequence::len)
            .max()
            .unwrap_or(0);
        if let Some(p) = self.players.get_mut(player) {
            p.reconfigure_bounds(max_len);
        }
    }

    fn refresh_watch(&self) {
        if let Some(watcher) = &self.watcher {
            let paths = self.sequences.iter().flat_map(|s| watch_paths(s.collection())).collect();
            watcher.watch(paths);
        }
    }

    /// Attach or clear the edit program of sequence `idx`.
    pub fn set_edit(&mut self, idx: usize, edit: Option<EditProgram>) {
        if let Some(seq) = self.sequences.get_mut(idx) {
            seq.set_edit(edit);
        }
    }

    /// Current 1-based frame of sequence `idx`
    pub fn frame_of(&self, idx: usize) -> usize {
        self.sequences
            .get(idx)
            .and_then(|s| self.players.get(s.player))
            .map(Player::frame)
            .unwrap_or(1)
    }

    /// Unedited image of the current frame
    pub fn raw_image(&mut self, idx: usize) -> Option<ImageHandle> {
        let frame = self.frame_of(idx);
        let loader = &self.loader;
        self.sequences.get_mut(idx)?.load_raw(frame, loader)
    }

    /// Image to display for sequence `idx`.
    ///
    /// With `skip_edit` the raw image is returned even if an edit exists.
    /// A failed edit is logged and the raw image is shown; it is retried
    /// once an input changes frame or is reloaded, or the sequence is
    /// invalidated.
    pub fn current_image(&mut self, idx: usize, skip_edit: bool) -> Option<ImageHandle> {
        let raw = self.raw_image(idx)?;
        if skip_edit {
            return Some(raw);
        }
        let Some(edit) = self.sequences[idx].edit().cloned() else {
            return Some(raw);
        };

        let seq = &self.sequences[idx];
        if seq.edit_inputs == self.edit_signature(&edit.text) && (seq.state().is_edited() || seq.edit_failed) {
            return seq.state().current().cloned();
        }

        let result = self.run_edit(&edit);
        // Inputs are loaded now, so their generations are settled
        let signature = self.edit_signature(&edit.text);
        let seq = &mut self.sequences[idx];
        let raw = seq.state().raw().cloned().unwrap_or(raw);
        match result {
            Ok(image) => {
                debug!("Sequence #{}: {} edit applied", idx, edit.kind);
                seq.set_state(FrameState::Edited {
                    raw,
                    edited: ImageHandle::owned(image),
                });
                seq.edit_failed = false;
            }
            Err(e) => {
                warn!("Sequence #{}: {} edit failed: {}", idx, edit.kind, e);
                if seq.state().is_edited() {
                    seq.set_state(FrameState::RawLoaded(raw));
                }
                seq.edit_failed = true;
            }
        }
        seq.edit_inputs = signature;
        seq.state().current().cloned()
    }

    /// (sequence, frame, generation) of every valid input, empty when the
    /// program is unusable
    fn edit_signature(&self, text: &str) -> Vec<(usize, usize, u64)> {
        match parse_program(text) {
            Ok((indices, _)) if check_indices(&indices, self.sequences.len()).is_ok() => indices
                .into_iter()
                .map(|i| (i, self.frame_of(i), self.sequences[i].generation()))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn run_edit(&mut self, edit: &EditProgram) -> Result<Image, EditError> {
        let (indices, program) = parse_program(&edit.text)?;
        check_indices(&indices, self.sequences.len())?;

        let mut inputs = Vec::with_capacity(indices.len());
        for &i in &indices {
            inputs.push(self.raw_image(i).ok_or(EditError::InputUnavailable(i))?);
        }
        let images: Vec<&Image> = inputs.iter().map(|h| &**h).collect();
        self.registry.run(edit.kind, &images, program)
    }

    /// Make `rect` (image pixels) of sequence `idx` resident in its texture.
    ///
    /// Returns true when an upload happened.
    pub fn ensure_visible(&mut self, idx: usize, rect: Rect, factory: &dyn TextureFactory) -> bool {
        let Some(image) = self.current_image(idx, false) else {
            return false;
        };
        let frame = self.frame_of(idx);
        let seq = &mut self.sequences[idx];
        let target = seq.texture.get_or_insert_with(|| factory.create_target());
        seq.region.ensure_visible(frame, &image, rect, target.as_mut())
    }

    /// Advance players and apply file changes. Returns true if anything
    /// visible changed.
    pub fn tick(&mut self, dt: f32) -> bool {
        let mut changed = false;
        for player in &mut self.players {
            changed |= player.update(dt);
        }

        let paths = self.watcher.as_ref().map(FileWatcher::drain).unwrap_or_default();
        if !paths.is_empty() {
            changed |= self.forget_paths(&paths);
        }

        for idx in 0..self.sequences.len() {
            let frame = self.frame_of(idx);
            self.sequences[idx].sync_frame(frame);
        }
        changed
    }

    /// Forget sequences using any of `paths`, and edits computed from them.
    fn forget_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> bool {
        let touched: Vec<usize> = self
            .sequences
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.collection()
                    .filenames()
                    .iter()
                    .any(|f| paths.iter().any(|p| p.as_ref() == Path::new(f)))
            })
            .map(|(i, _)| i)
            .collect();
        if touched.is_empty() {
            return false;
        }

        for seq in &mut self.sequences {
            if seq.edit_inputs.iter().any(|(i, _, _)| touched.contains(i)) {
                seq.forget();
            }
        }
        for &i in &touched {
            debug!("Sequence #{}: source changed on disk", i);
            self.sequences[i].forget();
        }
        true
    }

    /// Drop every materialized image and texture region.
    pub fn invalidate_all(&mut self) {
        for seq in &mut self.sequences {
            seq.forget();
        }
    }

    /// Drop every GPU texture while the GL context is still alive.
    pub fn release_textures(&mut self) {
        for seq in &mut self.sequences {
            seq.texture = None;
            seq.region.invalidate();
        }
    }

    /// Fit colormap of `idx` to the min/max of its current image.
    pub fn auto_scale_and_bias(&mut self, idx: usize) {
        let Some(image) = self.current_image(idx, false) else {
            return;
        };
        let cmap = self.sequences[idx].colormap;
        if let Some(c) = self.colormaps.get_mut(cmap) {
            c.auto_center_and_radius(image.min(), image.max());
        }
    }

    /// Fit colormap of `idx` to the samples inside `rect` only.
    pub fn smart_auto_scale_and_bias(&mut self, idx: usize, rect: Rect) {
        let Some(image) = self.current_image(idx, false) else {
            return;
        };
        let Some((min, max)) = image.region_min_max(rect) else {
            return;
        };
        let cmap = self.sequences[idx].colormap;
        if let Some(c) = self.colormaps.get_mut(cmap) {
            c.auto_center_and_radius(min, max);
        }
    }

    /// Apply a new over-fetch margin to every sequence.
    pub fn set_margin(&mut self, margin: i32) {
        self.settings.texture_margin = margin;
        for seq in &mut self.sequences {
            seq.set_margin(margin);
        }
    }

    pub fn title(&self, idx: usize) -> String {
        self.sequences
            .get(idx)
            .map(|s| s.title(idx, self.frame_of(idx)))
            .unwrap_or_default()
    }

    // Accessors

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn sequence(&self, idx: usize) -> Option<&Sequence> {
        self.sequences.get(idx)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_mut(&mut self, idx: usize) -> Option<&mut Player> {
        self.players.get_mut(idx)
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn view_mut(&mut self, idx: usize) -> Option<&mut View> {
        self.views.get_mut(idx)
    }

    pub fn colormap(&self, idx: usize) -> Option<&Colormap> {
        self.colormaps.get(idx)
    }

    pub fn colormap_mut(&mut self, idx: usize) -> Option<&mut Colormap> {
        self.colormaps.get_mut(idx)
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn window_mut(&mut self, idx: usize) -> Option<&mut Window> {
        self.windows.get_mut(idx)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    pub fn registry(&self) -> &EditRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sequence::tests::FrameDecoder;
    use crate::core::texture::tests::MockTarget;
    use crate::core::texture::TextureTarget;
    use crate::edit::EditKind;
    use std::sync::atomic::Ordering;

    struct MockFactory;

    impl TextureFactory for MockFactory {
        fn create_target(&self) -> Box<dyn TextureTarget> {
            Box::new(MockTarget::default())
        }
    }

    fn session() -> (Session, Arc<FrameDecoder>) {
        let decoder = Arc::new(FrameDecoder::default());
        let loader = ImageLoader::new(decoder.clone(), None);
        let settings = Settings {
            texture_margin: 0,
            ..Settings::default()
        };
        (Session::with_loader(settings, loader, EditRegistry::default()), decoder)
    }

    fn frames(names: &[&str]) -> ImageCollection {
        ImageCollection::from_filenames("f*", names.iter().map(|s| s.to_string()).collect())
    }

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Rect {
        Rect::new(x0, y0, x1, y1)
    }

    /// Test: nv/np/nw grammar
    /// Validates: Sequences attach to the current view, player and window
    #[test]
    fn test_from_items_grammar() {
        let (mut s, _) = session();
        let missing = "/nonexistent_seqview_dir/*.png";
        s.from_items(&[missing, "nv", missing, "np", missing, "nw", missing]);

        assert_eq!(s.sequences().len(), 4);
        assert_eq!((s.views().len(), s.players().len(), s.windows().len()), (2, 2, 2));

        let links: Vec<(usize, usize)> = s.sequences().iter().map(|q| (q.view, q.player)).collect();
        assert_eq!(links, vec![(0, 0), (1, 0), (1, 1), (1, 1)]);
        assert_eq!(s.windows()[0].sequences, vec![0, 1, 2]);
        assert_eq!(s.windows()[1].sequences, vec![3]);

        // Each sequence has its own colormap
        let cmaps: Vec<usize> = s.sequences().iter().map(|q| q.colormap).collect();
        assert_eq!(cmaps, vec![0, 1, 2, 3]);
        assert!(!s.sequences()[0].is_valid());
    }

    /// Test: Player bounds follow the longest attached sequence
    #[test]
    fn test_player_bounds() {
        let (mut s, _) = session();
        s.add_collection(frames(&["f1", "f2"]));
        s.add_collection(frames(&["f1", "f2", "f3", "f4"]));
        assert_eq!(s.players()[0].bounds(), (1, 4));
    }

    /// Test: Out-of-range edit index
    /// Validates: Raw image is shown and state is unchanged
    #[test]
    fn test_edit_fallback_out_of_range() {
        let (mut s, _) = session();
        let idx = s.add_collection(frames(&["f3"]));
        s.set_edit(idx, Some(EditProgram::new("5 x", EditKind::Expression)));

        let img = s.current_image(idx, false).unwrap();
        assert_eq!(img.max(), 3.0);
        assert!(matches!(s.sequence(idx).unwrap().state(), FrameState::RawLoaded(_)));
        assert!(!s.title(idx).contains("EDITED"));
    }

    /// Test: Failed edit after a successful one
    /// Validates: Display falls back to the raw image, no retry while inputs are unchanged
    #[test]
    fn test_edit_failure_falls_back_to_raw() {
        let (mut s, decoder) = session();
        let a = s.add_collection(frames(&["f2"]));
        s.new_player();
        // Sorted as ["bad", "f1"]: frame 2 decodes, frame 1 does not
        let b = s.add_collection(frames(&["f1", "bad"]));
        s.player_mut(1).unwrap().set_frame(2);
        s.set_edit(a, Some(EditProgram::new("0,1 x y +", EditKind::Expression)));

        assert_eq!(s.current_image(a, false).unwrap().max(), 3.0);
        assert!(s.sequence(a).unwrap().state().is_edited());

        // Input b moves to its undecodable frame
        s.player_mut(1).unwrap().set_frame(1);
        s.tick(0.0);
        let img = s.current_image(a, false).unwrap();
        assert_eq!(img.max(), 2.0);
        assert!(matches!(s.sequence(a).unwrap().state(), FrameState::RawLoaded(_)));
        assert!(s.sequence(a).unwrap().edit_failed);
        assert!(s.raw_image(b).is_none());

        let calls = decoder.calls.load(Ordering::Relaxed);
        assert_eq!(s.current_image(a, false).unwrap().max(), 2.0);
        // Inputs unchanged: the edit is not re-run
        assert_eq!(decoder.calls.load(Ordering::Relaxed), calls);
    }

    /// Test: Edit re-runs when an input changes frame
    #[test]
    fn test_edit_follows_input_frame() {
        let (mut s, decoder) = session();
        let a = s.add_collection(frames(&["f10"]));
        s.new_player();
        s.add_collection(frames(&["f1", "f2"]));
        s.set_edit(a, Some(EditProgram::new("1 x 100 +", EditKind::Expression)));

        assert_eq!(s.current_image(a, false).unwrap().max(), 101.0);
        let calls = decoder.calls.load(Ordering::Relaxed);
        // Unchanged inputs: no new edit, no new decode
        assert_eq!(s.current_image(a, false).unwrap().max(), 101.0);
        assert_eq!(decoder.calls.load(Ordering::Relaxed), calls);

        s.player_mut(1).unwrap().next();
        s.tick(0.0);
        assert_eq!(s.current_image(a, false).unwrap().max(), 102.0);

        // skip_edit bypasses the program
        assert_eq!(s.current_image(a, true).unwrap().max(), 10.0);
    }

    /// Test: Unsupported backend falls back to raw
    #[test]
    fn test_unsupported_kind() {
        let (mut s, _) = session();
        let idx = s.add_collection(frames(&["f7"]));
        s.set_edit(idx, Some(EditProgram::new("0 whatever", EditKind::Script)));
        assert_eq!(s.current_image(idx, false).unwrap().max(), 7.0);
        assert!(s.sequence(idx).unwrap().edit_failed);
    }

    /// Test: Texture streaming through the session
    /// Validates: One upload per frame and visible rect, re-upload after a frame change
    #[test]
    fn test_ensure_visible_frame_change() {
        let (mut s, _) = session();
        let idx = s.add_collection(frames(&["f1", "f2"]));

        assert!(s.ensure_visible(idx, rect(0, 0, 4, 2), &MockFactory));
        assert!(!s.ensure_visible(idx, rect(0, 0, 4, 2), &MockFactory));
        assert!(!s.ensure_visible(idx, rect(1, 0, 3, 1), &MockFactory));
        assert_eq!(s.sequence(idx).unwrap().texture_handle(), Some(1));

        s.player_mut(0).unwrap().next();
        s.tick(0.0);
        assert!(s.sequence(idx).unwrap().region().loaded().is_empty());
        assert!(s.ensure_visible(idx, rect(0, 0, 4, 2), &MockFactory));
        assert_eq!(s.sequence(idx).unwrap().region().loaded_frame(), Some(2));
    }

    /// Test: Out-of-bounds request never uploads
    #[test]
    fn test_ensure_visible_out_of_bounds() {
        let (mut s, _) = session();
        let idx = s.add_collection(frames(&["f1"]));
        assert!(!s.ensure_visible(idx, rect(100, 100, 200, 200), &MockFactory));
    }

    /// Test: Changed source forgets the sequence and its dependents
    #[test]
    fn test_forget_paths() {
        let (mut s, _) = session();
        let a = s.add_collection(frames(&["f1"]));
        let b = s.add_collection(frames(&["f5"]));
        s.set_edit(b, Some(EditProgram::new("0 x", EditKind::Expression)));
        s.current_image(a, false);
        s.current_image(b, false);
        assert!(s.sequence(b).unwrap().state().is_edited());

        assert!(s.forget_paths(&["f1"]));
        assert!(matches!(s.sequence(a).unwrap().state(), FrameState::NoImage));
        assert!(matches!(s.sequence(b).unwrap().state(), FrameState::NoImage));
        assert!(!s.forget_paths(&["unrelated"]));
    }

    /// Test: Reloaded input sequence
    /// Validates: Dependent edit is re-run and falls back to raw once the input is gone
    #[test]
    fn test_reload_input_reruns_edit() {
        let (mut s, _) = session();
        let a = s.add_collection(frames(&["f10"]));
        let b = s.add_collection(frames(&["f1"]));
        s.set_edit(a, Some(EditProgram::new("1 x 100 +", EditKind::Expression)));
        assert_eq!(s.current_image(a, false).unwrap().max(), 101.0);

        s.set_glob(b, "/nonexistent_seqview_dir/*.png");
        s.tick(0.0);
        assert!(s.raw_image(b).is_none());

        let img = s.current_image(a, false).unwrap();
        assert_eq!(img.max(), 10.0);
        assert!(!s.sequence(a).unwrap().state().is_edited());
        assert!(!s.title(a).contains("EDITED"));
    }

    /// Test: Input replaced by another collection
    /// Validates: Same (sequence, frame) but new data re-runs the edit
    #[test]
    fn test_replaced_input_reruns_edit() {
        let (mut s, _) = session();
        let a = s.add_collection(frames(&["f10"]));
        s.add_collection(frames(&["f1"]));
        s.set_edit(a, Some(EditProgram::new("1 x 100 +", EditKind::Expression)));
        assert_eq!(s.current_image(a, false).unwrap().max(), 101.0);

        s.sequences[1].set_collection(frames(&["f7"]));
        assert_eq!(s.current_image(a, false).unwrap().max(), 107.0);
    }

    #[test]
    fn test_auto_scale() {
        let (mut s, _) = session();
        let idx = s.add_collection(frames(&["f8"]));
        s.auto_scale_and_bias(idx);
        let c = s.colormap(0).unwrap();
        assert_eq!(c.center, 8.0);
        assert!(c.radius > 0.0);
    }

    #[test]
    fn test_window_cycling() {
        let mut w = Window {
            sequences: vec![4, 7, 9],
            ..Window::default()
        };
        w.prev_sequence();
        assert_eq!(w.current_sequence(), Some(9));
        w.next_sequence();
        w.next_sequence();
        assert_eq!(w.current_sequence(), Some(7));
    }
}
