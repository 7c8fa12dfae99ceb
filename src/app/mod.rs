//! Viewer application: eframe glue around a [`Session`]
//!
//! Submodules:
//! - `menu` - main menu bar (sequences, players, views, windows, options)
//! - `window` - one egui window per session window, input and drawing
//! - `renderer` - GL program drawing a sequence texture through its colormap
//!
//! # Frame Loop
//!
//! ```text
//! update()
//!   ├── session.tick(dt)            players, file changes, stale images
//!   ├── menu::show()                may add/reload sequences, change edits
//!   └── window::show_all()
//!         ├── current_image()       decode / edit as needed
//!         ├── ensure_visible()      incremental upload via GlTextureFactory
//!         └── PaintCallback         ImageRenderer::render(texture handle)
//! ```

mod menu;
pub mod renderer;
mod window;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eframe::{egui, glow};
use log::{info, warn};

use crate::core::collection::ImageCollection;
use crate::core::gl_texture::GlTextureFactory;
use crate::core::session::Session;
use crate::edit::EditKind;
use renderer::ImageRenderer;

/// Per-sequence UI buffers
#[derive(Debug, Clone)]
pub(crate) struct SequenceUi {
    pub glob: String,
    pub edit: String,
    pub edit_kind: EditKind,
    /// Colormap and view were fitted to the first image
    pub fitted: bool,
}

/// Menu and window state that is not part of the session
#[derive(Debug, Default)]
pub(crate) struct UiState {
    pub sequences: Vec<SequenceUi>,
    pub new_glob: String,
    /// Last glob previewed and its matches
    pub preview: Option<(String, ImageCollection)>,
}

impl UiState {
    /// One buffer per session sequence
    pub fn sync(&mut self, session: &Session) {
        for seq in &session.sequences()[self.sequences.len().min(session.sequences().len())..] {
            let (edit, edit_kind) = seq
                .edit()
                .map(|e| (e.text.clone(), e.kind))
                .unwrap_or((String::new(), EditKind::Expression));
            self.sequences.push(SequenceUi {
                glob: seq.glob().to_string(),
                edit,
                edit_kind,
                fitted: false,
            });
        }
    }

    /// Matches of `glob`, resolved again only when the text changes
    pub fn preview(&mut self, glob: &str) -> &ImageCollection {
        if self.preview.as_ref().is_some_and(|(text, _)| text != glob) {
            self.preview = None;
        }
        let (_, collection) = self
            .preview
            .get_or_insert_with(|| (glob.to_string(), ImageCollection::resolve(glob)));
        collection
    }
}

pub struct SeqViewApp {
    session: Session,
    ui: UiState,
    renderer: Arc<Mutex<ImageRenderer>>,
    textures: Option<GlTextureFactory>,
    settings_path: PathBuf,
}

impl SeqViewApp {
    pub fn new(cc: &eframe::CreationContext<'_>, session: Session, settings_path: PathBuf) -> Self {
        let textures = cc
            .gl
            .as_ref()
            .map(|gl| GlTextureFactory::new(Arc::clone(gl), session.settings().smooth_textures));
        if textures.is_none() {
            warn!("No OpenGL context, images will not be drawn");
        }

        let mut ui = UiState::default();
        ui.sync(&session);
        info!("Viewer started with {} sequence(s)", session.sequences().len());

        Self {
            session,
            ui,
            renderer: Arc::new(Mutex::new(ImageRenderer::new())),
            textures,
            settings_path,
        }
    }
}

impl eframe::App for SeqViewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let dt = ctx.input(|i| i.stable_dt);
        self.session.tick(dt);

        menu::show(ctx, &mut self.session, &mut self.ui, &self.settings_path);
        self.ui.sync(&self.session);

        window::show_all(
            ctx,
            &mut self.session,
            &mut self.ui,
            &self.renderer,
            self.textures.as_ref(),
        );

        if self.session.players().iter().any(|p| p.playing) {
            ctx.request_repaint();
        } else if self.session.settings().watch_files {
            ctx.request_repaint_after(Duration::from_millis(self.session.settings().watch_interval_ms));
        }
    }

    fn on_exit(&mut self, gl: Option<&glow::Context>) {
        if let Some(gl) = gl {
            self.renderer
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .destroy(gl);
        }
        self.session.release_textures();
        info!("Viewer closed");
    }
}
