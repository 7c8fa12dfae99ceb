//! Viewer windows: input, texture streaming and drawing

use std::sync::{Arc, Mutex};

use eframe::egui;
use glam::Vec2;
use log::debug;

use super::UiState;
use super::renderer::{DrawParams, ImageRenderer};
use crate::core::gl_texture::GlTextureFactory;
use crate::core::session::Session;

/// Zoom factor per scroll point
const ZOOM_SPEED: f32 = 0.002;

fn to_vec(v: egui::Vec2) -> Vec2 {
    Vec2::new(v.x, v.y)
}

pub(super) fn show_all(
    ctx: &egui::Context,
    session: &mut Session,
    state: &mut UiState,
    renderer: &Arc<Mutex<ImageRenderer>>,
    textures: Option<&GlTextureFactory>,
) {
    for win in 0..session.windows().len() {
        let Some(window) = session.windows().get(win) else {
            continue;
        };
        if !window.opened {
            continue;
        }
        let current = window.current_sequence();

        // Materialize first so the title shows this frame's image
        let title = match current {
            Some(idx) => {
                session.current_image(idx, false);
                session.title(idx)
            }
            None => format!("Window {} (empty)", win),
        };

        let mut open = true;
        egui::Window::new(title)
            .id(egui::Id::new(("seqview_window", win)))
            .open(&mut open)
            .default_size([800.0, 600.0])
            .resizable(true)
            .show(ctx, |ui| match current {
                Some(idx) => show_sequence(ui, session, state, renderer, textures, win, idx),
                None => {
                    ui.label("No sequence in this window. Use Sequences > Load new sequence.");
                }
            });

        if !open && let Some(window) = session.window_mut(win) {
            window.opened = false;
        }
    }
}

fn show_sequence(
    ui: &mut egui::Ui,
    session: &mut Session,
    state: &mut UiState,
    renderer: &Arc<Mutex<ImageRenderer>>,
    textures: Option<&GlTextureFactory>,
    win: usize,
    idx: usize,
) {
    let size = ui.available_size().max(egui::vec2(64.0, 64.0));
    let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click_and_drag());
    let win_size = Vec2::new(rect.width(), rect.height());
    let Some(seq) = session.sequence(idx) else {
        return;
    };
    let (view_idx, cmap_idx) = (seq.view, seq.colormap);

    handle_input(ui, &response, rect, session, win, idx);

    let image = session.current_image(idx, false);

    // Fit view and colormap to the first image of a sequence
    if let Some(img) = &image
        && let Some(buffers) = state.sequences.get_mut(idx)
        && !buffers.fitted
    {
        buffers.fitted = true;
        if let Some(view) = session.view_mut(view_idx) {
            view.fit(Vec2::new(img.width() as f32, img.height() as f32), win_size);
        }
        session.auto_scale_and_bias(idx);
    }

    let view = session.views().get(view_idx).copied().unwrap_or_default();
    if let Some(factory) = textures {
        session.ensure_visible(idx, view.visible_rect(win_size), factory);
    }

    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 0.0, egui::Color32::BLACK);

    let Some(img) = image else {
        let msg = match session.sequence(idx) {
            Some(s) if s.is_valid() => "cannot be loaded",
            _ => "the sequence contains no images",
        };
        painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            msg,
            egui::FontId::proportional(20.0),
            egui::Color32::from_rgb(255, 100, 100),
        );
        return;
    };

    if let Some(texture) = session.sequence(idx).and_then(|s| s.texture_handle()) {
        let params = DrawParams {
            texture,
            image_size: [img.width() as f32, img.height() as f32],
            element: img.element_type(),
            channels: img.channels(),
            view,
            colormap: session.colormap(cmap_idx).copied().unwrap_or_default(),
            viewport: [rect.width(), rect.height()],
        };
        let renderer = Arc::clone(renderer);
        painter.add(egui::PaintCallback {
            rect,
            callback: Arc::new(egui_glow::CallbackFn::new(move |_info, painter| {
                let mut renderer = renderer.lock().unwrap_or_else(|p| p.into_inner());
                renderer.render(painter.gl(), &params);
            })),
        });
    }

    // Hovered pixel readout
    if let Some(pos) = response.hover_pos() {
        let p = view.window_to_image(to_vec(pos - rect.min), win_size).floor();
        let (x, y) = (p.x as i32, p.y as i32);
        if let Some(values) = img.sample(x, y) {
            let values: Vec<String> = values.iter().map(|v| format!("{:.4}", v)).collect();
            painter.text(
                rect.left_bottom() + egui::vec2(6.0, -6.0),
                egui::Align2::LEFT_BOTTOM,
                format!("({}, {}) {}", x, y, values.join(" ")),
                egui::FontId::monospace(13.0),
                egui::Color32::WHITE,
            );
        }
    }
}

/// Pan, zoom and keyboard shortcuts of a hovered window
fn handle_input(
    ui: &egui::Ui,
    response: &egui::Response,
    rect: egui::Rect,
    session: &mut Session,
    win: usize,
    idx: usize,
) {
    let Some(seq) = session.sequence(idx) else {
        return;
    };
    let (view_idx, player_idx) = (seq.view, seq.player);
    let win_size = Vec2::new(rect.width(), rect.height());

    if response.dragged()
        && let Some(view) = session.view_mut(view_idx)
    {
        view.pan(to_vec(response.drag_delta()));
    }
    if !response.hovered() {
        return;
    }

    let scroll = ui.input(|i| i.smooth_scroll_delta.y);
    if scroll != 0.0
        && let Some(pos) = response.hover_pos()
        && let Some(view) = session.view_mut(view_idx)
    {
        view.zoom_at((scroll * ZOOM_SPEED).exp(), to_vec(pos - rect.min), win_size);
    }

    let (right, left, space, backspace, play, auto, fit, one) = ui.input(|i| {
        (
            i.key_pressed(egui::Key::ArrowRight),
            i.key_pressed(egui::Key::ArrowLeft),
            i.key_pressed(egui::Key::Space),
            i.key_pressed(egui::Key::Backspace),
            i.key_pressed(egui::Key::P),
            i.key_pressed(egui::Key::A),
            i.key_pressed(egui::Key::F),
            i.key_pressed(egui::Key::Num1),
        )
    });

    if let Some(player) = session.player_mut(player_idx) {
        if right {
            player.next();
        }
        if left {
            player.prev();
        }
        if play {
            player.toggle_playing();
            debug!("Player {} playing: {}", player_idx, player.playing);
        }
    }

    if let Some(window) = session.window_mut(win) {
        if space {
            window.next_sequence();
        }
        if backspace {
            window.prev_sequence();
        }
    }

    if auto {
        let view = session.views().get(view_idx).copied().unwrap_or_default();
        session.smart_auto_scale_and_bias(idx, view.visible_rect(win_size));
    }

    if fit || one {
        let size = session
            .current_image(idx, false)
            .map(|img| Vec2::new(img.width() as f32, img.height() as f32));
        if let (Some(size), Some(view)) = (size, session.view_mut(view_idx)) {
            if fit {
                view.fit(size, win_size);
            } else {
                view.reset(size);
            }
        }
    }
}
