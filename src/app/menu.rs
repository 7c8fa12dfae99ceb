//! Main menu bar

use std::path::Path;

use eframe::egui;
use log::{info, warn};

use super::UiState;
use crate::core::sequence::EditProgram;
use crate::core::session::Session;
use crate::edit::EditKind;

/// Matches listed under a glob editor
const PREVIEW_LIMIT: usize = 16;

pub(super) fn show(ctx: &egui::Context, session: &mut Session, state: &mut UiState, settings_path: &Path) {
    egui::TopBottomPanel::top("main_menu").show(ctx, |ui| {
        egui::MenuBar::new().ui(ui, |ui| {
            ui.menu_button("Sequences", |ui| sequences_menu(ui, session, state));
            ui.menu_button("Players", |ui| players_menu(ui, session));
            ui.menu_button("Views", |ui| views_menu(ui, session));
            ui.menu_button("Windows", |ui| windows_menu(ui, session));
            ui.menu_button("Options", |ui| options_menu(ui, session, settings_path));
        });
    });
}

fn sequences_menu(ui: &mut egui::Ui, session: &mut Session, state: &mut UiState) {
    for idx in 0..session.sequences().len() {
        let Some(seq) = session.sequence(idx) else {
            continue;
        };
        let label = format!("#{} {} ({} images)", idx, seq.glob(), seq.len());
        ui.menu_button(label, |ui| sequence_menu(ui, session, state, idx));
    }

    ui.separator();
    ui.menu_button("Load new sequence", |ui| {
        let response = ui.add(
            egui::TextEdit::singleline(&mut state.new_glob)
                .hint_text("path/to/frames_%04d.png")
                .desired_width(360.0),
        );
        let glob = state.new_glob.clone();
        let count = state.preview(&glob).len();
        ui.label(format!("{} match(es)", count));

        let commit = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if (commit || ui.button("Load").clicked()) && !glob.trim().is_empty() {
            let idx = session.add_sequence(glob.trim());
            info!("Loaded sequence #{} from '{}'", idx, glob.trim());
            state.new_glob.clear();
            ui.close();
        }
    });
}

fn sequence_menu(ui: &mut egui::Ui, session: &mut Session, state: &mut UiState, idx: usize) {
    let Some(buffers) = state.sequences.get_mut(idx) else {
        return;
    };

    // Glob editor with live preview
    ui.label("Glob");
    let response = ui.add(egui::TextEdit::singleline(&mut buffers.glob).desired_width(360.0));
    if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
        session.set_glob(idx, &buffers.glob);
        buffers.fitted = false;
    }

    let glob = buffers.glob.clone();
    let mut picked = None;
    if session.sequence(idx).is_some_and(|s| s.glob() != glob) {
        let matches = state.preview(&glob);
        for name in matches.filenames().iter().take(PREVIEW_LIMIT) {
            if ui.selectable_label(false, name).clicked() {
                picked = Some(name.clone());
            }
        }
        if matches.len() > PREVIEW_LIMIT {
            ui.label(format!("... {} more", matches.len() - PREVIEW_LIMIT));
        }
    }
    if let Some(name) = picked
        && let Some(buffers) = state.sequences.get_mut(idx)
    {
        session.set_glob(idx, &name);
        buffers.glob = name;
        buffers.fitted = false;
    }

    if ui.button("Reload").clicked() {
        session.reload(idx);
    }

    ui.separator();
    edit_section(ui, session, state, idx);

    ui.separator();
    let cmap_idx = session.sequence(idx).map(|s| s.colormap);
    if let Some(cmap) = cmap_idx.and_then(|c| session.colormap_mut(c)) {
        ui.horizontal(|ui| {
            ui.label("Center");
            ui.add(egui::DragValue::new(&mut cmap.center).speed(0.01));
            ui.label("Radius");
            ui.add(egui::DragValue::new(&mut cmap.radius).speed(0.01).range(1e-6..=f32::MAX));
        });
    }
    if ui.button("Auto scale and bias").clicked() {
        session.auto_scale_and_bias(idx);
    }
}

fn edit_section(ui: &mut egui::Ui, session: &mut Session, state: &mut UiState, idx: usize) {
    let Some(buffers) = state.sequences.get_mut(idx) else {
        return;
    };
    ui.label("Edit program");
    ui.add(
        egui::TextEdit::multiline(&mut buffers.edit)
            .hint_text("0 x neg")
            .code_editor()
            .desired_rows(3)
            .desired_width(360.0),
    );

    ui.horizontal(|ui| {
        egui::ComboBox::from_id_salt(("edit_kind", idx))
            .selected_text(buffers.edit_kind.name())
            .show_ui(ui, |ui| {
                for kind in EditKind::ALL {
                    let label = if session.registry().supports(kind) {
                        kind.name().to_string()
                    } else {
                        format!("{} (unavailable)", kind.name())
                    };
                    ui.selectable_value(&mut buffers.edit_kind, kind, label);
                }
            });

        if ui.button("Apply").clicked() {
            let edit = EditProgram::new(buffers.edit.clone(), buffers.edit_kind);
            session.set_edit(idx, Some(edit));
        }
        if ui.button("Clear").clicked() {
            buffers.edit.clear();
            session.set_edit(idx, None);
        }
    });

    if session.sequence(idx).is_some_and(|s| s.has_edit() && s.edit_failed) {
        ui.colored_label(egui::Color32::from_rgb(255, 100, 100), "Edit failed, showing the raw image");
    }
}

fn players_menu(ui: &mut egui::Ui, session: &mut Session) {
    for idx in 0..session.players().len() {
        let Some(player) = session.player_mut(idx) else {
            continue;
        };
        ui.label(format!("Player {}", idx));
        ui.horizontal(|ui| {
            ui.checkbox(&mut player.playing, "Play");
            ui.checkbox(&mut player.looping, "Loop");
            ui.add(egui::DragValue::new(&mut player.fps).range(0.1..=240.0).suffix(" fps"));
        });

        let (first, last) = player.bounds();
        let mut frame = player.frame();
        if ui.add(egui::Slider::new(&mut frame, first..=last).text("frame")).changed() {
            player.set_frame(frame);
        }
        ui.separator();
    }
}

fn views_menu(ui: &mut egui::Ui, session: &mut Session) {
    for idx in 0..session.views().len() {
        let Some(view) = session.view_mut(idx) else {
            continue;
        };
        ui.horizontal(|ui| {
            ui.label(format!("View {}", idx));
            ui.add(
                egui::DragValue::new(&mut view.zoom)
                    .speed(0.01)
                    .range(1.0 / 64.0..=256.0)
                    .suffix("x"),
            );
            ui.label(format!("center ({:.0}, {:.0})", view.center.x, view.center.y));
        });
    }
    ui.separator();
    if ui.button("New view").clicked() {
        let idx = session.new_view();
        info!("New view {} (used by sequences loaded next)", idx);
        ui.close();
    }
}

fn windows_menu(ui: &mut egui::Ui, session: &mut Session) {
    for idx in 0..session.windows().len() {
        let Some(window) = session.window_mut(idx) else {
            continue;
        };
        let label = format!("Window {} ({} sequences)", idx, window.sequences.len());
        ui.checkbox(&mut window.opened, label);
    }
    ui.separator();
    if ui.button("New window").clicked() {
        let idx = session.new_window();
        info!("New window {} (used by sequences loaded next)", idx);
        ui.close();
    }
}

fn options_menu(ui: &mut egui::Ui, session: &mut Session, settings_path: &Path) {
    let mut margin = session.settings().texture_margin;
    ui.horizontal(|ui| {
        ui.label("Texture margin");
        if ui.add(egui::DragValue::new(&mut margin).range(0..=4096).suffix(" px")).changed() {
            session.set_margin(margin);
        }
    });

    if let Some(cache) = session.loader().cache() {
        let stats = cache.stats();
        ui.label(format!(
            "Cache: {} images, {:.1} MB, {} hits / {} misses",
            stats.entries,
            stats.bytes as f64 / (1024.0 * 1024.0),
            stats.hits,
            stats.misses
        ));
        if ui.button("Flush cache").clicked() {
            cache.flush();
            session.invalidate_all();
        }
    } else {
        ui.label("Cache disabled");
    }

    ui.separator();
    if ui.button("Save settings").clicked() {
        if let Err(e) = session.settings().save(settings_path) {
            warn!("{:#}", e);
        }
        ui.close();
    }
}
