//! Pan/zoom transform between image pixels and window pixels
//!
//! `center` is the image point shown at the middle of the window, `zoom`
//! the number of window pixels per image pixel:
//!
//! ```text
//! window = (image - center) * zoom + win_size / 2
//! ```

use glam::Vec2;
use log::debug;

use crate::core::rect::Rect;

const MIN_ZOOM: f32 = 1.0 / 64.0;
const MAX_ZOOM: f32 = 256.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    pub center: Vec2,
    pub zoom: f32,
}

impl Default for View {
    fn default() -> Self {
        Self {
            center: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl View {
    pub fn image_to_window(&self, p: Vec2, win_size: Vec2) -> Vec2 {
        (p - self.center) * self.zoom + win_size * 0.5
    }

    pub fn window_to_image(&self, p: Vec2, win_size: Vec2) -> Vec2 {
        (p - win_size * 0.5) / self.zoom + self.center
    }

    /// Image pixels covered by the window (not clipped to any image)
    pub fn visible_rect(&self, win_size: Vec2) -> Rect {
        let min = self.window_to_image(Vec2::ZERO, win_size).floor();
        let max = self.window_to_image(win_size, win_size).ceil();
        Rect::new(min.x as i32, min.y as i32, max.x as i32, max.y as i32)
    }

    /// Multiply zoom keeping the image point under `cursor` fixed.
    pub fn zoom_at(&mut self, factor: f32, cursor: Vec2, win_size: Vec2) {
        if factor <= 0.0 || !factor.is_finite() {
            return;
        }
        let anchor = self.window_to_image(cursor, win_size);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.center = anchor - (cursor - win_size * 0.5) / self.zoom;
        debug!("Zoom: {:.3}x, center: ({:.1}, {:.1})", self.zoom, self.center.x, self.center.y);
    }

    /// Move the image by `delta` window pixels.
    pub fn pan(&mut self, delta: Vec2) {
        self.center -= delta / self.zoom;
    }

    /// Fit the whole image in the window, centered.
    pub fn fit(&mut self, image_size: Vec2, win_size: Vec2) {
        if image_size.x <= 0.0 || image_size.y <= 0.0 || win_size.x <= 0.0 || win_size.y <= 0.0 {
            return;
        }
        let scale = win_size / image_size;
        self.zoom = scale.x.min(scale.y).clamp(MIN_ZOOM, MAX_ZOOM);
        self.center = image_size * 0.5;
    }

    /// 1:1 pixels, centered on the image.
    pub fn reset(&mut self, image_size: Vec2) {
        self.zoom = 1.0;
        self.center = image_size * 0.5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let view = View {
            center: Vec2::new(50.0, 20.0),
            zoom: 2.0,
        };
        let win = Vec2::new(200.0, 100.0);
        assert_eq!(view.image_to_window(Vec2::new(50.0, 20.0), win), Vec2::new(100.0, 50.0));
        let p = Vec2::new(13.0, 77.0);
        assert_eq!(view.window_to_image(view.image_to_window(p, win), win), p);
    }

    /// Test: Visible rect of a zoomed view
    #[test]
    fn test_visible_rect() {
        let view = View {
            center: Vec2::new(100.0, 100.0),
            zoom: 2.0,
        };
        assert_eq!(view.visible_rect(Vec2::new(100.0, 60.0)), Rect::new(75, 85, 125, 115));
    }

    /// Test: Zoom keeps cursor anchor
    #[test]
    fn test_zoom_at_cursor() {
        let mut view = View {
            center: Vec2::new(64.0, 64.0),
            zoom: 1.0,
        };
        let win = Vec2::new(128.0, 128.0);
        let cursor = Vec2::new(10.0, 30.0);
        let before = view.window_to_image(cursor, win);
        view.zoom_at(4.0, cursor, win);
        assert_eq!(view.zoom, 4.0);
        assert!((view.window_to_image(cursor, win) - before).length() < 1e-4);
    }

    #[test]
    fn test_fit_and_pan() {
        let mut view = View::default();
        view.fit(Vec2::new(400.0, 100.0), Vec2::new(200.0, 200.0));
        assert_eq!(view.zoom, 0.5);
        assert_eq!(view.center, Vec2::new(200.0, 50.0));

        view.pan(Vec2::new(10.0, 0.0));
        assert_eq!(view.center, Vec2::new(180.0, 50.0));
    }
}
