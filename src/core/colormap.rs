//! Linear value mapping applied when drawing a sequence
//!
//! Displayed value = `(v - (center - radius)) / (2 * radius)`, in image
//! units (0..255 for 8-bit, raw values for float images).

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Colormap {
    pub center: f32,
    pub radius: f32,
}

impl Default for Colormap {
    fn default() -> Self {
        Self {
            center: 0.5,
            radius: 0.5,
        }
    }
}

impl Colormap {
    /// Map `[min, max]` onto the full display range
    pub fn auto_center_and_radius(&mut self, min: f32, max: f32) {
        if !(min.is_finite() && max.is_finite()) || max < min {
            return;
        }
        self.center = (min + max) * 0.5;
        self.radius = ((max - min) * 0.5).max(f32::EPSILON);
    }

    /// (scale, bias) such that `display = v * scale + bias`
    pub fn scale_bias(&self) -> (f32, f32) {
        let scale = 1.0 / (2.0 * self.radius.max(f32::EPSILON));
        (scale, 0.5 - self.center * scale)
    }

    pub fn apply(&self, v: f32) -> f32 {
        let (scale, bias) = self.scale_bias();
        v * scale + bias
    }
}
