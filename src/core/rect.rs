//! Integer rectangles in image pixel space
//!
//! `min` is inclusive, `max` is exclusive, so `[0, w) x [0, h)` is
//! `Rect::from_size(w, h)`. Any rect with `max <= min` on an axis is empty;
//! all empty rects compare equal through [`Rect::is_empty`], and the
//! canonical one is [`Rect::EMPTY`].

use glam::IVec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub min: IVec2,
    pub max: IVec2,
}

impl Rect {
    pub const EMPTY: Rect = Rect {
        min: IVec2::ZERO,
        max: IVec2::ZERO,
    };

    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            min: IVec2::new(x0, y0),
            max: IVec2::new(x1, y1),
        }
    }

    pub fn from_size(width: usize, height: usize) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn width(&self) -> i32 {
        self.max.x.saturating_sub(self.min.x).max(0)
    }

    pub fn height(&self) -> i32 {
        self.max.y.saturating_sub(self.min.y).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    /// Intersect with `bounds`. Disjoint rects collapse to [`Rect::EMPTY`].
    pub fn clip(&self, bounds: Rect) -> Rect {
        let r = Rect {
            min: self.min.max(bounds.min),
            max: self.max.min(bounds.max),
        };
        if r.is_empty() { Rect::EMPTY } else { r }
    }

    /// Smallest rect covering both. Empty operands are ignored.
    pub fn union(&self, other: Rect) -> Rect {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => Rect::EMPTY,
            (true, false) => other,
            (false, true) => *self,
            (false, false) => Rect {
                min: self.min.min(other.min),
                max: self.max.max(other.max),
            },
        }
    }

    /// Grow by `amount` pixels on every side, saturating at the i32 range.
    /// Empty rects stay empty.
    pub fn expand(&self, amount: i32) -> Rect {
        if self.is_empty() {
            return Rect::EMPTY;
        }
        Rect {
            min: self.min.saturating_sub(IVec2::splat(amount)),
            max: self.max.saturating_add(IVec2::splat(amount)),
        }
    }

    /// Inclusive containment; every rect contains the empty rect.
    pub fn contains(&self, other: Rect) -> bool {
        if other.is_empty() {
            return true;
        }
        if self.is_empty() {
            return false;
        }
        other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_disjoint_is_empty() {
        let bounds = Rect::from_size(100, 50);
        let r = Rect::new(-40, -40, -10, -10).clip(bounds);
        assert!(r.is_empty());
        assert_eq!(r, Rect::EMPTY);

        let r = Rect::new(120, 10, 130, 20).clip(bounds);
        assert!(r.is_empty());
    }

    #[test]
    fn test_clip_partial() {
        let r = Rect::new(-10, 40, 30, 90).clip(Rect::from_size(100, 50));
        assert_eq!(r, Rect::new(0, 40, 30, 50));
    }

    #[test]
    fn test_union_ignores_empty() {
        let a = Rect::new(10, 10, 20, 20);
        assert_eq!(Rect::EMPTY.union(a), a);
        assert_eq!(a.union(Rect::EMPTY), a);
        assert_eq!(a.union(Rect::new(30, 0, 40, 5)), Rect::new(10, 0, 40, 20));
    }

    #[test]
    fn test_contains_inclusive() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.contains(a));
        assert!(a.contains(Rect::new(2, 2, 10, 10)));
        assert!(!a.contains(Rect::new(2, 2, 11, 10)));
        assert!(a.contains(Rect::EMPTY));
        assert!(!Rect::EMPTY.contains(a));
    }

    #[test]
    fn test_expand() {
        assert_eq!(Rect::new(5, 5, 6, 6).expand(2), Rect::new(3, 3, 8, 8));
        assert!(Rect::EMPTY.expand(128).is_empty());
    }

    /// Test: Huge margins
    /// Validates: Expansion saturates instead of wrapping into an empty rect
    #[test]
    fn test_expand_saturates() {
        let r = Rect::new(10, 10, 20, 20).expand(i32::MAX);
        assert_eq!(r, Rect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX));
        assert!(!r.is_empty());
        assert_eq!(r.width(), i32::MAX);
        assert_eq!(r.clip(Rect::from_size(100, 50)), Rect::from_size(100, 50));
    }
}
