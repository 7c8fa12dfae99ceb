//! Playback position shared by the sequences attached to it
//!
//! **Why**: Several sequences can be scrubbed in lockstep. A player owns the
//! 1-based frame number and the `first..=last` bounds; sequences only read
//! the frame and ask the player to widen its bounds after a reload.
//!
//! **Used by**: Session (tick, bounds), app keyboard handler
//!
//! # Timing Model
//!
//! FPS-based: `update(dt)` accumulates elapsed time and advances by whole
//! frames (1/fps seconds each). Boundaries loop or stop depending on
//! `looping`.

use log::trace;

#[derive(Debug, Clone)]
pub struct Player {
    frame: usize,
    first: usize,
    last: usize,
    pub looping: bool,
    pub playing: bool,
    pub fps: f32,
    elapsed: f32,
}

impl Default for Player {
    fn default() -> Self {
        Self::new(24.0, true)
    }
}

impl Player {
    pub fn new(fps: f32, looping: bool) -> Self {
        Self {
            frame: 1,
            first: 1,
            last: 1,
            looping,
            playing: false,
            fps: fps.max(0.1),
            elapsed: 0.0,
        }
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn bounds(&self) -> (usize, usize) {
        (self.first, self.last)
    }

    /// Jump to `frame` (clamped into bounds). Returns true if it changed.
    pub fn set_frame(&mut self, frame: usize) -> bool {
        let old = self.frame;
        self.frame = frame;
        self.check_bounds();
        old != self.frame
    }

    /// Clamp the current frame into `first..=last`
    pub fn check_bounds(&mut self) {
        self.frame = self.frame.clamp(self.first, self.last);
    }

    /// Reset bounds to `1..=max_len` after a collection (re)load
    pub fn reconfigure_bounds(&mut self, max_len: usize) {
        self.first = 1;
        self.last = max_len.max(1);
        self.check_bounds();
        trace!("Player bounds reconfigured: 1..={}", self.last);
    }

    /// Step by `count` frames, wrapping when looping. Returns true if the frame changed.
    pub fn step(&mut self, count: i64) -> bool {
        if count == 0 {
            return false;
        }
        let first = self.first as i64;
        let last = self.last as i64;
        let range = last - first + 1;
        let target = self.frame as i64 + count;

        let next = if target > last {
            if self.looping { first + (target - last - 1) % range } else { last }
        } else if target < first {
            if self.looping { last - (first - target - 1) % range } else { first }
        } else {
            target
        };
        self.set_frame(next as usize)
    }

    pub fn next(&mut self) -> bool {
        self.step(1)
    }

    pub fn prev(&mut self) -> bool {
        self.step(-1)
    }

    pub fn toggle_playing(&mut self) {
        self.playing = !self.playing;
        self.elapsed = 0.0;
    }

    /// Advance playback by `dt` seconds. Returns true if the frame changed.
    pub fn update(&mut self, dt: f32) -> bool {
        if !self.playing {
            return false;
        }
        self.elapsed += dt.max(0.0);
        let frame_duration = 1.0 / self.fps;
        let frames = (self.elapsed / frame_duration).floor();
        if frames < 1.0 {
            return false;
        }
        self.elapsed -= frames * frame_duration;

        let count = frames as i64;
        if !self.looping && self.frame as i64 + count > self.last as i64 {
            trace!("Reached playback bound, stopping");
            self.playing = false;
        }
        self.step(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: Step wraps when looping, clamps otherwise
    #[test]
    fn test_step_loop_and_clamp() {
        let mut p = Player::new(24.0, true);
        p.reconfigure_bounds(5);
        assert!(p.prev());
        assert_eq!(p.frame(), 5);
        assert!(p.step(3));
        assert_eq!(p.frame(), 3);

        p.looping = false;
        p.step(100);
        assert_eq!(p.frame(), 5);
        assert!(!p.next());
    }

    /// Test: Update advances by whole frames
    #[test]
    fn test_update_accumulates() {
        let mut p = Player::new(10.0, true);
        p.reconfigure_bounds(100);
        p.toggle_playing();

        assert!(!p.update(0.05));
        assert!(p.update(0.06));
        assert_eq!(p.frame(), 2);
        assert!(p.update(0.3));
        assert_eq!(p.frame(), 5);
    }

    #[test]
    fn test_update_stops_at_end() {
        let mut p = Player::new(1.0, false);
        p.reconfigure_bounds(2);
        p.toggle_playing();
        p.update(5.0);
        assert_eq!(p.frame(), 2);
        assert!(!p.playing);
    }

    /// Test: Reload shrinks bounds and clamps frame
    #[test]
    fn test_reconfigure_bounds() {
        let mut p = Player::default();
        p.reconfigure_bounds(50);
        p.set_frame(40);
        p.reconfigure_bounds(10);
        assert_eq!(p.frame(), 10);
        assert_eq!(p.bounds(), (1, 10));
    }
}
