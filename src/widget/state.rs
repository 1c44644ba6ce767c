use glam::Vec2;

/// Per-widget session state written by input events and read by frames
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    /// Pointer position in page pixels
    pub pointer: Vec2,
    /// Widget center in page pixels
    pub center: Vec2,
    pub hovered: bool,
    /// Seconds of animation accumulated over all frames
    pub time: f64,
    /// Clock reading of the previous frame, or of setup before the first
    pub last_frame: f64,
    /// Drawable size in pixels
    pub viewport: (u32, u32),
}

impl RenderState {
    /// State of a widget set up at clock reading `now`
    pub fn new(now: f64) -> Self {
        Self {
            pointer: Vec2::ZERO,
            center: Vec2::ZERO,
            hovered: false,
            time: 0.0,
            last_frame: now,
            viewport: (1, 1),
        }
    }

    /// Account for a frame at clock reading `now` and return the delta
    pub fn advance(&mut self, now: f64) -> f64 {
        let delta = (now - self.last_frame).max(0.0);
        self.last_frame = now;
        self.time += delta;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates() {
        let mut state = RenderState::new(9.75);
        assert_eq!(state.advance(10.0), 0.25);
        assert_eq!(state.advance(10.5), 0.5);
        assert_eq!(state.advance(11.0), 0.5);
        assert_eq!(state.time, 1.25);
    }

    #[test]
    fn test_clock_going_backwards_is_ignored() {
        let mut state = RenderState::new(5.0);
        assert_eq!(state.advance(4.0), 0.0);
        assert_eq!(state.advance(4.5), 0.5);
        assert_eq!(state.time, 0.5);
    }
}
