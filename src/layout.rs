use crate::config::LayoutConfig;

/// Sizes the message list so the input row stays on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    breakpoint: f32,
    narrow_fraction: f32,
    wide_fraction: f32,
}

impl Layout {
    pub fn new(config: &LayoutConfig) -> Self {
        Layout {
            breakpoint: config.breakpoint,
            narrow_fraction: config.narrow_fraction.clamp(0.0, 1.0),
            wide_fraction: config.wide_fraction.clamp(0.0, 1.0),
        }
    }

    pub fn is_narrow(&self, width: f32) -> bool {
        width <= self.breakpoint
    }

    /// Maximum height of the message list for a viewport, in logical pixels.
    pub fn max_height(&self, width: f32, height: f32) -> f32 {
        let fraction = if self.is_narrow(width) {
            self.narrow_fraction
        } else {
            self.wide_fraction
        };
        (height * fraction).max(0.0)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Layout::new(&LayoutConfig::default())
    }
}
