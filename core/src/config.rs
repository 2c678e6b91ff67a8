use crate::constants::{DISPLAY_HEIGHT, DISPLAY_WIDTH, TICK_RATE};

/// What happens to sprite pixels that land beyond the edge of the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePolicy {
    /// Pixels reappear on the opposite edge (modulo width/height)
    Wrap,
    /// Pixels pile up on the last row/column
    Clamp,
}

impl EdgePolicy {
    /// Maps a possibly off-screen coordinate onto the display
    pub fn place(self, x: usize, y: usize) -> (usize, usize) {
        match self {
            EdgePolicy::Wrap => (x % DISPLAY_WIDTH, y % DISPLAY_HEIGHT),
            EdgePolicy::Clamp => (x.min(DISPLAY_WIDTH - 1), y.min(DISPLAY_HEIGHT - 1)),
        }
    }
}

impl Default for EdgePolicy {
    fn default() -> Self {
        EdgePolicy::Wrap
    }
}

/// Knobs for the behaviours that differ between interpreters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Ticks per second; timers count down once per tick
    pub tick_rate: u32,
    /// How many instructions may execute per tick
    pub instructions_per_tick: u32,
    /// How sprites are drawn at the edge of the display
    pub edge_policy: EdgePolicy,
    /// Step over unknown opcodes instead of stalling on them
    pub skip_invalid_opcodes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tick_rate: TICK_RATE,
            instructions_per_tick: 1,
            edge_policy: EdgePolicy::default(),
            skip_invalid_opcodes: false,
        }
    }
}
