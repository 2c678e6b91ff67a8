use std::time::Duration;

/// The display is 64 pixels wide
pub const DISPLAY_WIDTH: usize = 64;
/// The display is 32 pixels tall
pub const DISPLAY_HEIGHT: usize = 32;

/// 4KB of addressable memory
pub const MEMORY_SIZE: usize = 4096;
/// ROMs are loaded (and execution starts) here
pub const PROGRAM_START: u16 = 0x200;
/// The largest ROM that fits between `PROGRAM_START` and the end of memory
pub const PROGRAM_CAPACITY: usize = MEMORY_SIZE - PROGRAM_START as usize;
/// The last address a two byte instruction can be fetched from
pub const LAST_INSTRUCTION: u16 = (MEMORY_SIZE - 2) as u16;

/// Number of return address slots in the call stack
pub const STACK_SIZE: usize = 16;

/// Index of the flag register VF
pub const VF: usize = 0xF;

/// Timers count down (and by default instructions execute) at 60Hz
pub const TICK_RATE: u32 = 60;

/// Time between two ticks at `rate` Hz
pub fn tick_period(rate: u32) -> Duration {
    Duration::from_secs(1) / rate.max(1)
}

/// Each glyph in the sprite sheet is 5 rows tall
pub const GLYPH_HEIGHT: u16 = 5;
/// Where the sprite sheet lives in memory
pub const SPRITE_SHEET_ADDR: usize = 0x000;

/// # Sprite Sheet
/// The hexadecimal digits 0..F as 4x5 sprites; only the high nibble of each row is drawn.
///
/// ```text
/// 0xF0 -> ████
/// 0x90 -> █  █
/// 0x90 -> █  █
/// 0x90 -> █  █
/// 0xF0 -> ████
/// ```
#[rustfmt::skip]
pub const SPRITE_SHEET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
