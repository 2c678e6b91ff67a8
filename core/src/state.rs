use std::ops::Range;

use crate::constants::{
    DISPLAY_HEIGHT, DISPLAY_WIDTH, LAST_INSTRUCTION, MEMORY_SIZE, PROGRAM_START, SPRITE_SHEET,
    SPRITE_SHEET_ADDR, STACK_SIZE,
};
use crate::error::{Error, Result};
use crate::opcode::Opcode;

/// The FrameBuffer is indexed as [y][x]; `true` is a lit pixel
pub type FrameBuffer = [[bool; DISPLAY_WIDTH]; DISPLAY_HEIGHT];

/// A snapshot of the Chip-8 internal state
///
/// ## CPU
/// Registers
/// - (v) 16 primary 8-bit registers (V0..VF)
///     - the first 15 (V0..VE) are general purpose registers
///     - the 16th (VF) is the carry/borrow/collision flag
/// - (i) a 16-bit memory address register; never masked to 12 bits
///
/// Counter
/// - (pc) a 16-bit program counter
///
/// Pointer
/// - (sp) an 8-bit stack pointer indexing the top used slot of `stack`
///
/// Timers
/// - 2 8-bit timers (delay & sound)
///
/// ## Memory
/// - 16 slot stack of return addresses
/// - 4096 bytes of addressable memory, the sprite sheet at 0x000 and programs from 0x200
/// - 32x64 frame buffer and a flag raised whenever it changes
///
/// ## Input
/// - the pressed status of keys 0..F
/// - the register waiting for a key press, if any
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct State {
    pub v: [u8; 16],
    pub i: u16,
    pub pc: u16,
    pub sp: u8,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub stack: [u16; STACK_SIZE],
    pub memory: [u8; MEMORY_SIZE],
    pub frame_buffer: FrameBuffer,
    pub draw_flag: bool,
    pub pressed_keys: [bool; 16],
    pub awaiting_key: Option<u8>,
}

impl State {
    pub fn new() -> Self {
        let mut memory = [0; MEMORY_SIZE];
        memory[SPRITE_SHEET_ADDR..SPRITE_SHEET_ADDR + SPRITE_SHEET.len()]
            .copy_from_slice(&SPRITE_SHEET);

        State {
            v: [0; 16],
            i: 0,
            pc: PROGRAM_START,
            sp: 0,
            delay_timer: 0,
            sound_timer: 0,
            stack: [0; STACK_SIZE],
            memory,
            frame_buffer: [[false; DISPLAY_WIDTH]; DISPLAY_HEIGHT],
            draw_flag: false,
            pressed_keys: [false; 16],
            awaiting_key: None,
        }
    }

    /// Back to power-on, except that memory (sprite sheet and program) is kept
    /// and the blank display is flagged for redrawing.
    pub fn reset(&mut self) {
        *self = State {
            memory: self.memory,
            draw_flag: true,
            ..State::new()
        };
    }

    /// Fetches the opcode at the pc
    pub fn fetch(&self) -> Result<Opcode> {
        let pc = self.pc as usize;
        match self.memory.get(pc..pc + 2) {
            Some(&[high, low]) => Ok(Opcode::from_bytes(high, low)),
            _ => Err(Error::AddressOutOfRange {
                address: pc + 1,
                pc: self.pc,
            }),
        }
    }

    /// The memory range `[start, start + len)`, if all of it exists
    pub fn range(&self, start: u16, len: usize) -> Result<Range<usize>> {
        let start = start as usize;
        let end = start + len;
        if end > MEMORY_SIZE {
            return Err(Error::AddressOutOfRange {
                address: end - 1,
                pc: self.pc,
            });
        }
        Ok(start..end)
    }

    /// `len` bytes of memory starting at `start`
    pub fn read(&self, start: u16, len: usize) -> Result<&[u8]> {
        let range = self.range(start, len)?;
        Ok(&self.memory[range])
    }

    /// Errors unless `pc` can be fetched from
    pub fn check_pc(&self) -> Result<()> {
        if self.pc > LAST_INSTRUCTION {
            return Err(Error::AddressOutOfRange {
                address: self.pc as usize,
                pc: self.pc,
            });
        }
        Ok(())
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}
