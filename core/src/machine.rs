use std::io::Read;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::clock::{Slot, Ticker};
use crate::config::Config;
use crate::constants::{PROGRAM_CAPACITY, PROGRAM_START};
use crate::error::{Error, Result};
use crate::instruction::Instruction;
use crate::operations;
use crate::state::{FrameBuffer, State};

/// # Machine
/// A Chip-8 virtual machine.
///
/// Owns the current `state`, the tick gate that paces execution and the callback that beeps
/// while the sound timer runs.
///
/// Supplies interfaces for:
/// - loading programs
/// - pressing and releasing keys
/// - stepping the CPU (which also advances its timers)
/// - taking its frame buffer for rendering by some display
/// - resetting it
pub struct Machine {
    state: State,
    config: Config,
    ticker: Ticker,
    timers_due: bool,
    /// pc of the invalid opcode last reported as a stall
    stalled: Option<u16>,
    beeper: Option<Box<dyn FnMut()>>,
}

impl Machine {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Machine {
            state: State::new(),
            ticker: Ticker::new(config.tick_rate, config.instructions_per_tick),
            config,
            timers_due: false,
            stalled: None,
            beeper: None,
        }
    }

    /// Sets the callback run on every step that leaves the sound timer above zero
    pub fn set_beeper<F: FnMut() + 'static>(&mut self, beeper: F) {
        self.beeper = Some(Box::new(beeper));
    }

    /// Copies a program into memory at 0x200.
    ///
    /// Nothing else changes; in particular the pc stays where it is.
    pub fn load_program(&mut self, program: &[u8]) -> Result<()> {
        if program.len() > PROGRAM_CAPACITY {
            return Err(Error::Capacity {
                size: program.len(),
                capacity: PROGRAM_CAPACITY,
            });
        }
        let start = PROGRAM_START as usize;
        self.state.memory[start..start + program.len()].copy_from_slice(program);
        self.stalled = None;
        debug!("loaded {} byte program at {:#05X}", program.len(), start);
        Ok(())
    }

    /// Load a rom from some source
    ///
    /// # Arguments
    /// * `reader` a reader that yields an entire ROM
    pub fn load_rom(&mut self, reader: &mut dyn Read) -> std::io::Result<()> {
        let mut program = Vec::new();
        reader.read_to_end(&mut program)?;
        self.load_program(&program)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Set the pressed status of a key
    ///
    /// # Arguments
    /// * `key` the index 0x0..=0xF of the key
    /// * `pressed` whether it is down
    pub fn set_key(&mut self, key: u8, pressed: bool) {
        self.state.pressed_keys[key as usize] = pressed;
    }

    /// Returns the FrameBuffer if it changed since it was last taken
    pub fn take_frame(&mut self) -> Option<FrameBuffer> {
        if self.state.draw_flag {
            self.state.draw_flag = false;
            Some(self.state.frame_buffer)
        } else {
            None
        }
    }

    /// The current FrameBuffer, changed or not
    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.state.frame_buffer
    }

    /// A read-only view of the whole machine state
    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// How often the gate opens; drivers should step at least this often
    pub fn tick_period(&self) -> Duration {
        self.ticker.period()
    }

    /// Back to power-on; memory (and so the loaded program) is kept
    pub fn reset(&mut self) {
        self.state.reset();
        self.timers_due = false;
        self.stalled = None;
        debug!("reset");
    }

    /// Steps the machine as of now; see `step_at`
    pub fn step(&mut self) -> Result<Option<u16>> {
        self.step_at(Instant::now())
    }

    /// Executes at most one instruction.
    ///
    /// Returns the opcode executed, or `None` if the tick gate had no slot for it. Once per tick
    /// the first instruction to execute also counts the timers down.
    /// While an Fx0A is waiting for a key, every step polls the keypad and counts as executing it.
    ///
    /// On error nothing changes, although the slot is used up.
    pub fn step_at(&mut self, now: Instant) -> Result<Option<u16>> {
        match self.ticker.poll(now) {
            Slot::Gated => return Ok(None),
            Slot::Tick => self.timers_due = true,
            Slot::Spare => {}
        }

        let op = self.state.fetch()?;
        let next = match self.state.awaiting_key {
            Some(x) => operations::poll_key(&self.state, x),
            None => match Instruction::decode(op) {
                Some(instruction) => {
                    trace!(
                        "{} {} v{:02X?} i{:04X} pc{:04X}",
                        op,
                        instruction,
                        self.state.v,
                        self.state.i,
                        self.state.pc
                    );
                    operations::execute(instruction, &self.state, self.config.edge_policy)?
                }
                None => self.invalid_opcode(op.0)?,
            },
        };

        self.state = next;
        self.stalled = None;
        self.advance_timers();
        Ok(Some(op.0))
    }

    /// Either stalls on the opcode or steps over it, depending on the config.
    ///
    /// A stall is only logged on the step that starts it.
    fn invalid_opcode(&mut self, opcode: u16) -> Result<State> {
        let pc = self.state.pc;
        if !self.config.skip_invalid_opcodes {
            if self.stalled != Some(pc) {
                warn!("stalled on invalid opcode {:04X} at {:#05X}", opcode, pc);
                self.stalled = Some(pc);
            }
            return Err(Error::InvalidOpcode { opcode, pc });
        }
        warn!("skipping invalid opcode {:04X} at {:#05X}", opcode, pc);
        let next = State {
            pc: pc + 0x2,
            ..self.state
        };
        next.check_pc()?;
        Ok(next)
    }

    /// Counts both timers down once per tick, beeping while the sound timer is still running
    fn advance_timers(&mut self) {
        if !self.timers_due {
            return;
        }
        self.timers_due = false;

        self.state.delay_timer = self.state.delay_timer.saturating_sub(1);
        self.state.sound_timer = self.state.sound_timer.saturating_sub(1);
        if self.state.sound_timer > 0 {
            if let Some(beep) = self.beeper.as_mut() {
                beep();
            }
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::constants::{DISPLAY_HEIGHT, DISPLAY_WIDTH, SPRITE_SHEET, VF};

    /// Drives a machine one tick at a time
    struct Driver {
        machine: Machine,
        now: Instant,
    }

    impl Driver {
        fn new(program: &[u8]) -> Self {
            Self::with_config(program, Config::default())
        }

        fn with_config(program: &[u8], config: Config) -> Self {
            let mut machine = Machine::with_config(config);
            machine.load_program(program).unwrap();
            Driver {
                machine,
                now: Instant::now(),
            }
        }

        /// Steps at the next tick
        fn tick(&mut self) -> Result<Option<u16>> {
            let result = self.machine.step_at(self.now);
            self.now += self.machine.tick_period();
            result
        }

        fn ticks(&mut self, count: usize) {
            for _ in 0..count {
                self.tick().unwrap();
            }
        }
    }

    #[test]
    fn test_load_program() {
        let mut machine = Machine::new();
        machine.load_program(&[0x00, 0xE0]).unwrap();
        assert_eq!(machine.state.memory[0x200..0x202], [0x00, 0xE0]);
        assert_eq!(machine.state.pc, 0x200);
    }

    #[test]
    fn test_load_program_fills_memory() {
        let mut machine = Machine::new();
        machine.load_program(&[0xAB; 0xE00]).unwrap();
        assert_eq!(machine.state.memory[0xFFF], 0xAB);
    }

    #[test]
    fn test_load_program_too_large() {
        let mut machine = Machine::new();
        let before = machine.state;
        assert_eq!(
            machine.load_program(&[0xAB; 0xE01]),
            Err(Error::Capacity {
                size: 0xE01,
                capacity: 0xE00
            })
        );
        assert_eq!(machine.state, before);
    }

    #[test]
    fn test_load_program_leaves_pc() {
        let mut machine = Machine::new();
        machine.state.pc = 0x204;
        machine.load_program(&[0x12, 0x00]).unwrap();
        assert_eq!(machine.state.pc, 0x204);
    }

    #[test]
    fn test_load_rom_from_reader() {
        let mut machine = Machine::new();
        let mut rom: &[u8] = &[0x61, 0x07];
        machine.load_rom(&mut rom).unwrap();
        assert_eq!(machine.state.memory[0x200..0x202], [0x61, 0x07]);
    }

    #[test]
    fn test_step_returns_executed_opcode() {
        let mut driver = Driver::new(&[0x61, 0x07, 0x00, 0xE0]);
        assert_eq!(driver.tick(), Ok(Some(0x6107)));
        assert_eq!(driver.tick(), Ok(Some(0x00E0)));
        assert_eq!(driver.machine.state.v[0x1], 0x07);
    }

    #[test]
    fn test_step_is_gated_between_ticks() {
        let mut machine = Machine::new();
        machine.load_program(&[0x71, 0x01, 0x71, 0x01]).unwrap();
        let start = Instant::now();
        assert_eq!(machine.step_at(start), Ok(Some(0x7101)));
        let before = machine.state;
        assert_eq!(machine.step_at(start + Duration::from_millis(1)), Ok(None));
        assert_eq!(machine.state, before);
        let next_tick = start + machine.tick_period();
        assert_eq!(machine.step_at(next_tick), Ok(Some(0x7101)));
        assert_eq!(machine.state.v[0x1], 0x02);
    }

    #[test]
    fn test_several_instructions_per_tick() {
        let config = Config {
            instructions_per_tick: 3,
            ..Config::default()
        };
        // LD V0, 10; LD DT, V0; then three adds
        let program = [0x60, 0x0A, 0xF0, 0x15, 0x71, 0x01, 0x71, 0x01, 0x71, 0x01];
        let mut machine = Machine::with_config(config);
        machine.load_program(&program).unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            assert!(machine.step_at(start).unwrap().is_some());
        }
        assert_eq!(machine.step_at(start), Ok(None));
        assert_eq!(machine.state.delay_timer, 10);
        // timers count down once for the whole tick
        let next_tick = start + machine.tick_period();
        machine.step_at(next_tick).unwrap();
        machine.step_at(next_tick).unwrap();
        assert_eq!(machine.state.delay_timer, 9);
        assert_eq!(machine.state.v[0x1], 3);
    }

    #[test]
    fn test_pc_stays_in_memory() {
        // JP 0x300; at 0x300 ADD V1, 1; JP 0x300
        let mut program = vec![0x13, 0x00];
        program.resize(0x100, 0);
        program.extend_from_slice(&[0x71, 0x01, 0x13, 0x00]);
        let mut driver = Driver::new(&program);
        for _ in 0..50 {
            driver.tick().unwrap();
            assert!(driver.machine.state.pc <= 4094);
        }
        assert_eq!(driver.machine.state.v[0x1], 25);
    }

    #[test]
    fn test_alu_carry_and_borrow() {
        // V1 = FF, V2 = 01, ADD V1, V2
        let mut driver = Driver::new(&[0x61, 0xFF, 0x62, 0x01, 0x81, 0x24]);
        driver.ticks(3);
        assert_eq!(driver.machine.state.v[0x1], 0x00);
        assert_eq!(driver.machine.state.v[VF], 0x1);

        // V1 = 01, V2 = 02, SUB V1, V2
        let mut driver = Driver::new(&[0x61, 0x01, 0x62, 0x02, 0x81, 0x25]);
        driver.ticks(3);
        assert_eq!(driver.machine.state.v[0x1], 0xFF);
        assert_eq!(driver.machine.state.v[VF], 0x0);
    }

    #[test]
    fn test_call_return_round_trip() {
        // 0x200 CALL 0x206; 0x202 LD V2, 2; 0x204 JP 0x204; 0x206 LD V1, 1; 0x208 RET
        let program = [0x22, 0x06, 0x62, 0x02, 0x12, 0x04, 0x61, 0x01, 0x00, 0xEE];
        let mut driver = Driver::new(&program);
        driver.tick().unwrap();
        assert_eq!(driver.machine.state.sp, 1);
        assert_eq!(driver.machine.state.pc, 0x206);
        driver.ticks(2);
        assert_eq!(driver.machine.state.pc, 0x202);
        assert_eq!(driver.machine.state.sp, 0);
        driver.tick().unwrap();
        assert_eq!(driver.machine.state.v[0x1..0x3], [1, 2]);
    }

    #[test]
    fn test_return_with_empty_stack_is_an_error() {
        let mut driver = Driver::new(&[0x00, 0xEE]);
        let before = driver.machine.state;
        assert_eq!(driver.tick(), Err(Error::StackUnderflow { pc: 0x200 }));
        assert_eq!(driver.machine.state, before);
    }

    #[test]
    fn test_unbounded_recursion_overflows() {
        // CALL 0x200 forever
        let mut driver = Driver::new(&[0x22, 0x00]);
        driver.ticks(15);
        assert_eq!(driver.tick(), Err(Error::StackOverflow { pc: 0x200 }));
        assert_eq!(driver.machine.state.sp, 15);
    }

    #[test]
    fn test_bcd() {
        // LD V1, 234; LD I, 0x300; LD B, V1
        let mut driver = Driver::new(&[0x61, 0xEA, 0xA3, 0x00, 0xF1, 0x33]);
        driver.ticks(3);
        assert_eq!(driver.machine.state.memory[0x300..0x303], [2, 3, 4]);
    }

    #[test]
    fn test_draw_twice_collides() {
        // LD I, 0x208; DRW V0, V0, 1; DRW V0, V0, 1; JP 0x206; sprite 0x80
        let program = [0xA2, 0x08, 0xD0, 0x01, 0xD0, 0x01, 0x12, 0x06, 0x80];
        let mut driver = Driver::new(&program);
        driver.ticks(2);
        assert_eq!(driver.machine.state.v[VF], 0);
        let frame = driver.machine.take_frame().unwrap();
        assert!(frame[0][0]);
        assert_eq!(driver.machine.take_frame(), None);
        driver.tick().unwrap();
        assert_eq!(driver.machine.state.v[VF], 1);
        let frame = driver.machine.take_frame().unwrap();
        assert!(!frame[0][0]);
    }

    #[test]
    fn test_frame_buffer_does_not_clear_dirty_flag() {
        let mut driver = Driver::new(&[0x00, 0xE0]);
        driver.tick().unwrap();
        assert_eq!(
            driver.machine.frame_buffer(),
            &[[false; DISPLAY_WIDTH]; DISPLAY_HEIGHT]
        );
        assert!(driver.machine.take_frame().is_some());
    }

    #[test]
    fn test_reset() {
        let mut driver = Driver::new(&[0x61, 0x07, 0xA3, 0x00, 0xD0, 0x05, 0x22, 0x00]);
        driver.ticks(4);
        driver.machine.set_key(0x5, true);
        driver.machine.take_frame();
        driver.machine.reset();

        let state = driver.machine.state;
        assert_eq!(state.pc, 0x200);
        assert_eq!(state.sp, 0);
        assert_eq!(state.i, 0);
        assert_eq!(state.v, [0; 16]);
        assert_eq!(state.stack, [0; 16]);
        assert_eq!(state.pressed_keys, [false; 16]);
        assert!(state.frame_buffer.iter().all(|row| row.iter().all(|&p| !p)));
        assert!(driver.machine.take_frame().is_some());
        // the program is still there to run again
        assert_eq!(state.memory[0x200..0x202], [0x61, 0x07]);
    }

    #[test]
    fn test_reset_is_idempotent_and_keeps_the_font() {
        let mut driver = Driver::new(&[0x61, 0x07]);
        driver.tick().unwrap();
        driver.machine.reset();
        let once = driver.machine.state;
        driver.machine.reset();
        assert_eq!(driver.machine.state, once);
        for _ in 0..10 {
            driver.machine.reset();
        }
        assert_eq!(driver.machine.state.memory[..80], SPRITE_SHEET[..]);
    }

    #[test]
    fn test_timers_floor_at_zero() {
        let mut driver = Driver::new(&[0x12, 0x00]);
        driver.ticks(3);
        assert_eq!(driver.machine.state.delay_timer, 0);
        assert_eq!(driver.machine.state.sound_timer, 0);
    }

    #[test]
    fn test_timers_count_down_per_step() {
        // LD V0, 3; LD DT, V0; LD ST, V0; JP 0x206
        let mut driver = Driver::new(&[0x60, 0x03, 0xF0, 0x15, 0xF0, 0x18, 0x12, 0x06]);
        driver.ticks(2);
        // set then immediately decremented by the same step
        assert_eq!(driver.machine.state.delay_timer, 2);
        driver.ticks(1);
        assert_eq!(driver.machine.state.delay_timer, 1);
        assert_eq!(driver.machine.state.sound_timer, 2);
        driver.ticks(5);
        assert_eq!(driver.machine.state.delay_timer, 0);
        assert_eq!(driver.machine.state.sound_timer, 0);
    }

    #[test]
    fn test_beeps_while_sound_timer_runs() {
        let beeps = Rc::new(Cell::new(0));
        // LD V0, 3; LD ST, V0; JP 0x204
        let mut driver = Driver::new(&[0x60, 0x03, 0xF0, 0x18, 0x12, 0x04]);
        let counter = Rc::clone(&beeps);
        driver.machine.set_beeper(move || counter.set(counter.get() + 1));

        driver.ticks(1);
        assert_eq!(beeps.get(), 0);
        // ST 3 -> 2
        driver.ticks(1);
        assert_eq!(beeps.get(), 1);
        // ST 2 -> 1, then 1 -> 0 which is silent
        driver.ticks(2);
        assert_eq!(beeps.get(), 2);
        // and nothing once it is at 0
        driver.ticks(5);
        assert_eq!(beeps.get(), 2);
    }

    #[test]
    fn test_gated_steps_do_not_touch_timers() {
        let mut machine = Machine::new();
        machine.load_program(&[0x12, 0x00]).unwrap();
        machine.state.delay_timer = 5;
        let start = Instant::now();
        machine.step_at(start).unwrap();
        for _ in 0..10 {
            assert_eq!(machine.step_at(start), Ok(None));
        }
        assert_eq!(machine.state.delay_timer, 4);
    }

    #[test]
    fn test_key_wait() {
        // LD V3, K; JP 0x202
        let mut driver = Driver::new(&[0xF3, 0x0A, 0x12, 0x02]);
        for _ in 0..5 {
            assert_eq!(driver.tick(), Ok(Some(0xF30A)));
            assert_eq!(driver.machine.state.pc, 0x200);
        }
        driver.machine.set_key(0xC, true);
        assert_eq!(driver.tick(), Ok(Some(0xF30A)));
        assert_eq!(driver.machine.state.v[0x3], 0xC);
        assert_eq!(driver.machine.state.pc, 0x202);
        driver.ticks(3);
        assert_eq!(driver.machine.state.pc, 0x202);
        assert_eq!(driver.machine.state.v[0x3], 0xC);
    }

    #[test]
    fn test_key_wait_keeps_timers_running() {
        let mut driver = Driver::new(&[0xF0, 0x0A]);
        driver.machine.state.delay_timer = 3;
        driver.ticks(2);
        assert_eq!(driver.machine.state.delay_timer, 1);
    }

    #[test]
    fn test_reset_cancels_key_wait() {
        let mut driver = Driver::new(&[0xF0, 0x0A]);
        driver.tick().unwrap();
        assert_eq!(driver.machine.state.awaiting_key, Some(0x0));
        driver.machine.reset();
        assert_eq!(driver.machine.state.awaiting_key, None);
    }

    #[test]
    fn test_invalid_opcode_stalls() {
        let mut driver = Driver::new(&[0x01, 0x23]);
        driver.machine.state.delay_timer = 5;
        for _ in 0..3 {
            assert_eq!(
                driver.tick(),
                Err(Error::InvalidOpcode {
                    opcode: 0x0123,
                    pc: 0x200
                })
            );
        }
        assert_eq!(driver.machine.state.pc, 0x200);
        assert_eq!(driver.machine.state.delay_timer, 5);
    }

    #[test]
    fn test_stall_is_reported_once_until_cleared() {
        let mut driver = Driver::new(&[0x01, 0x23]);
        assert_eq!(driver.machine.stalled, None);
        assert!(driver.tick().is_err());
        assert_eq!(driver.machine.stalled, Some(0x200));
        assert!(driver.tick().is_err());
        assert_eq!(driver.machine.stalled, Some(0x200));

        // Patching in a valid instruction ends the stall
        driver.machine.load_program(&[0x61, 0x07]).unwrap();
        assert_eq!(driver.machine.stalled, None);
        assert_eq!(driver.tick(), Ok(Some(0x6107)));
        assert_eq!(driver.machine.stalled, None);

        // As does a reset
        driver.machine.load_program(&[0x01, 0x23]).unwrap();
        driver.machine.reset();
        assert!(driver.tick().is_err());
        assert_eq!(driver.machine.stalled, Some(0x200));
        driver.machine.reset();
        assert_eq!(driver.machine.stalled, None);
    }

    #[test]
    fn test_invalid_opcode_skipped() {
        let config = Config {
            skip_invalid_opcodes: true,
            ..Config::default()
        };
        let mut driver = Driver::with_config(&[0x01, 0x23, 0x61, 0x07], config);
        assert_eq!(driver.tick(), Ok(Some(0x0123)));
        assert_eq!(driver.machine.state.pc, 0x202);
        driver.tick().unwrap();
        assert_eq!(driver.machine.state.v[0x1], 0x07);
    }
}
