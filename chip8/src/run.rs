use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, log_enabled, Level};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;

use display::{Colour, Display};
use emu8_core::{Config, Error, Machine, State};

use crate::keymap::keymap;

/// How long to sleep between passes over the event loop
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One line showing the registers, timers and the last opcode executed
fn readout(state: &State, last_op: u16) -> String {
    let registers: Vec<String> = state
        .v
        .iter()
        .enumerate()
        .map(|(index, value)| format!("V{:X}={:02X}", index, value))
        .collect();
    format!(
        "{} I={:04X} DT={:02X} ST={:02X} PC={:04X} SP={:02X} OP={:04X}",
        registers.join(" "),
        state.i,
        state.delay_timer,
        state.sound_timer,
        state.pc,
        state.sp,
        last_op
    )
}

/// Runs a ROM in a window until it's closed
///
/// # Arguments
/// * `colours` the foreground and background colours
pub fn run(rom: &Path, config: Config, scale: u32, colours: [Colour; 2]) -> Result<()> {
    let mut machine = Machine::with_config(config);
    info!(
        "{} Hz, {} instruction(s) per tick, {:?} edges",
        machine.config().tick_rate,
        machine.config().instructions_per_tick,
        machine.config().edge_policy
    );

    // Load ROM
    let program = std::fs::read(rom).with_context(|| format!("unable to read {}", rom.display()))?;
    machine
        .load_program(&program)
        .with_context(|| format!("unable to load {}", rom.display()))?;
    info!("loaded {} ({} bytes)", rom.display(), program.len());

    // The terminal bell stands in for a buzzer
    machine.set_beeper(|| {
        print!("\x07");
        let _ = io::stdout().flush();
    });

    // Get SDL2 context
    let sdl = sdl2::init().map_err(|e| anyhow!(e))?;
    let mut display = Display::new(&sdl, scale)?;
    let [foreground, background] = colours;
    display.set_colours(foreground, background);
    let mut events = sdl.event_pump().map_err(|e| anyhow!(e))?;

    'event: loop {
        // Handle input
        for event in events.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'event,
                Event::KeyDown {
                    keycode: Some(Keycode::Home),
                    ..
                } => machine.reset(),
                Event::KeyDown {
                    keycode: Some(key), ..
                } => {
                    if let Some(index) = keymap(key) {
                        machine.set_key(index, true);
                    }
                }
                Event::KeyUp {
                    keycode: Some(key), ..
                } => {
                    if let Some(index) = keymap(key) {
                        machine.set_key(index, false);
                    }
                }
                _ => continue,
            };
        }

        // Update state; the machine gates itself so use up every slot it has
        let mut last_op = None;
        loop {
            match machine.step() {
                Ok(Some(op)) => last_op = Some(op),
                Ok(None) => break,
                // The machine logs the stall itself
                Err(Error::InvalidOpcode { .. }) => break,
                Err(e) => return Err(e.into()),
            }
        }
        if let Some(op) = last_op {
            if log_enabled!(Level::Debug) {
                debug!("{}", readout(machine.state(), op));
            }
        }

        // If the frame changed, render it
        if let Some(frame) = machine.take_frame() {
            display.render(&frame)?;
        }

        std::thread::sleep(POLL_INTERVAL);
    }

    Ok(())
}
