use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use display::Colour;
use emu8_core::constants::TICK_RATE;
use emu8_core::{disassembler, Config, EdgePolicy};

mod keymap;
mod run;

#[derive(Parser, Debug)]
#[command(version, about = "A Chip-8 emulator and disassembler", long_about = None)]
struct Args {
    /// Log more; repeat for even more
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a ROM
    Run {
        /// Path to the ROM file to run
        rom: PathBuf,

        /// Size of each Chip-8 pixel on screen
        #[arg(short, long, default_value_t = 10)]
        scale: u32,

        /// Ticks per second; the timers count down once per tick
        #[arg(long, default_value_t = TICK_RATE)]
        tick_rate: u32,

        /// How many instructions to execute per tick
        #[arg(short, long, default_value_t = 1)]
        instructions_per_tick: u32,

        /// What happens to sprites drawn across the edge of the screen
        #[arg(long, value_enum, default_value_t = Edge::Wrap)]
        edge: Edge,

        /// Step over invalid opcodes rather than stalling on them
        #[arg(long)]
        skip_invalid: bool,

        /// Colour of lit pixels, as RRGGBB hex
        #[arg(long, value_parser = parse_colour, default_value = "33FF66")]
        foreground: Colour,

        /// Colour of unlit pixels, as RRGGBB hex
        #[arg(long, value_parser = parse_colour, default_value = "000000")]
        background: Colour,
    },
    /// Print the instructions in a ROM
    Disasm {
        /// Path to the ROM file to disassemble
        rom: PathBuf,

        /// Write the listing here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Edge {
    Wrap,
    Clamp,
}

impl From<Edge> for EdgePolicy {
    fn from(edge: Edge) -> Self {
        match edge {
            Edge::Wrap => EdgePolicy::Wrap,
            Edge::Clamp => EdgePolicy::Clamp,
        }
    }
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Parses `RRGGBB`, with or without a leading `#`
fn parse_colour(hex: &str) -> std::result::Result<Colour, String> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("expected 6 hex digits, got {:?}", hex));
    }
    let rgb = u32::from_str_radix(hex, 16).map_err(|e| e.to_string())?;
    Ok([(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8])
}

fn disasm(rom: PathBuf, output: Option<PathBuf>, json: bool) -> Result<()> {
    let program = std::fs::read(&rom).with_context(|| format!("unable to read {}", rom.display()))?;
    let lines = disassembler::disassemble(&program)
        .with_context(|| format!("unable to disassemble {}", rom.display()))?;
    let write = if json {
        disassembler::write_json
    } else {
        disassembler::write_listing
    };
    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("unable to create {}", path.display()))?;
            write(&lines, &mut BufWriter::new(file))?;
        }
        None => write(&lines, &mut io::stdout().lock())?,
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    SimpleLogger::new()
        .with_level(log_level(args.verbose))
        .init()?;

    match args.command {
        Command::Run {
            rom,
            scale,
            tick_rate,
            instructions_per_tick,
            edge,
            skip_invalid,
            foreground,
            background,
        } => {
            let config = Config {
                tick_rate,
                instructions_per_tick,
                edge_policy: edge.into(),
                skip_invalid_opcodes: skip_invalid,
            };
            run::run(&rom, config, scale, [foreground, background])
        }
        Command::Disasm { rom, output, json } => disasm(rom, output, json),
    }
}
