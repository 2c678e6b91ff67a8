use std::fmt;
use std::io::{self, Write};

use serde::Serialize;

use crate::constants::{PROGRAM_CAPACITY, PROGRAM_START};
use crate::error::{Error, Result};
use crate::instruction::Instruction;
use crate::opcode::Opcode;

/// One word of a disassembled ROM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    /// Where the word would be loaded
    pub address: u16,
    pub opcode: Opcode,
    /// `None` if the word isn't a valid instruction (most likely sprite or other data)
    pub instruction: Option<Instruction>,
}

/// `0x0200  00E0  CLS`, with invalid words shown as data
impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#06X}  {}  ", self.address, self.opcode)?;
        match self.instruction {
            Some(instruction) => write!(f, "{}", instruction),
            None => write!(f, "DW {:#06X}", self.opcode.0),
        }
    }
}

/// A `Line` as it appears in a JSON listing
#[derive(Serialize)]
struct Entry {
    address: u16,
    opcode: String,
    instruction: Option<String>,
}

impl From<&Line> for Entry {
    fn from(line: &Line) -> Self {
        Entry {
            address: line.address,
            opcode: line.opcode.to_string(),
            instruction: line.instruction.map(|instruction| instruction.to_string()),
        }
    }
}

/// Decodes every word of `rom` as if it were loaded at 0x200.
///
/// A trailing odd byte can't be a whole opcode and is left out.
/// Fails with `Error::Capacity` if `rom` wouldn't fit in memory.
pub fn disassemble(rom: &[u8]) -> Result<Vec<Line>> {
    if rom.len() > PROGRAM_CAPACITY {
        return Err(Error::Capacity {
            size: rom.len(),
            capacity: PROGRAM_CAPACITY,
        });
    }
    let lines = rom
        .chunks_exact(2)
        .enumerate()
        .map(|(index, word)| {
            let opcode = Opcode::from_bytes(word[0], word[1]);
            Line {
                // Below 0x1000 since the rom fits in memory
                address: (PROGRAM_START as usize + 2 * index) as u16,
                opcode,
                instruction: Instruction::decode(opcode),
            }
        })
        .collect();
    Ok(lines)
}

/// Writes one line per word
pub fn write_listing(lines: &[Line], out: &mut dyn Write) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()
}

/// Writes the lines as a pretty-printed JSON array
pub fn write_json(lines: &[Line], out: &mut dyn Write) -> io::Result<()> {
    let entries: Vec<Entry> = lines.iter().map(Entry::from).collect();
    serde_json::to_writer_pretty(&mut *out, &entries)?;
    writeln!(out)?;
    out.flush()
}
