pub use config::{Config, EdgePolicy};
pub use error::{Error, Result};
pub use instruction::Instruction;
pub use machine::Machine;
pub use opcode::Opcode;
pub use state::{FrameBuffer, State};

mod clock;
mod config;
pub mod constants;
pub mod disassembler;
mod error;
mod instruction;
mod machine;
mod opcode;
mod operations;
mod state;
