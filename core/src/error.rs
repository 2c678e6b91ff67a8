/// Everything that can go wrong while loading or stepping the machine.
///
/// None of these are raised after the machine's state has been touched; a failed operation
/// leaves the machine exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("ROM is too large ({size} bytes), at most {capacity} bytes fit in memory")]
    Capacity { size: usize, capacity: usize },

    #[error("invalid opcode {opcode:#06X} at {pc:#05X}")]
    InvalidOpcode { opcode: u16, pc: u16 },

    #[error("stack overflow: call at {pc:#05X} exceeds the maximum call depth")]
    StackOverflow { pc: u16 },

    #[error("stack underflow: return at {pc:#05X} with an empty call stack")]
    StackUnderflow { pc: u16 },

    #[error("address {address:#06X} is out of range (instruction at {pc:#05X})")]
    AddressOutOfRange { address: usize, pc: u16 },
}

pub type Result<T> = std::result::Result<T, Error>;
