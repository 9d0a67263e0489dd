//! Result and errors.
use std::{
    fmt::{self, Display, Formatter},
    io,
};

use crate::constants::{Address, MAX_PROGRAM_SIZE, STACK_SIZE};

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// Attempt to load a bytecode program that can't fit in memory.
    LargeProgram,
    /// Fontset data is malformed.
    Font(String),
    /// `CALL` nested deeper than the stack can hold.
    ///
    /// Address is the location of the offending instruction.
    StackOverflow { address: Address },
    /// `RET` executed with an empty call stack.
    StackUnderflow { address: Address },
    Io(io::Error),
    Fmt(fmt::Error),
}

impl Chip8Error {
    /// Errors raised while the interpreter loop is running, as opposed
    /// to errors raised while loading.
    pub fn is_runtime(&self) -> bool {
        matches!(
            self,
            Self::StackOverflow { .. } | Self::StackUnderflow { .. }
        )
    }
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LargeProgram => write!(
                f,
                "program too large for VM memory, maximum is {MAX_PROGRAM_SIZE} bytes"
            ),
            Self::Font(msg) => write!(f, "font error: {}", msg),
            Self::StackOverflow { address } => write!(
                f,
                "runtime error: call stack overflow at 0x{address:03X}, maximum depth is {STACK_SIZE}"
            ),
            Self::StackUnderflow { address } => {
                write!(f, "runtime error: call stack underflow at 0x{address:03X}")
            }
            Self::Io(err) => write!(f, "{}", err),
            Self::Fmt(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Chip8Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Fmt(err) => Some(err),
            _ => None,
        }
    }
}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}

impl From<io::Error> for Chip8Error {
    fn from(err: io::Error) -> Self {
        Chip8Error::Io(err)
    }
}
