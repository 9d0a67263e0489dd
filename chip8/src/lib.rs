mod bytecode;
mod clock;
pub mod constants;
mod cpu;
mod devices;
mod disasm;
mod display;
mod error;
mod vm;

pub use self::{
    bytecode::Op,
    devices::{InvalidKeyCode, KeyCode, KeySnapshot},
    display::{draw_sprite, pixel, Chip8DisplayBuffer},
    error::{Chip8Error, Chip8Result},
    vm::Hz,
};

/// Version of the interpreter implementation.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        bytecode::Op,
        devices::KeyCode,
        disasm::Disassembler,
        error::{Chip8Error, Chip8Result},
        vm::{Chip8Conf, Chip8Vm, Flow, Hz},
    };
}
