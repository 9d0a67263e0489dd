//! Instruction decoding.
//!
//! Each instruction word is decoded once into an [`Op`] which carries
//! its operands, and is then dispatched with an exhaustive match.
use std::fmt::{self, Formatter};

use crate::constants::Address;

/// Decoded instruction.
///
/// Register operands `vx` and `vy` are always in the range `0x0..=0xF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Op {
    /// 0nnn (SYS addr)
    ///
    /// Call machine code routine on the original hardware.
    /// Ignored by modern interpreters.
    Sys { address: Address },
    /// 00E0 (CLS)
    ///
    /// Clear the screen.
    ClearScreen,
    /// 00EE (RET)
    ///
    /// Return from the sub-routine.
    Return,
    /// 1nnn (JP addr)
    ///
    /// Jump to the address in `nnn`.
    JumpAddress { address: Address },
    /// 2nnn (CALL addr)
    ///
    /// Call the sub-routine at address `nnn`.
    Call { address: Address },
    /// 3xnn (SE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` equals value `nn`
    Skip_Eq_Byte { vx: u8, nn: u8 },
    /// 4xnn (SNE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` does not equal value `nn`.
    Skip_NotEq_Byte { vx: u8, nn: u8 },
    /// 5xy0 (SE Vx, Vy)
    ///
    /// Skip the next instruction if register `Vx` equals register `Vy`.
    Skip_Eq { vx: u8, vy: u8 },
    /// 6xnn (LD Vx, byte)
    Load_Byte { vx: u8, nn: u8 },
    /// 7xnn (ADD Vx, byte)
    ///
    /// Add byte to the value in register `Vx`, store the result in `Vx`.
    /// Carry flag is not set.
    Add_Byte { vx: u8, nn: u8 },

    // ------------------------------------------------------------------------
    // Math
    /// 8xy0 (LD Vx, Vy)
    ///
    /// Store the value of register VY in register VX.
    Load_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy1 (OR Vx, Vy)
    Or_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy2 (AND Vx, Vy)
    And_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy3 (XOR Vx, Vy)
    Xor_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy4 (ADD Vx, Vy)
    ///
    /// ADDs VX to VY, and stores the result in VX.
    /// Overflow is wrapped. If overflowed, set VF to 1, else 0.
    Add_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy5 (SUB Vx, Vy)
    ///
    /// Subtracts VY from VX, and stores the result in VX.
    /// VF is set to 0 when there is a borrow, set to 1 when there isn't.
    Sub_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy6 (SHR Vx)
    ///
    /// VF is set to the least-significant bit of Vx, then VX is shifted right by 1.
    /// VY is unused.
    ShiftRight { vx: u8 },
    /// 8xy7 (SUBN Vx, Vy)
    ///
    /// Subtracts VX from VY, and stores the result in VX.
    /// VF is set to 0 when there is a borrow, set to 1 when there isn't.
    SubReverse_Vx_Vy { vx: u8, vy: u8 },
    /// 8xyE (SHL Vx)
    ///
    /// VF is set to the most-significant bit of Vx, then VX is shifted left by 1.
    /// VY is unused.
    ShiftLeft { vx: u8 },

    /// 9xy0 (SNE Vx, Vy)
    ///
    /// Skip the next instruction if register `Vx` does not equal register `Vy`.
    Skip_NotEq { vx: u8, vy: u8 },
    /// Annn (LD I, addr)
    ///
    /// Load address into register `I`.
    Load_Address { address: Address },
    /// Bnnn (JP V0, addr)
    ///
    /// Jump to location nnn + V0.
    Jump_V0 { address: Address },
    /// Cxnn (RND Vx, byte)
    ///
    /// Generate random number.
    Random { vx: u8, nn: u8 },
    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer.
    Draw { vx: u8, vy: u8, n: u8 },

    // ------------------------------------------------------------------------
    // Keyboard
    /// Ex9E (SKP Vx)
    Skip_Key { vx: u8 },
    /// ExA1 (SKNP Vx)
    Skip_NotKey { vx: u8 },

    // ------------------------------------------------------------------------
    // Miscellaneous
    /// Fx07 (LD Vx, DT)
    Load_Vx_Delay { vx: u8 },
    /// Fx0A (LD Vx, K)
    ///
    /// Wait for a key press, store the value of the key in Vx.
    Wait_Key { vx: u8 },
    /// Fx15 (LD DT, Vx)
    Load_Delay_Vx { vx: u8 },
    /// Fx18 (LD ST, Vx)
    Load_Sound_Vx { vx: u8 },
    /// Fx1E (ADD I, Vx)
    Add_Address_Vx { vx: u8 },
    /// Fx29 (LD F, Vx)
    ///
    /// Set I to the location of the font glyph for digit Vx.
    Load_Font { vx: u8 },
    /// Fx33 (LD B, Vx)
    ///
    /// Store binary-coded decimal of Vx at I, I+1 and I+2.
    Store_Bcd { vx: u8 },
    /// Fx55 (LD [I], Vx)
    ///
    /// Store registers V0 through Vx in memory starting at I.
    Store_Registers { vx: u8 },
    /// Fx65 (LD Vx, [I])
    ///
    /// Read registers V0 through Vx from memory starting at I.
    Load_Registers { vx: u8 },

    /// Word that matches no instruction.
    Unknown(u16),
}

impl Op {
    /// Decode an instruction word.
    ///
    /// Every word decodes to exactly one variant. Exact matches
    /// (`00E0`, `00EE`) are tested before the broader `0nnn` form.
    #[inline(always)]
    pub fn decode(word: u16) -> Op {
        let [a, b] = word.to_be_bytes();
        let op = a >> 4; // 0xF000
        let vx = a & 0xF; // 0x0F00
        let vy = b >> 4; // 0x00F0
        let n = b & 0xF; // 0x000F
        let nn = b; // 0x00FF
        let address = word & 0x0FFF; // 0x0FFF

        match op {
            0x0 => match word {
                0x00E0 => Op::ClearScreen,
                0x00EE => Op::Return,
                _ => Op::Sys { address },
            },
            0x1 => Op::JumpAddress { address },
            0x2 => Op::Call { address },
            0x3 => Op::Skip_Eq_Byte { vx, nn },
            0x4 => Op::Skip_NotEq_Byte { vx, nn },
            0x5 if n == 0 => Op::Skip_Eq { vx, vy },
            0x6 => Op::Load_Byte { vx, nn },
            0x7 => Op::Add_Byte { vx, nn },
            // Arithmetic instructions identified by n
            0x8 => match n {
                0x0 => Op::Load_Vx_Vy { vx, vy },
                0x1 => Op::Or_Vx_Vy { vx, vy },
                0x2 => Op::And_Vx_Vy { vx, vy },
                0x3 => Op::Xor_Vx_Vy { vx, vy },
                0x4 => Op::Add_Vx_Vy { vx, vy },
                0x5 => Op::Sub_Vx_Vy { vx, vy },
                0x6 => Op::ShiftRight { vx },
                0x7 => Op::SubReverse_Vx_Vy { vx, vy },
                0xE => Op::ShiftLeft { vx },
                _ => Op::Unknown(word),
            },
            0x9 if n == 0 => Op::Skip_NotEq { vx, vy },
            0xA => Op::Load_Address { address },
            0xB => Op::Jump_V0 { address },
            0xC => Op::Random { vx, nn },
            0xD => Op::Draw { vx, vy, n },
            0xE => match nn {
                0x9E => Op::Skip_Key { vx },
                0xA1 => Op::Skip_NotKey { vx },
                _ => Op::Unknown(word),
            },
            // Miscellaneous instructions identified by nn
            0xF => match nn {
                0x07 => Op::Load_Vx_Delay { vx },
                0x0A => Op::Wait_Key { vx },
                0x15 => Op::Load_Delay_Vx { vx },
                0x18 => Op::Load_Sound_Vx { vx },
                0x1E => Op::Add_Address_Vx { vx },
                0x29 => Op::Load_Font { vx },
                0x33 => Op::Store_Bcd { vx },
                0x55 => Op::Store_Registers { vx },
                0x65 => Op::Load_Registers { vx },
                _ => Op::Unknown(word),
            },
            _ => Op::Unknown(word),
        }
    }

    /// Decode an instruction from its two bytes as stored in memory.
    #[inline(always)]
    pub fn from_bytes(bytes: [u8; 2]) -> Op {
        Op::decode(u16::from_be_bytes(bytes))
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Op::Sys { address } => write!(f, "SYS 0x{address:03X}"),
            Op::ClearScreen => write!(f, "CLS"),
            Op::Return => write!(f, "RET"),
            Op::JumpAddress { address } => write!(f, "JP 0x{address:03X}"),
            Op::Call { address } => write!(f, "CALL 0x{address:03X}"),
            Op::Skip_Eq_Byte { vx, nn } => write!(f, "SE v{vx:X}, {nn}"),
            Op::Skip_NotEq_Byte { vx, nn } => write!(f, "SNE v{vx:X}, {nn}"),
            Op::Skip_Eq { vx, vy } => write!(f, "SE v{vx:X}, v{vy:X}"),
            Op::Load_Byte { vx, nn } => write!(f, "LD v{vx:X}, {nn}"),
            Op::Add_Byte { vx, nn } => write!(f, "ADD v{vx:X}, {nn}"),
            // ------
            Op::Load_Vx_Vy { vx, vy } => write!(f, "LD v{vx:X}, v{vy:X}"),
            Op::Or_Vx_Vy { vx, vy } => write!(f, "OR v{vx:X}, v{vy:X}"),
            Op::And_Vx_Vy { vx, vy } => write!(f, "AND v{vx:X}, v{vy:X}"),
            Op::Xor_Vx_Vy { vx, vy } => write!(f, "XOR v{vx:X}, v{vy:X}"),
            Op::Add_Vx_Vy { vx, vy } => write!(f, "ADD v{vx:X}, v{vy:X}"),
            Op::Sub_Vx_Vy { vx, vy } => write!(f, "SUB v{vx:X}, v{vy:X}"),
            Op::ShiftRight { vx } => write!(f, "SHR v{vx:X}"),
            Op::SubReverse_Vx_Vy { vx, vy } => write!(f, "SUBN v{vx:X}, v{vy:X}"),
            Op::ShiftLeft { vx } => write!(f, "SHL v{vx:X}"),
            // ------
            Op::Skip_NotEq { vx, vy } => write!(f, "SNE v{vx:X}, v{vy:X}"),
            Op::Load_Address { address } => write!(f, "LD I, 0x{address:03X}"),
            Op::Jump_V0 { address } => write!(f, "JP v0, 0x{address:03X}"),
            Op::Random { vx, nn } => write!(f, "RND v{vx:X}, {nn}"),
            Op::Draw { vx, vy, n } => write!(f, "DRW v{vx:X}, v{vy:X}, {n}"),
            // ------
            Op::Skip_Key { vx } => write!(f, "SKP v{vx:X}"),
            Op::Skip_NotKey { vx } => write!(f, "SKNP v{vx:X}"),
            // ------
            Op::Load_Vx_Delay { vx } => write!(f, "LD v{vx:X}, DT"),
            Op::Wait_Key { vx } => write!(f, "LD v{vx:X}, K"),
            Op::Load_Delay_Vx { vx } => write!(f, "LD DT, v{vx:X}"),
            Op::Load_Sound_Vx { vx } => write!(f, "LD ST, v{vx:X}"),
            Op::Add_Address_Vx { vx } => write!(f, "ADD I, v{vx:X}"),
            Op::Load_Font { vx } => write!(f, "LD F, v{vx:X}"),
            Op::Store_Bcd { vx } => write!(f, "LD B, v{vx:X}"),
            Op::Store_Registers { vx } => write!(f, "LD [I], v{vx:X}"),
            Op::Load_Registers { vx } => write!(f, "LD v{vx:X}, [I]"),
            Op::Unknown(word) => write!(f, "0x{word:04X}"),
        }
    }
}
