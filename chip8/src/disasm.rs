//! Disassembler.
use std::fmt::{self, Write as FmtWrite};

use crate::{
    bytecode::Op,
    constants::{Address, MEM_START},
};

/// Linear disassembler that prints one line per instruction word.
///
/// No attempt is made to separate sprite data from code, so
/// data blocks are shown as whatever instruction their bytes decode to.
pub struct Disassembler<'a> {
    bytecode: &'a [u8],
    /// Memory address the bytecode is loaded at.
    origin: Address,
}

impl<'a> Disassembler<'a> {
    pub fn new(bytecode: &'a [u8]) -> Self {
        Self::with_origin(bytecode, MEM_START as Address)
    }

    pub fn with_origin(bytecode: &'a [u8], origin: Address) -> Self {
        Self { bytecode, origin }
    }

    pub fn print_bytecode(&self) -> fmt::Result {
        let mut s = String::new();
        self.disassemble(&mut s)?;
        print!("{s}");
        Ok(())
    }

    /// Write the whole program to the given writer.
    ///
    /// Each line holds the address, the raw word and the mnemonic:
    ///
    /// ```text
    /// 0200: 00E0  CLS
    /// ```
    pub fn disassemble<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        let mut chunks = self.bytecode.chunks_exact(2);

        for (index, chunk) in chunks.by_ref().enumerate() {
            let bytes = [chunk[0], chunk[1]];
            let op = Op::from_bytes(bytes);
            writeln!(
                w,
                "{:04X}: {:04X}  {op}",
                self.address_of(index * 2),
                u16::from_be_bytes(bytes)
            )?;
        }

        // Trailing odd byte can't form an instruction.
        if let [byte] = chunks.remainder() {
            let cursor = self.bytecode.len() - 1;
            writeln!(w, "{:04X}: {byte:02X}    db 0x{byte:02X}", self.address_of(cursor))?;
        }

        Ok(())
    }

    #[inline]
    fn address_of(&self, cursor: usize) -> usize {
        self.origin as usize + cursor
    }
}
