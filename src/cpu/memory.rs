//! Mano memory subsystem.
//!
//! 4096 sixteen-bit words, plus a parallel table recording which source
//! instruction was loaded at each address. The table is only for display.

use crate::asm::{Instruction, Program};
use serde::{Serialize, Deserialize};

/// The number of memory words.
pub const MEMORY_SIZE: usize = 4096;

/// Mano memory: 4096 words.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    words: Vec<u16>,
    code: Vec<Option<Instruction>>,
}

impl Memory {
    /// Create a new memory with all words zeroed.
    pub fn new() -> Self {
        Self {
            words: vec![0; MEMORY_SIZE],
            code: vec![None; MEMORY_SIZE],
        }
    }

    /// Read a word. The address is taken modulo 4096, as AR is 12 bits.
    #[inline]
    pub fn read(&self, addr: u16) -> u16 {
        self.words[Self::index(addr)]
    }

    /// Write a word. The address is taken modulo 4096.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        self.words[Self::index(addr)] = value;
    }

    /// The source instruction loaded at `addr`, if any.
    pub fn source_at(&self, addr: u16) -> Option<&Instruction> {
        self.code[Self::index(addr)].as_ref()
    }

    /// The whole memory image.
    pub fn words(&self) -> &[u16] {
        &self.words
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
        self.code.iter_mut().for_each(|c| *c = None);
    }

    /// Check that every entry of `program` fits in memory.
    pub fn check_program(program: &Program) -> Result<(), MemoryError> {
        match program.words().find(|(origin, _)| *origin as usize >= MEMORY_SIZE) {
            Some((origin, _)) => Err(MemoryError::AddressOutOfRange(origin)),
            None => Ok(()),
        }
    }

    /// Write every instruction and data word at its origin.
    ///
    /// Instructions are written first, then data; a later entry at the same
    /// origin overwrites an earlier one.
    pub fn load_program(&mut self, program: &Program) -> Result<(), MemoryError> {
        Self::check_program(program)?;

        for instr in &program.instructions {
            self.words[instr.origin as usize] = instr.binary;
            self.code[instr.origin as usize] = Some(instr.clone());
        }
        for data in &program.data {
            self.words[data.origin as usize] = data.binary;
        }

        Ok(())
    }

    /// Every `(address, word)` pair whose word is non-zero.
    pub fn non_zero(&self) -> impl Iterator<Item = (usize, u16)> + '_ {
        self.words.iter().copied().enumerate().filter(|(_, w)| *w != 0)
    }

    #[inline]
    fn index(addr: u16) -> usize {
        addr as usize % MEMORY_SIZE
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("non_zero_words", &self.non_zero().count())
            .field("total_words", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// A program entry's origin lies outside 0x000-0xFFF.
    #[error("memory address {0:#X} out of range (0x000 to 0xFFF)")]
    AddressOutOfRange(u16),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::Data;

    fn instr(origin: u16, binary: u16) -> Instruction {
        Instruction { origin, binary, source_line: String::new(), source_line_number: 1 }
    }

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        mem.write(10, 0xBEEF);
        assert_eq!(mem.read(10), 0xBEEF);
    }

    #[test]
    fn test_address_wraps_at_4096() {
        let mut mem = Memory::new();
        mem.write(0x1005, 7);
        assert_eq!(mem.read(5), 7);
    }

    #[test]
    fn test_load_program_last_write_wins() {
        let mut mem = Memory::new();
        let program = Program {
            instructions: vec![instr(0x100, 0x7001), instr(0x101, 0x7800)],
            data: vec![Data { origin: 0x101, binary: 42 }],
        };

        mem.load_program(&program).unwrap();

        assert_eq!(mem.read(0x100), 0x7001);
        assert_eq!(mem.read(0x101), 42);
        assert_eq!(mem.source_at(0x100).map(|i| i.binary), Some(0x7001));
        assert!(mem.source_at(0x102).is_none());
    }

    #[test]
    fn test_load_program_rejects_out_of_range_origin() {
        let mut mem = Memory::new();
        mem.write(3, 3);
        let program = Program {
            instructions: vec![instr(0x000, 0x7001)],
            data: vec![Data { origin: 0x1000, binary: 1 }],
        };

        assert_eq!(mem.load_program(&program), Err(MemoryError::AddressOutOfRange(0x1000)));
        assert_eq!(mem.read(0), 0);
        assert_eq!(mem.read(3), 3);
    }
}
