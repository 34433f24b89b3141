//! Mano CPU registers and flags.
//!
//! The register file:
//! - AC, DR, IR, TR: 16-bit
//! - AR, PC: 12-bit
//! - INPR, OUTR: 8-bit
//! - SC: 4-bit sequence counter
//!
//! Every setter masks to the register width. Arithmetic on the machine is
//! modular over these widths; there is no separate signed representation.

use serde::{Serialize, Deserialize};

pub const WORD_MASK: u16 = 0xFFFF;
pub const ADDRESS_MASK: u16 = 0x0FFF;
pub const BYTE_MASK: u16 = 0x00FF;
pub const SC_MASK: u8 = 0x0F;

/// The Mano register file.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    ac: u16,
    dr: u16,
    ir: u16,
    tr: u16,
    ar: u16,
    pc: u16,
    inpr: u16,
    outr: u16,
    sc: u8,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // ==================== 16-bit ====================

    /// Accumulator.
    pub fn ac(&self) -> u16 {
        self.ac
    }

    pub fn set_ac(&mut self, value: u32) {
        self.ac = (value & WORD_MASK as u32) as u16;
    }

    /// Data register.
    pub fn dr(&self) -> u16 {
        self.dr
    }

    pub fn set_dr(&mut self, value: u32) {
        self.dr = (value & WORD_MASK as u32) as u16;
    }

    /// Instruction register.
    pub fn ir(&self) -> u16 {
        self.ir
    }

    pub fn set_ir(&mut self, value: u32) {
        self.ir = (value & WORD_MASK as u32) as u16;
    }

    /// Temporary register.
    pub fn tr(&self) -> u16 {
        self.tr
    }

    pub fn set_tr(&mut self, value: u32) {
        self.tr = (value & WORD_MASK as u32) as u16;
    }

    // ==================== 12-bit ====================

    /// Address register.
    pub fn ar(&self) -> u16 {
        self.ar
    }

    pub fn set_ar(&mut self, value: u32) {
        self.ar = (value & ADDRESS_MASK as u32) as u16;
    }

    /// Program counter.
    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, value: u32) {
        self.pc = (value & ADDRESS_MASK as u32) as u16;
    }

    /// Increment the program counter by 1 (wrapping at 12 bits).
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.set_pc(old as u32 + 1);
        old
    }

    // ==================== 8-bit ====================

    /// Input register.
    pub fn inpr(&self) -> u16 {
        self.inpr
    }

    pub fn set_inpr(&mut self, value: u32) {
        self.inpr = (value & BYTE_MASK as u32) as u16;
    }

    /// Output register.
    pub fn outr(&self) -> u16 {
        self.outr
    }

    pub fn set_outr(&mut self, value: u32) {
        self.outr = (value & BYTE_MASK as u32) as u16;
    }

    // ==================== Sequence counter ====================

    pub fn sc(&self) -> u8 {
        self.sc
    }

    pub fn set_sc(&mut self, value: u32) {
        self.sc = (value & SC_MASK as u32) as u8;
    }
}

impl std::fmt::Debug for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AC={:04X} DR={:04X} IR={:04X} TR={:04X} AR={:03X} PC={:03X} INPR={:02X} OUTR={:02X} SC={}",
            self.ac, self.dr, self.ir, self.tr, self.ar, self.pc, self.inpr, self.outr, self.sc
        )
    }
}

/// The one-bit flip-flops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    /// Carry out of the adder; also the 17th bit of CIR/CIL.
    pub e: bool,
    /// Start/stop. HLT clears it.
    pub s: bool,
    /// Interrupt enable.
    pub ien: bool,
    /// Input flag: set when INPR may be read.
    pub fgi: bool,
    /// Output flag: set when OUTR may be written.
    pub fgo: bool,
}

impl Flags {
    /// Power-on state: running, both I/O flags ready.
    pub fn new() -> Self {
        Self { e: false, s: true, ien: false, fgi: true, fgo: true }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Flags {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_setters_mask_to_width() {
        let mut regs = Registers::new();
        regs.set_ac(0x1_2345);
        regs.set_pc(0x1234);
        regs.set_ar(0xFFFF);
        regs.set_inpr(0x1FF);
        regs.set_outr(0x141);
        regs.set_sc(0x13);

        assert_eq!(regs.ac(), 0x2345);
        assert_eq!(regs.pc(), 0x234);
        assert_eq!(regs.ar(), 0xFFF);
        assert_eq!(regs.inpr(), 0xFF);
        assert_eq!(regs.outr(), 0x41);
        assert_eq!(regs.sc(), 0x3);
    }

    #[test]
    fn test_advance_pc_wraps() {
        let mut regs = Registers::new();
        regs.set_pc(0xFFF);

        let old = regs.advance_pc();
        assert_eq!(old, 0xFFF);
        assert_eq!(regs.pc(), 0);
    }

    #[test]
    fn test_flags_power_on() {
        let flags = Flags::new();
        assert!(flags.s);
        assert!(flags.fgi);
        assert!(flags.fgo);
        assert!(!flags.e);
        assert!(!flags.ien);
    }

    proptest! {
        #[test]
        fn prop_word_registers_wrap(value in any::<u32>()) {
            let mut regs = Registers::new();
            regs.set_ac(value);
            regs.set_dr(value);
            regs.set_tr(value);
            prop_assert_eq!(regs.ac() as u32, value % 0x1_0000);
            prop_assert_eq!(regs.dr() as u32, value % 0x1_0000);
            prop_assert_eq!(regs.tr() as u32, value % 0x1_0000);
        }

        #[test]
        fn prop_address_registers_wrap(value in any::<u32>()) {
            let mut regs = Registers::new();
            regs.set_ar(value);
            regs.set_pc(value);
            prop_assert_eq!(regs.ar() as u32, value % 0x1000);
            prop_assert_eq!(regs.pc() as u32, value % 0x1000);
        }
    }
}
