//! Point-in-time copies of the machine state.

use crate::cpu::memory::Memory;
use crate::cpu::registers::{Flags, Registers};
use serde::{Serialize, Deserialize};
use std::collections::VecDeque;

/// Every register, flag, memory word and queued I/O byte at one instant.
///
/// A snapshot owns its data; later steps of the simulator never change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapShot {
    // registers
    pub ac: u16,
    pub dr: u16,
    pub ir: u16,
    pub tr: u16,
    pub ar: u16,
    pub pc: u16,
    pub inpr: u16,
    pub outr: u16,
    pub sc: u8,

    // flags
    pub e: bool,
    pub s: bool,
    pub ien: bool,
    pub fgi: bool,
    pub fgo: bool,

    /// All 4096 words.
    pub memory: Vec<u16>,
    /// Bytes queued but not yet read by the machine.
    pub input_stream: Vec<u8>,
    /// Bytes written so far.
    pub output_stream: Vec<u8>,
}

impl SnapShot {
    pub fn capture(
        regs: &Registers,
        flags: &Flags,
        mem: &Memory,
        input: &VecDeque<u8>,
        output: &[u8],
    ) -> Self {
        Self {
            ac: regs.ac(),
            dr: regs.dr(),
            ir: regs.ir(),
            tr: regs.tr(),
            ar: regs.ar(),
            pc: regs.pc(),
            inpr: regs.inpr(),
            outr: regs.outr(),
            sc: regs.sc(),
            e: flags.e,
            s: flags.s,
            ien: flags.ien,
            fgi: flags.fgi,
            fgo: flags.fgo,
            memory: mem.words().to_vec(),
            input_stream: input.iter().copied().collect(),
            output_stream: output.to_vec(),
        }
    }

    /// The output stream as text, with invalid UTF-8 replaced.
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output_stream).into_owned()
    }
}
