//! Instruction decoder for the Mano basic computer.
//!
//! A Mano word is 16 bits. Memory-reference instructions (MRI) carry an
//! opcode in bits 14-12, a 12-bit address and an indirect bit (bit 15).
//! Register-reference and I/O instructions are fixed constants whose bits
//! 14-12 read `111`; exactly one of bits 11-0 selects the operation.

use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

/// Bit 15 of an MRI word.
pub const INDIRECT_BIT: u16 = 0x8000;
/// Bits 11-0 of an MRI word.
pub const ADDRESS_MASK: u16 = 0x0FFF;

/// Memory-reference operations (opcodes 0x0 to 0x6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryOp {
    /// AC := AC & M[AR]
    And,
    /// AC := AC + M[AR], E := carry
    Add,
    /// AC := M[AR]
    Lda,
    /// M[AR] := AC
    Sta,
    /// PC := AR
    Bun,
    /// M[AR] := PC, PC := AR + 1
    Bsa,
    /// M[AR] := M[AR] + 1, skip if zero
    Isz,
}

impl MemoryOp {
    pub const ALL: [MemoryOp; 7] = [
        MemoryOp::And,
        MemoryOp::Add,
        MemoryOp::Lda,
        MemoryOp::Sta,
        MemoryOp::Bun,
        MemoryOp::Bsa,
        MemoryOp::Isz,
    ];

    /// The 3-bit opcode stored in bits 14-12.
    pub fn opcode(self) -> u16 {
        match self {
            MemoryOp::And => 0x0,
            MemoryOp::Add => 0x1,
            MemoryOp::Lda => 0x2,
            MemoryOp::Sta => 0x3,
            MemoryOp::Bun => 0x4,
            MemoryOp::Bsa => 0x5,
            MemoryOp::Isz => 0x6,
        }
    }

    pub fn from_opcode(opcode: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.opcode() == opcode)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            MemoryOp::And => "AND",
            MemoryOp::Add => "ADD",
            MemoryOp::Lda => "LDA",
            MemoryOp::Sta => "STA",
            MemoryOp::Bun => "BUN",
            MemoryOp::Bsa => "BSA",
            MemoryOp::Isz => "ISZ",
        }
    }
}

/// Register-reference operations (`0x7xxx`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterOp {
    Cla,
    Cle,
    Cma,
    Cme,
    Cir,
    Cil,
    Inc,
    Spa,
    Sna,
    Sza,
    Sze,
    Hlt,
}

impl RegisterOp {
    pub const ALL: [RegisterOp; 12] = [
        RegisterOp::Cla,
        RegisterOp::Cle,
        RegisterOp::Cma,
        RegisterOp::Cme,
        RegisterOp::Cir,
        RegisterOp::Cil,
        RegisterOp::Inc,
        RegisterOp::Spa,
        RegisterOp::Sna,
        RegisterOp::Sza,
        RegisterOp::Sze,
        RegisterOp::Hlt,
    ];

    /// The full 16-bit encoding.
    pub fn code(self) -> u16 {
        match self {
            RegisterOp::Cla => 0x7800,
            RegisterOp::Cle => 0x7400,
            RegisterOp::Cma => 0x7200,
            RegisterOp::Cme => 0x7100,
            RegisterOp::Cir => 0x7080,
            RegisterOp::Cil => 0x7040,
            RegisterOp::Inc => 0x7020,
            RegisterOp::Spa => 0x7010,
            RegisterOp::Sna => 0x7008,
            RegisterOp::Sza => 0x7004,
            RegisterOp::Sze => 0x7002,
            RegisterOp::Hlt => 0x7001,
        }
    }

    pub fn from_code(word: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == word)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            RegisterOp::Cla => "CLA",
            RegisterOp::Cle => "CLE",
            RegisterOp::Cma => "CMA",
            RegisterOp::Cme => "CME",
            RegisterOp::Cir => "CIR",
            RegisterOp::Cil => "CIL",
            RegisterOp::Inc => "INC",
            RegisterOp::Spa => "SPA",
            RegisterOp::Sna => "SNA",
            RegisterOp::Sza => "SZA",
            RegisterOp::Sze => "SZE",
            RegisterOp::Hlt => "HLT",
        }
    }
}

/// Input/output operations (`0xFxxx`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IoOp {
    Inp,
    Out,
    Ski,
    Sko,
    Ion,
    Iof,
}

impl IoOp {
    pub const ALL: [IoOp; 6] = [IoOp::Inp, IoOp::Out, IoOp::Ski, IoOp::Sko, IoOp::Ion, IoOp::Iof];

    /// The full 16-bit encoding.
    pub fn code(self) -> u16 {
        match self {
            IoOp::Inp => 0xF800,
            IoOp::Out => 0xF400,
            IoOp::Ski => 0xF200,
            IoOp::Sko => 0xF100,
            IoOp::Ion => 0xF080,
            IoOp::Iof => 0xF040,
        }
    }

    pub fn from_code(word: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == word)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            IoOp::Inp => "INP",
            IoOp::Out => "OUT",
            IoOp::Ski => "SKI",
            IoOp::Sko => "SKO",
            IoOp::Ion => "ION",
            IoOp::Iof => "IOF",
        }
    }
}

/// Any instruction mnemonic of the machine (directives excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Memory(MemoryOp),
    Register(RegisterOp),
    Io(IoOp),
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Memory(op) => op.mnemonic(),
            Opcode::Register(op) => op.mnemonic(),
            Opcode::Io(op) => op.mnemonic(),
        }
    }
}

impl FromStr for Opcode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(op) = MemoryOp::ALL.into_iter().find(|op| op.mnemonic() == s) {
            return Ok(Opcode::Memory(op));
        }
        if let Some(op) = RegisterOp::ALL.into_iter().find(|op| op.mnemonic() == s) {
            return Ok(Opcode::Register(op));
        }
        IoOp::ALL
            .into_iter()
            .find(|op| op.mnemonic() == s)
            .map(Opcode::Io)
            .ok_or(())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded 16-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Memory-reference instruction.
    Memory { op: MemoryOp, address: u16, indirect: bool },
    /// Register-reference instruction.
    Register(RegisterOp),
    /// Input/output instruction.
    Io(IoOp),
    /// A `111` word that matches none of the fixed constants.
    Unknown(u16),
}

/// Fields the T2 decode state extracts from IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields {
    /// Bits 14-12.
    pub opcode: u16,
    /// Bits 11-0.
    pub address: u16,
    /// Bit 15.
    pub indirect: bool,
}

impl Fields {
    pub fn of(word: u16) -> Self {
        Self {
            opcode: (word >> 12) & 0x7,
            address: word & ADDRESS_MASK,
            indirect: word & INDIRECT_BIT != 0,
        }
    }
}

/// Decode a 16-bit word.
pub fn decode(word: u16) -> Operation {
    let fields = Fields::of(word);
    if let Some(op) = MemoryOp::from_opcode(fields.opcode) {
        return Operation::Memory { op, address: fields.address, indirect: fields.indirect };
    }
    if let Some(op) = RegisterOp::from_code(word) {
        return Operation::Register(op);
    }
    match IoOp::from_code(word) {
        Some(op) => Operation::Io(op),
        None => Operation::Unknown(word),
    }
}

/// Encode an instruction back to a 16-bit word.
///
/// MRI addresses are masked to 12 bits.
pub fn encode(operation: &Operation) -> u16 {
    match *operation {
        Operation::Memory { op, address, indirect } => {
            let indirect_bit = if indirect { INDIRECT_BIT } else { 0 };
            (op.opcode() << 12) | (address & ADDRESS_MASK) | indirect_bit
        }
        Operation::Register(op) => op.code(),
        Operation::Io(op) => op.code(),
        Operation::Unknown(word) => word,
    }
}
