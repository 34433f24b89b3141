//! The assembled program handed from the assembler to the simulator.

use serde::{Serialize, Deserialize};
use std::fmt;

/// One emitted code word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Absolute memory address (0-4095).
    pub origin: u16,
    /// Resolved machine word.
    pub binary: u16,
    /// Source text of the line that produced this word.
    pub source_line: String,
    /// 1-based source line number.
    pub source_line_number: usize,
}

/// One `DEC`/`HEX` literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub origin: u16,
    pub binary: u16,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03X}: {:016b}  ; line {}: {}",
            self.origin, self.binary, self.source_line_number, self.source_line
        )
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03X}: {:016b}", self.origin, self.binary)
    }
}

/// Instructions and data words, each in emission order.
///
/// Two entries may share an origin only when the source reused an address
/// through `ORG`; loading is last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub data: Vec<Data>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// The address execution starts from: the origin of the first instruction.
    pub fn entry_point(&self) -> Option<u16> {
        self.instructions.first().map(|i| i.origin)
    }

    /// Total number of emitted words.
    pub fn len(&self) -> usize {
        self.instructions.len() + self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty() && self.data.is_empty()
    }

    /// Every `(origin, word)` pair, instructions first, in load order.
    pub fn words(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.instructions
            .iter()
            .map(|i| (i.origin, i.binary))
            .chain(self.data.iter().map(|d| (d.origin, d.binary)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_point_is_first_instruction() {
        let mut program = Program::new();
        assert_eq!(program.entry_point(), None);

        program.data.push(Data { origin: 0x10, binary: 5 });
        program.instructions.push(Instruction {
            origin: 0x20,
            binary: 0x7001,
            source_line: "HLT".into(),
            source_line_number: 3,
        });
        assert_eq!(program.entry_point(), Some(0x20));
        assert_eq!(program.len(), 2);
        assert_eq!(program.words().collect::<Vec<_>>(), vec![(0x20, 0x7001), (0x10, 5)]);
    }
}
