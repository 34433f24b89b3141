//! Disassembler for Mano programs.
//!
//! Converts machine words back to readable assembly. Addresses are printed
//! in hex, so the output documents a program rather than reassembling it.

use crate::asm::program::Program;
use crate::cpu::decode::{decode, Operation};
use crate::cpu::memory::Memory;

/// Disassemble a single word to text.
pub fn disassemble_word(word: u16) -> String {
    format_operation(&decode(word))
}

/// Disassemble every instruction and data word of a program, sorted by
/// address.
pub fn disassemble(program: &Program) -> String {
    let mut output = String::new();
    output.push_str("; Mano Disassembly\n");
    output.push_str("; ----------------\n\n");

    let mut words: Vec<(u16, u16, bool)> = program
        .instructions
        .iter()
        .map(|i| (i.origin, i.binary, true))
        .chain(program.data.iter().map(|d| (d.origin, d.binary, false)))
        .collect();
    words.sort_by_key(|(origin, _, _)| *origin);

    for (origin, word, is_code) in words {
        let text = if is_code {
            disassemble_word(word)
        } else {
            format!("HEX {:X}", word)
        };
        output.push_str(&format!("{:03X}: {:04X}  {}\n", origin, word, text));
    }

    output
}

/// Disassemble the non-zero words of a memory image.
pub fn disassemble_memory(memory: &Memory) -> String {
    let mut output = String::new();
    for (addr, word) in memory.non_zero() {
        output.push_str(&format!("{:03X}: {:04X}  {}\n", addr, word, disassemble_word(word)));
    }
    output
}

fn format_operation(operation: &Operation) -> String {
    match *operation {
        Operation::Memory { op, address, indirect } => {
            if indirect {
                format!("{} {:03X} I", op.mnemonic(), address)
            } else {
                format!("{} {:03X}", op.mnemonic(), address)
            }
        }
        Operation::Register(op) => op.mnemonic().to_string(),
        Operation::Io(op) => op.mnemonic().to_string(),
        Operation::Unknown(word) => format!("??? {:04X}", word),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::cpu::decode::{encode, MemoryOp};

    #[test]
    fn test_disassemble_hlt() {
        assert_eq!(disassemble_word(0x7001), "HLT");
        assert_eq!(disassemble_word(0xF400), "OUT");
    }

    #[test]
    fn test_disassemble_mri() {
        let word = encode(&Operation::Memory { op: MemoryOp::Lda, address: 0x101, indirect: true });
        assert_eq!(disassemble_word(word), "LDA 101 I");
        assert_eq!(disassemble_word(0x4200), "BUN 200");
    }

    #[test]
    fn test_disassemble_unknown() {
        assert_eq!(disassemble_word(0x7003), "??? 7003");
    }

    #[test]
    fn test_listing_is_sorted_by_address() {
        let program = assemble("ORG 10\nLDA X\nHLT\nORG 5\nX, DEC 7\nEND").unwrap();
        let listing = disassemble(&program);
        let body: Vec<_> = listing.lines().skip(3).collect();
        assert_eq!(body, ["005: 0007  HEX 7", "010: 2005  LDA 005", "011: 7001  HLT"]);
    }
}
