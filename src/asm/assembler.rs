//! Two-pass assembler for Mano programs.
//!
//! Syntax:
//! ```text
//! // Comment
//!         ORG 100         // Set the location counter (hex)
//! START,  LDA NUM         // Label, MRI with a symbolic address
//!         ADD PTR I       // Indirect addressing
//!         STA 260         // Decimal absolute address
//!         CMA             // Register-reference
//!         OUT             // I/O
//!         HLT
//! NUM,    DEC -5          // Decimal data word
//! PTR,    HEX 1F0         // Hexadecimal data word
//!         END
//! ```
//!
//! Pass 1 assigns an address to every label; pass 2 emits the words.
//! Every call starts from an empty symbol table.

use crate::asm::error::{AssemblerError, ErrorKind, SemanticError};
use crate::asm::lexer::{tokenize, Directive, Keyword, Token, TokenKind};
use crate::asm::parser::{parse, Line};
use crate::asm::program::{Data, Instruction, Program};
use crate::cpu::decode::{encode, MemoryOp, Opcode, Operation, ADDRESS_MASK};
use crate::cpu::memory::MEMORY_SIZE;
use crate::event::{EventSink, LogContext, LogSink};
use std::collections::BTreeMap;

/// Label name to address.
pub type SymbolTable = BTreeMap<String, u16>;

/// Assemble source code into a program, reporting to the `log` facade.
pub fn assemble(source: &str) -> Result<Program, AssemblerError> {
    Assembler::new().assemble(source)
}

/// Assemble source code, reporting progress and errors to `sink`.
pub fn assemble_with<S: EventSink>(source: &str, sink: &mut S) -> Result<Program, AssemblerError> {
    Assembler::with_sink(sink).assemble(source)
}

/// The assembler state.
pub struct Assembler<S: EventSink = LogSink> {
    /// Symbol table of the most recent run.
    symbols: SymbolTable,
    sink: S,
}

impl Assembler<LogSink> {
    pub fn new() -> Self {
        Self::with_sink(LogSink)
    }
}

impl Default for Assembler<LogSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> Assembler<S> {
    pub fn with_sink(sink: S) -> Self {
        Self { symbols: SymbolTable::new(), sink }
    }

    /// Labels resolved by the last call to [`assemble`](Self::assemble).
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Assemble `source`. Fails on the first violation; no partial program
    /// is returned.
    pub fn assemble(&mut self, source: &str) -> Result<Program, AssemblerError> {
        self.symbols.clear();

        match self.run(source) {
            Ok(program) => {
                self.sink.success(
                    LogContext::Assembler,
                    format!(
                        "Program compiled successfully: {} instruction(s), {} data word(s).",
                        program.instructions.len(),
                        program.data.len()
                    ),
                );
                Ok(program)
            }
            Err(err) => {
                let context = match err.kind() {
                    ErrorKind::Lexical => LogContext::Lexer,
                    ErrorKind::Syntax => LogContext::Parser,
                    ErrorKind::Semantic => LogContext::Assembler,
                };
                self.sink.error(context, err.to_string());
                Err(err)
            }
        }
    }

    fn run(&mut self, source: &str) -> Result<Program, AssemblerError> {
        let tokens = tokenize(source)?;
        self.sink.info(LogContext::Lexer, format!("{} token(s)", tokens.len()));

        let lines = parse(&tokens)?;
        self.sink.info(LogContext::Parser, format!("{} statement line(s)", lines.len()));

        check_end(&tokens)?;
        self.first_pass(&lines, &tokens)?;
        let program = self.second_pass(&lines)?;

        Ok(program)
    }

    // ==================== Pass 1 ====================

    fn first_pass(&mut self, lines: &[Line], tokens: &[Token]) -> Result<(), SemanticError> {
        let mut lc: u16 = 0;

        for line in lines {
            match line.keyword {
                Keyword::Directive(Directive::Org) => {
                    lc = parse_origin(&line.operands()[0])?;
                    if let Some(label) = &line.label {
                        self.define(label, lc)?;
                    }
                }
                Keyword::Directive(Directive::End) => {
                    if let Some(label) = &line.label {
                        self.define(label, lc)?;
                    }
                    break;
                }
                _ => {
                    if let Some(label) = &line.label {
                        self.define(label, lc)?;
                    }
                    lc = next_location(lc, line.head())?;
                }
            }
        }

        // Every symbol anywhere in the stream must now be known.
        for token in tokens.iter().filter(|t| t.kind == TokenKind::Identifier) {
            if !self.symbols.contains_key(&token.lexeme) {
                return Err(SemanticError::UndefinedLabel {
                    line: token.line,
                    column: token.column,
                    label: token.lexeme.clone(),
                });
            }
        }

        Ok(())
    }

    fn define(&mut self, label: &Token, address: u16) -> Result<(), SemanticError> {
        if self.symbols.contains_key(&label.lexeme) {
            return Err(SemanticError::DuplicateLabel {
                line: label.line,
                column: label.column,
                label: label.lexeme.clone(),
            });
        }
        self.sink.info(
            LogContext::Assembler,
            format!("label {} = {:03X}", label.lexeme, address),
        );
        self.symbols.insert(label.lexeme.clone(), address);
        Ok(())
    }

    // ==================== Pass 2 ====================

    fn second_pass(&mut self, lines: &[Line]) -> Result<Program, SemanticError> {
        let mut program = Program::new();
        let mut lc: u16 = 0;

        for line in lines {
            let head = line.head();
            match line.keyword {
                Keyword::Directive(Directive::Org) => {
                    lc = parse_origin(&line.operands()[0])?;
                    self.sink.info(LogContext::Directive, format!("ORG: LC <- {:03X}", lc));
                    continue;
                }
                Keyword::Directive(Directive::End) => {
                    self.sink.info(LogContext::Directive, "END");
                    break;
                }
                Keyword::Directive(Directive::Dec) => {
                    let binary = parse_dec(&line.operands()[0])?;
                    self.sink.info(LogContext::Directive, format!("DEC: M[{:03X}] <- {:04X}", lc, binary));
                    program.data.push(Data { origin: lc, binary });
                }
                Keyword::Directive(Directive::Hex) => {
                    let binary = parse_hex(&line.operands()[0])?;
                    self.sink.info(LogContext::Directive, format!("HEX: M[{:03X}] <- {:04X}", lc, binary));
                    program.data.push(Data { origin: lc, binary });
                }
                Keyword::Op(opcode) => {
                    let binary = self.encode_line(opcode, line.operands())?;
                    self.sink.info(
                        LogContext::Assembler,
                        format!("{:03X}: {:04X}  {}", lc, binary, line.source()),
                    );
                    program.instructions.push(Instruction {
                        origin: lc,
                        binary,
                        source_line: line.source().to_string(),
                        source_line_number: line.number,
                    });
                }
            }
            lc = next_location(lc, head)?;
        }

        Ok(program)
    }

    fn encode_line(&self, opcode: Opcode, operands: &[Token]) -> Result<u16, SemanticError> {
        let operation = match opcode {
            Opcode::Memory(op) => self.memory_operation(op, operands)?,
            Opcode::Register(op) => Operation::Register(op),
            Opcode::Io(op) => Operation::Io(op),
        };
        Ok(encode(&operation))
    }

    fn memory_operation(&self, op: MemoryOp, operands: &[Token]) -> Result<Operation, SemanticError> {
        let operand = &operands[0];
        let address = match operand.kind {
            TokenKind::NumberDec => decimal_address(&operand.lexeme),
            _ => self
                .symbols
                .get(&operand.lexeme)
                .copied()
                .ok_or_else(|| SemanticError::UndefinedLabel {
                    line: operand.line,
                    column: operand.column,
                    label: operand.lexeme.clone(),
                })?,
        };
        let indirect = operands.get(1).map_or(false, |marker| marker.kind == TokenKind::Indirection);

        Ok(Operation::Memory { op, address, indirect })
    }
}

/// Exactly one END, and it must be the last token.
fn check_end(tokens: &[Token]) -> Result<(), SemanticError> {
    let (line, column) = tokens.last().map_or((0, 0), |t| (t.line, t.column));
    let mut ends = tokens.iter().filter(|t| t.is_directive(Directive::End));

    if ends.next().is_none() {
        return Err(SemanticError::MissingEnd { line, column });
    }
    if let Some(second) = ends.next() {
        return Err(SemanticError::MultipleEnd { line: second.line, column: second.column });
    }
    match tokens.last() {
        Some(last) if last.is_directive(Directive::End) => Ok(()),
        _ => Err(SemanticError::EndNotLast { line, column }),
    }
}

/// Advance the location counter past a word emitted at `lc`.
fn next_location(lc: u16, at: &Token) -> Result<u16, SemanticError> {
    if lc as usize >= MEMORY_SIZE {
        return Err(SemanticError::AddressOverflow { line: at.line, column: at.column });
    }
    Ok(lc + 1)
}

fn parse_origin(token: &Token) -> Result<u16, SemanticError> {
    match u32::from_str_radix(&token.lexeme, 16) {
        Ok(value) if value <= ADDRESS_MASK as u32 => Ok(value as u16),
        _ => Err(SemanticError::OriginOutOfRange {
            line: token.line,
            column: token.column,
            value: token.lexeme.clone(),
        }),
    }
}

/// `DEC` literal as a 16-bit two's-complement word.
fn parse_dec(token: &Token) -> Result<u16, SemanticError> {
    match token.lexeme.parse::<i16>() {
        Ok(value) => Ok(value as u16),
        Err(_) => Err(SemanticError::DecOutOfRange {
            line: token.line,
            column: token.column,
            value: token.lexeme.clone(),
        }),
    }
}

fn parse_hex(token: &Token) -> Result<u16, SemanticError> {
    u16::from_str_radix(&token.lexeme, 16).map_err(|_| SemanticError::HexOutOfRange {
        line: token.line,
        column: token.column,
        value: token.lexeme.clone(),
    })
}

/// A literal decimal MRI address, masked to 12 bits.
fn decimal_address(lexeme: &str) -> u16 {
    lexeme
        .bytes()
        .filter(u8::is_ascii_digit)
        .fold(0u32, |acc, d| (acc * 10 + (d - b'0') as u32) % MEMORY_SIZE as u32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventLog, LogLevel};
    use proptest::prelude::*;

    fn semantic(source: &str) -> SemanticError {
        match assemble(source) {
            Err(AssemblerError::Semantic(e)) => e,
            other => panic!("expected semantic error, got {:?}", other),
        }
    }

    #[test]
    fn test_assemble_round_trip_example() {
        let program = assemble("ORG 100 \n START, LDA NUM \n HLT \n NUM, DEC 5 \n END").unwrap();

        let words: Vec<_> = program.instructions.iter().map(|i| (i.origin, i.binary)).collect();
        assert_eq!(words, vec![(0x100, 0x2102), (0x101, 0x7001)]);
        assert_eq!(program.data, vec![Data { origin: 0x102, binary: 0x0005 }]);
        assert_eq!(program.instructions[0].source_line, "START, LDA NUM");
        assert_eq!(program.instructions[0].source_line_number, 2);
    }

    #[test]
    fn test_forward_reference_and_indirection() {
        let source = "
            ORG 200
     MAIN,  LDA VALUE, I
            ISZ VALUE
            BUN MAIN
     VALUE, DEC 3
     BUF,   HEX FF
            END
        ";
        let program = assemble(source).unwrap();
        let words: Vec<_> = program.instructions.iter().map(|i| i.binary).collect();
        assert_eq!(words, vec![0xA203, 0x6203, 0x4200]);
        assert_eq!(program.data[1], Data { origin: 0x204, binary: 0x00FF });
    }

    #[test]
    fn test_labels_match_emitted_positions_across_org() {
        let source = "
            ORG 10
     A,     CLA
     B,     HLT
            ORG 40
     C,     DEC 1
     D,     BUN A
            END
        ";
        let mut asm = Assembler::new();
        let program = asm.assemble(source).unwrap();

        let symbols = asm.symbols();
        assert_eq!(symbols["A"], 0x10);
        assert_eq!(symbols["B"], 0x11);
        assert_eq!(symbols["C"], 0x40);
        assert_eq!(symbols["D"], 0x41);
        assert_eq!(program.instructions[0].origin, symbols["A"]);
        assert_eq!(program.instructions[1].origin, symbols["B"]);
        assert_eq!(program.data[0].origin, symbols["C"]);
        assert_eq!(program.instructions[2].origin, symbols["D"]);
        assert_eq!(program.instructions[2].binary, 0x4010);
    }

    #[test]
    fn test_register_and_io_constants() {
        let program = assemble("CLA\nCIL\nINP\nSKO\nIOF\nHLT\nEND").unwrap();
        let words: Vec<_> = program.instructions.iter().map(|i| i.binary).collect();
        assert_eq!(words, vec![0x7800, 0x7040, 0xF800, 0xF100, 0xF040, 0x7001]);
        let origins: Vec<_> = program.instructions.iter().map(|i| i.origin).collect();
        assert_eq!(origins, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_decimal_address_is_masked() {
        let program = assemble("HLT\nLDA 4097\nEND").unwrap();
        assert_eq!(program.instructions[1].binary, 0x2001);
    }

    #[test]
    fn test_dec_range() {
        let program = assemble("HLT\nX, DEC -1\nY, DEC -32768\nZ, DEC 32767\nEND").unwrap();
        let words: Vec<_> = program.data.iter().map(|d| d.binary).collect();
        assert_eq!(words, vec![0xFFFF, 0x8000, 0x7FFF]);

        assert!(matches!(semantic("HLT\nX, DEC 32768\nEND"), SemanticError::DecOutOfRange { .. }));
        assert!(matches!(semantic("HLT\nX, DEC -32769\nEND"), SemanticError::DecOutOfRange { .. }));
    }

    #[test]
    fn test_hex_and_org_range() {
        assert!(matches!(semantic("HLT\nX, HEX 10000\nEND"), SemanticError::HexOutOfRange { .. }));
        assert!(matches!(semantic("ORG 1000\nHLT\nEND"), SemanticError::OriginOutOfRange { .. }));
        assert!(matches!(
            semantic("ORG FFF\nHLT\nCLA\nEND"),
            SemanticError::AddressOverflow { line: 3, .. }
        ));
    }

    #[test]
    fn test_end_rules() {
        assert!(matches!(semantic("ORG 100\nHLT"), SemanticError::MissingEnd { .. }));
        assert!(matches!(semantic(""), SemanticError::MissingEnd { line: 0, column: 0 }));
        assert!(matches!(
            semantic("ORG 100\nSTART, LDA START\nEND\nEND"),
            SemanticError::MultipleEnd { line: 4, .. }
        ));
        assert!(matches!(
            semantic("ORG 100\nNUM, DEC 10\nEND\nADD NUM"),
            SemanticError::EndNotLast { .. }
        ));
    }

    #[test]
    fn test_duplicate_label() {
        let err = semantic("X, CLA\nY, HLT\nX, DEC 1\nEND");
        assert_eq!(
            err,
            SemanticError::DuplicateLabel { line: 3, column: 1, label: "X".into() }
        );
    }

    #[test]
    fn test_undefined_label_reported_before_codegen() {
        let source = "
            ORG 200
     MAIN,  LDA A
            BUN MAIN
            END
        ";
        let mut log = EventLog::new();
        let err = assemble_with(source, &mut log).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("undefined label 'a'"));
        assert_eq!(err.position(), (3, 17));
        // Pass 2 never ran.
        assert!(log.by_context(LogContext::Directive).is_empty());
        assert_eq!(log.by_level(LogLevel::Error).len(), 1);
    }

    #[test]
    fn test_errors_are_routed_by_kind() {
        let mut log = EventLog::new();
        let err = assemble_with("LDA $", &mut log).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lexical);
        assert_eq!(log.by_context(LogContext::Lexer)[0].level, LogLevel::Error);

        let err = assemble_with("LDA\nEND", &mut log).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(log.by_context(LogContext::Parser).last().map(|e| e.level), Some(LogLevel::Error));
    }

    #[test]
    fn test_success_is_reported() {
        let mut log = EventLog::new();
        assemble_with("HLT\nEND", &mut log).unwrap();
        assert_eq!(log.by_level(LogLevel::Success).len(), 1);
    }

    #[test]
    fn test_each_call_starts_fresh() {
        let mut asm = Assembler::new();
        asm.assemble("X, HLT\nEND").unwrap();
        // Would be a duplicate if the previous table survived.
        asm.assemble("X, CLA\nEND").unwrap();
        assert_eq!(asm.symbols().len(), 1);
    }

    #[test]
    fn test_label_named_i() {
        let program = assemble("BUN I\nI, HLT\nEND").unwrap();
        assert_eq!(program.instructions[0].binary, 0x4001);
    }

    #[test]
    fn test_labels_on_org_and_end() {
        let mut asm = Assembler::new();
        let program = asm.assemble("HLT\nX, ORG 20\nCLA\nY, END").unwrap();

        assert_eq!(asm.symbols()["X"], 0x20);
        assert_eq!(asm.symbols()["Y"], 0x21);
        // END takes no slot.
        assert_eq!(program.words().count(), 2);
    }

    #[test]
    fn test_hex_upper_bound() {
        let program = assemble("HLT\nX, HEX FFFF\nY, HEX 0\nEND").unwrap();
        let words: Vec<_> = program.data.iter().map(|d| d.binary).collect();
        assert_eq!(words, vec![0xFFFF, 0x0000]);
    }

    #[test]
    fn test_instructions_agree_with_encode() {
        let program = assemble("ORG 300\nP, ISZ P I\nSTA 4095\nCME\nSKI\nEND").unwrap();
        let words: Vec<_> = program.instructions.iter().map(|i| i.binary).collect();
        assert_eq!(
            words,
            vec![
                encode(&Operation::Memory { op: MemoryOp::Isz, address: 0x300, indirect: true }),
                encode(&Operation::Memory { op: MemoryOp::Sta, address: 0xFFF, indirect: false }),
                0x7100,
                0xF200,
            ]
        );
        assert_eq!(words[0], 0xE300);
    }

    proptest! {
        #[test]
        fn prop_dec_is_twos_complement(value in -32768i32..=32767) {
            let program = assemble(&format!("HLT\nX, DEC {}\nEND", value)).unwrap();
            prop_assert_eq!(program.data[0].binary, (value & 0xFFFF) as u16);
        }
    }
}
