//! Assembler and disassembler for Mano programs.
//!
//! This module provides:
//! - A lexer and a line-oriented grammar check
//! - A two-pass assembler (text → [`Program`])
//! - A disassembler (words → readable text)

pub mod assembler;
pub mod disasm;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod program;

pub use assembler::{assemble, assemble_with, Assembler, SymbolTable};
pub use disasm::{disassemble, disassemble_memory, disassemble_word};
pub use error::{AssemblerError, ErrorKind, LexError, SemanticError, SyntaxError};
pub use lexer::{tokenize, Directive, Keyword, Token, TokenKind};
pub use parser::{parse, Line};
pub use program::{Data, Instruction, Program};
