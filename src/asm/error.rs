//! Errors raised while turning source text into a [`Program`].
//!
//! [`Program`]: crate::asm::Program

use thiserror::Error;

/// A character outside `[A-Z0-9,_-]` in the normalized source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lexer error at line {line}, col {column}: invalid token '{lexeme}' (allowed characters: A-Z, 0-9, '_', ',', '-')")]
pub struct LexError {
    pub line: usize,
    pub column: usize,
    pub lexeme: String,
}

/// A token sequence that violates the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at line {line}, col {column}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self { line, column, message: message.into() }
    }
}

/// Violations found after the grammar check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("assembler error at line {line}, col {column}: missing END directive")]
    MissingEnd { line: usize, column: usize },

    #[error("assembler error at line {line}, col {column}: multiple END directives")]
    MultipleEnd { line: usize, column: usize },

    #[error("assembler error at line {line}, col {column}: END directive must be the last statement")]
    EndNotLast { line: usize, column: usize },

    #[error("assembler error at line {line}, col {column}: duplicate label '{label}'")]
    DuplicateLabel { line: usize, column: usize, label: String },

    #[error("assembler error at line {line}, col {column}: undefined label '{label}'")]
    UndefinedLabel { line: usize, column: usize, label: String },

    #[error("assembler error at line {line}, col {column}: DEC value {value} out of range (-32768 to 32767)")]
    DecOutOfRange { line: usize, column: usize, value: String },

    #[error("assembler error at line {line}, col {column}: HEX value {value} out of range (0-FFFF)")]
    HexOutOfRange { line: usize, column: usize, value: String },

    #[error("assembler error at line {line}, col {column}: ORG address {value} out of range (0-FFF)")]
    OriginOutOfRange { line: usize, column: usize, value: String },

    #[error("assembler error at line {line}, col {column}: location counter passed the end of memory")]
    AddressOverflow { line: usize, column: usize },
}

impl SemanticError {
    pub fn position(&self) -> (usize, usize) {
        match *self {
            SemanticError::MissingEnd { line, column }
            | SemanticError::MultipleEnd { line, column }
            | SemanticError::EndNotLast { line, column }
            | SemanticError::DuplicateLabel { line, column, .. }
            | SemanticError::UndefinedLabel { line, column, .. }
            | SemanticError::DecOutOfRange { line, column, .. }
            | SemanticError::HexOutOfRange { line, column, .. }
            | SemanticError::OriginOutOfRange { line, column, .. }
            | SemanticError::AddressOverflow { line, column } => (line, column),
        }
    }
}

/// Which stage rejected the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Semantic,
}

/// Any error produced by [`assemble`](crate::asm::assemble).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

impl AssemblerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssemblerError::Lex(_) => ErrorKind::Lexical,
            AssemblerError::Syntax(_) => ErrorKind::Syntax,
            AssemblerError::Semantic(_) => ErrorKind::Semantic,
        }
    }

    /// `(line, column)`, both 1-based; `(0, 0)` for an empty source.
    pub fn position(&self) -> (usize, usize) {
        match self {
            AssemblerError::Lex(e) => (e.line, e.column),
            AssemblerError::Syntax(e) => (e.line, e.column),
            AssemblerError::Semantic(e) => e.position(),
        }
    }
}
