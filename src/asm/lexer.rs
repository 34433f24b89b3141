//! Tokenizer for Mano assembly.
//!
//! Source is uppercased, `//` comments are stripped and blank lines are
//! dropped. Each remaining line is split into runs of `[A-Z0-9_-]`. A `-`
//! is only accepted as the single leading sign of a decimal literal, so
//! `DEC -1` lexes as one number while `--5` or `X-` are rejected. Each run
//! is classified with one token of lookback:
//!
//! - mnemonics and directives are keywords;
//! - `I` is an indirection marker when it directly follows an address
//!   operand on the same line, otherwise an identifier (a label may be
//!   called `I`);
//! - digits after `DEC` or an MRI are decimal, hex digits after `HEX` or
//!   `ORG` are hexadecimal. The very first token of the stream has no
//!   lookback and is classified by shape alone;
//! - anything else is an identifier.

use crate::asm::error::LexError;
use crate::cpu::decode::Opcode;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Assembler directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    /// Set the location counter.
    Org,
    /// End of program.
    End,
    /// Decimal data word.
    Dec,
    /// Hexadecimal data word.
    Hex,
}

impl FromStr for Directive {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORG" => Ok(Directive::Org),
            "END" => Ok(Directive::End),
            "DEC" => Ok(Directive::Dec),
            "HEX" => Ok(Directive::Hex),
            _ => Err(()),
        }
    }
}

/// A reserved word: an instruction mnemonic or a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Op(Opcode),
    Directive(Directive),
}

impl Keyword {
    pub fn parse(lexeme: &str) -> Option<Self> {
        if let Ok(op) = lexeme.parse::<Opcode>() {
            return Some(Keyword::Op(op));
        }
        lexeme.parse::<Directive>().ok().map(Keyword::Directive)
    }

    pub fn is_mri(self) -> bool {
        matches!(self, Keyword::Op(Opcode::Memory(_)))
    }
}

/// Token classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Keyword,
    NumberDec,
    NumberHex,
    Indirection,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Keyword => "KEYWORD",
            TokenKind::NumberDec => "NUMBER_DEC",
            TokenKind::NumberHex => "NUMBER_HEX",
            TokenKind::Indirection => "INDIRECTION",
        })
    }
}

/// A classified lexeme with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    /// 1-based physical line number.
    pub line: usize,
    /// 1-based character column within the physical line.
    pub column: usize,
    /// The comment-stripped, trimmed text of the line.
    pub source_line: String,
}

impl Token {
    /// The keyword this token spells, if it is a keyword token.
    pub fn keyword(&self) -> Option<Keyword> {
        match self.kind {
            TokenKind::Keyword => Keyword::parse(&self.lexeme),
            _ => None,
        }
    }

    pub fn is_directive(&self, directive: Directive) -> bool {
        self.keyword() == Some(Keyword::Directive(directive))
    }

    fn is_operand(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Identifier | TokenKind::NumberDec | TokenKind::NumberHex
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (line {}, col {})", self.kind, self.lexeme, self.line, self.column)
    }
}

pub(crate) struct Patterns {
    pub allowed: Regex,
    pub chunk: Regex,
    pub lexeme: Regex,
    pub unsigned_dec: Regex,
    pub signed_dec: Regex,
    pub hex: Regex,
    pub identifier: Regex,
}

pub(crate) fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        allowed: Regex::new(r"^[A-Z0-9,_-]+$").expect("static pattern"),
        chunk: Regex::new(r"\S+").expect("static pattern"),
        lexeme: Regex::new(r"[A-Z0-9_-]+").expect("static pattern"),
        unsigned_dec: Regex::new(r"^[0-9]+$").expect("static pattern"),
        signed_dec: Regex::new(r"^-?[0-9]+$").expect("static pattern"),
        hex: Regex::new(r"^[0-9A-F]+$").expect("static pattern"),
        identifier: Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("static pattern"),
    })
}

/// Tokenize a whole source text.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let pats = patterns();
    let source = source.to_uppercase();
    let mut tokens: Vec<Token> = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line_num = index + 1;
        let code = strip_comment(raw);
        let text = code.trim();
        if text.is_empty() {
            continue;
        }
        let indent = code.chars().count() - code.trim_start().chars().count();
        let column = |offset: usize| indent + text[..offset].chars().count() + 1;

        for chunk in pats.chunk.find_iter(text) {
            if !pats.allowed.is_match(chunk.as_str()) {
                return Err(LexError {
                    line: line_num,
                    column: column(chunk.start()),
                    lexeme: chunk.as_str().to_string(),
                });
            }
        }

        for m in pats.lexeme.find_iter(text) {
            let lexeme = m.as_str();
            if lexeme.contains('-') && !pats.signed_dec.is_match(lexeme) {
                return Err(LexError {
                    line: line_num,
                    column: column(m.start()),
                    lexeme: lexeme.to_string(),
                });
            }
            let kind = classify(lexeme, tokens.last(), line_num);
            tokens.push(Token {
                kind,
                lexeme: lexeme.to_string(),
                line: line_num,
                column: column(m.start()),
                source_line: text.to_string(),
            });
        }
    }

    Ok(tokens)
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn classify(lexeme: &str, prev: Option<&Token>, line: usize) -> TokenKind {
    let pats = patterns();

    if Keyword::parse(lexeme).is_some() {
        return TokenKind::Keyword;
    }

    if lexeme == "I" {
        return match prev {
            Some(p) if p.line == line && p.is_operand() => TokenKind::Indirection,
            _ => TokenKind::Identifier,
        };
    }

    match prev {
        Some(p) => match p.keyword() {
            Some(Keyword::Directive(Directive::Dec)) if pats.signed_dec.is_match(lexeme) => {
                TokenKind::NumberDec
            }
            Some(k) if k.is_mri() && pats.unsigned_dec.is_match(lexeme) => TokenKind::NumberDec,
            Some(Keyword::Directive(Directive::Hex | Directive::Org))
                if pats.hex.is_match(lexeme) =>
            {
                TokenKind::NumberHex
            }
            _ => TokenKind::Identifier,
        },
        None if pats.unsigned_dec.is_match(lexeme) => TokenKind::NumberDec,
        None if pats.hex.is_match(lexeme) => TokenKind::NumberHex,
        None => TokenKind::Identifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_label_and_mri() {
        let tokens = tokenize("start, lda num // load").unwrap();
        let lexemes: Vec<_> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, ["START", "LDA", "NUM"]);
        assert_eq!(tokens[1].column, 8);
        assert_eq!(tokens[2].source_line, "START, LDA NUM");
        assert_eq!(
            kinds("START, LDA NUM"),
            [TokenKind::Identifier, TokenKind::Keyword, TokenKind::Identifier]
        );
    }

    #[test]
    fn test_blank_and_comment_lines_keep_physical_numbers() {
        let tokens = tokenize("\n// header\n   HLT\n").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].line, 3);
        assert_eq!(tokens[0].column, 4);
    }

    #[test]
    fn test_numbers_depend_on_previous_keyword() {
        assert_eq!(kinds("ORG 100"), [TokenKind::Keyword, TokenKind::NumberHex]);
        assert_eq!(kinds("HLT\nX, DEC 100"), [
            TokenKind::Keyword,
            TokenKind::Identifier,
            TokenKind::Keyword,
            TokenKind::NumberDec,
        ]);
        assert_eq!(kinds("HLT\nX, HEX 1F"), [
            TokenKind::Keyword,
            TokenKind::Identifier,
            TokenKind::Keyword,
            TokenKind::NumberHex,
        ]);
        // Hex digits after an MRI are a symbol, not a number.
        assert_eq!(kinds("HLT\nBUN F0A"), [
            TokenKind::Keyword,
            TokenKind::Keyword,
            TokenKind::Identifier,
        ]);
        assert_eq!(kinds("HLT\nSTA 250"), [
            TokenKind::Keyword,
            TokenKind::Keyword,
            TokenKind::NumberDec,
        ]);
    }

    #[test]
    fn test_negative_decimal_after_dec() {
        let tokens = tokenize("HLT\nN, DEC -32768").unwrap();
        assert_eq!(tokens[3].lexeme, "-32768");
        assert_eq!(tokens[3].kind, TokenKind::NumberDec);
    }

    #[test]
    fn test_first_token_classified_by_shape() {
        assert_eq!(kinds("100"), [TokenKind::NumberDec]);
        assert_eq!(kinds("1A"), [TokenKind::NumberHex]);
        assert_eq!(kinds("G1"), [TokenKind::Identifier]);
    }

    #[test]
    fn test_indirection_marker() {
        assert_eq!(kinds("HLT\nLDA PTR I"), [
            TokenKind::Keyword,
            TokenKind::Keyword,
            TokenKind::Identifier,
            TokenKind::Indirection,
        ]);
        // After a keyword, `I` is a symbol.
        assert_eq!(kinds("HLT\nLDA I"), [
            TokenKind::Keyword,
            TokenKind::Keyword,
            TokenKind::Identifier,
        ]);
        // A label called I at the start of a line.
        assert_eq!(kinds("HLT\nSTA X\nI, DEC 1")[3], TokenKind::Identifier);
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("HLT\n  LDA X+1").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 7);
        assert_eq!(err.lexeme, "X+1");
    }

    #[test]
    fn test_stray_hyphens_are_rejected() {
        for (source, lexeme) in [("HLT\nX, DEC --5", "--5"), ("HLT\nX, DEC 5-", "5-"), ("HLT\nLDA X-", "X-")] {
            let err = tokenize(source).unwrap_err();
            assert_eq!(err.line, 2, "{}", source);
            assert_eq!(err.lexeme, lexeme, "{}", source);
        }
        assert_eq!(tokenize("HLT\nA-B, CLA").unwrap_err().column, 1);
        assert!(tokenize("HLT\nX, DEC -5").is_ok());
    }

    #[test]
    fn test_columns_count_characters() {
        // U+00A0 and U+3000 are whitespace wider than one byte.
        let err = tokenize("HLT\n\u{a0}\u{a0}LDA X+1").unwrap_err();
        assert_eq!(err.column, 7);

        let tokens = tokenize("\u{3000}X,\u{3000}HLT").unwrap();
        assert_eq!(tokens[0].column, 2);
        assert_eq!(tokens[1].column, 5);
    }

    #[test]
    fn test_comment_hides_invalid_characters() {
        assert!(tokenize("HLT // $$$ ???").is_ok());
    }
}
