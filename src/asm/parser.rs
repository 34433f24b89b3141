//! Grammar check and line grouping.
//!
//! ```text
//! line        ::= [label] instruction
//! label       ::= identifier ","
//! instruction ::= MRI address ["," "I"]
//!               | register-ref | io-instr
//!               | "ORG" hex | "END" | "HEX" hex | "DEC" dec
//! address     ::= identifier | decimal-number
//! ```
//!
//! Tokens are grouped by physical line and each line is checked against the
//! exact arity and operand types of its instruction class. The grouped,
//! label-split lines are what the assembler passes consume.

use crate::asm::error::SyntaxError;
use crate::asm::lexer::{patterns, Directive, Keyword, Token, TokenKind};
use crate::cpu::decode::Opcode;

/// One source line after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based physical line number.
    pub number: usize,
    /// Leading label, if the line defines one.
    pub label: Option<Token>,
    /// Keyword of the statement head.
    pub keyword: Keyword,
    /// The instruction or directive and its operands, label removed.
    /// Never empty.
    pub statement: Vec<Token>,
}

impl Line {
    /// The mnemonic or directive token.
    pub fn head(&self) -> &Token {
        &self.statement[0]
    }

    pub fn operands(&self) -> &[Token] {
        &self.statement[1..]
    }

    /// Comment-stripped source text of the line.
    pub fn source(&self) -> &str {
        &self.head().source_line
    }
}

/// Validate a token stream and group it by line.
pub fn parse(tokens: &[Token]) -> Result<Vec<Line>, SyntaxError> {
    Parser::new(tokens).parse()
}

pub struct Parser<'a> {
    tokens: &'a [Token],
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens }
    }

    pub fn parse(&self) -> Result<Vec<Line>, SyntaxError> {
        self.group()
            .into_iter()
            .map(|group| self.parse_line(group))
            .collect()
    }

    /// Split the stream into runs of tokens sharing a line number.
    fn group(&self) -> Vec<&'a [Token]> {
        let mut groups = Vec::new();
        let mut rest = self.tokens;
        while let Some(first) = rest.first() {
            let len = rest.iter().take_while(|t| t.line == first.line).count();
            let (group, tail) = rest.split_at(len);
            groups.push(group);
            rest = tail;
        }
        groups
    }

    fn parse_line(&self, group: &[Token]) -> Result<Line, SyntaxError> {
        let first = &group[0];
        let (label, statement) = if first.kind == TokenKind::Identifier {
            expect_identifier(first)?;
            (Some(first.clone()), group[1..].to_vec())
        } else {
            (None, group.to_vec())
        };

        let Some(head) = statement.first() else {
            return Err(SyntaxError::new(
                first.line,
                first.column,
                format!(
                    "line {} has a label '{}' but no instruction; each label must be followed by an instruction or directive",
                    first.line, first.lexeme
                ),
            ));
        };

        let Some(keyword) = head.keyword() else {
            return Err(SyntaxError::new(
                head.line,
                head.column,
                format!("line {} expected KEYWORD, found {}", head.line, head.kind),
            ));
        };

        let operands = &statement[1..];
        match keyword {
            Keyword::Op(Opcode::Memory(_)) => check_mri(head, operands)?,
            Keyword::Op(_) => {
                if !operands.is_empty() {
                    return Err(SyntaxError::new(
                        head.line,
                        head.column,
                        format!(
                            "line {}: instruction '{}' does not take any operands, but found extra tokens",
                            head.line, head.lexeme
                        ),
                    ));
                }
            }
            Keyword::Directive(Directive::End) => {
                if !operands.is_empty() {
                    return Err(SyntaxError::new(
                        head.line,
                        head.column,
                        format!(
                            "line {}: END directive does not take any operands, but found extra tokens",
                            head.line
                        ),
                    ));
                }
            }
            Keyword::Directive(Directive::Org | Directive::Hex) => {
                check_single_operand(head, operands, TokenKind::NumberHex, "hexadecimal")?
            }
            Keyword::Directive(Directive::Dec) => {
                check_single_operand(head, operands, TokenKind::NumberDec, "decimal")?
            }
        }

        Ok(Line { number: head.line, label, keyword, statement })
    }
}

fn expect_identifier(token: &Token) -> Result<(), SyntaxError> {
    if patterns().identifier.is_match(&token.lexeme) {
        Ok(())
    } else {
        Err(SyntaxError::new(
            token.line,
            token.column,
            format!("invalid IDENTIFIER, found {}", token.lexeme),
        ))
    }
}

fn check_mri(head: &Token, operands: &[Token]) -> Result<(), SyntaxError> {
    let Some((address, remaining)) = operands.split_first() else {
        return Err(SyntaxError::new(
            head.line,
            head.column,
            format!(
                "line {}: MRI instruction '{}' requires an address operand, but none was provided",
                head.line, head.lexeme
            ),
        ));
    };

    match address.kind {
        TokenKind::Identifier => expect_identifier(address)?,
        TokenKind::NumberDec => {}
        other => {
            return Err(SyntaxError::new(
                address.line,
                address.column,
                format!(
                    "line {}: MRI instruction '{}' requires an address operand, found {}",
                    address.line, head.lexeme, other
                ),
            ))
        }
    }

    match remaining {
        [] => Ok(()),
        [marker] if marker.kind == TokenKind::Indirection => Ok(()),
        [marker] => Err(SyntaxError::new(
            marker.line,
            marker.column,
            format!(
                "line {}: unexpected token '{}' after address operand; only 'I' is allowed for indirect addressing",
                marker.line, marker.lexeme
            ),
        )),
        _ => Err(SyntaxError::new(
            head.line,
            head.column,
            format!("line {}: too many operands", head.line),
        )),
    }
}

fn check_single_operand(
    head: &Token,
    operands: &[Token],
    kind: TokenKind,
    description: &str,
) -> Result<(), SyntaxError> {
    match operands {
        [operand] if operand.kind == kind => Ok(()),
        [operand] => Err(SyntaxError::new(
            operand.line,
            operand.column,
            format!(
                "line {}: {} directive requires a {} operand, found {}",
                operand.line, head.lexeme, description, operand.kind
            ),
        )),
        _ => Err(SyntaxError::new(
            head.line,
            head.column,
            format!(
                "line {}: {} directive requires exactly one operand, found {}",
                head.line,
                head.lexeme,
                operands.len()
            ),
        )),
    }
}
