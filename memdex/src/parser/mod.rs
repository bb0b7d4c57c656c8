//! Predicate-string parser: a SQL-ish boolean grammar over comparisons,
//! `IN` membership, `AND`/`OR`/`NOT` and parenthesisation, lowered straight
//! into [`Condition`] trees.

mod lexer;

use crate::common::Value;
use crate::condition::{BinaryOp, Condition};
use crate::errors::{ErrorKind, MemdexError, MemdexResult};
use lexer::{tokenize, Spanned, Token};

/// Turns a predicate string into a condition tree.
pub trait ParserProvider {
    fn parse(&self, input: &str) -> MemdexResult<Condition>;
}

/// The default parser.
///
/// Grammar, loosest first: `OR`, `AND`, `NOT`, then a single optional
/// comparison (`= != < <= > >= IS IN`) between operands. Operands are
/// literals (integers, floats, quoted strings, `TRUE`/`FALSE`/`NULL`),
/// identifiers, back-tick computed identifiers, bracketed arrays, or
/// parenthesised sub-expressions. Keywords are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct PredicateParser;

impl ParserProvider for PredicateParser {
    fn parse(&self, input: &str) -> MemdexResult<Condition> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let condition = parser.parse_or()?;
        if let Some(spanned) = parser.peek() {
            return Err(parser_error(
                &format!("Unexpected trailing input {:?}", spanned.token),
                Some(spanned.offset),
            ));
        }
        Ok(condition)
    }
}

fn parser_error(message: &str, offset: Option<usize>) -> MemdexError {
    let full = match offset {
        Some(offset) => format!("{} at offset {}", message, offset),
        None => format!("{} at end of input", message),
    };
    log::error!("Predicate parse failed: {}", full);
    MemdexError::new(&full, ErrorKind::ParseError)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.pos).cloned();
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn keyword(&self, keyword: &str) -> bool {
        matches!(
            self.peek(),
            Some(Spanned { token: Token::Ident(name), .. }) if name.eq_ignore_ascii_case(keyword)
        )
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> MemdexResult<()> {
        match self.advance() {
            Some(spanned) if spanned.token == expected => Ok(()),
            Some(spanned) => Err(parser_error(
                &format!("Expected {} but found {:?}", what, spanned.token),
                Some(spanned.offset),
            )),
            None => Err(parser_error(&format!("Expected {}", what), None)),
        }
    }

    fn parse_or(&mut self) -> MemdexResult<Condition> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = Condition::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> MemdexResult<Condition> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("AND") {
            let right = self.parse_not()?;
            left = Condition::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> MemdexResult<Condition> {
        if self.eat_keyword("NOT") {
            return Ok(self.parse_not()?.not());
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> MemdexResult<Condition> {
        let left = self.parse_operand()?;
        let op = match self.peek() {
            Some(Spanned { token: Token::Eq, .. }) => BinaryOp::Eq,
            Some(Spanned { token: Token::Ne, .. }) => BinaryOp::Ne,
            Some(Spanned { token: Token::Lt, .. }) => BinaryOp::Lt,
            Some(Spanned { token: Token::Le, .. }) => BinaryOp::Le,
            Some(Spanned { token: Token::Gt, .. }) => BinaryOp::Gt,
            Some(Spanned { token: Token::Ge, .. }) => BinaryOp::Ge,
            _ if self.keyword("IS") => BinaryOp::Is,
            _ if self.keyword("IN") => BinaryOp::In,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_operand()?;
        Ok(Condition::binary(op, left, right))
    }

    fn parse_operand(&mut self) -> MemdexResult<Condition> {
        let spanned = match self.advance() {
            Some(spanned) => spanned,
            None => return Err(parser_error("Expected an operand", None)),
        };
        match spanned.token {
            Token::Int(v) => Ok(Condition::Literal(Value::I64(v))),
            Token::Uint(v) => Ok(Condition::Literal(Value::U64(v))),
            Token::Float(v) => Ok(Condition::Literal(Value::F64(v))),
            Token::Str(v) => Ok(Condition::Literal(Value::String(v))),
            Token::Minus => {
                let next = self.advance();
                match next {
                    Some(Spanned { token: Token::Int(v), .. }) => {
                        Ok(Condition::Literal(Value::I64(-v)))
                    }
                    Some(Spanned { token: Token::Float(v), .. }) => {
                        Ok(Condition::Literal(Value::F64(-v)))
                    }
                    Some(spanned) => Err(parser_error(
                        &format!("Expected a number after '-' but found {:?}", spanned.token),
                        Some(spanned.offset),
                    )),
                    None => Err(parser_error("Expected a number after '-'", None)),
                }
            }
            Token::Ident(name) => {
                if name.eq_ignore_ascii_case("TRUE") {
                    Ok(Condition::Literal(Value::Bool(true)))
                } else if name.eq_ignore_ascii_case("FALSE") {
                    Ok(Condition::Literal(Value::Bool(false)))
                } else if name.eq_ignore_ascii_case("NULL") {
                    Ok(Condition::Literal(Value::Null))
                } else if ["AND", "OR", "NOT", "IN", "IS"]
                    .iter()
                    .any(|kw| name.eq_ignore_ascii_case(kw))
                {
                    Err(parser_error(
                        &format!("Keyword {} cannot be used as an attribute", name),
                        Some(spanned.offset),
                    ))
                } else {
                    Ok(Condition::Attribute(name))
                }
            }
            Token::Computed(name) => Ok(Condition::Attribute(name)),
            Token::LBracket => {
                let mut items = Vec::new();
                if matches!(self.peek(), Some(Spanned { token: Token::RBracket, .. })) {
                    self.pos += 1;
                    return Ok(Condition::Array(items));
                }
                loop {
                    items.push(self.parse_operand()?);
                    match self.advance() {
                        Some(Spanned { token: Token::Comma, .. }) => continue,
                        Some(Spanned { token: Token::RBracket, .. }) => break,
                        Some(spanned) => {
                            return Err(parser_error(
                                &format!("Expected ',' or ']' but found {:?}", spanned.token),
                                Some(spanned.offset),
                            ))
                        }
                        None => return Err(parser_error("Unclosed array literal", None)),
                    }
                }
                Ok(Condition::Array(items))
            }
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(parser_error(
                &format!("Unexpected token {:?}", other),
                Some(spanned.offset),
            )),
        }
    }
}
