use crate::errors::{ErrorKind, MemdexError, MemdexResult};

/// A lexical token of the predicate grammar, with the char offset it
/// started at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Bare identifier; keywords are classified by the parser.
    Ident(String),
    /// Back-tick identifier (computed attribute); the name keeps its tick.
    Computed(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn parse_error(message: &str, offset: usize) -> MemdexError {
    MemdexError::new(
        &format!("{} at offset {}", message, offset),
        ErrorKind::ParseError,
    )
}

/// Splits a predicate string into tokens.
pub(crate) fn tokenize(input: &str) -> MemdexResult<Vec<Spanned>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        let start = pos;
        match c {
            c if c.is_whitespace() => {
                pos += 1;
            }
            '(' => {
                tokens.push(Spanned { token: Token::LParen, offset: start });
                pos += 1;
            }
            ')' => {
                tokens.push(Spanned { token: Token::RParen, offset: start });
                pos += 1;
            }
            '[' => {
                tokens.push(Spanned { token: Token::LBracket, offset: start });
                pos += 1;
            }
            ']' => {
                tokens.push(Spanned { token: Token::RBracket, offset: start });
                pos += 1;
            }
            ',' => {
                tokens.push(Spanned { token: Token::Comma, offset: start });
                pos += 1;
            }
            '-' => {
                tokens.push(Spanned { token: Token::Minus, offset: start });
                pos += 1;
            }
            '=' => {
                tokens.push(Spanned { token: Token::Eq, offset: start });
                pos += 1;
            }
            '!' => {
                if chars.get(pos + 1) == Some(&'=') {
                    tokens.push(Spanned { token: Token::Ne, offset: start });
                    pos += 2;
                } else {
                    return Err(parse_error("Unexpected character '!'", start));
                }
            }
            '<' => {
                if chars.get(pos + 1) == Some(&'=') {
                    tokens.push(Spanned { token: Token::Le, offset: start });
                    pos += 2;
                } else if chars.get(pos + 1) == Some(&'>') {
                    tokens.push(Spanned { token: Token::Ne, offset: start });
                    pos += 2;
                } else {
                    tokens.push(Spanned { token: Token::Lt, offset: start });
                    pos += 1;
                }
            }
            '>' => {
                if chars.get(pos + 1) == Some(&'=') {
                    tokens.push(Spanned { token: Token::Ge, offset: start });
                    pos += 2;
                } else {
                    tokens.push(Spanned { token: Token::Gt, offset: start });
                    pos += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                pos += 1;
                loop {
                    match chars.get(pos) {
                        None => return Err(parse_error("Unterminated string literal", start)),
                        Some(&ch) if ch == quote => {
                            // a doubled quote is an escaped quote
                            if chars.get(pos + 1) == Some(&quote) {
                                text.push(quote);
                                pos += 2;
                            } else {
                                pos += 1;
                                break;
                            }
                        }
                        Some(&ch) => {
                            text.push(ch);
                            pos += 1;
                        }
                    }
                }
                tokens.push(Spanned { token: Token::Str(text), offset: start });
            }
            '`' => {
                pos += 1;
                let mut name = String::from("`");
                while pos < chars.len() && is_ident_char(chars[pos]) {
                    name.push(chars[pos]);
                    pos += 1;
                }
                if name.len() == 1 {
                    return Err(parse_error("Empty computed attribute name", start));
                }
                tokens.push(Spanned { token: Token::Computed(name), offset: start });
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                let mut is_float = false;
                while pos < chars.len() {
                    let ch = chars[pos];
                    if ch.is_ascii_digit() {
                        text.push(ch);
                        pos += 1;
                    } else if ch == '.' && !is_float && chars.get(pos + 1).is_some_and(|n| n.is_ascii_digit()) {
                        is_float = true;
                        text.push(ch);
                        pos += 1;
                    } else {
                        break;
                    }
                }
                let token = if is_float {
                    match text.parse::<f64>() {
                        Ok(v) => Token::Float(v),
                        Err(_) => return Err(parse_error("Invalid numeric literal", start)),
                    }
                } else if let Ok(v) = text.parse::<i64>() {
                    Token::Int(v)
                } else if let Ok(v) = text.parse::<u64>() {
                    Token::Uint(v)
                } else {
                    return Err(parse_error("Numeric literal out of range", start));
                };
                tokens.push(Spanned { token, offset: start });
            }
            c if is_ident_start(c) => {
                let mut name = String::new();
                while pos < chars.len() && is_ident_char(chars[pos]) {
                    name.push(chars[pos]);
                    pos += 1;
                }
                tokens.push(Spanned { token: Token::Ident(name), offset: start });
            }
            other => {
                return Err(parse_error(&format!("Unexpected character '{}'", other), start));
            }
        }
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_operators_and_delimiters() {
        assert_eq!(
            kinds("a >= 1 AND (b != 2)"),
            vec![
                Token::Ident("a".to_string()),
                Token::Ge,
                Token::Int(1),
                Token::Ident("AND".to_string()),
                Token::LParen,
                Token::Ident("b".to_string()),
                Token::Ne,
                Token::Int(2),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("1.5"), vec![Token::Float(1.5)]);
        assert_eq!(kinds("42"), vec![Token::Int(42)]);
        assert_eq!(
            kinds("18446744073709551615"),
            vec![Token::Uint(u64::MAX)]
        );
        assert_eq!(kinds("-3"), vec![Token::Minus, Token::Int(3)]);
    }

    #[test]
    fn test_strings_with_doubled_quote_escape() {
        assert_eq!(kinds("'it''s'"), vec![Token::Str("it's".to_string())]);
        assert_eq!(kinds("\"hi\""), vec![Token::Str("hi".to_string())]);
    }

    #[test]
    fn test_computed_identifier_keeps_tick() {
        assert_eq!(kinds("`total"), vec![Token::Computed("`total".to_string())]);
    }

    #[test]
    fn test_unterminated_string_fails() {
        let err = tokenize("'oops").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ParseError);
    }

    #[test]
    fn test_offsets_point_at_token_starts() {
        let spanned = tokenize("a = 10").unwrap();
        assert_eq!(spanned[0].offset, 0);
        assert_eq!(spanned[1].offset, 2);
        assert_eq!(spanned[2].offset, 4);
    }
}
