use std::fmt;

use thiserror::Error;

use crate::ast::{SpannedToken, Token};

/// A location in the query source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Byte offset from the start of the source
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Position {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Errors raised while splitting the query source into tokens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unterminated string literal starting at {position}")]
    UnterminatedString { position: Position },

    #[error("invalid escape sequence '\\{escape}' at {position}")]
    InvalidEscape { escape: String, position: Position },

    #[error("invalid numeric literal '{literal}' at {position}")]
    InvalidNumber { literal: String, position: Position },

    #[error("invalid byte string literal at {position}: {reason}")]
    InvalidBytes { reason: String, position: Position },

    #[error("unexpected character '{ch}' at {position}")]
    UnexpectedCharacter { ch: char, position: Position },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::UnterminatedString { position }
            | LexError::InvalidEscape { position, .. }
            | LexError::InvalidNumber { position, .. }
            | LexError::InvalidBytes { position, .. }
            | LexError::UnexpectedCharacter { position, .. } => *position,
        }
    }

    /// Byte offset of the offending input.
    pub fn offset(&self) -> usize {
        self.position().offset
    }
}

pub struct Lexer {
    input: Vec<char>,
    index: usize,
    offset: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            index: 0,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Splits the whole source into tokens, ending with [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn position(&self) -> Position {
        Position {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.index).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.index + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.index += 1;
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(c) = self.current_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, start: Position) -> Result<String, LexError> {
        let mut result = String::new();
        self.advance(); // Consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    let escape_position = self.position();
                    self.advance(); // Consume backslash
                    let escaped = match self.current_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('b') => '\u{8}',
                        Some('f') => '\u{c}',
                        Some('/') => '/',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some('u') => {
                            self.advance();
                            result.push(self.read_unicode_escape(escape_position)?);
                            continue;
                        }
                        Some(other) => {
                            return Err(LexError::InvalidEscape {
                                escape: other.to_string(),
                                position: escape_position,
                            });
                        }
                        None => return Err(LexError::UnterminatedString { position: start }),
                    };
                    result.push(escaped);
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::UnterminatedString { position: start })
    }

    fn read_hex4(&mut self, escape_position: Position) -> Result<u32, LexError> {
        let mut digits = String::new();
        for _ in 0..4 {
            match self.current_char() {
                Some(c) if c.is_ascii_hexdigit() => {
                    digits.push(c);
                    self.advance();
                }
                _ => {
                    return Err(LexError::InvalidEscape {
                        escape: format!("u{}", digits),
                        position: escape_position,
                    });
                }
            }
        }
        u32::from_str_radix(&digits, 16).map_err(|_| LexError::InvalidEscape {
            escape: format!("u{}", digits),
            position: escape_position,
        })
    }

    /// Reads the `XXXX` part of `\uXXXX`, combining surrogate pairs.
    fn read_unicode_escape(&mut self, escape_position: Position) -> Result<char, LexError> {
        let high = self.read_hex4(escape_position)?;

        let code = if (0xD800..0xDC00).contains(&high) {
            if self.current_char() != Some('\\') || self.peek_char(1) != Some('u') {
                return Err(LexError::InvalidEscape {
                    escape: format!("u{:04x}", high),
                    position: escape_position,
                });
            }
            self.advance();
            self.advance();
            let low = self.read_hex4(escape_position)?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(LexError::InvalidEscape {
                    escape: format!("u{:04x}", low),
                    position: escape_position,
                });
            }
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        } else {
            high
        };

        char::from_u32(code).ok_or_else(|| LexError::InvalidEscape {
            escape: format!("u{:04x}", code),
            position: escape_position,
        })
    }

    /// Reads `h"0a ff"`; the cursor sits on the `h`.
    fn read_bytes(&mut self, start: Position) -> Result<Vec<u8>, LexError> {
        self.advance(); // h
        self.advance(); // opening quote

        let mut body = String::new();
        loop {
            match self.current_char() {
                Some('"') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    body.push(c);
                    self.advance();
                }
                None => return Err(LexError::UnterminatedString { position: start }),
            }
        }

        body.split_whitespace()
            .map(|pair| {
                if pair.len() != 2 {
                    return Err(LexError::InvalidBytes {
                        reason: format!("'{}' is not a two-digit hex byte", pair),
                        position: start,
                    });
                }
                u8::from_str_radix(pair, 16).map_err(|_| LexError::InvalidBytes {
                    reason: format!("'{}' is not a hex byte", pair),
                    position: start,
                })
            })
            .collect()
    }

    fn read_number(&mut self, start: Position) -> Result<Token, LexError> {
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if self.current_char() == Some('.') && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            number.push('.');
            self.advance();
            while let Some(ch) = self.current_char().filter(|c| c.is_ascii_digit()) {
                number.push(ch);
                self.advance();
            }
        }

        if let Some(e) = self.current_char().filter(|c| *c == 'e' || *c == 'E') {
            let signed = matches!(self.peek_char(1), Some('+') | Some('-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_char(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                number.push(e);
                self.advance();
                if signed {
                    number.extend(self.current_char());
                    self.advance();
                }
                while let Some(ch) = self.current_char().filter(|c| c.is_ascii_digit()) {
                    number.push(ch);
                    self.advance();
                }
            }
        }

        // `12abc` is one malformed literal, not a number followed by a name
        if self
            .current_char()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
        {
            let suffix = self.read_identifier();
            return Err(LexError::InvalidNumber {
                literal: format!("{}{}", number, suffix),
                position: start,
            });
        }

        let invalid = || LexError::InvalidNumber {
            literal: number.clone(),
            position: start,
        };
        if is_float {
            number.parse::<f64>().map(Token::Float).map_err(|_| invalid())
        } else {
            // 2^63 only fits once negated; it lexes to i64::MIN and the parser
            // accepts it directly after a prefix minus
            match number.parse::<u64>() {
                Ok(n) if n == i64::MIN.unsigned_abs() => Ok(Token::Integer(i64::MIN)),
                Ok(n) => i64::try_from(n).map(Token::Integer).map_err(|_| invalid()),
                Err(_) => Err(invalid()),
            }
        }
    }

    /// Consumes one or two characters and yields the matching token.
    fn symbol(&mut self, second: char, double: Token, single: Token) -> Token {
        self.advance();
        if self.current_char() == Some(second) {
            self.advance();
            double
        } else {
            single
        }
    }

    pub fn next_token(&mut self) -> Result<SpannedToken, LexError> {
        self.skip_whitespace_and_comments();
        let position = self.position();

        let token = match self.current_char() {
            None => Token::Eof,
            Some('$') => {
                if self
                    .peek_char(1)
                    .is_some_and(|c| c.is_alphabetic() || c == '_')
                {
                    self.advance();
                    Token::Variable(self.read_identifier())
                } else {
                    return Err(LexError::UnexpectedCharacter { ch: '$', position });
                }
            }
            Some('|') => {
                self.advance();
                Token::Pipe
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some(';') => {
                self.advance();
                Token::Semicolon
            }
            Some('+') => {
                self.advance();
                Token::Plus
            }
            Some('-') => {
                self.advance();
                Token::Minus
            }
            Some('*') => {
                self.advance();
                Token::Star
            }
            Some('%') => {
                self.advance();
                Token::Percent
            }
            Some('?') => {
                self.advance();
                Token::Question
            }
            Some('.') => self.symbol('.', Token::DotDot, Token::Dot),
            Some('/') => self.symbol('/', Token::DoubleSlash, Token::Slash),
            Some(':') => self.symbol(':', Token::ColonColon, Token::Colon),
            Some('>') => self.symbol('=', Token::GtEq, Token::Gt),
            Some('<') => self.symbol('=', Token::LtEq, Token::Lt),
            Some('=') if self.peek_char(1) == Some('=') => {
                self.advance();
                self.advance();
                Token::EqEq
            }
            Some('!') if self.peek_char(1) == Some('=') => {
                self.advance();
                self.advance();
                Token::NotEq
            }
            Some('{') => {
                self.advance();
                Token::LBrace
            }
            Some('}') => {
                self.advance();
                Token::RBrace
            }
            Some('(') => {
                self.advance();
                Token::LParen
            }
            Some(')') => {
                self.advance();
                Token::RParen
            }
            Some('[') => {
                self.advance();
                Token::LBracket
            }
            Some(']') => {
                self.advance();
                Token::RBracket
            }
            Some('"') => Token::String(self.read_string(position)?),
            Some('h') if self.peek_char(1) == Some('"') => Token::Bytes(self.read_bytes(position)?),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();

                match ident.as_str() {
                    "if" => Token::If,
                    "then" => Token::Then,
                    "elif" => Token::Elif,
                    "else" => Token::Else,
                    "end" => Token::End,
                    "as" => Token::As,
                    "def" => Token::Def,
                    "reduce" => Token::Reduce,
                    "try" => Token::Try,
                    "catch" => Token::Catch,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    "null" => Token::Null,
                    _ => Token::Identifier(ident),
                }
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number(position)?,
            Some(ch) => return Err(LexError::UnexpectedCharacter { ch, position }),
        };

        Ok(SpannedToken { token, position })
    }
}

#[cfg(test)]
fn kinds(source: &str) -> Vec<Token> {
    Lexer::new(source)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|t| t.token)
        .collect()
}

#[test]
fn test_keywords() {
    assert_eq!(
        kinds("and or not true false null"),
        vec![
            Token::And,
            Token::Or,
            Token::Not,
            Token::Boolean(true),
            Token::Boolean(false),
            Token::Null,
            Token::Eof,
        ]
    );
}

#[test]
fn test_pipe() {
    assert_eq!(
        kinds(".[] | select(.x > 5)"),
        vec![
            Token::Dot,
            Token::LBracket,
            Token::RBracket,
            Token::Pipe,
            Token::Identifier("select".to_string()),
            Token::LParen,
            Token::Dot,
            Token::Identifier("x".to_string()),
            Token::Gt,
            Token::Integer(5),
            Token::RParen,
            Token::Eof,
        ]
    );
}

#[test]
fn test_positions_track_lines() {
    let tokens = Lexer::new(".a |\n  length").tokenize().unwrap();
    let length = &tokens[3];
    assert_eq!(length.token, Token::Identifier("length".to_string()));
    assert_eq!(length.position.line, 2);
    assert_eq!(length.position.column, 3);
    assert_eq!(length.position.offset, 7);
}
