use std::fmt;

use crate::lexer::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Integer
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0
    /// ```
    Integer(i64),

    /// Floating-point number, with fraction and/or exponent
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 1e3
    /// 2.5E-3
    /// ```
    Float(f64),

    /// String literal enclosed in double quotes
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// "tab\tand é"
    /// ```
    String(String),

    /// Byte-string literal of whitespace-separated hex pairs
    ///
    /// # Examples
    /// ```text
    /// h"0a 0b ff"
    /// ```
    Bytes(Vec<u8>),

    /// Boolean values
    Boolean(bool),

    /// Null value
    Null,

    // Identifiers and References
    /// Function or field name
    ///
    /// Must start with letter or underscore, followed by letters, digits, or underscores.
    ///
    /// # Examples
    /// ```text
    /// length
    /// sort_by
    /// _internal
    /// ```
    Identifier(String),

    /// Variable reference
    ///
    /// # Examples
    /// ```text
    /// $item
    /// $ENV
    /// ```
    Variable(String),

    // Keywords
    If,
    Then,
    Elif,
    Else,
    End,
    As,
    Def,
    Reduce,
    Try,
    Catch,

    // Operators
    /// Pipeline operator
    ///
    /// # Examples
    /// ```text
    /// .items | length
    /// ```
    Pipe,

    /// Alternative operator (`//`)
    ///
    /// # Examples
    /// ```text
    /// .name // "anonymous"
    /// ```
    DoubleSlash,

    /// Optional suffix
    ///
    /// # Examples
    /// ```text
    /// .name?
    /// .[]?
    /// ```
    Question,

    // Comparison
    /// Equality operator
    EqEq,

    /// Inequality operator
    NotEq,

    /// Less than
    Lt,

    /// Greater than
    Gt,

    /// Less than or equal
    LtEq,

    /// Greater than or equal
    GtEq,

    // Arithmetic
    /// Addition or concatenation
    Plus,

    /// Subtraction
    Minus,

    /// Multiplication
    Star,

    /// Division
    Slash,

    /// Modulo
    Percent,

    // Logical
    /// Logical AND (word, not symbol)
    And,

    /// Logical OR (word, not symbol)
    Or,

    /// Logical NOT (word, not symbol)
    Not,

    // Delimiters
    /// Left bracket for index, slice and array construction
    LBracket,

    /// Right bracket
    RBracket,

    /// Left parenthesis for grouping or function calls
    LParen,

    /// Right parenthesis
    RParen,

    /// Left brace for object construction
    LBrace,

    /// Right brace
    RBrace,

    /// Dot for identity, field access and method calls
    Dot,

    /// Recursive descent (`..`)
    DotDot,

    /// Comma for fan-out and separating elements
    Comma,

    /// Colon for object entries and slices
    Colon,

    /// Double colon inside variant tags (`Option::Some`)
    ColonColon,

    /// Semicolon separating arguments and ending definitions
    Semicolon,

    /// End of input
    Eof,
}

impl Token {
    /// Source text of a keyword token, so it can be reused as a field or key name.
    pub fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            Token::If => "if",
            Token::Then => "then",
            Token::Elif => "elif",
            Token::Else => "else",
            Token::End => "end",
            Token::As => "as",
            Token::Def => "def",
            Token::Reduce => "reduce",
            Token::Try => "try",
            Token::Catch => "catch",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::Boolean(true) => "true",
            Token::Boolean(false) => "false",
            Token::Null => "null",
            _ => return None,
        };
        Some(text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.keyword_text() {
            return write!(f, "'{}'", text);
        }
        match self {
            Token::Integer(i64::MIN) => write!(f, "integer {}", i64::MIN.unsigned_abs()),
            Token::Integer(n) => write!(f, "integer {}", n),
            Token::Float(n) => write!(f, "float {}", n),
            Token::String(s) => write!(f, "string {:?}", s),
            Token::Bytes(_) => f.write_str("byte string"),
            Token::Identifier(name) => write!(f, "identifier '{}'", name),
            Token::Variable(name) => write!(f, "variable '${}'", name),
            Token::Eof => f.write_str("end of input"),
            other => {
                let symbol = match other {
                    Token::Pipe => "|",
                    Token::DoubleSlash => "//",
                    Token::Question => "?",
                    Token::EqEq => "==",
                    Token::NotEq => "!=",
                    Token::Lt => "<",
                    Token::Gt => ">",
                    Token::LtEq => "<=",
                    Token::GtEq => ">=",
                    Token::Plus => "+",
                    Token::Minus => "-",
                    Token::Star => "*",
                    Token::Slash => "/",
                    Token::Percent => "%",
                    Token::LBracket => "[",
                    Token::RBracket => "]",
                    Token::LParen => "(",
                    Token::RParen => ")",
                    Token::LBrace => "{",
                    Token::RBrace => "}",
                    Token::Dot => ".",
                    Token::DotDot => "..",
                    Token::Comma => ",",
                    Token::Colon => ":",
                    Token::ColonColon => "::",
                    Token::Semicolon => ";",
                    _ => "?",
                };
                write!(f, "'{}'", symbol)
            }
        }
    }
}

/// A token together with the position where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub position: Position,
}
