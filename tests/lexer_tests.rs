// tests/lexer_tests.rs

use aq_lang::ast::Token;
use aq_lang::lexer::{LexError, Lexer};

fn tokens(input: &str) -> Vec<Token> {
    Lexer::new(input)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|t| t.token)
        .collect()
}

fn single(input: &str) -> Token {
    let mut all = tokens(input);
    assert_eq!(all.pop(), Some(Token::Eof), "input: {}", input);
    assert_eq!(all.len(), 1, "input: {}", input);
    all.remove(0)
}

// ============================================================================
// Symbols
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        ("|", Token::Pipe),
        (",", Token::Comma),
        (";", Token::Semicolon),
        ("?", Token::Question),
        ("+", Token::Plus),
        ("-", Token::Minus),
        ("*", Token::Star),
        ("/", Token::Slash),
        ("%", Token::Percent),
        ("(", Token::LParen),
        (")", Token::RParen),
        ("[", Token::LBracket),
        ("]", Token::RBracket),
        ("{", Token::LBrace),
        ("}", Token::RBrace),
        (".", Token::Dot),
        (":", Token::Colon),
        ("<", Token::Lt),
        (">", Token::Gt),
    ];

    for (input, expected) in test_cases {
        assert_eq!(single(input), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_two_char_tokens() {
    let test_cases = vec![
        ("==", Token::EqEq),
        ("!=", Token::NotEq),
        ("<=", Token::LtEq),
        (">=", Token::GtEq),
        ("//", Token::DoubleSlash),
        ("..", Token::DotDot),
        ("::", Token::ColonColon),
    ];

    for (input, expected) in test_cases {
        assert_eq!(single(input), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_lone_equals_is_rejected() {
    let err = Lexer::new(". = 1").tokenize().unwrap_err();
    assert!(matches!(err, LexError::UnexpectedCharacter { ch: '=', .. }));
    assert_eq!(err.offset(), 2);
}

#[test]
fn test_lone_dollar_is_rejected() {
    let err = Lexer::new("$ ").tokenize().unwrap_err();
    assert!(matches!(err, LexError::UnexpectedCharacter { ch: '$', .. }));
}

// ============================================================================
// Keywords and names
// ============================================================================

#[test]
fn test_keywords() {
    let test_cases = vec![
        ("if", Token::If),
        ("then", Token::Then),
        ("elif", Token::Elif),
        ("else", Token::Else),
        ("end", Token::End),
        ("as", Token::As),
        ("def", Token::Def),
        ("reduce", Token::Reduce),
        ("try", Token::Try),
        ("catch", Token::Catch),
        ("and", Token::And),
        ("or", Token::Or),
        ("not", Token::Not),
        ("true", Token::Boolean(true)),
        ("false", Token::Boolean(false)),
        ("null", Token::Null),
    ];

    for (input, expected) in test_cases {
        assert_eq!(single(input), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_identifiers_and_variables() {
    assert_eq!(single("sort_by"), Token::Identifier("sort_by".into()));
    assert_eq!(single("_x1"), Token::Identifier("_x1".into()));
    assert_eq!(single("ifx"), Token::Identifier("ifx".into()));
    assert_eq!(single("$item"), Token::Variable("item".into()));
    assert_eq!(single("$ENV"), Token::Variable("ENV".into()));
}

#[test]
fn test_variant_tag() {
    assert_eq!(
        tokens("Option::Some(1)"),
        vec![
            Token::Identifier("Option".into()),
            Token::ColonColon,
            Token::Identifier("Some".into()),
            Token::LParen,
            Token::Integer(1),
            Token::RParen,
            Token::Eof,
        ]
    );
}

// ============================================================================
// Numbers
// ============================================================================

#[test]
fn test_numbers() {
    assert_eq!(single("0"), Token::Integer(0));
    assert_eq!(single("42"), Token::Integer(42));
    assert_eq!(single("2.75"), Token::Float(2.75));
    assert_eq!(single("1e3"), Token::Float(1000.0));
    assert_eq!(single("2.5E-3"), Token::Float(0.0025));
    assert_eq!(single("1e+2"), Token::Float(100.0));
}

#[test]
fn test_integer_followed_by_dot() {
    assert_eq!(
        tokens("1.a"),
        vec![
            Token::Integer(1),
            Token::Dot,
            Token::Identifier("a".into()),
            Token::Eof
        ]
    );
}

#[test]
fn test_negative_number_is_two_tokens() {
    assert_eq!(tokens("-5"), vec![Token::Minus, Token::Integer(5), Token::Eof]);
}

#[test]
fn test_invalid_numbers() {
    let err = Lexer::new("12abc").tokenize().unwrap_err();
    assert!(matches!(err, LexError::InvalidNumber { ref literal, .. } if literal == "12abc"));

    let err = Lexer::new("99999999999999999999").tokenize().unwrap_err();
    assert!(matches!(err, LexError::InvalidNumber { .. }));
}

#[test]
fn test_integer_range_edges() {
    assert_eq!(single("9223372036854775807"), Token::Integer(i64::MAX));
    // only valid after a prefix minus, which the parser checks
    assert_eq!(single("9223372036854775808"), Token::Integer(i64::MIN));

    let err = Lexer::new("9223372036854775809").tokenize().unwrap_err();
    assert!(matches!(err, LexError::InvalidNumber { .. }));
}

// ============================================================================
// Strings and bytes
// ============================================================================

#[test]
fn test_string_escapes() {
    assert_eq!(single(r#""a\nb""#), Token::String("a\nb".into()));
    assert_eq!(single(r#""q\"q""#), Token::String("q\"q".into()));
    assert_eq!(single(r#""é""#), Token::String("é".into()));
    assert_eq!(single(r#""😀""#), Token::String("😀".into()));
    assert_eq!(single(r#""tab\t/\/""#), Token::String("tab\t//".into()));
}

#[test]
fn test_unicode_passthrough() {
    assert_eq!(single("\"héllo 世界\""), Token::String("héllo 世界".into()));
}

#[test]
fn test_invalid_escape() {
    let err = Lexer::new(r#""\x""#).tokenize().unwrap_err();
    assert!(matches!(err, LexError::InvalidEscape { ref escape, .. } if escape == "x"));
    assert_eq!(err.offset(), 1);
}

#[test]
fn test_lone_surrogate() {
    let err = Lexer::new(r#""\ud83d""#).tokenize().unwrap_err();
    assert!(matches!(err, LexError::InvalidEscape { .. }));
}

#[test]
fn test_unterminated_string() {
    let err = Lexer::new("  \"abc").tokenize().unwrap_err();
    assert!(matches!(err, LexError::UnterminatedString { .. }));
    assert_eq!(err.offset(), 2);
}

#[test]
fn test_bytes() {
    assert_eq!(single("h\"0a ff 00\""), Token::Bytes(vec![0x0a, 0xff, 0x00]));
    assert_eq!(single("h\"\""), Token::Bytes(vec![]));
    assert_eq!(single("h"), Token::Identifier("h".into()));
}

#[test]
fn test_invalid_bytes() {
    let err = Lexer::new("h\"0g\"").tokenize().unwrap_err();
    assert!(matches!(err, LexError::InvalidBytes { .. }));

    let err = Lexer::new("h\"abc\"").tokenize().unwrap_err();
    assert!(matches!(err, LexError::InvalidBytes { .. }));
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        tokens(".a # the a field\n| length"),
        vec![
            Token::Dot,
            Token::Identifier("a".into()),
            Token::Pipe,
            Token::Identifier("length".into()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_empty_input() {
    assert_eq!(tokens(""), vec![Token::Eof]);
    assert_eq!(tokens("   # only a comment"), vec![Token::Eof]);
}

#[test]
fn test_positions() {
    let spanned = Lexer::new("é | .b").tokenize().unwrap();
    // `é` is two bytes but one column
    assert_eq!(spanned[1].position.offset, 3);
    assert_eq!(spanned[1].position.column, 3);
    assert_eq!(spanned[3].position.offset, 6);
    assert_eq!(spanned[4].position.offset, 7);
}
