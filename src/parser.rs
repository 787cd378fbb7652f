use std::mem;

use thiserror::Error;

use crate::{
    ast::{BinOp, Expr, ExprKind, Param, Pattern, SpannedToken, Token, UnaryOp},
    lexer::Position,
    value::Value,
};

/// Deepest nesting of brackets, prefix operators and other recursive
/// constructs the parser accepts.
pub const MAX_NESTING: usize = 128;

/// A token stream that does not form a valid query.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("expected {expected}, found {found} at {position}")]
pub struct ParseError {
    pub expected: String,
    pub found: String,
    pub position: Position,
}

/// Parses a complete token stream (as produced by
/// [`Lexer::tokenize`](crate::lexer::Lexer::tokenize)) into one expression.
pub fn parse(tokens: Vec<SpannedToken>) -> Result<Expr, ParseError> {
    Parser::new(tokens).parse()
}

pub struct Parser {
    tokens: Vec<SpannedToken>,
    index: usize,
    /// Inside call arguments and object bodies a top-level comma separates
    /// items instead of fanning out.
    comma_separates: bool,
    depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<SpannedToken>) -> Self {
        if tokens.last().is_none_or(|t| t.token != Token::Eof) {
            let position = tokens.last().map(|t| t.position).unwrap_or_default();
            tokens.push(SpannedToken {
                token: Token::Eof,
                position,
            });
        }
        Parser {
            tokens,
            index: 0,
            comma_separates: false,
            depth: 0,
        }
    }

    /// Parses the whole query; trailing tokens are an error.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_pipe()?;
        self.expect(Token::Eof, "end of input")?;
        Ok(expr)
    }

    fn current(&self) -> &Token {
        &self.tokens[self.index].token
    }

    fn position(&self) -> Position {
        self.tokens[self.index].position
    }

    fn peek(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.index + offset).min(last)].token
    }

    /// Moves past the current token and returns it. `Eof` is never consumed.
    fn advance(&mut self) -> Token {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
            mem::replace(&mut self.tokens[self.index - 1].token, Token::Eof)
        } else {
            Token::Eof
        }
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(self.current()) == mem::discriminant(token)
    }

    fn expect(&mut self, expected: Token, description: &str) -> Result<Position, ParseError> {
        if !self.check(&expected) {
            return Err(self.error(description));
        }
        let position = self.position();
        self.advance();
        Ok(position)
    }

    fn error(&self, expected: &str) -> ParseError {
        ParseError {
            expected: expected.to_string(),
            found: self.current().to_string(),
            position: self.position(),
        }
    }

    /// Runs `f` one nesting level deeper.
    fn descend<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("a less deeply nested expression"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn with_comma_mode<T>(
        &mut self,
        separates: bool,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = mem::replace(&mut self.comma_separates, separates);
        let result = f(self);
        self.comma_separates = saved;
        result
    }

    /// Parses a full pipeline in which commas fan out.
    fn parse_nested(&mut self) -> Result<Expr, ParseError> {
        self.with_comma_mode(false, |p| p.parse_pipe())
    }

    fn parse_pipe(&mut self) -> Result<Expr, ParseError> {
        self.descend(Self::pipeline)
    }

    fn pipeline(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Token::Def) {
            return self.parse_def();
        }

        let mut left = self.parse_comma()?;

        while self.check(&Token::Pipe) {
            let position = self.position();
            self.advance();
            let right = if self.check(&Token::Def) {
                self.parse_def()?
            } else {
                self.parse_comma()?
            };

            left = Expr::new(
                ExprKind::Pipe {
                    left: Box::new(left),
                    right: Box::new(right),
                },
                position,
            );
        }
        Ok(left)
    }

    fn parse_comma(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_alternative()?;
        if self.comma_separates {
            return Ok(left);
        }

        while self.check(&Token::Comma) {
            let position = self.position();
            self.advance();
            let right = self.parse_alternative()?;

            left = Expr::new(
                ExprKind::Comma {
                    left: Box::new(left),
                    right: Box::new(right),
                },
                position,
            );
        }
        Ok(left)
    }

    fn parse_alternative(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_or()?;

        if self.check(&Token::DoubleSlash) {
            let position = self.position();
            self.advance();
            // Right-associative
            let right = self.descend(Self::parse_alternative)?;
            return Ok(binary(BinOp::Alternative, left, right, position));
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;

        while self.check(&Token::Or) {
            let position = self.position();
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinOp::Or, left, right, position);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;

        while self.check(&Token::And) {
            let position = self.position();
            self.advance();
            let right = self.parse_not()?;
            left = binary(BinOp::And, left, right, position);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        // A bare `not` (e.g. `. | not`) is the built-in function, handled in parse_primary
        if self.check(&Token::Not) && starts_operand(self.peek(1)) {
            let position = self.position();
            self.advance();
            let operand = self.descend(Self::parse_not)?;
            return Ok(Expr::new(
                ExprKind::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                position,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;

        let Some(op) = comparison_op(self.current()) else {
            return Ok(left);
        };
        let position = self.position();
        self.advance();
        let right = self.parse_additive()?;

        if comparison_op(self.current()).is_some() {
            return Err(self.error("an operand grouped with parentheses (comparisons do not chain)"));
        }
        Ok(binary(op, left, right, position))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Subtract,
                _ => break,
            };

            let position = self.position();
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right, position);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current() {
                Token::Star => BinOp::Multiply,
                Token::Slash => BinOp::Divide,
                Token::Percent => BinOp::Modulo,
                _ => break,
            };

            let position = self.position();
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right, position);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if !self.check(&Token::Minus) {
            return self.parse_binding();
        }

        let position = self.position();
        self.advance();
        if *self.current() == Token::Integer(i64::MIN) {
            // The lexer's marker for 2^63, which is only valid negated
            self.advance();
            return Ok(Expr::new(ExprKind::Literal(Value::Integer(i64::MIN)), position));
        }
        let operand = self.descend(Self::parse_unary)?;

        // Fold negative number literals
        let kind = match operand.kind {
            ExprKind::Literal(Value::Integer(n)) if n != i64::MIN => {
                ExprKind::Literal(Value::Integer(-n))
            }
            ExprKind::Literal(Value::Float(n)) => ExprKind::Literal(Value::Float(-n)),
            kind => ExprKind::UnaryOp {
                op: UnaryOp::Negate,
                operand: Box::new(Expr::new(kind, operand.position)),
            },
        };
        Ok(Expr::new(kind, position))
    }

    /// `term as pattern | body`; the body extends as far right as a pipeline can.
    fn parse_binding(&mut self) -> Result<Expr, ParseError> {
        let source = self.parse_postfix()?;
        if !self.check(&Token::As) {
            return Ok(source);
        }

        let position = self.position();
        self.advance();
        let pattern = self.parse_pattern()?;
        self.expect(Token::Pipe, "'|' after binding pattern")?;
        let body = self.parse_pipe()?;

        Ok(Expr::new(
            ExprKind::As {
                source: Box::new(source),
                pattern,
                body: Box::new(body),
            },
            position,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current() {
                Token::Dot => {
                    let dot = self.position();
                    match self.peek(1) {
                        Token::LBracket => {
                            self.advance();
                        }
                        _ => match self.field_name_after_dot() {
                            Some(name) => {
                                self.advance(); // '.'
                                self.advance(); // name
                                expr = self.parse_field_or_method(expr, name, dot)?;
                            }
                            None => break,
                        },
                    }
                }
                Token::LBracket => {
                    expr = self.parse_bracket_suffix(expr)?;
                }
                Token::Question => {
                    let position = self.position();
                    self.advance();
                    expr = make_optional(expr, position);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Name of the field in `.name`, `.if`, or `."quoted"` when it directly follows
    /// the dot at the cursor.
    fn field_name_after_dot(&self) -> Option<String> {
        let dot = &self.tokens[self.index];
        let next = self.tokens.get(self.index + 1)?;
        if next.position.offset != dot.position.offset + 1 {
            return None;
        }
        match &next.token {
            Token::Identifier(name) | Token::String(name) => Some(name.clone()),
            token => token.keyword_text().map(str::to_string),
        }
    }

    fn parse_field_or_method(
        &mut self,
        target: Expr,
        name: String,
        position: Position,
    ) -> Result<Expr, ParseError> {
        if self.check(&Token::LParen) {
            // Method-call chaining: `t.name(args)` is `t | name(args)`
            let args = self.parse_args()?;
            let call = Expr::new(ExprKind::FunctionCall { name, args }, position);
            return Ok(Expr::new(
                ExprKind::Pipe {
                    left: Box::new(target),
                    right: Box::new(call),
                },
                position,
            ));
        }

        Ok(Expr::new(
            ExprKind::Field {
                target: Box::new(target),
                name,
                optional: false,
            },
            position,
        ))
    }

    /// Parses `[]`, `[e]`, `[e:e]`, `[:e]` and `[e:]` following `target`.
    fn parse_bracket_suffix(&mut self, target: Expr) -> Result<Expr, ParseError> {
        let position = self.expect(Token::LBracket, "'['")?;
        let target = Box::new(target);

        if self.check(&Token::RBracket) {
            self.advance();
            return Ok(Expr::new(
                ExprKind::Iterate {
                    target,
                    optional: false,
                },
                position,
            ));
        }

        let from = if self.check(&Token::Colon) {
            None
        } else {
            Some(Box::new(self.parse_nested()?))
        };

        if self.check(&Token::Colon) {
            self.advance();
            let to = if self.check(&Token::RBracket) {
                None
            } else {
                Some(Box::new(self.parse_nested()?))
            };
            self.expect(Token::RBracket, "']' to close slice")?;
            return Ok(Expr::new(
                ExprKind::Slice {
                    target,
                    from,
                    to,
                    optional: false,
                },
                position,
            ));
        }

        self.expect(Token::RBracket, "']' to close index")?;
        let index = from.ok_or_else(|| self.error("index expression"))?;
        Ok(Expr::new(
            ExprKind::Index {
                target,
                index,
                optional: false,
            },
            position,
        ))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.descend(Self::primary)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();

        let kind = match self.current() {
            Token::Dot => {
                // `.name` and `.[...]` are completed by the postfix loop
                let continues = matches!(self.peek(1), Token::LBracket)
                    || self.field_name_after_dot().is_some();
                if !continues {
                    self.advance();
                }
                ExprKind::Identity
            }
            Token::DotDot => {
                self.advance();
                ExprKind::FunctionCall {
                    name: "recurse".to_string(),
                    args: vec![],
                }
            }
            Token::Integer(i64::MIN) => {
                return Err(self.error("an integer within the 64-bit range"));
            }
            Token::Integer(_)
            | Token::Float(_)
            | Token::String(_)
            | Token::Bytes(_)
            | Token::Boolean(_)
            | Token::Null => ExprKind::Literal(literal_value(self.advance())),
            Token::Not => {
                self.advance();
                ExprKind::FunctionCall {
                    name: "not".to_string(),
                    args: vec![],
                }
            }
            Token::Variable(_) => match self.advance() {
                Token::Variable(name) => ExprKind::VariableRef(name),
                _ => unreachable!(),
            },
            Token::Identifier(_) => {
                let name = match self.advance() {
                    Token::Identifier(name) => name,
                    _ => unreachable!(),
                };
                if self.check(&Token::ColonColon) {
                    return self.parse_variant(name, position);
                }
                let args = if self.check(&Token::LParen) {
                    self.parse_args()?
                } else {
                    vec![]
                };
                ExprKind::FunctionCall { name, args }
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_nested()?;
                self.expect(Token::RParen, "')'")?;
                return Ok(inner);
            }
            Token::LBracket => {
                self.advance();
                if self.check(&Token::RBracket) {
                    self.advance();
                    ExprKind::ArrayConstruct(None)
                } else {
                    let inner = self.parse_nested()?;
                    self.expect(Token::RBracket, "']' to close array")?;
                    ExprKind::ArrayConstruct(Some(Box::new(inner)))
                }
            }
            Token::LBrace => {
                self.advance();
                return self.with_comma_mode(true, |p| p.parse_object_construct(position));
            }
            Token::If => {
                self.advance();
                return self.parse_if_tail(position);
            }
            Token::Try => return self.parse_try(),
            Token::Reduce => return self.parse_reduce(),
            _ => return Err(self.error("an expression")),
        };

        Ok(Expr::new(kind, position))
    }

    /// Parses `(a; b, c)`; arguments are separated by `;` or `,`.
    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(Token::LParen, "'('")?;
        let mut args = vec![];

        if self.check(&Token::RParen) {
            self.advance();
            return Ok(args);
        }

        loop {
            args.push(self.with_comma_mode(true, |p| p.parse_pipe())?);

            match self.current() {
                Token::Semicolon | Token::Comma => {
                    self.advance();
                }
                Token::RParen => {
                    self.advance();
                    return Ok(args);
                }
                _ => return Err(self.error("';', ',' or ')' in argument list")),
            }
        }
    }

    fn parse_variant(&mut self, first: String, position: Position) -> Result<Expr, ParseError> {
        let mut tag = first;
        while self.check(&Token::ColonColon) {
            self.advance();
            match self.advance() {
                Token::Identifier(part) => {
                    tag.push_str("::");
                    tag.push_str(&part);
                }
                other => {
                    return Err(ParseError {
                        expected: "variant name after '::'".to_string(),
                        found: other.to_string(),
                        position: self.tokens[self.index - 1].position,
                    });
                }
            }
        }

        let payload = if self.check(&Token::LParen) {
            self.advance();
            let inner = self.parse_nested()?;
            self.expect(Token::RParen, "')' to close variant payload")?;
            Some(Box::new(inner))
        } else {
            None
        };

        Ok(Expr::new(ExprKind::VariantConstruct { tag, payload }, position))
    }

    fn parse_object_construct(&mut self, position: Position) -> Result<Expr, ParseError> {
        let mut entries = vec![];

        while !self.check(&Token::RBrace) {
            let key_position = self.position();

            let entry = match self.current().clone() {
                Token::Variable(name) => {
                    self.advance();
                    let value = Expr::new(ExprKind::VariableRef(name.clone()), key_position);
                    (string_literal(name, key_position), value)
                }
                Token::LParen => {
                    self.advance();
                    let key = self.parse_nested()?;
                    self.expect(Token::RParen, "')' to close computed key")?;
                    self.expect(Token::Colon, "':' after object key")?;
                    (key, self.parse_alternative()?)
                }
                token => {
                    let name = match token {
                        Token::Identifier(name) | Token::String(name) => name,
                        other => match other.keyword_text() {
                            Some(text) => text.to_string(),
                            None => return Err(self.error("object key")),
                        },
                    };
                    self.advance();

                    let value = if self.check(&Token::Colon) {
                        self.advance();
                        self.parse_alternative()?
                    } else {
                        // `{name}` is `{name: .name}`
                        Expr::new(
                            ExprKind::Field {
                                target: Box::new(Expr::identity(key_position)),
                                name: name.clone(),
                                optional: false,
                            },
                            key_position,
                        )
                    };
                    (string_literal(name, key_position), value)
                }
            };
            entries.push(entry);

            if self.check(&Token::Comma) {
                self.advance();
            } else if !self.check(&Token::RBrace) {
                return Err(self.error("',' or '}' in object"));
            }
        }

        self.expect(Token::RBrace, "'}'")?;
        Ok(Expr::new(ExprKind::ObjectConstruct(entries), position))
    }

    /// Parses the rest of `if`/`elif`; the keyword is already consumed.
    fn parse_if_tail(&mut self, position: Position) -> Result<Expr, ParseError> {
        let cond = self.parse_nested()?;
        self.expect(Token::Then, "'then'")?;
        let then_branch = self.parse_nested()?;

        let else_branch = match self.current() {
            Token::Elif => {
                let elif = self.position();
                self.advance();
                Some(Box::new(self.descend(|p| p.parse_if_tail(elif))?))
            }
            Token::Else => {
                self.advance();
                let branch = self.parse_nested()?;
                self.expect(Token::End, "'end'")?;
                Some(Box::new(branch))
            }
            Token::End => {
                self.advance();
                None
            }
            _ => return Err(self.error("'elif', 'else' or 'end'")),
        };

        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            position,
        ))
    }

    fn parse_try(&mut self) -> Result<Expr, ParseError> {
        let position = self.expect(Token::Try, "'try'")?;
        let body = self.parse_postfix()?;

        let catch = if self.check(&Token::Catch) {
            self.advance();
            Some(Box::new(self.parse_postfix()?))
        } else {
            None
        };

        Ok(Expr::new(
            ExprKind::Try {
                body: Box::new(body),
                catch,
            },
            position,
        ))
    }

    fn parse_reduce(&mut self) -> Result<Expr, ParseError> {
        let position = self.expect(Token::Reduce, "'reduce'")?;
        let source = self.parse_postfix()?;
        self.expect(Token::As, "'as'")?;
        let pattern = self.parse_pattern()?;
        self.expect(Token::LParen, "'(' after reduce pattern")?;
        let init = self.parse_nested()?;
        self.expect(Token::Semicolon, "';' between reduce initial value and update")?;
        let update = self.parse_nested()?;
        self.expect(Token::RParen, "')' to close reduce")?;

        Ok(Expr::new(
            ExprKind::Reduce {
                source: Box::new(source),
                pattern,
                init: Box::new(init),
                update: Box::new(update),
            },
            position,
        ))
    }

    /// Parses `def name(params): body; rest`.
    fn parse_def(&mut self) -> Result<Expr, ParseError> {
        let position = self.expect(Token::Def, "'def'")?;

        let name = match self.current() {
            Token::Identifier(_) => match self.advance() {
                Token::Identifier(name) => name,
                _ => unreachable!(),
            },
            _ => return Err(self.error("function name after 'def'")),
        };

        let mut params = vec![];
        if self.check(&Token::LParen) {
            self.advance();
            loop {
                let param = match self.advance() {
                    Token::Identifier(p) => Param::Filter(p),
                    Token::Variable(p) => Param::Value(p),
                    other => {
                        return Err(ParseError {
                            expected: "parameter name".to_string(),
                            found: other.to_string(),
                            position: self.tokens[self.index - 1].position,
                        });
                    }
                };
                params.push(param);

                match self.current() {
                    Token::Semicolon | Token::Comma => {
                        self.advance();
                    }
                    Token::RParen => {
                        self.advance();
                        break;
                    }
                    _ => return Err(self.error("';' or ')' in parameter list")),
                }
            }
        }

        self.expect(Token::Colon, "':' after function signature")?;
        let body = self.parse_nested()?;
        self.expect(Token::Semicolon, "';' after function body")?;
        let rest = self.parse_pipe()?;

        Ok(Expr::new(
            ExprKind::FunctionDef {
                name,
                params,
                body: Box::new(body),
                rest: Box::new(rest),
            },
            position,
        ))
    }

    fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        let start = self.position();
        let pattern = self.parse_pattern_inner()?;

        let names = pattern.variables();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ParseError {
                    expected: "distinct variable names in pattern".to_string(),
                    found: format!("duplicate variable '${}'", name),
                    position: start,
                });
            }
        }
        Ok(pattern)
    }

    fn parse_pattern_inner(&mut self) -> Result<Pattern, ParseError> {
        match self.current().clone() {
            Token::Variable(name) => {
                self.advance();
                Ok(Pattern::Variable(name))
            }
            Token::LBracket => {
                self.advance();
                let mut items = vec![self.descend(Self::parse_pattern_inner)?];
                while self.check(&Token::Comma) {
                    self.advance();
                    items.push(self.descend(Self::parse_pattern_inner)?);
                }
                self.expect(Token::RBracket, "']' to close array pattern")?;
                Ok(Pattern::Array(items))
            }
            Token::LBrace => {
                self.advance();
                let mut entries = vec![];
                loop {
                    let entry = match self.current().clone() {
                        Token::Variable(name) => {
                            self.advance();
                            (name.clone(), Pattern::Variable(name))
                        }
                        token => {
                            let key = match token {
                                Token::Identifier(key) | Token::String(key) => key,
                                other => match other.keyword_text() {
                                    Some(text) => text.to_string(),
                                    None => return Err(self.error("key in object pattern")),
                                },
                            };
                            self.advance();
                            self.expect(Token::Colon, "':' after pattern key")?;
                            (key, self.descend(Self::parse_pattern_inner)?)
                        }
                    };
                    entries.push(entry);

                    if self.check(&Token::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(Token::RBrace, "'}' to close object pattern")?;
                Ok(Pattern::Object(entries))
            }
            _ => Err(self.error("binding pattern ('$name', '[...]' or '{...}')")),
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr, position: Position) -> Expr {
    Expr::new(
        ExprKind::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        position,
    )
}

fn string_literal(text: String, position: Position) -> Expr {
    Expr::new(ExprKind::Literal(Value::String(text)), position)
}

fn literal_value(token: Token) -> Value {
    match token {
        Token::Integer(n) => Value::Integer(n),
        Token::Float(n) => Value::Float(n),
        Token::String(s) => Value::String(s),
        Token::Bytes(b) => Value::Bytes(b),
        Token::Boolean(b) => Value::Boolean(b),
        _ => Value::Null,
    }
}

fn comparison_op(token: &Token) -> Option<BinOp> {
    match token {
        Token::EqEq => Some(BinOp::Equal),
        Token::NotEq => Some(BinOp::NotEqual),
        Token::Lt => Some(BinOp::LessThan),
        Token::Gt => Some(BinOp::GreaterThan),
        Token::LtEq => Some(BinOp::LessEqual),
        Token::GtEq => Some(BinOp::GreaterEqual),
        _ => None,
    }
}

/// Whether `token` can begin the operand of a prefix `not`.
fn starts_operand(token: &Token) -> bool {
    matches!(
        token,
        Token::Dot
            | Token::DotDot
            | Token::Integer(_)
            | Token::Float(_)
            | Token::String(_)
            | Token::Bytes(_)
            | Token::Boolean(_)
            | Token::Null
            | Token::Identifier(_)
            | Token::Variable(_)
            | Token::LParen
            | Token::LBracket
            | Token::LBrace
            | Token::Minus
            | Token::Not
            | Token::If
            | Token::Try
            | Token::Reduce
    )
}

/// Applies a `?` suffix: access nodes become optional, anything else is wrapped in `try`.
fn make_optional(expr: Expr, position: Position) -> Expr {
    let Expr { kind, position: at } = expr;
    let kind = match kind {
        ExprKind::Field { target, name, optional: false } => ExprKind::Field {
            target,
            name,
            optional: true,
        },
        ExprKind::Index { target, index, optional: false } => ExprKind::Index {
            target,
            index,
            optional: true,
        },
        ExprKind::Slice { target, from, to, optional: false } => ExprKind::Slice {
            target,
            from,
            to,
            optional: true,
        },
        ExprKind::Iterate { target, optional: false } => ExprKind::Iterate {
            target,
            optional: true,
        },
        kind => {
            return Expr::new(
                ExprKind::Try {
                    body: Box::new(Expr::new(kind, at)),
                    catch: None,
                },
                position,
            );
        }
    };
    Expr::new(kind, at)
}
