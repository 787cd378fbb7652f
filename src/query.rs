use log::debug;
use thiserror::Error;

use crate::{
    ast::Expr,
    env::Environment,
    evaluator::{Evaluator, RuntimeError, ValueStream},
    lexer::{LexError, Lexer, Position},
    parser::{self, ParseError},
    value::Value,
};

/// Errors that stop a query from compiling. Both are fatal for a whole run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("lexical error: {0}")]
    Lex(#[from] LexError),

    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),
}

impl CompileError {
    pub fn position(&self) -> Position {
        match self {
            CompileError::Lex(e) => e.position(),
            CompileError::Parse(e) => e.position,
        }
    }
}

/// A compiled query: the parsed expression tree, built once and evaluated
/// read-only against any number of documents.
///
/// # Examples
///
/// ```
/// use aq_lang::{Query, Value};
///
/// let query = Query::compile("{a: (1, 2), b: 3}").unwrap();
/// let outputs: Vec<Value> = query.run(Value::Null).collect::<Result<_, _>>().unwrap();
///
/// assert_eq!(outputs.len(), 2);
/// assert_eq!(
///     outputs[1],
///     Value::object([("a", Value::Integer(2)), ("b", Value::Integer(3))])
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    expr: Expr,
}

impl Query {
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        let tokens = Lexer::new(source).tokenize()?;
        debug!("lexed query into {} tokens", tokens.len());
        let expr = parser::parse(tokens)?;
        debug!("compiled query {:?}", source);

        Ok(Query {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluates the query against one document.
    pub fn run(&self, input: Value) -> Outputs<'_> {
        self.run_with(input, &[])
    }

    /// Evaluates the query with extra `$name` variables in scope.
    pub fn run_with(&self, input: Value, variables: &[(String, Value)]) -> Outputs<'_> {
        let env = Environment::with_variables(variables.iter().cloned());
        Outputs {
            stream: Some(Evaluator::new().evaluate(&self.expr, input, &env)),
        }
    }
}

/// Outputs of a query for one document.
///
/// The sequence ends right after the first error: a failure aborts the
/// current document only. Dropping it abandons the rest of the evaluation.
pub struct Outputs<'a> {
    stream: Option<ValueStream<'a>>,
}

impl Iterator for Outputs<'_> {
    type Item = Result<Value, RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.stream.as_mut()?.next();
        if !matches!(item, Some(Ok(_))) {
            self.stream = None;
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_stops_after_error() {
        let query = Query::compile("1, error(\"boom\"), 3").unwrap();
        let outputs: Vec<_> = query.run(Value::Null).collect();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0], Ok(Value::Integer(1)));
        assert!(outputs[1].is_err());
    }

    #[test]
    fn test_compile_error_position() {
        let err = Query::compile("1 +").unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
        assert_eq!(err.position().offset, 3);
    }

    #[test]
    fn test_variables() {
        let query = Query::compile("$x + 1").unwrap();
        let outputs: Vec<_> = query
            .run_with(Value::Null, &[("x".to_string(), Value::Integer(41))])
            .collect();
        assert_eq!(outputs, vec![Ok(Value::Integer(42))]);
    }
}
