//! A small filter language for structured documents.
//!
//! A query is compiled once into an expression tree and then evaluated
//! against any number of documents. Every expression maps one input value to
//! a lazy stream of outputs, so pipelines over unbounded generators such as
//! `limit(3; range(0))` stay usable.
//!
//! ```
//! use aq_lang::{Query, Value};
//!
//! let query = Query::compile("[.[] | select(. > 2)] | map(. * 2)").unwrap();
//! let input = Value::Array((1..=4).map(Value::Integer).collect());
//!
//! let outputs: Vec<Value> = query.run(input).collect::<Result<_, _>>().unwrap();
//! assert_eq!(outputs, vec![Value::Array(vec![Value::Integer(6), Value::Integer(8)])]);
//! ```
pub mod ast;
pub mod builtins;
pub mod driver;
pub mod env;
pub mod evaluator;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod query;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinOp, Expr, ExprKind, Pattern, Token, UnaryOp};
pub use driver::{
    DocumentFailure, Driver, DriverError, DriverOptions, ErrorPolicy, OutputSink, RunSummary,
};
pub use env::Environment;
pub use evaluator::{ErrorKind, Evaluator, MAX_CALL_DEPTH, RuntimeError, ValueStream};
pub use lexer::{LexError, Lexer, Position};
pub use output::{to_text, to_text_pretty};
pub use parser::{ParseError, Parser};
pub use query::{CompileError, Outputs, Query};
pub use value::{Map, Value};
