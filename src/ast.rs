//! # Query Language - Abstract Syntax Tree
//!
//! This module defines the tokens and the Abstract Syntax Tree (AST) of the
//! query language, a small filter language for structured documents in which
//! every expression maps one input value to a stream of zero or more outputs.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (access, construction, operators, bindings)
//! - **[operators]** - Binary and unary operators
//! - **[pattern]** - Destructuring patterns for `as` and `reduce`
//!
//! ## Quick Start
//!
//! ```text
//! .orders[] | select(.total > 100) | {id, customer: .customer.name}
//! ```
//!
//! This query iterates the orders, keeps the large ones and builds a summary
//! object for each of them.
//!
//! ## Core Concepts
//!
//! ### Streams
//!
//! `,` produces the outputs of both sides, `|` feeds every output of the left
//! side into the right side, and `[...]` collects a stream into one array.
//!
//! ```text
//! .a, .b          # two outputs
//! .items[] | .id  # one output per item
//! [.items[].id]   # one array
//! ```
//!
//! ### Construction fans out
//!
//! ```text
//! {a: (1, 2), b: 3}   # {"a": 1, "b": 3} then {"a": 2, "b": 3}
//! ```
//!
//! ### Truthiness
//!
//! Everything is truthy except `false` and `null`; `0`, `""` and `[]` are true.
//!
//! ## Examples
//!
//! ```text
//! .items | map(.price * 1.1)
//! .users[] as {name: $n, $age} | select($age >= 18) | $n
//! def fact: if . <= 1 then 1 else . * (. - 1 | fact) end; fact
//! reduce .[] as $x (0; . + $x)
//! ```
pub mod expressions;
pub mod operators;
pub mod pattern;
pub mod tokens;

pub use expressions::{Expr, ExprKind, Param};
pub use operators::{BinOp, UnaryOp};
pub use pattern::Pattern;
pub use tokens::{SpannedToken, Token};
