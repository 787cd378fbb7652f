//! CLI support for aq-lang
//!
//! Provides programmatic access to the `aq` command for embedding in other
//! tools: compile a query, decode a JSON document stream, run it through the
//! driver and print the outputs.

mod convert;
mod output_file;
mod run;

pub use convert::{json_to_value, parse_documents, value_to_json};
pub use output_file::OutputFile;
pub use run::{RunOptions, RunOutcome, execute_run};

use std::io;

use thiserror::Error;

use crate::{CompileError, DriverError};

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid JSON for --argjson {name}: {source}")]
    ArgJson {
        name: String,
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("no input provided; use --input, --text, --null-input or pipe JSON to stdin")]
    NoInput,
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Compile(_) => 3,
            CliError::Driver(DriverError::Runtime { .. }) => 5,
            _ => 2,
        }
    }
}
