//! Execute aq queries against JSON input

use std::io::{self, Write};

use super::{CliError, parse_documents, value_to_json};
use crate::{
    DocumentFailure, Driver, DriverOptions, ErrorPolicy, OutputSink, Query, RunSummary, Value,
    output::TextPrinter,
};

/// Options for one invocation
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// The query source
    pub query: String,
    /// JSON document stream; not needed with `null_input`
    pub input: Option<String>,
    /// Run the query once against `null` instead of reading documents
    pub null_input: bool,
    /// Collect every document into one array
    pub slurp: bool,
    /// One line per output
    pub compact: bool,
    /// Strict JSON output instead of the native text form
    pub json: bool,
    /// Only validate syntax, don't execute
    pub syntax_only: bool,
    pub policy: ErrorPolicy,
    pub jobs: usize,
    pub max_outputs: Option<usize>,
    /// Variables bound as `$name`
    pub bindings: Vec<(String, Value)>,
}

/// Result of a run
#[derive(Debug)]
pub enum RunOutcome {
    /// Syntax validation passed
    SyntaxValid,
    /// Query executed; failed documents are listed in the summary
    Completed(RunSummary),
}

/// Writes each output on its own line and failures to stderr.
struct WriterSink<'w> {
    writer: &'w mut dyn Write,
    printer: TextPrinter,
    json: bool,
    compact: bool,
}

impl OutputSink for WriterSink<'_> {
    fn output(&mut self, _document: usize, value: Value) -> io::Result<()> {
        let text = if self.json {
            let json = value_to_json(value);
            if self.compact {
                serde_json::to_string(&json)
            } else {
                serde_json::to_string_pretty(&json)
            }
            .map_err(io::Error::other)?
        } else {
            self.printer.print(&value)
        };
        writeln!(self.writer, "{}", text)
    }

    fn failure(&mut self, failure: &DocumentFailure) -> io::Result<()> {
        eprintln!("aq: error (document {}): {}", failure.document, failure.error);
        Ok(())
    }
}

/// Compiles and runs a query, writing outputs to `writer`.
pub fn execute_run(options: &RunOptions, writer: &mut dyn Write) -> Result<RunOutcome, CliError> {
    let query = Query::compile(&options.query)?;

    if options.syntax_only {
        return Ok(RunOutcome::SyntaxValid);
    }

    let documents = if options.null_input {
        vec![Value::Null]
    } else {
        let text = options.input.as_ref().ok_or(CliError::NoInput)?;
        let documents = parse_documents(text)?;
        if options.slurp {
            vec![Value::Array(documents)]
        } else {
            documents
        }
    };

    let driver = Driver::new(
        &query,
        DriverOptions {
            policy: options.policy,
            bindings: options.bindings.clone(),
            jobs: options.jobs.max(1),
            max_outputs: options.max_outputs,
        },
    );
    let mut sink = WriterSink {
        writer,
        printer: TextPrinter::new(!options.compact),
        json: options.json,
        compact: options.compact,
    };
    let summary = driver.run(documents, &mut sink)?;
    sink.writer.flush()?;

    Ok(RunOutcome::Completed(summary))
}
