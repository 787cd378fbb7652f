//! Runs a compiled query over a stream of documents.
//!
//! The driver owns the per-document error policy. Documents are numbered
//! from 1 in input order, and outputs always come out in that order, even
//! when documents are evaluated on several threads.

use std::io;

use log::{trace, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::{evaluator::RuntimeError, query::Query, value::Value};

/// What to do when a document's evaluation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop the whole run at the first failure
    FailFast,
    /// Log the failure and continue with the next document
    Skip,
    /// Hand the failure to the sink as a diagnostic and continue
    #[default]
    Report,
}

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub policy: ErrorPolicy,
    /// Variables visible to the query as `$name`
    pub bindings: Vec<(String, Value)>,
    /// Worker threads; 1 evaluates documents one after another
    pub jobs: usize,
    /// Truncates each document's outputs
    pub max_outputs: Option<usize>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        DriverOptions {
            policy: ErrorPolicy::default(),
            bindings: Vec::new(),
            jobs: 1,
            max_outputs: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("document {document}: {error}")]
    Runtime {
        document: usize,
        error: RuntimeError,
    },

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error("failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A document whose evaluation raised an error.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFailure {
    pub document: usize,
    pub error: RuntimeError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub documents: usize,
    pub outputs: usize,
    pub failures: Vec<DocumentFailure>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Destination for a run's outputs and reported failures.
pub trait OutputSink {
    fn output(&mut self, document: usize, value: Value) -> io::Result<()>;

    /// Called for failures under [`ErrorPolicy::Report`].
    fn failure(&mut self, _failure: &DocumentFailure) -> io::Result<()> {
        Ok(())
    }
}

impl OutputSink for Vec<Value> {
    fn output(&mut self, _document: usize, value: Value) -> io::Result<()> {
        self.push(value);
        Ok(())
    }
}

/// Everything one document produced, for documents evaluated off-thread.
struct Evaluated {
    outputs: Vec<Value>,
    error: Option<RuntimeError>,
}

pub struct Driver<'q> {
    query: &'q Query,
    options: DriverOptions,
}

impl<'q> Driver<'q> {
    pub fn new(query: &'q Query, options: DriverOptions) -> Self {
        Driver { query, options }
    }

    /// Evaluates every document, writing outputs to `sink` in input order.
    ///
    /// # Examples
    ///
    /// ```
    /// use aq_lang::{Driver, DriverOptions, Query, Value};
    ///
    /// let query = Query::compile(".a").unwrap();
    /// let documents = vec![
    ///     Value::object([("a", Value::Integer(1))]),
    ///     Value::object([("b", Value::Integer(2))]),
    ///     Value::object([("a", Value::Integer(3))]),
    /// ];
    ///
    /// let mut outputs = Vec::new();
    /// let summary = Driver::new(&query, DriverOptions::default())
    ///     .run(documents, &mut outputs)
    ///     .unwrap();
    ///
    /// assert_eq!(outputs, vec![Value::Integer(1), Value::Integer(3)]);
    /// assert_eq!(summary.failures[0].document, 2);
    /// ```
    pub fn run<I, S>(&self, documents: I, sink: &mut S) -> Result<RunSummary, DriverError>
    where
        I: IntoIterator<Item = Value>,
        S: OutputSink + ?Sized,
    {
        if self.options.jobs > 1 {
            let documents: Vec<Value> = documents.into_iter().collect();
            return self.run_parallel(documents, sink);
        }

        let mut summary = RunSummary::default();
        for (index, document) in documents.into_iter().enumerate() {
            let number = index + 1;
            trace!("evaluating document {}", number);
            summary.documents += 1;

            let limit = self.options.max_outputs.unwrap_or(usize::MAX);
            let outputs = self.query.run_with(document, &self.options.bindings);
            for item in outputs.take(limit) {
                match item {
                    Ok(value) => {
                        sink.output(number, value)?;
                        summary.outputs += 1;
                    }
                    Err(error) => self.fail(number, error, sink, &mut summary)?,
                }
            }
        }
        Ok(summary)
    }

    fn run_parallel<S>(&self, documents: Vec<Value>, sink: &mut S) -> Result<RunSummary, DriverError>
    where
        S: OutputSink + ?Sized,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()?;
        trace!(
            "evaluating {} documents on {} threads",
            documents.len(),
            self.options.jobs
        );

        let evaluated: Vec<Evaluated> = pool.install(|| {
            documents
                .into_par_iter()
                .map(|document| self.evaluate(document))
                .collect()
        });

        let mut summary = RunSummary::default();
        for (index, result) in evaluated.into_iter().enumerate() {
            let number = index + 1;
            summary.documents += 1;
            for value in result.outputs {
                sink.output(number, value)?;
                summary.outputs += 1;
            }
            if let Some(error) = result.error {
                self.fail(number, error, sink, &mut summary)?;
            }
        }
        Ok(summary)
    }

    /// Runs one document to completion. Each call builds its own environment,
    /// so this is safe to call from any thread.
    fn evaluate(&self, document: Value) -> Evaluated {
        let limit = self.options.max_outputs.unwrap_or(usize::MAX);
        let mut evaluated = Evaluated {
            outputs: Vec::new(),
            error: None,
        };
        for item in self.query.run_with(document, &self.options.bindings).take(limit) {
            match item {
                Ok(value) => evaluated.outputs.push(value),
                Err(error) => evaluated.error = Some(error),
            }
        }
        evaluated
    }

    fn fail<S>(
        &self,
        document: usize,
        error: RuntimeError,
        sink: &mut S,
        summary: &mut RunSummary,
    ) -> Result<(), DriverError>
    where
        S: OutputSink + ?Sized,
    {
        match self.options.policy {
            ErrorPolicy::FailFast => return Err(DriverError::Runtime { document, error }),
            ErrorPolicy::Skip => warn!("skipping document {}: {}", document, error),
            ErrorPolicy::Report => sink.failure(&DocumentFailure {
                document,
                error: error.clone(),
            })?,
        }
        summary.failures.push(DocumentFailure { document, error });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documents() -> Vec<Value> {
        vec![Value::Integer(4), Value::from("x"), Value::Integer(6)]
    }

    #[test]
    fn test_fail_fast_stops() {
        let query = Query::compile(". * 2").unwrap();
        let options = DriverOptions {
            policy: ErrorPolicy::FailFast,
            ..DriverOptions::default()
        };

        let mut outputs = Vec::new();
        let err = Driver::new(&query, options)
            .run(documents(), &mut outputs)
            .unwrap_err();

        assert!(matches!(err, DriverError::Runtime { document: 2, .. }));
        assert_eq!(outputs, vec![Value::Integer(8)]);
    }

    #[test]
    fn test_skip_continues() {
        let query = Query::compile(". * 2").unwrap();
        let options = DriverOptions {
            policy: ErrorPolicy::Skip,
            ..DriverOptions::default()
        };

        let mut outputs = Vec::new();
        let summary = Driver::new(&query, options)
            .run(documents(), &mut outputs)
            .unwrap();

        assert_eq!(outputs, vec![Value::Integer(8), Value::Integer(12)]);
        assert_eq!(summary.documents, 3);
        assert_eq!(summary.failures.len(), 1);
        assert!(!summary.succeeded());
    }
}
