use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
    process,
};

use aq_lang::{
    ErrorPolicy,
    cli::{self, CliError, OutputFile, RunOptions, RunOutcome},
};
use clap::{CommandFactory, Parser as ClapParser, ValueEnum};

#[derive(ClapParser)]
#[command(name = "aq")]
#[command(about = "aq - filter, transform and generate structured documents")]
#[command(version)]
struct Cli {
    /// The query to run (defaults to `.`)
    query: Option<String>,

    /// Read input documents from a file
    #[arg(short, long, conflicts_with = "text")]
    input: Option<PathBuf>,

    /// Write outputs to a file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read the query from a file
    #[arg(short = 'q', long = "query", conflicts_with = "query")]
    query_file: Option<PathBuf>,

    /// Input documents given inline
    #[arg(short, long)]
    text: Option<String>,

    /// Run the query once against null instead of reading input
    #[arg(short, long)]
    null_input: bool,

    /// Collect all input documents into one array
    #[arg(short, long)]
    slurp: bool,

    /// Print each output on one line
    #[arg(short, long)]
    compact: bool,

    /// Print strict JSON (bytes as arrays, variants as objects)
    #[arg(long)]
    json: bool,

    /// Bind $NAME to the string VALUE
    #[arg(long = "arg", num_args = 2, value_names = ["NAME", "VALUE"])]
    args: Vec<String>,

    /// Bind $NAME to a JSON value
    #[arg(long = "argjson", num_args = 2, value_names = ["NAME", "JSON"])]
    json_args: Vec<String>,

    /// What to do when a document fails
    #[arg(long, value_enum, default_value_t = OnError::Report)]
    on_error: OnError,

    /// Evaluate documents on this many threads
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Stop after this many outputs per document
    #[arg(long)]
    max_outputs: Option<usize>,

    /// Only validate syntax, don't execute
    #[arg(long)]
    syntax_only: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OnError {
    FailFast,
    Skip,
    Report,
}

impl From<OnError> for ErrorPolicy {
    fn from(on_error: OnError) -> Self {
        match on_error {
            OnError::FailFast => ErrorPolicy::FailFast,
            OnError::Skip => ErrorPolicy::Skip,
            OnError::Report => ErrorPolicy::Report,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let stdin_is_terminal = atty::is(atty::Stream::Stdin);

    if cli.query.is_none()
        && cli.query_file.is_none()
        && cli.input.is_none()
        && cli.text.is_none()
        && !cli.null_input
        && stdin_is_terminal
    {
        if let Err(e) = Cli::command().print_help() {
            eprintln!("aq: failed to print usage: {}", e);
        }
        process::exit(2);
    }

    match run(cli, stdin_is_terminal) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("aq: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn run(cli: Cli, stdin_is_terminal: bool) -> Result<i32, CliError> {
    let query = match (&cli.query_file, cli.query) {
        (Some(path), _) => fs::read_to_string(path)?,
        (None, Some(query)) => query,
        (None, None) => ".".to_string(),
    };

    let input = if cli.null_input || cli.syntax_only {
        None
    } else if let Some(text) = cli.text {
        Some(text)
    } else if let Some(path) = &cli.input {
        Some(fs::read_to_string(path)?)
    } else if !stdin_is_terminal {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Some(buffer)
    } else {
        None
    };

    let mut bindings = Vec::new();
    for pair in cli.args.chunks(2) {
        bindings.push((pair[0].clone(), aq_lang::Value::String(pair[1].clone())));
    }
    for pair in cli.json_args.chunks(2) {
        let value = serde_json::from_str(&pair[1]).map_err(|source| CliError::ArgJson {
            name: pair[0].clone(),
            source,
        })?;
        bindings.push((pair[0].clone(), cli::json_to_value(value)));
    }

    let options = RunOptions {
        query,
        input,
        null_input: cli.null_input,
        slurp: cli.slurp,
        compact: cli.compact,
        json: cli.json,
        syntax_only: cli.syntax_only,
        policy: cli.on_error.into(),
        jobs: cli.jobs,
        max_outputs: cli.max_outputs,
        bindings,
    };

    let mut writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(OutputFile::new(path)),
        None => Box::new(io::BufWriter::new(io::stdout().lock())),
    };

    match cli::execute_run(&options, &mut writer)? {
        RunOutcome::SyntaxValid => {
            println!("Syntax is valid");
            Ok(0)
        }
        RunOutcome::Completed(summary) if summary.succeeded() => Ok(0),
        RunOutcome::Completed(summary) => {
            log::debug!(
                "{} of {} documents failed",
                summary.failures.len(),
                summary.documents
            );
            Ok(5)
        }
    }
}
