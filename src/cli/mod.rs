//! CLI support for ducto
//!
//! Provides programmatic access to the CLI behavior so the binary stays a
//! thin argument-parsing wrapper.

use std::collections::HashMap;
use std::io;

use crate::json::{from_json, to_json};
use crate::path::PathFinder;
use crate::pipeline::{Pipe, PipeError};
use crate::value::Value;

/// Errors that can occur while running a pipeline from the command line
#[derive(Debug)]
pub enum CliError {
    /// Pipeline execution error
    Pipe(PipeError),
    /// JSON parsing error
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
    /// No input provided
    NoInput,
    /// --globals was not a JSON object
    BadGlobals,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Pipe(e) => write!(f, "Pipeline error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => {
                write!(f, "No input provided. Pass a value, use --file, or pipe to stdin.")
            }
            CliError::BadGlobals => write!(f, "--globals must be a JSON object"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Pipe(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PipeError> for CliError {
    fn from(e: PipeError) -> Self {
        CliError::Pipe(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

/// What to run and how to read the input
pub struct RunOptions {
    /// The pipeline expression
    pub pipeline: String,
    /// Raw input text
    pub input: Option<String>,
    /// Parse the input as JSON instead of a plain string
    pub json: bool,
    /// Split the input on newlines into an array of strings
    pub newline: bool,
    /// JSON object of `@name` globals for path lookups
    pub globals: Option<String>,
}

/// Runs a pipeline over the configured input and returns the result.
pub fn execute_run(options: &RunOptions) -> Result<Value, CliError> {
    let input = options.input.as_deref().ok_or(CliError::NoInput)?;

    let value = if options.json {
        from_json(&serde_json::from_str(input)?)
    } else if options.newline {
        Value::Array(
            input
                .lines()
                .map(|line| Value::String(line.to_string()))
                .collect(),
        )
    } else {
        Value::String(input.trim_end_matches('\n').to_string())
    };

    let mut pipe = Pipe::with_defaults();
    pipe.register_path_finder(PathFinder::new(parse_globals(options.globals.as_deref())?));

    Ok(pipe.run(&options.pipeline, value)?)
}

fn parse_globals(globals: Option<&str>) -> Result<HashMap<String, Value>, CliError> {
    let Some(text) = globals else {
        return Ok(HashMap::new());
    };
    match from_json(&serde_json::from_str(text)?) {
        Value::Object(map) => Ok(map),
        _ => Err(CliError::BadGlobals),
    }
}

/// Renders a result value as JSON text.
pub fn render(value: &Value, pretty: bool) -> String {
    let json = to_json(value);
    if pretty {
        serde_json::to_string_pretty(&json).unwrap_or_else(|_| "null".to_string())
    } else {
        serde_json::to_string(&json).unwrap_or_else(|_| "null".to_string())
    }
}
