use clap::Parser;
use ducto::cli::{self, CliError, RunOptions};
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ducto")]
#[command(about = "Ducto - a converter pipeline language for transforming values")]
#[command(version)]
struct Cli {
    /// The pipeline expression to run, e.g. "Convert ToInt32 | AsArrayWithOneItem"
    pipeline: String,

    /// Input value (reads from stdin if not provided)
    input: Option<String>,

    /// Read the input from a file instead
    #[arg(short, long, conflicts_with = "input")]
    file: Option<PathBuf>,

    /// Parse the input as JSON
    #[arg(short, long)]
    json: bool,

    /// Split the input on newlines into an array of strings
    #[arg(short, long, conflicts_with = "json")]
    newline: bool,

    /// JSON object of @name globals for path lookups
    #[arg(short, long)]
    globals: Option<String>,

    /// Pretty-print the output
    #[arg(short, long)]
    pretty: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let input = match (cli.input, cli.file) {
        (Some(s), _) => Some(s),
        (None, Some(path)) => Some(std::fs::read_to_string(path).map_err(CliError::Io)?),
        (None, None) if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(CliError::Io)?;
            Some(buffer)
        }
        (None, None) => None,
    };

    let options = RunOptions {
        pipeline: cli.pipeline,
        input,
        json: cli.json,
        newline: cli.newline,
        globals: cli.globals,
    };

    let result = cli::execute_run(&options)?;
    println!("{}", cli::render(&result, cli.pretty));
    Ok(())
}
