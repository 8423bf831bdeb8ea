use anyhow::Context;
use argh::FromArgs;
use lineshell::Interpreter;
use lineshell::interpreter::DEFAULT_PROMPT;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::process::ExitCode;

#[derive(FromArgs)]
/// A small interactive shell with file redirection.
struct Args {
    #[argh(option, short = 'c')]
    /// evaluate a single line and exit with its status.
    command: Option<String>,

    #[argh(option, default = "LevelFilter::Warn", from_str_fn(parse_level))]
    /// log level written to stderr: off, error, warn, info, debug or trace.
    log_level: LevelFilter,

    #[argh(option)]
    /// prompt shown before each line in interactive mode.
    prompt: Option<String>,
}

fn parse_level(value: &str) -> Result<LevelFilter, String> {
    value
        .parse()
        .map_err(|_| format!("unknown log level: {value}"))
}

fn init_logging(level: LevelFilter) -> anyhow::Result<()> {
    let config = ConfigBuilder::new().set_time_level(LevelFilter::Off).build();
    TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto)
        .context("failed to initialise logging")
}

fn run(args: Args) -> anyhow::Result<i32> {
    init_logging(args.log_level)?;
    let mut shell = Interpreter::default();

    match args.command {
        Some(line) => Ok(shell.evaluate(&line)?.exit_code),
        None => shell.repl(args.prompt.as_deref().unwrap_or(DEFAULT_PROMPT)),
    }
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    match run(args) {
        // Exit statuses are truncated to a byte like any other process status.
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("lineshell: {e:#}");
            ExitCode::FAILURE
        }
    }
}
