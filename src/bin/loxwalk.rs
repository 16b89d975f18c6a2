//! Lox interpreter command-line.
//!
//! When called without argument it drops into an interactive read-evaluate-print loop.
//!
//! When called with arguments, it interprets the corresponding files in a single interpreter
//! session (so code and data sharing is possible).  A syntax error exits with status 65 and a
//! runtime error with status 70.

use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use loxwalk::{Config, ErrorPolicy, Interpreter, LoxError};

#[derive(Debug, Parser)]
#[command(version, about = "Tree-walking interpreter for the Lox language")]
struct Args {
    /// Scripts to run in order.  Starts a REPL when none is given.
    files: Vec<PathBuf>,

    /// Report a runtime error and go on with the next top-level statement.
    #[arg(long)]
    keep_going: bool,

    /// Maximum nesting of function calls.
    #[arg(long, default_value_t = Config::default().max_call_depth)]
    max_call_depth: usize,
}

fn main() -> Result<ExitCode, anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::default().with_max_call_depth(args.max_call_depth);
    if args.keep_going {
        config = config.with_error_policy(ErrorPolicy::Continue);
    }

    if args.files.is_empty() {
        run_prompt(config)?;
        Ok(ExitCode::SUCCESS)
    } else {
        run_all_files(&args.files, config)
    }
}

fn run_all_files(paths: &[PathBuf], config: Config) -> Result<ExitCode, anyhow::Error> {
    let mut interp_stdout = io::stdout();
    let mut interp = Interpreter::with_config(&mut interp_stdout, config);

    for p in paths {
        let reader = BufReader::new(
            File::open(p).with_context(|| format!("failed to open {}", p.display()))?,
        );
        match interp.eval(reader) {
            Ok(()) => (),
            Err(e @ LoxError::Syntax(_)) => {
                eprintln!("{}", e);
                return Ok(ExitCode::from(65));
            }
            Err(e @ LoxError::Runtime(_)) => {
                eprintln!("{}", e);
                return Ok(ExitCode::from(70));
            }
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", p.display())),
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_prompt(config: Config) -> Result<(), io::Error> {
    let stdin = io::stdin();
    let mut repl_stdout = io::stdout();
    let mut interp_stdout = io::stdout();

    let mut interp = Interpreter::with_config(&mut interp_stdout, config);

    let mut input = String::new();
    loop {
        repl_stdout.write_all(b"> ")?;
        repl_stdout.flush()?;

        input.clear();
        let nbytes = stdin.read_line(&mut input)?;
        if nbytes == 0 {
            break;
        }

        if let Err(e) = interp.eval(input.as_bytes()) {
            eprintln!("{}", e);
        }
    }

    Ok(())
}
