//! Usecode runner CLI
//!
//! Entry point for `usecode-run`. Parses CLI arguments and delegates to
//! the Runtime for execution.

use clap::Parser as ClapParser;
use interpreter::ExecOutcome;
use uc_cli::logging::init_logging;
use uc_cli::{Cli, CliError, Runtime};

fn run(cli: Cli) -> Result<i32, CliError> {
    if cli.disassemble {
        for line in Runtime::disassemble_file(&cli.image, cli.class)? {
            println!("{line}");
        }
        return Ok(0);
    }

    let mut runtime = Runtime::new().with_max_ticks(cli.max_ticks);
    if let Some(path) = &cli.config {
        runtime = runtime.with_config(Runtime::load_config(path)?);
    }
    if let Some(variant) = cli.variant {
        runtime = runtime.with_variant(variant.into());
    }

    let report = runtime.run_file(&cli.image, cli.class, cli.offset)?;
    match &report.outcome {
        Some(ExecOutcome::Terminated(result)) => {
            println!("result: {result} (0x{result:08X})");
        }
        Some(ExecOutcome::Faulted(err)) => {
            eprintln!("Usecode Error: {err}");
            return Ok(1);
        }
        Some(ExecOutcome::Yielded) | None => {
            eprintln!(
                "Error: process {} still running after {} ticks",
                report.pid, report.ticks
            );
            return Ok(2);
        }
    }
    println!(
        "ticks: {}, strings: {}, lists: {}",
        report.ticks, report.stats.strings, report.stats.lists
    );
    Ok(0)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.trace);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(CliError::Io(e)) => {
            eprintln!("Error: Could not read file: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
