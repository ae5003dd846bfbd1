//! The Aspen compiler CLI.
//!
//! Provides the `aspenc` command with the following subcommands:
//!
//! - `aspenc check <file>` - Parse and type-check a source file
//! - `aspenc build <file>` - Compile to IR and print (or write) it
//!
//! Exit codes: 0 on success, 1 when any error-severity diagnostic was
//! produced, 2 on driver failure (I/O, bad arguments).

use std::path::{Path, PathBuf};
use std::process;

use aspen_common::diagnostics::Diagnostics;
use aspen_typeck::diagnostics::{render_diagnostic, DiagnosticOptions};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "aspenc", version, about = "The Aspen compiler")]
struct Cli {
    /// Disable colored diagnostic output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and type-check a source file
    Check {
        /// Path to the Aspen source file
        file: PathBuf,
    },
    /// Compile a source file to IR
    Build {
        /// Path to the Aspen source file
        file: PathBuf,

        /// Output path for the IR listing (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let options = DiagnosticOptions {
        color: !cli.no_color,
    };
    let code = match &cli.command {
        Commands::Check { file } => check(file, &options),
        Commands::Build { file, output } => build(file, output.as_deref(), &options),
    };
    match code {
        Ok(had_errors) => process::exit(if had_errors { 1 } else { 0 }),
        Err(message) => {
            eprintln!("error: {message}");
            process::exit(2);
        }
    }
}

fn read_source(file: &Path) -> Result<String, String> {
    std::fs::read_to_string(file)
        .map_err(|e| format!("failed to read '{}': {e}", file.display()))
}

/// Run the front-end and report everything it found. Returns whether any
/// error-severity diagnostic was produced.
fn check(file: &Path, options: &DiagnosticOptions) -> Result<bool, String> {
    let source = read_source(file)?;
    let (_, had_errors) = compile(&source, options);
    Ok(had_errors)
}

/// Compile to IR. Procedures affected by errors may be incomplete, so the
/// listing is only produced on a clean run.
fn build(file: &Path, output: Option<&Path>, options: &DiagnosticOptions) -> Result<bool, String> {
    let source = read_source(file)?;
    let (module, had_errors) = compile(&source, options);
    if had_errors {
        return Ok(true);
    }
    let listing = module.to_string();
    match output {
        Some(path) => std::fs::write(path, listing)
            .map_err(|e| format!("failed to write '{}': {e}", path.display()))?,
        None => print!("{listing}"),
    }
    Ok(false)
}

/// The full pipeline: parse, check, lower; diagnostics from every phase
/// go to stderr in source order per phase.
fn compile(source: &str, options: &DiagnosticOptions) -> (aspen_ir::Module, bool) {
    let parse = aspen_parser::parse(source);
    let typeck = aspen_typeck::check(&parse);
    let lowered = aspen_ir::lower::lower(&typeck);

    let mut had_errors = false;
    for diagnostics in [
        parse.diagnostics(),
        &typeck.diagnostics,
        &lowered.diagnostics,
    ] {
        had_errors |= report(diagnostics, source, options);
    }
    (lowered.module, had_errors)
}

/// Print a diagnostic batch; returns whether it contained errors.
fn report(diagnostics: &Diagnostics, source: &str, options: &DiagnosticOptions) -> bool {
    for diagnostic in diagnostics.iter() {
        eprint!("{}", render_diagnostic(diagnostic, source, options));
    }
    diagnostics.has_errors()
}
