//! The `plc` command line front end.
//!
//! Parses a single source file, runs the full name-resolution and
//! type-checking pipeline over it, and reports diagnostics in the
//! `path:line:column: severity: message` wire format on standard error.
//! There is no error recovery: the first diagnostic raised by a given
//! stage ends the run, and the process exit code tells a caller which
//! stage failed.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use plc_ast::Diagnostic;
use plc_ast::ParseError;
use plc_ast::Span;

/// Exit code reported for a successful compilation.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code reported when the source file fails to parse.
pub const EXIT_PARSE_ERROR: u8 = 1;
/// Exit code reported when name resolution or type checking fails.
pub const EXIT_SEMANTIC_ERROR: u8 = 2;
/// Exit code reported when the source file cannot be read.
pub const EXIT_IO_ERROR: u8 = 3;

/// `plc` parses, resolves, and type-checks a packet-processing-language
/// source file.
///
/// There are no flags beyond the source path: verbosity and dump-format
/// concerns belong to downstream drivers, not this front end.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// The source file to compile.
    pub path: PathBuf,

    /// The logging verbosity.
    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
}

/// Runs the front end end-to-end and returns the process exit code.
///
/// This is the single entry point `main` delegates to; splitting it out
/// keeps `main` itself a thin, untestable shim around argument parsing and
/// process exit. Returns a plain `u8` rather than [`std::process::ExitCode`]
/// so the exit code itself is directly assertable in tests.
pub fn run(cli: &Cli) -> u8 {
    let source = match fs::read_to_string(&cli.path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{}: error: {err}", cli.path.display());
            return EXIT_IO_ERROR;
        }
    };

    let (ast, root) = match plc_ast::parse_program(&source) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("{}", parse_diagnostic(&cli.path, &err));
            return EXIT_PARSE_ERROR;
        }
    };
    tracing::debug!(nodes = ast.len(), "parse complete");

    let (_analysis, errors) = plc_analysis::analyze(&ast, root);
    if let Some(first) = errors.first() {
        let diagnostic = Diagnostic::error(&cli.path, first.span(), first.to_string());
        eprintln!("{diagnostic}");
        return EXIT_SEMANTIC_ERROR;
    }

    EXIT_SUCCESS
}

/// Builds the external diagnostic for a parse failure.
///
/// [`ParseError`]'s own `Display` repeats the span before the message
/// (`line:column: expected ...`); this re-renders it through
/// [`Diagnostic`] so parse and semantic failures share one wire format.
fn parse_diagnostic(path: &Path, err: &ParseError) -> Diagnostic {
    let message = match err {
        ParseError::UnexpectedToken { expected, found, .. } => {
            format!("expected {expected}, found {found}")
        }
        ParseError::UnexpectedEoi { .. } => "unexpected end of input".to_string(),
    };
    Diagnostic::error(path, err.span(), message)
}

/// Initializes the `tracing` subscriber at the verbosity the CLI selected.
///
/// Diagnostics (parse/semantic errors) always go to standard error in the
/// fixed wire format above; this only controls the separate stream of
/// structured pass-progress logs (`tracing::debug!`/`info!` in the
/// analysis crates), which are a debugging aid and not part of the
/// external contract.
pub fn init_tracing(verbose: &clap_verbosity_flag::Verbosity) {
    let filter = match verbose.tracing_level() {
        Some(level) => tracing_subscriber::filter::LevelFilter::from_level(level),
        None => tracing_subscriber::filter::LevelFilter::OFF,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(filter.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_source(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reports_success_on_a_clean_program() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(
            &dir,
            "good.p4",
            "parser P() { state start { transition accept; } }",
        );
        let cli = Cli {
            path,
            verbose: clap_verbosity_flag::Verbosity::new(0, 0),
        };
        assert_eq!(run(&cli), EXIT_SUCCESS);
    }

    #[test]
    fn reports_parse_error_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "bad.p4", "parser P( { }");
        let cli = Cli {
            path,
            verbose: clap_verbosity_flag::Verbosity::new(0, 0),
        };
        assert_eq!(run(&cli), EXIT_PARSE_ERROR);
    }

    #[test]
    fn reports_semantic_error_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(
            &dir,
            "unknown.p4",
            "parser P() { state start { transition foo; } }",
        );
        let cli = Cli {
            path,
            verbose: clap_verbosity_flag::Verbosity::new(0, 0),
        };
        assert_eq!(run(&cli), EXIT_SEMANTIC_ERROR);
    }

    #[test]
    fn reports_io_error_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.p4");
        let cli = Cli {
            path,
            verbose: clap_verbosity_flag::Verbosity::new(0, 0),
        };
        assert_eq!(run(&cli), EXIT_IO_ERROR);
    }
}
