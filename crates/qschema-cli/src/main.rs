//! # qschema CLI entry point
//!
//! Parses command-line arguments, installs logging, and dispatches to
//! subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use qschema_cli::validate::{run_validate, ValidateArgs};
use qschema_cli::{init_tracing, LogFormat};

/// qschema: quantity-aware schema validation for configuration documents.
#[derive(Parser, Debug)]
#[command(name = "qschema", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Format of log lines written to stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate documents against a schema.
    Validate(ValidateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "qschema starting");

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cli_parse_validate() {
        let cli = Cli::try_parse_from([
            "qschema",
            "validate",
            "--schema",
            "pod.schema.yaml",
            "a.yaml",
            "b.yaml",
        ])
        .unwrap();
        let Commands::Validate(args) = cli.command;
        assert_eq!(args.schema, PathBuf::from("pod.schema.yaml"));
        assert_eq!(args.documents.len(), 2);
        assert!(!args.all_branches);
        assert_eq!(args.max_depth, None);
    }

    #[test]
    fn cli_parse_validate_options() {
        let cli = Cli::try_parse_from([
            "qschema",
            "validate",
            "--schema",
            "s.json",
            "--config",
            "qschema.yaml",
            "--max-depth",
            "64",
            "--all-branches",
            "--format",
            "json",
            "doc.yaml",
        ])
        .unwrap();
        let Commands::Validate(args) = cli.command;
        assert_eq!(args.config, Some(PathBuf::from("qschema.yaml")));
        assert_eq!(args.max_depth, Some(64));
        assert!(args.all_branches);
    }

    #[test]
    fn cli_parse_verbose_levels() {
        let base = ["validate", "--schema", "s.json", "d.yaml"];
        let cli0 = Cli::try_parse_from(std::iter::once("qschema").chain(base)).unwrap();
        assert_eq!(cli0.verbose, 0);
        let cli2 =
            Cli::try_parse_from(["qschema", "-vv"].into_iter().chain(base)).unwrap();
        assert_eq!(cli2.verbose, 2);
        let cli3 = Cli::try_parse_from(
            ["qschema", "validate", "-vvv", "--schema", "s.json", "d.yaml"],
        )
        .unwrap();
        assert_eq!(cli3.verbose, 3);
    }

    #[test]
    fn cli_parse_log_format() {
        let cli = Cli::try_parse_from([
            "qschema",
            "--log-format",
            "json",
            "validate",
            "--schema",
            "s.json",
            "d.yaml",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn cli_parse_requires_schema_and_documents() {
        assert!(Cli::try_parse_from(["qschema", "validate", "d.yaml"]).is_err());
        assert!(Cli::try_parse_from(["qschema", "validate", "--schema", "s.json"]).is_err());
    }

    #[test]
    fn cli_parse_no_subcommand_errors() {
        assert!(Cli::try_parse_from(["qschema"]).is_err());
    }
}
