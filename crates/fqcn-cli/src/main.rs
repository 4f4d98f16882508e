//! `fqcn` - rewrite short module names to fully-qualified names
//!
//! Exit codes: `0` success, `1` failed or non-compliant files, `2` fatal
//! configuration or startup error.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use fqcn_core::{ReportFormat, TieBreak};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;
mod logging;

use logging::LogFormat;

fn cli() -> Command {
    Command::new("fqcn")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Convert short module names in task documents to fully-qualified names")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file (default: ./.fqcn.yml when present)"),
        )
        .arg(
            Arg::new("mapping-file")
                .long("mapping-file")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Mapping file layered over the built-in mappings"),
        )
        .arg(
            Arg::new("map")
                .long("map")
                .global(true)
                .action(ArgAction::Append)
                .value_name("SHORT=FQCN")
                .help("Inline mapping override; may be repeated"),
        )
        .arg(
            Arg::new("tie-break")
                .long("tie-break")
                .global(true)
                .value_parser(["structural-fit", "document-order"])
                .help("How to choose among several module key candidates"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("More log output; repeat for trace"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .global(true)
                .action(ArgAction::Count)
                .help("Less log output"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Log line format on stderr"),
        )
        .subcommand(
            Command::new("convert")
                .about("Rewrite module keys in a file or directory")
                .arg(path_arg("File or directory to convert"))
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Report changes without writing"),
                )
                .arg(
                    Arg::new("diff")
                        .long("diff")
                        .action(ArgAction::SetTrue)
                        .help("Print a unified diff per changed file"),
                )
                .arg(
                    Arg::new("no-backup")
                        .long("no-backup")
                        .action(ArgAction::SetTrue)
                        .help("Do not keep a copy of the original file"),
                )
                .arg(
                    Arg::new("backup-suffix")
                        .long("backup-suffix")
                        .help("Suffix for backup files (default: .fqcn.bak)"),
                )
                .args(run_args()),
        )
        .subcommand(
            Command::new("validate")
                .about("Report compliance without modifying anything")
                .arg(path_arg("File or directory to validate"))
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Report unknown modules and fail on any issue"),
                )
                .args(run_args()),
        )
        .subcommand(
            Command::new("batch")
                .about("Discover projects under a directory and process them in parallel")
                .arg(path_arg("Root directory to search for projects"))
                .arg(
                    Arg::new("validate")
                        .long("validate")
                        .action(ArgAction::SetTrue)
                        .help("Validate instead of converting"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .requires("validate")
                        .help("Strict validation"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Report changes without writing"),
                )
                .arg(
                    Arg::new("no-backup")
                        .long("no-backup")
                        .action(ArgAction::SetTrue)
                        .help("Do not keep a copy of the original files"),
                )
                .arg(
                    Arg::new("include")
                        .long("include")
                        .action(ArgAction::Append)
                        .help("Project marker pattern; may be repeated"),
                )
                .arg(
                    Arg::new("exclude")
                        .long("exclude")
                        .action(ArgAction::Append)
                        .help("Exclude pattern; may be repeated"),
                )
                .args(run_args()),
        )
}

fn path_arg(help: &'static str) -> Arg {
    Arg::new("path")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help(help)
}

fn run_args() -> [Arg; 3] {
    [
        Arg::new("workers")
            .short('j')
            .long("workers")
            .value_parser(value_parser!(usize))
            .help("Parallel workers for directories (default: 4)"),
        Arg::new("format")
            .long("format")
            .value_parser(["text", "json", "yaml"])
            .default_value("text")
            .help("Report format on stdout"),
        Arg::new("continue-on-error")
            .long("continue-on-error")
            .action(ArgAction::SetTrue)
            .help("Keep going after a file fails and exit 0 on partial failure"),
    ]
}

/// Report format selected on a subcommand
pub(crate) fn report_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| f.parse().ok())
        .unwrap_or_default()
}

/// Tie-break selected on the command line
pub(crate) fn tie_break(args: &ArgMatches) -> Option<TieBreak> {
    args.get_one::<String>("tie-break").map(|t| match t.as_str() {
        "document-order" => TieBreak::DocumentOrder,
        _ => TieBreak::StructuralFit,
    })
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let verbosity = i16::from(matches.get_count("verbose")) - i16::from(matches.get_count("quiet"));
    let log_format = match matches.get_one::<String>("log-format").map(String::as_str) {
        Some("json") => LogFormat::Json,
        _ => LogFormat::Text,
    };
    logging::init(verbosity, log_format);

    match commands::dispatch(&matches) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "fatal");
            eprintln!("error: {e:#}");
            ExitCode::from(commands::EXIT_FATAL)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let m = cli()
            .try_get_matches_from(["fqcn", "convert", "x.yml", "--map", "a=b.c.a", "-vv"])
            .unwrap();
        assert_eq!(m.get_count("verbose"), 2);
        let (name, sub) = m.subcommand().unwrap();
        assert_eq!(name, "convert");
        assert_eq!(sub.get_one::<PathBuf>("path").unwrap(), &PathBuf::from("x.yml"));
    }

    #[test]
    fn strict_batch_requires_validate() {
        assert!(cli()
            .try_get_matches_from(["fqcn", "batch", ".", "--strict"])
            .is_err());
    }
}
