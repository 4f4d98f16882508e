//! Subcommand runners
//!
//! Each runner resolves settings (flags over config file over defaults),
//! builds the mapping table once, hands the files to the batch driver and
//! renders the outcome on stdout.

use crate::config::CliConfig;
use crate::{report_format, tie_break};
use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use fqcn_batch::{BatchConfig, BatchDriver, BatchKind, BatchMode, BatchResult, Discovery, FileReport, Project};
use fqcn_core::{
    AnalyzerPolicy, ControlKeywordSet, ConversionOptions, MappingEntry, MappingTable,
    MappingTableBuilder, ReportFormat, TaskAnalyzer, ValidationOptions,
    DEFAULT_BACKUP_SUFFIX,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit code for failed or non-compliant files
pub(crate) const EXIT_FAILURE: u8 = 1;

/// Exit code for fatal configuration or startup errors
pub(crate) const EXIT_FATAL: u8 = 2;

/// Settings shared by every subcommand
struct Session {
    config: CliConfig,
    table: MappingTable,
    analyzer: TaskAnalyzer,
}

impl Session {
    fn new(global: &ArgMatches) -> Result<Self> {
        let config = CliConfig::load(global.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
        let table = build_table(global, &config)?;
        let policy = AnalyzerPolicy {
            tie_break: tie_break(global).or(config.tie_break).unwrap_or_default(),
        };
        let analyzer = TaskAnalyzer::with_config(ControlKeywordSet::builtin(), policy);
        Ok(Self {
            config,
            table,
            analyzer,
        })
    }

    fn batch_config(&self, args: &ArgMatches) -> BatchConfig {
        let mut include = self.config.include.clone();
        let mut exclude = self.config.exclude.clone();
        if let Ok(Some(values)) = args.try_get_many::<String>("include") {
            include.extend(values.cloned());
        }
        if let Ok(Some(values)) = args.try_get_many::<String>("exclude") {
            exclude.extend(values.cloned());
        }
        BatchConfig {
            workers: args
                .get_one::<usize>("workers")
                .copied()
                .or(self.config.workers)
                .unwrap_or(fqcn_batch::DEFAULT_WORKERS),
            continue_on_error: continue_on_error(args, &self.config),
            include,
            exclude,
        }
    }

    fn conversion_options(&self, args: &ArgMatches) -> ConversionOptions {
        ConversionOptions {
            dry_run: args.get_flag("dry-run"),
            backup: !args.get_flag("no-backup") && self.config.backup.unwrap_or(true),
            backup_suffix: args
                .try_get_one::<String>("backup-suffix")
                .ok()
                .flatten()
                .cloned()
                .or_else(|| self.config.backup_suffix.clone())
                .unwrap_or_else(|| DEFAULT_BACKUP_SUFFIX.to_string()),
        }
    }

    fn validation_options(&self, args: &ArgMatches) -> ValidationOptions {
        ValidationOptions {
            strict: args.get_flag("strict") || self.config.strict.unwrap_or(false),
        }
    }
}

/// Run the selected subcommand
pub(crate) fn dispatch(matches: &ArgMatches) -> Result<ExitCode> {
    let Some((name, args)) = matches.subcommand() else {
        bail!("no subcommand given");
    };
    let ctx = Session::new(matches)?;
    let format = report_format(args);
    let path = args
        .get_one::<PathBuf>("path")
        .context("missing path argument")?;

    let (mode, projects, batch) = match name {
        "convert" => (
            BatchMode::Convert(ctx.conversion_options(args)),
            target_projects(path, &ctx.batch_config(args))?,
            false,
        ),
        "validate" => (
            BatchMode::Validate(ctx.validation_options(args)),
            target_projects(path, &ctx.batch_config(args))?,
            false,
        ),
        "batch" => {
            let mode = if args.get_flag("validate") {
                BatchMode::Validate(ctx.validation_options(args))
            } else {
                BatchMode::Convert(ctx.conversion_options(args))
            };
            let config = ctx.batch_config(args);
            let projects = Discovery::new(&config.include, &config.exclude)?
                .projects(path)
                .with_context(|| format!("failed to discover projects under {}", path.display()))?;
            if projects.is_empty() {
                tracing::warn!(root = %path.display(), "no projects found");
            }
            (mode, projects, true)
        }
        other => bail!("unknown subcommand '{other}'"),
    };

    let config = ctx.batch_config(args);
    let continue_on_error = config.continue_on_error;
    let driver = BatchDriver::new(&ctx.table, ctx.analyzer.clone(), config);
    let result = driver.run(&projects, &mode)?;

    let show_diff = args.try_get_one::<bool>("diff").ok().flatten().copied().unwrap_or(false);
    render(&result, format, batch, show_diff)?;
    Ok(ExitCode::from(exit_code(&result, continue_on_error)))
}

/// Projects for a single file or directory target
fn target_projects(path: &Path, config: &BatchConfig) -> Result<Vec<Project>> {
    if path.is_file() {
        let root = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        return Ok(vec![Project::from_files(root, vec![path.to_path_buf()])]);
    }
    if !path.is_dir() {
        bail!("no such file or directory: {}", path.display());
    }
    let files = Discovery::new(&[], &config.exclude)?
        .files(path)
        .with_context(|| format!("failed to list files under {}", path.display()))?;
    Ok(vec![Project::from_files(path, files)])
}

fn build_table(global: &ArgMatches, config: &CliConfig) -> Result<MappingTable> {
    let mut builder = MappingTableBuilder::with_defaults().context("built-in mappings are unusable")?;

    let mapping_file = global
        .get_one::<PathBuf>("mapping-file")
        .cloned()
        .or_else(|| config.mapping_file.clone());
    if let Some(file) = mapping_file {
        builder = builder.with_file(file);
    }
    builder = builder.with_overrides(
        config
            .mappings
            .iter()
            .map(|(short, fq)| MappingEntry::new(short.clone(), fq.clone())),
    );

    if let Some(values) = global.get_many::<String>("map") {
        for value in values {
            let entry = MappingEntry::parse_override(value)
                .with_context(|| format!("invalid --map value '{value}'"))?;
            builder = builder.with_override(entry);
        }
    }

    let (table, warnings) = builder.build_with_warnings();
    for warning in &warnings {
        tracing::warn!(source = ?warning.source, "{}", warning.message);
    }
    tracing::debug!(entries = table.len(), "mapping table ready");
    Ok(table)
}

fn continue_on_error(args: &ArgMatches, config: &CliConfig) -> bool {
    args.get_flag("continue-on-error") || config.continue_on_error.unwrap_or(false)
}

fn render(result: &BatchResult, format: ReportFormat, batch: bool, show_diff: bool) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    let text = if batch {
        format.render(result)?
    } else {
        let mut text = format.render(&result.files)?;
        if format == ReportFormat::Text && result.files.len() > 1 {
            text.push_str(&summary_line(result));
        }
        text
    };
    stdout.write_all(text.as_bytes())?;

    if show_diff && format == ReportFormat::Text {
        for file in &result.files {
            if let FileReport::Conversion(conversion) = file {
                stdout.write_all(conversion.diff().as_bytes())?;
            }
        }
    }
    stdout.flush()?;
    Ok(())
}

fn summary_line(result: &BatchResult) -> String {
    let t = &result.totals;
    match result.kind {
        BatchKind::Convert => format!(
            "{} file(s), {} change(s), {} failed\n",
            t.files_processed, t.changes_made, t.failed
        ),
        BatchKind::Validate => format!(
            "{} file(s), {} invalid, {} failed, compliance {:.2}\n",
            t.files_processed, t.invalid, t.failed, result.compliance_score
        ),
    }
}

/// `0` on success, `1` on failed files (unless tolerated) or invalid files
fn exit_code(result: &BatchResult, continue_on_error: bool) -> u8 {
    let failed = result.totals.failed > 0 || result.aborted;
    if failed && !continue_on_error {
        return EXIT_FAILURE;
    }
    if result.kind == BatchKind::Validate && result.totals.invalid > 0 {
        return EXIT_FAILURE;
    }
    0
}
