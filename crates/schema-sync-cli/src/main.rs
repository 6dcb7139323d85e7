//! schema-sync: compare schema snapshots, plan migrations, validate environments.

mod config;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use schema_sync::{
    Casing, CompareOptions, Dialect, DiffOptions, FixtureFile, Outcome, PairOutcome, Schema,
    SnapshotSource, ValidationReport,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_CODES: &str = "\
Exit codes:
  0  no differences (compare, validate) or success (migrate, plan)
  1  differences found
  2  a snapshot could not be read, or the output could not be written
  3  invalid configuration or options
  4  the migration could not be planned or rendered (dependency cycle, or an
     operation or type the dialect cannot express)";

/// Compare database schema snapshots and plan the DDL that reconciles them.
#[derive(Parser, Debug)]
#[command(name = "schema-sync", version, after_help = EXIT_CODES)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the differences between two snapshots
    Compare {
        #[command(flatten)]
        pair: PairArgs,
    },
    /// Render the migration script that turns source into target
    Migrate {
        #[command(flatten)]
        pair: PairArgs,

        /// SQL dialect (postgres, mysql, sqlite)
        #[arg(long, default_value = "postgres")]
        dialect: String,

        /// Write DIR/migration.sql instead of printing
        #[arg(long, value_name = "DIR")]
        output: Option<Utf8PathBuf>,
    },
    /// Print the ordered operation plan
    Plan {
        #[command(flatten)]
        pair: PairArgs,
    },
    /// Compare every configured environment
    Validate {
        /// Config file (default: search for .config/schema-sync.styx)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct PairArgs {
    /// Snapshot of the current state
    #[arg(long)]
    source: Utf8PathBuf,

    /// Snapshot of the desired state
    #[arg(long)]
    target: Utf8PathBuf,

    /// Tables to leave out, comma separated
    #[arg(long, value_delimiter = ',')]
    ignore: Vec<String>,

    /// Skip index comparison
    #[arg(long)]
    no_indexes: bool,

    /// Skip constraint comparison
    #[arg(long)]
    no_constraints: bool,

    /// Skip default value comparison
    #[arg(long)]
    no_defaults: bool,

    /// Match identifiers case-insensitively
    #[arg(long)]
    case_insensitive: bool,
}

impl PairArgs {
    fn casing(&self) -> Casing {
        if self.case_insensitive {
            Casing::Insensitive
        } else {
            Casing::Sensitive
        }
    }

    fn options(&self) -> Result<DiffOptions, CliError> {
        let compare = CompareOptions {
            check_indexes: !self.no_indexes,
            check_constraints: !self.no_constraints,
            check_defaults: !self.no_defaults,
        };
        DiffOptions::new(self.ignore.iter().cloned(), compare, self.casing())
            .map_err(|e| CliError::Core(e.into()))
    }

    fn snapshots(&self) -> Result<(Schema, Schema), CliError> {
        let casing = self.casing();
        let source = FixtureFile::new(self.source.clone()).with_casing(casing);
        let target = FixtureFile::new(self.target.clone()).with_casing(casing);
        let source = source.snapshot().map_err(schema_sync::Error::from)?;
        let target = target.snapshot().map_err(schema_sync::Error::from)?;
        Ok((source, target))
    }

    fn diff(&self) -> Result<schema_sync::SchemaDiff, CliError> {
        let options = self.options()?;
        let (source, target) = self.snapshots()?;
        let diff =
            schema_sync::try_diff(&source, &target, &options).map_err(schema_sync::Error::from)?;
        Ok(diff)
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Core(#[from] schema_sync::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) => 3,
            CliError::Core(schema_sync::Error::Config(_)) => 3,
            CliError::Core(schema_sync::Error::Snapshot(_)) => 2,
            CliError::Core(schema_sync::Error::Plan(_) | schema_sync::Error::Render(_)) => 4,
            CliError::Write { .. } => 2,
        }
    }
}

fn exit_code(outcome: Outcome) -> u8 {
    match outcome {
        Outcome::NoDifferences => 0,
        Outcome::DifferencesFound => 1,
        Outcome::SnapshotFailed => 2,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("schema_sync=info")),
        )
        .init();

    match run(cli).await {
        Ok(outcome) => ExitCode::from(exit_code(outcome)),
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<Outcome, CliError> {
    match cli.command {
        Commands::Compare { pair } => {
            let diff = pair.diff()?;
            print_colored(&schema_sync::render_report(&diff));
            Ok(diff.outcome())
        }
        Commands::Migrate {
            pair,
            dialect,
            output,
        } => {
            let dialect: Dialect = dialect
                .parse()
                .map_err(|e: schema_sync::ConfigError| CliError::Core(e.into()))?;
            let diff = pair.diff()?;
            let plan = schema_sync::plan(&diff).map_err(schema_sync::Error::from)?;
            let sql = schema_sync::render(plan.operations(), dialect)
                .map_err(schema_sync::Error::from)?;

            match output {
                Some(dir) => {
                    let path = dir.join("migration.sql");
                    std::fs::create_dir_all(&dir)
                        .and_then(|_| std::fs::write(&path, &sql))
                        .map_err(|source| CliError::Write {
                            path: path.clone(),
                            source,
                        })?;
                    tracing::info!(%path, operations = plan.len(), "wrote migration");
                }
                None => print!("{sql}"),
            }
            Ok(Outcome::NoDifferences)
        }
        Commands::Plan { pair } => {
            let diff = pair.diff()?;
            let plan = schema_sync::plan(&diff).map_err(schema_sync::Error::from)?;
            print!("{}", schema_sync::render_plan(&plan));
            Ok(Outcome::NoDifferences)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let loaded = match config_path {
                Some(path) => config::load_path(&path)?,
                None => config::load()?,
            };
            tracing::info!(
                config = %loaded.path.display(),
                environments = loaded.config.environments.len(),
                "validating environments"
            );
            let dialect: Option<Dialect> = loaded
                .config
                .dialect
                .as_deref()
                .map(|name| name.parse::<Dialect>())
                .transpose()
                .map_err(|e: schema_sync::ConfigError| CliError::Core(e.into()))?;

            let environments = loaded.environments()?;
            let options = loaded.diff_options()?;
            let report = schema_sync::validate(
                &environments,
                &options,
                &loaded.topology(),
                loaded.config.concurrency(),
            )
            .await
            .map_err(schema_sync::Error::from)?;

            print_report(&report, dialect)?;
            Ok(report.outcome())
        }
    }
}

fn print_report(report: &ValidationReport, dialect: Option<Dialect>) -> Result<(), CliError> {
    let color = std::io::stdout().is_terminal();

    for ((source, target), outcome) in report.pairs() {
        let pair = format!("{source} -> {target}");
        match outcome {
            PairOutcome::Matched => {
                if color {
                    println!("{} {}", pair.bold(), "matched".green());
                } else {
                    println!("{pair} matched");
                }
            }
            PairOutcome::Differs(diff) => {
                let summary = format!("{} differences", diff.change_count());
                if color {
                    println!("{} {}", pair.bold(), summary.yellow());
                } else {
                    println!("{pair} {summary}");
                }
                for difference in diff {
                    let indent = if difference.is_table_level() { "  " } else { "      " };
                    print_colored(&format!("{indent}{difference}\n"));
                }
                if let Some(dialect) = dialect {
                    let plan = schema_sync::plan(diff).map_err(schema_sync::Error::from)?;
                    let sql = schema_sync::render(plan.operations(), dialect)
                        .map_err(schema_sync::Error::from)?;
                    println!();
                    for line in sql.lines() {
                        println!("  {line}");
                    }
                }
            }
            PairOutcome::Errored { environment, error } => {
                let message = format!("{environment} failed: {error}");
                if color {
                    println!("{} {}", pair.bold(), message.red());
                } else {
                    println!("{pair} {message}");
                }
            }
        }
    }

    Ok(())
}

/// Print report text, coloring lines by their leading marker on a terminal.
fn print_colored(text: &str) {
    if !std::io::stdout().is_terminal() {
        print!("{text}");
        return;
    }

    for line in text.lines() {
        match line.trim_start().chars().next() {
            Some('+') => println!("{}", line.green()),
            Some('-') => println!("{}", line.red()),
            Some('~') => println!("{}", line.yellow()),
            _ => println!("{line}"),
        }
    }
}
