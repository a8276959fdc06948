//! Command-line interface for change-gate.
//!
//! This module provides the `cgate` CLI. Without a subcommand it runs the
//! gate; the subcommands are:
//! - `run`: Run the gate (same as no subcommand)
//! - `changes`: Print the change set for a revision pair
//! - `list`: List configured checks
//! - `init`: Initialize configuration
//! - `validate`: Validate configuration
//! - `config`: Show the configuration file in use
//! - `completions`: Generate shell completions

mod commands;
mod report;

use crate::core::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code for command-line usage errors (EX_USAGE).
const EXIT_USAGE: u8 = 64;

/// Accepts exactly the names [`presets::available`](crate::presets::available) lists.
fn preset_parser() -> clap::builder::PossibleValuesParser {
    clap::builder::PossibleValuesParser::new(crate::presets::available().iter().copied())
}

/// Change-scoped quality gate.
#[derive(Debug, Parser)]
#[command(
    name = "cgate",
    author,
    version,
    about = "Change-scoped quality gate: run checks against the files that changed",
    long_about = r#"
change-gate (cgate) works out which files changed between a base and a head
revision, runs an ordered list of checks against exactly those files, and
exits with a single pass/fail status.

Scoped checks receive the changed files as arguments and are skipped when
there are none. Full checks always run against the whole tree.

Quick start:
  cgate --base origin/main --check 'lint=ruff check' \
        --check 'tests:full=pytest --cov'

Exit codes:
  0  all checks passed or were skipped for lack of input
  1  at least one check failed
  2  base or head revision could not be resolved
  3  the --timeout budget ran out
"#,
    propagate_version = true,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Gate options when no subcommand is given.
    #[command(flatten)]
    pub run: RunArgs,

    /// Configuration file (default: search for change-gate.toml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use color output.
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,
}

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Always use color.
    Always,
    /// Auto-detect color support.
    #[default]
    Auto,
    /// Never use color.
    Never,
}

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report.
    #[default]
    Text,
    /// Machine-readable JSON on stdout.
    Json,
}

/// Options for a gate run.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Baseline revision to diff against.
    #[arg(long, value_name = "REVISION")]
    pub base: Option<String>,

    /// Revision under test [default: HEAD].
    #[arg(long, value_name = "REVISION")]
    pub head: Option<String>,

    /// Scope checks to changed files or to the whole tree.
    #[arg(long, value_parser = ["scoped-to-changes", "full-tree"])]
    pub mode: Option<String>,

    /// Check to run, as NAME[:scoped|:full]=COMMAND (repeatable).
    #[arg(long = "check", value_name = "NAME[:MODE]=COMMAND")]
    pub checks: Vec<String>,

    /// Wall-clock budget in seconds (or a duration such as 5m).
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<String>,

    /// Use a preset check list instead of the configured one.
    #[arg(long, value_parser = preset_parser())]
    pub preset: Option<String>,

    /// Report format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the gate.
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Print the files that changed between two revisions.
    #[command(visible_alias = "c")]
    Changes {
        /// Baseline revision.
        #[arg(long, value_name = "REVISION")]
        base: Option<String>,

        /// Revision under test [default: HEAD].
        #[arg(long, value_name = "REVISION")]
        head: Option<String>,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// List configured checks.
    #[command(visible_alias = "l")]
    List {
        /// Show a preset's checks instead.
        #[arg(long, value_parser = preset_parser())]
        preset: Option<String>,
    },

    /// Initialize change-gate configuration.
    #[command(visible_alias = "i")]
    Init {
        /// Use a preset configuration.
        #[arg(short, long, value_parser = preset_parser())]
        preset: Option<String>,

        /// Overwrite existing configuration.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration file.
    #[command(visible_alias = "v")]
    Validate,

    /// Show configuration file location and contents.
    Config {
        /// Output raw TOML.
        #[arg(long)]
        raw: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Runs the CLI.
pub async fn run() -> Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // clap exits with 2 on usage errors, which would read as a
            // revision error here.
            let code = if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
            if let Err(io) = e.print() {
                return Err(crate::Error::io("print usage", io));
            }
            return Ok(code);
        },
    };

    // Set up logging
    setup_logging(cli.verbose, cli.quiet);

    // Set up color
    setup_color(cli.color);

    let config = cli.config.as_deref();
    let progress = !cli.quiet;

    match cli.command {
        Some(Commands::Run(args)) => commands::run(&args, config, progress).await,
        Some(Commands::Changes { base, head, format }) => {
            commands::changes(base.as_deref(), head.as_deref(), format, config)
        },
        Some(Commands::List { preset }) => commands::list(preset.as_deref(), config),
        Some(Commands::Init { preset, force }) => commands::init(preset.as_deref(), force),
        Some(Commands::Validate) => commands::validate(config),
        Some(Commands::Config { raw }) => commands::config(raw, config),
        Some(Commands::Completions { shell }) => {
            commands::completions(shell);
            Ok(ExitCode::SUCCESS)
        },
        None => commands::run(&cli.run, config, progress).await,
    }
}

/// Sets up logging based on verbosity flags.
fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Sets up color output.
fn setup_color(choice: ColorChoice) {
    match choice {
        ColorChoice::Always => {
            console::set_colors_enabled(true);
            console::set_colors_enabled_stderr(true);
        },
        ColorChoice::Never => {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        },
        ColorChoice::Auto => {
            // Let console crate auto-detect
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_help() {
        let cli = Cli::try_parse_from(["cgate", "--help"]);
        // --help causes early exit, so this will be an error
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    // =========================================================================
    // Default (run) arguments
    // =========================================================================

    #[test]
    fn test_parse_no_subcommand() {
        let cli = Cli::try_parse_from(["cgate"]).expect("parse");
        assert!(cli.command.is_none());
        assert!(cli.run.checks.is_empty());
        assert_eq!(cli.run.format, OutputFormat::Text);
    }

    #[test]
    fn test_parse_top_level_gate_flags() {
        let cli = Cli::try_parse_from([
            "cgate",
            "--base",
            "origin/main",
            "--head",
            "feature",
            "--mode",
            "full-tree",
            "--check",
            "lint=ruff check",
            "--check",
            "coverage:full=pytest --cov",
            "--timeout",
            "60",
        ])
        .expect("parse");

        assert!(cli.command.is_none());
        assert_eq!(cli.run.base.as_deref(), Some("origin/main"));
        assert_eq!(cli.run.head.as_deref(), Some("feature"));
        assert_eq!(cli.run.mode.as_deref(), Some("full-tree"));
        assert_eq!(cli.run.checks.len(), 2);
        assert_eq!(cli.run.timeout.as_deref(), Some("60"));
    }

    #[test]
    fn test_parse_invalid_mode() {
        let result = Cli::try_parse_from(["cgate", "--mode", "everything"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_run_subcommand() {
        let cli =
            Cli::try_parse_from(["cgate", "run", "--base", "main", "--format", "json"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::Run(ref args))
                if args.base.as_deref() == Some("main") && args.format == OutputFormat::Json
        ));
    }

    #[test]
    fn test_parse_run_alias() {
        let cli = Cli::try_parse_from(["cgate", "r"]).expect("parse run alias");
        assert!(matches!(cli.command, Some(Commands::Run(_))));
    }

    #[test]
    fn test_top_level_flags_conflict_with_subcommand() {
        let result = Cli::try_parse_from(["cgate", "--base", "main", "list"]);
        assert!(result.is_err());
    }

    // =========================================================================
    // Subcommand parsing tests
    // =========================================================================

    #[test]
    fn test_parse_changes() {
        let cli = Cli::try_parse_from(["cgate", "changes", "--base", "main"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::Changes {
                base: Some(_),
                head: None,
                format: OutputFormat::Text
            })
        ));
    }

    #[test]
    fn test_parse_list_with_preset() {
        let cli = Cli::try_parse_from(["cgate", "list", "--preset", "python"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::List { preset: Some(_) })
        ));
    }

    #[test]
    fn test_parse_init_with_preset_and_force() {
        let cli =
            Cli::try_parse_from(["cgate", "init", "--preset", "python", "--force"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::Init {
                preset: Some(_),
                force: true
            })
        ));
    }

    #[test]
    fn test_every_available_preset_is_accepted() {
        for name in crate::presets::available() {
            let cli = Cli::try_parse_from(["cgate", "--preset", name]).expect("parse preset");
            assert_eq!(cli.run.preset.as_deref(), Some(*name));
        }
    }

    #[test]
    fn test_parse_init_invalid_preset() {
        let result = Cli::try_parse_from(["cgate", "init", "--preset", "invalid"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_validate_alias() {
        let cli = Cli::try_parse_from(["cgate", "v"]).expect("parse validate alias");
        assert!(matches!(cli.command, Some(Commands::Validate)));
    }

    #[test]
    fn test_parse_config_raw() {
        let cli = Cli::try_parse_from(["cgate", "config", "--raw"]).expect("parse");
        assert!(matches!(cli.command, Some(Commands::Config { raw: true })));
    }

    #[test]
    fn test_parse_completions_bash() {
        let cli = Cli::try_parse_from(["cgate", "completions", "bash"]).expect("parse");
        assert!(matches!(cli.command, Some(Commands::Completions { .. })));
    }

    // =========================================================================
    // Global flags tests
    // =========================================================================

    #[test]
    fn test_parse_global_config_path() {
        let cli = Cli::try_parse_from(["cgate", "list", "--config", "ci/gate.toml"]).expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("ci/gate.toml")));
    }

    #[test]
    fn test_parse_verbose_and_quiet() {
        let cli = Cli::try_parse_from(["cgate", "validate", "-v"]).expect("parse");
        assert!(cli.verbose);
        let cli = Cli::try_parse_from(["cgate", "validate", "-q"]).expect("parse");
        assert!(cli.quiet);
    }

    #[test]
    fn test_parse_color() {
        let cli = Cli::try_parse_from(["cgate", "list", "--color", "never"]).expect("parse");
        assert_eq!(cli.color, ColorChoice::Never);
        let cli = Cli::try_parse_from(["cgate", "list"]).expect("parse");
        assert_eq!(cli.color, ColorChoice::Auto);
    }
}
