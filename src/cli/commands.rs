//! CLI command implementations.

use super::report::{self, GateReport};
use super::{OutputFormat, RunArgs};
use crate::config::{parse_timeout, Config, CONFIG_FILE_NAME};
use crate::core::check::CheckDefinition;
use crate::core::error::{Error, Result};
use crate::core::executor::Executor;
use crate::core::git::GitRepo;
use crate::core::runner::{GateMode, GateOptions, GateRunner};
use crate::presets;
use console::style;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Loads the configuration from `path`, or searches for it.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) if !p.exists() => Err(Error::ConfigNotFound {
            path: p.to_path_buf(),
        }),
        Some(p) => Config::load_from(p),
        None => Config::load_or_default(),
    }
}

/// Converts an integer exit code into an [`ExitCode`].
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Run the gate.
pub async fn run(args: &RunArgs, config_path: Option<&Path>, progress: bool) -> Result<ExitCode> {
    let mut config = load_config(config_path)?;

    // Checks given on the command line replace the configured list
    if !args.checks.is_empty() {
        config.checks = args
            .checks
            .iter()
            .map(|spec| CheckDefinition::parse_spec(spec))
            .collect::<Result<_>>()?;
    } else if let Some(ref preset) = args.preset {
        config.checks = presets::checks(preset);
    }
    config.validate()?;

    let mode = match args.mode {
        Some(ref m) => m
            .parse::<GateMode>()
            .map_err(|e| Error::invalid_argument("--mode", e))?,
        None => config.gate.mode,
    };

    let timeout = match args.timeout {
        Some(ref t) => Some(
            parse_timeout(t)
                .ok_or_else(|| Error::invalid_argument("--timeout", format!("Invalid duration: {t}")))?,
        ),
        None => config.timeout(),
    };

    if config.checks.is_empty() {
        tracing::warn!("No checks configured; the gate passes trivially");
    }

    let repo = GitRepo::discover()?;
    let head = args.head.as_deref().unwrap_or(&config.gate.head);

    let (base, changes) = match mode {
        GateMode::ScopedToChanges => {
            let base = args
                .base
                .as_deref()
                .or(config.gate.base.as_deref())
                .ok_or_else(|| {
                    Error::config_invalid("--base", "a base revision is required for scoped runs")
                })?;
            let changes = GateRunner::compute_change_set(
                &repo,
                base,
                head,
                config.gate.diff_range,
                &config.gate.diff_filter,
            )?;
            (Some(base), changes)
        },
        GateMode::FullTree => (None, repo.tracked_files(head)?),
    };

    tracing::info!(mode = %mode, files = changes.len(), checks = config.checks.len(), "Starting gate");

    if progress && args.format == OutputFormat::Text {
        eprintln!(
            "{} Mode: {} ({} file(s))",
            style("•").cyan(),
            style(mode.name()).bold(),
            changes.len()
        );
    }

    let runner = GateRunner::new(GateOptions {
        cwd: Some(repo.root().to_path_buf()),
        timeout,
        batch_size: config.gate.batch_size,
        env: config.toolchain.exported_env(),
        show_progress: progress && args.format == OutputFormat::Text,
    });

    let result = runner.run_gate(&config.checks, &changes).await;

    match args.format {
        OutputFormat::Text => report::print_text(&result),
        OutputFormat::Json => {
            report::print_json(&GateReport::new(&result, mode, base, head, &changes))?;
        },
    }

    Ok(exit_code(result.status().exit_code()))
}

/// Print the change set.
pub fn changes(
    base: Option<&str>,
    head: Option<&str>,
    format: OutputFormat,
    config_path: Option<&Path>,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let repo = GitRepo::discover()?;

    let head = head.unwrap_or(&config.gate.head);
    let base = base
        .or(config.gate.base.as_deref())
        .ok_or_else(|| Error::config_invalid("--base", "a base revision is required"))?;

    let changes = GateRunner::compute_change_set(
        &repo,
        base,
        head,
        config.gate.diff_range,
        &config.gate.diff_filter,
    )?;

    match format {
        OutputFormat::Text => {
            let mut stdout = std::io::stdout().lock();
            for path in &changes {
                writeln!(stdout, "{}", path.display()).map_err(|e| Error::io("write output", e))?;
            }
        },
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&changes).map_err(|e| Error::Internal {
                message: format!("Failed to serialize change set: {e}"),
            })?;
            println!("{json}");
        },
    }

    Ok(ExitCode::SUCCESS)
}

/// List configured checks.
pub fn list(preset: Option<&str>, config_path: Option<&Path>) -> Result<ExitCode> {
    let checks = match preset {
        Some(p) => {
            eprintln!("{}", style(format!("Preset {p}:")).bold());
            eprintln!("  {}", presets::description(p));
            eprintln!();
            presets::checks(p)
        },
        None => load_config(config_path)?.checks,
    };

    if checks.is_empty() {
        eprintln!("{} No checks configured", style("!").yellow());
        eprintln!("  Run: cgate init");
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("{}", style("Checks (in run order):").bold());
    for check in &checks {
        print_check(check);
    }

    Ok(ExitCode::SUCCESS)
}

/// Prints a check's details.
fn print_check(check: &CheckDefinition) {
    let description = if check.description.is_empty() {
        check.run.as_str()
    } else {
        check.description.as_str()
    };

    eprintln!(
        "  {} [{}] - {}",
        style(&check.name).cyan(),
        check.mode,
        description
    );
    if !check.include.is_empty() {
        eprintln!("      include: {}", check.include.join(", "));
    }
}

/// Initialize configuration.
pub fn init(preset: Option<&str>, force: bool) -> Result<ExitCode> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        if std::io::stdin().is_terminal() {
            let overwrite = dialoguer::Confirm::new()
                .with_prompt(format!("{CONFIG_FILE_NAME} exists. Overwrite?"))
                .default(false)
                .interact()
                .map_err(|e| Error::Internal {
                    message: format!("Failed to read answer: {e}"),
                })?;
            if !overwrite {
                return Ok(ExitCode::FAILURE);
            }
        } else {
            eprintln!(
                "{} Configuration already exists: {}",
                style("!").yellow(),
                config_path.display()
            );
            eprintln!("  Use --force to overwrite.");
            return Ok(ExitCode::FAILURE);
        }
    }

    let preset = match preset {
        Some(p) => Some(p),
        None if Path::new(".pre-commit-config.yaml").exists() => {
            eprintln!(
                "{} Detected .pre-commit-config.yaml - using the python preset",
                style("•").cyan()
            );
            Some(presets::names::PYTHON)
        },
        None => None,
    };

    let config = preset.map_or_else(Config::default, Config::for_preset);

    let toml = toml::to_string_pretty(&config).map_err(|e| Error::Internal {
        message: format!("Failed to serialize config: {e}"),
    })?;

    std::fs::write(&config_path, toml).map_err(|e| Error::io("write config", e))?;

    eprintln!("{} Created {}", style("✓").green(), config_path.display());

    if let Some(p) = preset {
        eprintln!("  Using preset: {p}");
    }

    eprintln!("\nNext steps:");
    eprintln!("  1. Review and customize {CONFIG_FILE_NAME}");
    eprintln!("  2. Run: cgate --base origin/main");

    Ok(ExitCode::SUCCESS)
}

/// Validate configuration.
pub fn validate(config_path: Option<&Path>) -> Result<ExitCode> {
    let loaded = match config_path {
        Some(p) => load_config(Some(p)),
        None => Config::load(),
    };

    match loaded {
        Ok(config) => {
            // Parsing already validated; only tool availability is left.
            for check in &config.checks {
                if let Some(program) = check.program() {
                    if !Executor::command_exists(program) {
                        eprintln!(
                            "{} {}: `{program}` not found in PATH",
                            style("!").yellow(),
                            check.name
                        );
                    }
                }
            }
            eprintln!(
                "{} Configuration is valid ({} check(s))",
                style("✓").green(),
                config.checks.len()
            );
            Ok(ExitCode::SUCCESS)
        },
        Err(e) => {
            if let Error::ConfigNotFound { ref path } = e {
                eprintln!(
                    "{} Configuration not found: {}",
                    style("!").yellow(),
                    path.display()
                );
                eprintln!("  Run: cgate init");
            } else {
                eprintln!("{} Configuration validation failed: {e}", style("✗").red());
            }
            Ok(exit_code(e.exit_code()))
        },
    }
}

/// Show configuration.
pub fn config(raw: bool, config_path: Option<&Path>) -> Result<ExitCode> {
    let found = match config_path {
        Some(p) if p.exists() => Ok(p.to_path_buf()),
        Some(p) => Err(Error::ConfigNotFound {
            path: p.to_path_buf(),
        }),
        None => Config::find_config_file(),
    };

    match found {
        Ok(path) => {
            eprintln!("Configuration file: {}", path.display());

            let content = if raw {
                std::fs::read_to_string(&path).map_err(|e| Error::io("read config", e))?
            } else {
                let config = Config::load_from(&path)?;
                toml::to_string_pretty(&config).map_err(|e| Error::Internal {
                    message: format!("Failed to serialize config: {e}"),
                })?
            };
            eprintln!();
            std::io::stdout()
                .write_all(content.as_bytes())
                .map_err(|e| Error::io("write output", e))?;

            Ok(ExitCode::SUCCESS)
        },
        Err(Error::ConfigNotFound { .. }) => {
            eprintln!("{} No configuration file found", style("!").yellow());
            eprintln!("  Run: cgate init");
            Ok(ExitCode::FAILURE)
        },
        Err(e) => Err(e),
    }
}

/// Generate shell completions.
pub fn completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    clap_complete::generate(
        shell,
        &mut super::Cli::command(),
        "cgate",
        &mut std::io::stdout(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_conversion() {
        assert_eq!(exit_code(0), ExitCode::SUCCESS);
        assert_eq!(exit_code(3), ExitCode::from(3));
        assert_eq!(exit_code(-1), ExitCode::from(1));
    }

    #[test]
    fn test_load_config_missing_explicit_path() {
        let result = load_config(Some(Path::new("/definitely/not/here/change-gate.toml")));
        assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_config_explicit_path() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[[checks]]\nname = \"lint\"\nrun = \"ruff check\"\n",
        )
        .expect("write config");

        let config = load_config(Some(&path)).expect("load");
        assert_eq!(config.checks.len(), 1);
        assert_eq!(config.checks[0].name, "lint");
    }
}
