//! Command execution for running checks.
//!
//! This module provides utilities for executing shell commands
//! with timeout support, output capture, and error handling.
//!
//! On Unix every command runs in its own process group. When the command
//! finishes, times out, or is abandoned, the whole group is killed so tools
//! the check started (test runners, compilers, watchers) never outlive it.

use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// Exit code reported for a command killed on timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Output from a command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Whether the command was killed due to timeout.
    pub timed_out: bool,
    /// Duration the command took to run.
    pub duration: Duration,
}

impl CommandOutput {
    /// Returns true if the command succeeded (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Returns true if the shell could not find or execute the program.
    #[must_use]
    pub const fn not_invocable(&self) -> bool {
        !self.timed_out && matches!(self.exit_code, 126 | 127)
    }

    /// Returns combined stdout and stderr output.
    #[must_use]
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Options for command execution.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Working directory for the command.
    pub cwd: Option<std::path::PathBuf>,
    /// Timeout for the command.
    pub timeout: Option<Duration>,
    /// Environment variables to set.
    pub env: Vec<(String, String)>,
    /// Shell to use (default: sh on Unix, cmd on Windows).
    pub shell: Option<String>,
    /// Value of `$0` inside the shell script, shown in shell diagnostics.
    pub script_name: Option<String>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            timeout: None,
            env: Vec::new(),
            shell: None,
            script_name: None,
        }
    }
}

impl ExecuteOptions {
    /// Sets the working directory.
    #[must_use]
    pub fn cwd(mut self, path: impl AsRef<Path>) -> Self {
        self.cwd = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the shell used to interpret commands.
    #[must_use]
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    /// Sets `$0` for the shell script.
    #[must_use]
    pub fn script_name(mut self, name: impl Into<String>) -> Self {
        self.script_name = Some(name.into());
        self
    }
}

/// Executor for running shell commands.
#[derive(Debug, Default)]
pub struct Executor;

impl Executor {
    /// Creates a new executor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Executes a shell command.
    pub async fn execute(&self, command: &str, options: ExecuteOptions) -> Result<CommandOutput> {
        self.execute_with_args(command, &[], options).await
    }

    /// Executes a shell command with trailing positional arguments.
    ///
    /// On Unix the arguments reach the command through `"$@"`, so paths
    /// containing spaces or shell metacharacters are passed verbatim.
    /// Returns `Err` only when the shell itself cannot be spawned.
    pub async fn execute_with_args(
        &self,
        command: &str,
        args: &[PathBuf],
        options: ExecuteOptions,
    ) -> Result<CommandOutput> {
        let start = Instant::now();

        let mut cmd = build_command(command, args, &options);

        // Set working directory
        if let Some(ref cwd) = options.cwd {
            cmd.current_dir(cwd);
        }

        // Set environment variables
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        // Spawn the process
        let mut child = cmd.spawn().map_err(|e| Error::io("spawn command", e))?;
        let group = ProcessGroup::new(child.id());
        tracing::debug!(command, args = args.len(), pid = ?child.id(), "Spawned command");

        // Handle timeout
        let result = if let Some(timeout_duration) = options.timeout {
            match timeout(timeout_duration, self.wait_for_output(&mut child, &group)).await {
                Ok(result) => result,
                Err(_) => {
                    group.kill();
                    // kill() also reaps the child
                    if let Err(e) = child.kill().await {
                        tracing::warn!(error = %e, "Failed to kill timed out command");
                    }
                    return Ok(CommandOutput {
                        exit_code: TIMEOUT_EXIT_CODE,
                        stdout: String::new(),
                        stderr: "Command timed out".to_string(),
                        timed_out: true,
                        duration: start.elapsed(),
                    });
                },
            }
        } else {
            self.wait_for_output(&mut child, &group).await
        };

        let (exit_code, stdout, stderr) = result?;

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
            timed_out: false,
            duration: start.elapsed(),
        })
    }

    /// Waits for the command to complete and captures output.
    async fn wait_for_output(
        &self,
        child: &mut Child,
        group: &ProcessGroup,
    ) -> Result<(i32, String, String)> {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_handle = tokio::spawn(async move {
            let mut output = String::new();
            if let Some(stdout) = stdout {
                let mut reader = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    output.push_str(&line);
                    output.push('\n');
                }
            }
            output
        });

        let stderr_handle = tokio::spawn(async move {
            let mut output = String::new();
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    output.push_str(&line);
                    output.push('\n');
                }
            }
            output
        });

        let status = child.wait().await.map_err(|e| Error::io("wait for command", e))?;

        // Background jobs left behind would hold the pipes open.
        group.kill();

        let stdout = stdout_handle.await.map_err(|e| Error::Internal {
            message: format!("stdout task failed: {e}"),
        })?;
        let stderr = stderr_handle.await.map_err(|e| Error::Internal {
            message: format!("stderr task failed: {e}"),
        })?;

        Ok((status.code().unwrap_or(1), stdout, stderr))
    }

    /// Checks if a command exists in PATH.
    #[must_use]
    pub fn command_exists(command: &str) -> bool {
        which::which(command).is_ok()
    }
}

/// Process group led by a spawned shell.
///
/// Killed once: when the shell exits, when it times out, or on drop if the
/// run was abandoned. The group id is not signalled again afterwards, since
/// it may be reused once every member is gone.
#[derive(Debug)]
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    leader: Option<u32>,
    killed: AtomicBool,
}

impl ProcessGroup {
    const fn new(leader: Option<u32>) -> Self {
        Self {
            leader,
            killed: AtomicBool::new(false),
        }
    }

    /// Sends SIGKILL to every process left in the group.
    fn kill(&self) {
        if self.killed.swap(true, Ordering::AcqRel) {
            return;
        }

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let Some(pgid) = self.leader.and_then(|pid| i32::try_from(pid).ok()) else {
                return;
            };
            match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                // ESRCH: the group is already gone.
                Ok(()) | Err(Errno::ESRCH) => {},
                Err(e) => tracing::debug!(pgid, error = %e, "Failed to kill process group"),
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Builds the shell invocation for `command` with `args` appended.
fn build_command(command: &str, args: &[PathBuf], options: &ExecuteOptions) -> Command {
    if cfg!(windows) {
        let mut line = command.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(&quote_windows(&arg.to_string_lossy()));
        }
        let mut cmd = Command::new(options.shell.as_deref().unwrap_or("cmd"));
        cmd.arg("/C").arg(line);
        cmd
    } else {
        let script = if args.is_empty() {
            command.to_string()
        } else {
            format!("{command} \"$@\"")
        };
        let mut cmd = Command::new(options.shell.as_deref().unwrap_or("sh"));
        cmd.arg("-c")
            .arg(script)
            .arg(options.script_name.as_deref().unwrap_or("cgate"))
            .args(args);
        cmd
    }
}

fn quote_windows(arg: &str) -> String {
    if arg.contains([' ', '\t', '"', '&', '|', '<', '>', '^']) {
        format!("\"{}\"", arg.replace('"', "\"\""))
    } else {
        arg.to_string()
    }
}
