//! Builder for running external tool invocations synchronously.
//!
//! There is no timeout: a hung child blocks the caller until it exits.
//! Callers needing bounded execution must supervise the process externally.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => {
                let mut text = self.stdout.clone();
                if !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&self.stderr);
                text
            }
        }
    }

    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use fp_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # fn example() -> fp_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
///     .arg("/path/to/video.mkv")
///     .execute()?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().map(|a| {
                if a.is_empty() || a.contains(char::is_whitespace) {
                    format!("'{a}'")
                } else {
                    a.clone()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run the command to completion and capture its output, whatever the
    /// exit status.
    ///
    /// # Errors
    ///
    /// Returns [`fp_core::Error::Command`] only when the process cannot be
    /// spawned or waited on.
    pub fn output(&self) -> fp_core::Result<ToolOutput> {
        tracing::debug!("exec: {}", self.display());

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                fp_core::Error::command(
                    self.program_name(),
                    format!("failed to spawn {}: {e}", self.program.display()),
                )
            })?;

        Ok(ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run the command and require a zero exit status.
    ///
    /// # Errors
    ///
    /// Returns [`fp_core::Error::Command`] if spawning fails or the process
    /// exits with a non-zero status (message includes the captured output).
    pub fn execute(&self) -> fp_core::Result<ToolOutput> {
        let output = self.output()?;
        if !output.success() {
            return Err(fp_core::Error::command(
                self.program_name(),
                format!("exited with {}: {}", output.status, output.combined().trim()),
            ));
        }
        Ok(output)
    }
}
