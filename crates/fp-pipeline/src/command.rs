//! A single external-tool invocation and its run-time status.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fp_av::{Framework, ToolCommand};
use fp_core::{Error, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CommandStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a [`Command`]. Transitions only move forward:
/// `RECEIVED -> QUEUED -> RUNNING -> {SUCCEEDED | FAILED}`, and
/// `QUEUED -> CANCELLED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Received,
    Queued,
    Running,
    Cancelled,
    Failed,
    Succeeded,
}

impl CommandStatus {
    pub fn can_transition_to(self, next: CommandStatus) -> bool {
        use CommandStatus::*;
        matches!(
            (self, next),
            (Received, Queued)
                | (Queued, Running)
                | (Queued, Cancelled)
                | (Running, Succeeded)
                | (Running, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Failed | Self::Succeeded)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "RECEIVED"),
            Self::Queued => write!(f, "QUEUED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Value of a keyword option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptValue {
    /// `true` renders a bare `-key`; `false` omits the option.
    Flag(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for OptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<i64> for OptValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u32> for OptValue {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for OptValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for OptValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for OptValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&Path> for OptValue {
    fn from(p: &Path) -> Self {
        Self::Text(p.to_string_lossy().into_owned())
    }
}

/// Arguments of a command: leading positionals, ordered `-key value`
/// options (keys may repeat), then trailing positionals such as output
/// paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    positional: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    options: Vec<(String, OptValue)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    trailing: Vec<String>,
}

impl ArgSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(mut self, arg: impl Into<String>) -> Self {
        self.positional.push(arg.into());
        self
    }

    /// Append `-key value`. A leading dash on `key` is optional.
    pub fn opt(mut self, key: &str, value: impl Into<OptValue>) -> Self {
        self.options
            .push((key.trim_start_matches('-').to_string(), value.into()));
        self
    }

    /// Append a bare `-key`.
    pub fn flag(self, key: &str) -> Self {
        self.opt(key, true)
    }

    pub fn trailing(mut self, arg: impl Into<String>) -> Self {
        self.trailing.push(arg.into());
        self
    }

    /// Rendered command-line arguments.
    pub fn render(&self) -> Vec<String> {
        let mut args = self.positional.clone();
        for (key, value) in &self.options {
            match value {
                OptValue::Flag(false) => {}
                OptValue::Flag(true) => args.push(format!("-{key}")),
                other => {
                    args.push(format!("-{key}"));
                    args.push(other.to_string());
                }
            }
        }
        args.extend(self.trailing.iter().cloned());
        args
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One external-tool invocation in a job's graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    name: String,
    dependency: String,
    args: ArgSet,
    #[serde(default)]
    outputs: Vec<PathBuf>,
    #[serde(default)]
    depends_on: BTreeSet<String>,
    #[serde(default)]
    priority: i32,
    status: CommandStatus,
    #[serde(default)]
    log: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
}

impl Command {
    /// A new command invoking the dependency named `dependency`.
    pub fn new(name: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependency: dependency.into(),
            args: ArgSet::default(),
            outputs: Vec::new(),
            depends_on: BTreeSet::new(),
            priority: 0,
            status: CommandStatus::Received,
            log: String::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_args(mut self, args: ArgSet) -> Self {
        self.args = args;
        self
    }

    /// Declare an expected output; its parent directory is created before
    /// the command runs.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.insert(name.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn args(&self) -> &ArgSet {
        &self.args
    }

    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    pub fn get_priority(&self) -> i32 {
        self.priority
    }

    pub fn status(&self) -> CommandStatus {
        self.status
    }

    pub fn log(&self) -> &str {
        &self.log
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    fn transition(&mut self, next: CommandStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidState(format!(
                "command '{}' cannot move from {} to {next}",
                self.name, self.status
            )));
        }
        tracing::debug!("{}: {} -> {next}", self.name, self.status);
        self.status = next;
        Ok(())
    }

    pub(crate) fn queue(&mut self) -> Result<()> {
        self.transition(CommandStatus::Queued)
    }

    /// Cancel a queued command. Running or finished commands cannot be
    /// cancelled.
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(CommandStatus::Cancelled)
    }

    /// Tool invocation for this command with the program at `program`.
    pub fn to_tool_command(&self, program: &Path) -> ToolCommand {
        let mut cmd = ToolCommand::new(program);
        cmd.args(self.args.render());
        cmd
    }

    /// Run the command to completion through `framework`.
    ///
    /// # Errors
    ///
    /// [`Error::Command`] carrying the captured output on a non-zero exit;
    /// [`Error::InvalidState`] if the command is not queued.
    pub(crate) fn run(&mut self, framework: &dyn Framework) -> Result<()> {
        if self.status != CommandStatus::Queued {
            return Err(Error::InvalidState(format!(
                "command '{}' is {}, not QUEUED",
                self.name, self.status
            )));
        }
        let program = framework.dependency(&self.dependency)?.path()?.to_path_buf();

        for output in &self.outputs {
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tool = self.to_tool_command(&program);
        self.transition(CommandStatus::Running)?;
        self.started_at = Some(Utc::now());
        tracing::info!("Running {}: {}", self.name, tool.display());

        let result = tool.output();
        self.finished_at = Some(Utc::now());
        match result {
            Ok(output) if output.success() => {
                self.log = output.combined();
                self.transition(CommandStatus::Succeeded)
            }
            Ok(output) => {
                self.log = output.combined();
                self.transition(CommandStatus::Failed)?;
                tracing::error!("{} exited with {}", self.name, output.status);
                Err(Error::command(
                    &self.name,
                    format!("exited with {}: {}", output.status, self.log.trim()),
                ))
            }
            Err(e) => {
                self.log = e.to_string();
                self.transition(CommandStatus::Failed)?;
                tracing::error!("{} could not start: {e}", self.name);
                Err(Error::command(&self.name, self.log.clone()))
            }
        }
    }
}
