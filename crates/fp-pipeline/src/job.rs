//! Lifecycle of one packaging job.
//!
//! A [`Job`] is opened against a source (output directory created, source
//! validated, media probed), has plugins attached (each attach rebuilds the
//! whole command graph), is run (commands execute one at a time in graph
//! order) and is finally closed. Its state file is rewritten after every
//! state change.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fp_av::{Framework, MediaInfo};
use fp_core::config::JobConfig;
use fp_core::{Error, JobId, Result};

use crate::command::{Command, CommandStatus};
use crate::graph;
use crate::plugin::{JobContext, Plugin};
use crate::state::JobState;

pub struct Job {
    id: JobId,
    source: PathBuf,
    output_dir: PathBuf,
    state_path: PathBuf,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    framework: Arc<dyn Framework>,
    media: MediaInfo,
    plugins: Vec<Box<dyn Plugin>>,
    commands: Vec<Command>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("output_dir", &self.output_dir)
            .field("plugins", &self.plugin_names())
            .field("commands", &self.commands.len())
            .finish_non_exhaustive()
    }
}

impl Job {
    /// Open a job for `source`: create the output directory, validate the
    /// source and probe it.
    ///
    /// # Errors
    ///
    /// [`Error::Probe`] if the source is missing or fails probing or
    /// duration validation; [`Error::Io`] if the output directory cannot be
    /// created.
    pub fn open(source: &Path, config: &JobConfig, framework: Arc<dyn Framework>) -> Result<Self> {
        if !source.is_file() {
            return Err(Error::probe(source, "source does not exist or is not a regular file"));
        }
        let source = std::fs::canonicalize(source)?;
        let output_dir = output_dir_for(&source, config)?;
        std::fs::create_dir_all(&output_dir)?;

        let id = JobId::new();
        tracing::info!(
            "Opening job {} for {} -> {}",
            id.short(),
            source.display(),
            output_dir.display()
        );
        let media = framework.probe(&source)?;

        let job = Self {
            id,
            state_path: output_dir.join(&config.state_file),
            source,
            output_dir,
            started_at: Utc::now(),
            finished_at: None,
            framework,
            media,
            plugins: Vec::new(),
            commands: Vec::new(),
        };
        job.persist()?;
        Ok(job)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn media(&self) -> &MediaInfo {
        &self.media
    }

    pub fn framework(&self) -> &dyn Framework {
        self.framework.as_ref()
    }

    /// Commands in execution order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name() == name)
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.finished_at.is_some()
    }

    // -----------------------------------------------------------------------
    // Graph
    // -----------------------------------------------------------------------

    /// Attach `plugin` and rebuild the command graph from scratch.
    ///
    /// On failure the plugin is not attached and the previous graph is kept.
    ///
    /// # Errors
    ///
    /// [`Error::Graph`] for unknown or cyclic dependencies; errors from the
    /// plugin's command emission; [`Error::InvalidState`] once the job has
    /// started running or is closed.
    pub fn attach(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        self.ensure_attachable()?;
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(Error::Config(format!(
                "plugin '{}' is already attached",
                plugin.name()
            )));
        }

        let mut plugins = std::mem::take(&mut self.plugins);
        plugins.push(plugin);
        let built = self.build_commands(&plugins);
        match built {
            Ok(commands) => {
                self.plugins = plugins;
                self.commands = commands;
                tracing::info!(
                    "Job {}: {} plugins, {} commands",
                    self.id.short(),
                    self.plugins.len(),
                    self.commands.len()
                );
                self.persist()
            }
            Err(e) => {
                if let Some(rejected) = plugins.pop() {
                    tracing::warn!("Rejected plugin {}: {e}", rejected.name());
                }
                self.plugins = plugins;
                Err(e)
            }
        }
    }

    fn ensure_attachable(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::InvalidState(format!("job {} is closed", self.id)));
        }
        if self
            .commands
            .iter()
            .any(|c| c.status() != CommandStatus::Queued)
        {
            return Err(Error::InvalidState(format!(
                "job {} has already started running",
                self.id
            )));
        }
        Ok(())
    }

    fn build_commands(&self, plugins: &[Box<dyn Plugin>]) -> Result<Vec<Command>> {
        let ctx = JobContext {
            id: self.id,
            source: &self.source,
            output_dir: &self.output_dir,
            media: &self.media,
            framework: self.framework.as_ref(),
            plugins,
        };

        let mut emitted = Vec::new();
        for plugin in plugins {
            let commands = plugin.commands(&ctx)?;
            tracing::debug!("{} emitted {} commands", plugin.name(), commands.len());
            emitted.extend(commands);
        }

        for cmd in &emitted {
            let dep = self.framework.dependency(cmd.dependency())?;
            if !dep.is_ready() {
                return Err(Error::dependency_missing(
                    cmd.dependency(),
                    format!("required by command '{}' but not ready", cmd.name()),
                ));
            }
        }

        let mut ordered = graph::order(emitted)?;
        for cmd in &mut ordered {
            cmd.queue()?;
        }
        Ok(ordered)
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run every queued command in order, one at a time.
    ///
    /// A command whose dependencies did not all succeed (because they were
    /// cancelled) is cancelled instead of run.
    ///
    /// # Errors
    ///
    /// [`Error::Command`] from the first failing command. Commands after it
    /// stay QUEUED. Running a closed job, or one with a failed command, is
    /// [`Error::InvalidState`].
    pub fn run(&mut self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::InvalidState(format!("job {} is closed", self.id)));
        }
        if let Some(failed) = self
            .commands
            .iter()
            .find(|c| c.status() == CommandStatus::Failed)
        {
            return Err(Error::InvalidState(format!(
                "command '{}' already failed; open a new job to retry",
                failed.name()
            )));
        }

        tracing::info!("Running job {} ({} commands)", self.id.short(), self.commands.len());
        for i in 0..self.commands.len() {
            if self.commands[i].status() != CommandStatus::Queued {
                continue;
            }

            if let Some(blocker) = self.unsatisfied_dependency(&self.commands[i]) {
                tracing::warn!(
                    "Cancelling {}: dependency {blocker} did not succeed",
                    self.commands[i].name()
                );
                self.commands[i].cancel()?;
                self.persist()?;
                continue;
            }

            let result = self.commands[i].run(self.framework.as_ref());
            let persisted = self.persist();
            result?;
            persisted?;
        }

        tracing::info!(
            "Job {} finished: {} succeeded, {} cancelled",
            self.id.short(),
            self.count(CommandStatus::Succeeded),
            self.count(CommandStatus::Cancelled)
        );
        Ok(())
    }

    fn unsatisfied_dependency(&self, cmd: &Command) -> Option<String> {
        cmd.dependencies()
            .iter()
            .find(|dep| {
                self.command(dep)
                    .map_or(true, |c| c.status() != CommandStatus::Succeeded)
            })
            .cloned()
    }

    fn count(&self, status: CommandStatus) -> usize {
        self.commands.iter().filter(|c| c.status() == status).count()
    }

    /// Cancel every queued command. Returns how many were cancelled.
    pub fn cancel_pending(&mut self) -> Result<usize> {
        let mut cancelled = 0;
        for cmd in &mut self.commands {
            if cmd.status() == CommandStatus::Queued {
                cmd.cancel()?;
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::info!("Job {}: cancelled {cancelled} commands", self.id.short());
            self.persist()?;
        }
        Ok(cancelled)
    }

    /// Set the end timestamp and persist the final state.
    pub fn close(&mut self) -> Result<JobState> {
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
        self.persist()?;
        tracing::info!("Closed job {}", self.id.short());
        Ok(self.state())
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    /// Snapshot of the current state.
    pub fn state(&self) -> JobState {
        JobState {
            id: self.id,
            source: self.source.clone(),
            output_dir: self.output_dir.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_secs: self
                .finished_at
                .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0),
            plugins: self.plugin_names(),
            commands: self.commands.clone(),
        }
    }

    /// Rewrite the state file.
    pub fn persist(&self) -> Result<()> {
        self.state().save(&self.state_path)
    }
}

/// `<output_root>/<stem>` when an output root is configured, else
/// `<source dir>/<stem>_packaged`.
fn output_dir_for(source: &Path, config: &JobConfig) -> Result<PathBuf> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::probe(source, "source has no file name"))?;
    Ok(match &config.output_root {
        Some(root) => root.join(stem),
        None => source
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{stem}_packaged")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dir_next_to_source() {
        let dir = output_dir_for(Path::new("/media/movie.mkv"), &JobConfig::default()).unwrap();
        assert_eq!(dir, PathBuf::from("/media/movie_packaged"));
    }

    #[test]
    fn output_dir_under_root() {
        let config = JobConfig {
            output_root: Some(PathBuf::from("/srv/out")),
            ..JobConfig::default()
        };
        let dir = output_dir_for(Path::new("/media/movie.mkv"), &config).unwrap();
        assert_eq!(dir, PathBuf::from("/srv/out/movie"));
    }
}
