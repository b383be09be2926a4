//! Persisted job state.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fp_core::{Error, JobId, Result};
use serde::{Deserialize, Serialize};

use crate::command::{Command, CommandStatus};

/// Snapshot of a job written to its state file after every state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub id: JobId,
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl JobState {
    /// Write the state as JSON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        tracing::debug!("Persisted job {} to {}", self.id, path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read job state {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Number of commands in `status`.
    pub fn count(&self, status: CommandStatus) -> usize {
        self.commands.iter().filter(|c| c.status() == status).count()
    }

    /// The first failed command, if any.
    pub fn failed_command(&self) -> Option<&Command> {
        self.commands
            .iter()
            .find(|c| c.status() == CommandStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ArgSet;

    fn sample() -> JobState {
        let mut queued = Command::new("audio.extract", "ffmpeg")
            .with_args(ArgSet::new().opt("i", "/media/in.mkv").trailing("/out/audio.m4a"))
            .output("/out/audio.m4a")
            .priority(3);
        queued.queue().unwrap();
        let mut cancelled = Command::new("metadata.export", "ffmpeg").depends_on("audio.extract");
        cancelled.queue().unwrap();
        cancelled.cancel().unwrap();
        JobState {
            id: JobId::new(),
            source: PathBuf::from("/media/in.mkv"),
            output_dir: PathBuf::from("/out"),
            started_at: Utc::now(),
            finished_at: None,
            duration_secs: None,
            plugins: vec!["audio".into(), "metadata".into()],
            commands: vec![queued, cancelled, Command::new("received", "ffmpeg")],
        }
    }

    #[test]
    fn round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        let state = sample();
        state.save(&path).unwrap();
        let loaded = JobState::load(&path).unwrap();

        assert_eq!(loaded.id, state.id);
        assert_eq!(loaded.source, state.source);
        assert_eq!(loaded.output_dir, state.output_dir);
        let statuses: Vec<_> = loaded.commands.iter().map(Command::status).collect();
        assert_eq!(
            statuses,
            vec![
                CommandStatus::Queued,
                CommandStatus::Cancelled,
                CommandStatus::Received
            ]
        );
        assert_eq!(loaded, state);
        assert!(!dir.path().join("job.json.tmp").exists());
    }

    #[test]
    fn ids_timestamps_and_paths_are_strings() {
        let state = sample();
        let value = serde_json::to_value(&state).unwrap();
        assert!(value["id"].is_string());
        assert!(value["started_at"].is_string());
        assert!(value["source"].is_string());
        assert_eq!(value["commands"][0]["status"], "QUEUED");
    }

    #[test]
    fn counts_by_status() {
        let state = sample();
        assert_eq!(state.count(CommandStatus::Queued), 1);
        assert_eq!(state.count(CommandStatus::Cancelled), 1);
        assert!(state.failed_command().is_none());
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = JobState::load(Path::new("/nonexistent/job.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/job.json"));
    }
}
