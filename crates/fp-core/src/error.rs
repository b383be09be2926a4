//! Unified error type for forgepack.
//!
//! Every crate funnels its failures into [`Error`]. Each variant carries the
//! name of the binary, path, command or source file involved so that a
//! failure can be diagnosed from the persisted job state alone.

use std::path::PathBuf;

/// Unified error type covering all failure modes in forgepack.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A dependency could not be resolved, is not executable, or its
    /// download/unpack step failed.
    #[error("dependency missing [{name}]: {message}")]
    DependencyMissing {
        /// Dependency name (e.g. "ffmpeg").
        name: String,
        /// Human-readable error description.
        message: String,
    },

    /// The installed tool does not satisfy the required version constraint.
    #[error("version mismatch [{name}]: found {found}, required {required}")]
    VersionMismatch {
        /// Dependency name.
        name: String,
        /// Version reported by the tool (or the raw output if none was found).
        found: String,
        /// The requirement that was not met.
        required: String,
    },

    /// Tool output did not match the expected structure.
    #[error("failed to parse {tool} output: {message}")]
    Parse {
        /// Tool whose output was being parsed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The source could not be probed or failed source-level validation.
    #[error("probe error [{}]: {message}", source_path.display())]
    Probe {
        /// The offending source file.
        source_path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// The command graph references an unknown command or contains a cycle.
    #[error("graph error: {0}")]
    Graph(String),

    /// An external invocation exited unsuccessfully.
    #[error("command [{name}] failed: {message}")]
    Command {
        /// Name of the failing command.
        name: String,
        /// Exit description followed by the captured output.
        message: String,
    },

    /// Configuration or construction input failed validation.
    #[error("config error: {0}")]
    Config(String),

    /// An operation was attempted in a state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An I/O operation failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying serde_json error.
        #[from]
        source: serde_json::Error,
    },
}

impl Error {
    /// Convenience constructor for [`Error::DependencyMissing`].
    pub fn dependency_missing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::DependencyMissing {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::VersionMismatch`].
    pub fn version_mismatch(
        name: impl Into<String>,
        found: impl Into<String>,
        required: impl Into<String>,
    ) -> Self {
        Error::VersionMismatch {
            name: name.into(),
            found: found.into(),
            required: required.into(),
        }
    }

    /// Convenience constructor for [`Error::Parse`].
    pub fn parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Probe`].
    pub fn probe(source_path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Probe {
            source_path: source_path.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Graph`].
    pub fn graph(message: impl Into<String>) -> Self {
        Error::Graph(message.into())
    }

    /// Convenience constructor for [`Error::Command`].
    pub fn command(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Command {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort construction of a framework or job.
    ///
    /// Command failures only abort the remaining run queue.
    pub fn is_fatal_at_construction(&self) -> bool {
        !matches!(self, Error::Command { .. })
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_missing_display() {
        let err = Error::dependency_missing("ffmpeg", "not found in cache or PATH");
        assert_eq!(
            err.to_string(),
            "dependency missing [ffmpeg]: not found in cache or PATH"
        );
    }

    #[test]
    fn version_mismatch_display() {
        let err = Error::version_mismatch("ffmpeg", "4.4.2", "^6.1");
        assert_eq!(
            err.to_string(),
            "version mismatch [ffmpeg]: found 4.4.2, required ^6.1"
        );
    }

    #[test]
    fn parse_display() {
        let err = Error::parse("ffmpeg", "table marker not found");
        assert_eq!(
            err.to_string(),
            "failed to parse ffmpeg output: table marker not found"
        );
    }

    #[test]
    fn probe_display_names_source() {
        let err = Error::probe("/media/movie.mkv", "duration 0 out of range");
        assert_eq!(
            err.to_string(),
            "probe error [/media/movie.mkv]: duration 0 out of range"
        );
    }

    #[test]
    fn graph_display() {
        let err = Error::graph("cycle detected: a -> b -> a");
        assert_eq!(err.to_string(), "graph error: cycle detected: a -> b -> a");
    }

    #[test]
    fn command_display() {
        let err = Error::command("thumbnail", "exit status: 1\nNo such file");
        assert!(err.to_string().starts_with("command [thumbnail] failed"));
        assert!(!err.is_fatal_at_construction());
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.is_fatal_at_construction());
    }

    #[test]
    fn json_from_serde() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(json_err);
        assert!(matches!(err, Error::Json { .. }));
    }
}
