//! Application configuration types.
//!
//! The top-level [`Config`] is deserialized from TOML and carries the
//! dependency manifest, probe limits, job defaults and per-plugin option
//! tables. Every section defaults sensibly so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::media::{Platform, PostProcess};
use crate::Error;

/// Locations searched when no explicit config path is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &["./forgepack.toml", "~/.config/forgepack/config.toml"];

/// Default upper bound on source duration: 24 hours.
pub const DEFAULT_MAX_DURATION_SECS: f64 = 86_400.0;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provisioner: ProvisionerConfig,
    pub probe: ProbeConfig,
    pub job: JobConfig,
    /// Raw option tables keyed by plugin name; each plugin deserializes its
    /// own typed options from its table.
    pub plugins: BTreeMap<String, toml::Table>,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load and parse the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&contents)?;
        for warning in config.validate() {
            tracing::warn!("{}: {warning}", path.display());
        }
        Ok(config)
    }

    /// Load from `custom_path` if given, otherwise from the first default
    /// location that exists, otherwise return defaults.
    pub fn load_or_default(custom_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = custom_path {
            return Self::load(path);
        }

        for path_str in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path_str);
            let path = Path::new(expanded.as_ref());
            if path.exists() {
                tracing::debug!("Using config file {}", path.display());
                return Self::load(path);
            }
        }

        tracing::debug!("No config file found; using defaults");
        Ok(Self::default())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (i, dep) in self.provisioner.dependencies.iter().enumerate() {
            if dep.name.trim().is_empty() {
                warnings.push(format!("provisioner.dependencies[{i}].name is empty"));
            }
            if dep.binary.trim().is_empty() {
                warnings.push(format!("provisioner.dependencies[{i}].binary is empty"));
            }
            if dep.url.is_some() && dep.post_process.is_none() {
                warnings.push(format!(
                    "provisioner.dependencies[{i}] ({}) has a url but no post_process action",
                    dep.name
                ));
            }
            if let Err(e) = dep.version_req() {
                warnings.push(format!("provisioner.dependencies[{i}]: {e}"));
            }
        }

        if self.probe.max_duration_secs <= 0.0 {
            warnings.push("probe.max_duration_secs must be positive".into());
        }

        if self.job.state_file.trim().is_empty() {
            warnings.push("job.state_file is empty".into());
        }

        warnings
    }

    /// Option table for the named plugin, or an empty table.
    pub fn plugin_options(&self, name: &str) -> toml::Table {
        self.plugins.get(name).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Provisioner
// ---------------------------------------------------------------------------

/// Dependency cache location and manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Directory holding downloaded binaries. `~` is expanded.
    pub cache_dir: PathBuf,
    /// The dependency manifest.
    pub dependencies: Vec<DependencySpec>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("~/.cache/forgepack/bin"),
            dependencies: vec![
                DependencySpec::from_path_lookup("ffmpeg", ">=4"),
                DependencySpec::from_path_lookup("ffprobe", ">=4"),
            ],
        }
    }
}

impl ProvisionerConfig {
    /// The cache directory with a leading `~` expanded.
    pub fn expanded_cache_dir(&self) -> PathBuf {
        let raw = self.cache_dir.to_string_lossy();
        PathBuf::from(shellexpand::tilde(raw.as_ref()).into_owned())
    }
}

/// One entry of the dependency manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Logical name commands refer to (e.g. "ffmpeg").
    pub name: String,
    /// Bare executable name, or a relative/absolute path to it.
    pub binary: String,
    /// Semver requirement the installed tool must satisfy (e.g. "~6.1").
    #[serde(default = "default_version")]
    pub version: String,
    /// Platform this entry applies to.
    #[serde(default)]
    pub platform: Platform,
    /// Download location used when the binary cannot be found locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// How to turn the downloaded bytes into an executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_process: Option<PostProcess>,
    /// Ignore any cached copy and download again.
    #[serde(default)]
    pub force_download: bool,
    /// Move the whole extracted tree into the cache, not just the binary.
    #[serde(default)]
    pub move_all: bool,
    /// Arguments that make the tool print its version.
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
}

fn default_version() -> String {
    "*".to_string()
}

fn default_version_args() -> Vec<String> {
    vec!["-version".to_string()]
}

impl DependencySpec {
    /// Entry that is only ever looked up on `PATH` under its own name.
    pub fn from_path_lookup(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            binary: name.to_string(),
            version: version.to_string(),
            platform: Platform::any(),
            url: None,
            post_process: None,
            force_download: false,
            move_all: false,
            version_args: default_version_args(),
        }
    }

    /// Parse the version requirement.
    pub fn version_req(&self) -> Result<semver::VersionReq> {
        semver::VersionReq::parse(&self.version).map_err(|e| {
            Error::Config(format!(
                "invalid version requirement '{}' for {}: {e}",
                self.version, self.name
            ))
        })
    }

    /// Whether `binary` names a path rather than a bare executable name.
    pub fn locator_is_path(&self) -> bool {
        let path = Path::new(&self.binary);
        path.is_absolute() || path.components().count() > 1
    }

    /// File name of the executable this entry provides.
    pub fn binary_file_name(&self) -> String {
        Path::new(&self.binary)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.binary.clone())
    }
}

// ---------------------------------------------------------------------------
// Probe / Job
// ---------------------------------------------------------------------------

/// Source validation limits applied at probe time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Sources longer than this are rejected.
    pub max_duration_secs: f64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
        }
    }
}

/// Defaults for job output placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Parent directory for job outputs. When unset, outputs go next to the
    /// source in `<stem>_packaged/`.
    pub output_root: Option<PathBuf>,
    /// File name of the persisted job state inside the output directory.
    pub state_file: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            output_root: None,
            state_file: "job.json".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_valid() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.provisioner.dependencies.len(), 2);
        assert_eq!(config.probe.max_duration_secs, DEFAULT_MAX_DURATION_SECS);
        assert_eq!(config.job.state_file, "job.json");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn parses_full_manifest_entry() {
        let toml_str = r#"
            [provisioner]
            cache_dir = "/tmp/fp-cache"

            [[provisioner.dependencies]]
            name = "ffmpeg"
            binary = "ffmpeg"
            version = "~6.1"
            platform = { os = "linux", arch = "x86_64" }
            url = "https://example.com/ffmpeg-6.1-amd64-static.tar.xz"
            post_process = "untar"
            force_download = true
            move_all = true

            [plugins.thumbnail]
            width = 640
        "#;
        let config = Config::from_toml(toml_str).unwrap();
        let dep = &config.provisioner.dependencies[0];
        assert_eq!(dep.name, "ffmpeg");
        assert_eq!(dep.platform, Platform::new("linux", "x86_64"));
        assert_eq!(dep.post_process, Some(PostProcess::Untar));
        assert!(dep.force_download);
        assert!(dep.move_all);
        assert_eq!(dep.version_args, vec!["-version".to_string()]);
        assert!(dep.version_req().unwrap().matches(&semver::Version::new(6, 1, 2)));
        assert_eq!(
            config.plugin_options("thumbnail").get("width"),
            Some(&toml::Value::Integer(640))
        );
        assert!(config.plugin_options("audio").is_empty());
    }

    #[test]
    fn validate_flags_bad_entries() {
        let mut config = Config::default();
        config.provisioner.dependencies.push(DependencySpec {
            url: Some("https://example.com/tool".into()),
            version: "not a version".into(),
            ..DependencySpec::from_path_lookup("tool", "*")
        });
        config.probe.max_duration_secs = 0.0;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 3, "{warnings:?}");
    }

    #[test]
    fn locator_kinds() {
        let bare = DependencySpec::from_path_lookup("ffmpeg", "*");
        assert!(!bare.locator_is_path());

        let relative = DependencySpec {
            binary: "bin/ffmpeg".into(),
            ..bare.clone()
        };
        assert!(relative.locator_is_path());
        assert_eq!(relative.binary_file_name(), "ffmpeg");

        let absolute = DependencySpec {
            binary: "/usr/bin/ffmpeg".into(),
            ..bare
        };
        assert!(absolute.locator_is_path());
    }

    #[test]
    fn load_or_default_reads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forgepack.toml");
        std::fs::write(&path, "[probe]\nmax_duration_secs = 60.0\n").unwrap();
        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.probe.max_duration_secs, 60.0);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/forgepack.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/forgepack.toml"));
    }

    #[test]
    fn cache_dir_tilde_expansion() {
        let cfg = ProvisionerConfig::default();
        if std::env::var_os("HOME").is_some() {
            assert!(!cfg.expanded_cache_dir().to_string_lossy().starts_with('~'));
        }
    }
}
