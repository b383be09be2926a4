//! Dependency provisioning.
//!
//! The [`DependencyProvisioner`] turns a manifest entry into a validated,
//! version-checked executable path. Resolution tries, in order: an explicit
//! path locator, the local cache (unless `force_download`), the executable
//! search path, and finally a download from the configured URL.

pub mod fetch;
mod install;
pub mod version;

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fp_core::config::ProvisionerConfig;
use fp_core::{DependencySpec, Error, Platform, Result};
use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;
use fetch::{Fetcher, HttpFetcher};

pub use install::is_executable;

// ---------------------------------------------------------------------------
// Dependency
// ---------------------------------------------------------------------------

/// Where a dependency is in its resolution lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    NotResolved,
    /// Located on disk (path locator, cache or search path).
    Found,
    /// Fetched and installed into the cache.
    Downloaded,
    /// Exists and is executable.
    Validated,
    /// Version checked; safe to invoke.
    Ready,
    Unavailable,
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotResolved => write!(f, "not_resolved"),
            Self::Found => write!(f, "found"),
            Self::Downloaded => write!(f, "downloaded"),
            Self::Validated => write!(f, "validated"),
            Self::Ready => write!(f, "ready"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// A manifest entry together with its resolution outcome.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub spec: DependencySpec,
    pub state: ResolutionState,
    path: Option<PathBuf>,
    version: Option<semver::Version>,
}

impl Dependency {
    fn unresolved(spec: DependencySpec) -> Self {
        Self {
            spec,
            state: ResolutionState::NotResolved,
            path: None,
            version: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn is_ready(&self) -> bool {
        self.state == ResolutionState::Ready
    }

    /// Resolved executable path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DependencyMissing`] unless the dependency is ready.
    pub fn path(&self) -> Result<&Path> {
        match (&self.path, self.state) {
            (Some(path), ResolutionState::Ready) => Ok(path),
            (_, state) => Err(Error::dependency_missing(
                &self.spec.name,
                format!("dependency is {state}, not ready"),
            )),
        }
    }

    /// Version reported by the tool, when it printed one.
    pub fn version(&self) -> Option<&semver::Version> {
        self.version.as_ref()
    }

    /// A [`ToolCommand`] for this dependency.
    pub fn command(&self) -> Result<ToolCommand> {
        Ok(ToolCommand::new(self.path()?))
    }
}

/// Availability report for one manifest entry, returned by
/// [`DependencyProvisioner::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    pub state: ResolutionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// DependencyProvisioner
// ---------------------------------------------------------------------------

/// Resolves manifest entries to ready-to-run executables.
#[derive(Clone)]
pub struct DependencyProvisioner {
    manifest: Vec<DependencySpec>,
    cache_dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    search_path: Option<OsString>,
}

impl fmt::Debug for DependencyProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyProvisioner")
            .field("manifest", &self.manifest)
            .field("cache_dir", &self.cache_dir)
            .field("search_path", &self.search_path)
            .finish_non_exhaustive()
    }
}

impl DependencyProvisioner {
    /// Provisioner over the configured manifest, downloading over HTTP.
    pub fn new(config: &ProvisionerConfig) -> Self {
        Self {
            manifest: config.dependencies.clone(),
            cache_dir: config.expanded_cache_dir(),
            fetcher: Arc::new(HttpFetcher::new()),
            search_path: None,
        }
    }

    /// Replace the download transport.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Search these directories instead of the process `PATH`.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn manifest(&self) -> &[DependencySpec] {
        &self.manifest
    }

    /// First manifest entry named `name` that applies to `platform`.
    pub fn spec_for(&self, name: &str, platform: &Platform) -> Result<&DependencySpec> {
        self.manifest
            .iter()
            .find(|spec| spec.name == name && spec.platform.matches(platform))
            .ok_or_else(|| {
                Error::dependency_missing(name, format!("no manifest entry for platform {platform}"))
            })
    }

    /// Resolve `name` for `platform` to a ready dependency.
    ///
    /// # Errors
    ///
    /// [`Error::DependencyMissing`] when the binary cannot be located,
    /// downloaded, unpacked or executed; [`Error::VersionMismatch`] when it
    /// fails the manifest's version requirement.
    pub fn resolve(&self, name: &str, platform: &Platform) -> Result<Dependency> {
        let spec = self.spec_for(name, platform)?.clone();
        let mut dep = Dependency::unresolved(spec);
        match self.resolve_into(&mut dep) {
            Ok(()) => Ok(dep),
            Err(e) => {
                dep.state = ResolutionState::Unavailable;
                tracing::warn!("{} unavailable: {e}", dep.spec.name);
                Err(e)
            }
        }
    }

    fn resolve_into(&self, dep: &mut Dependency) -> Result<()> {
        let req = dep.spec.version_req()?;
        let (path, state) = self.locate(&dep.spec)?;
        dep.path = Some(path.clone());
        dep.state = state;
        tracing::debug!("{} {state} at {}", dep.spec.name, path.display());

        if !is_executable(&path) {
            return Err(Error::dependency_missing(
                &dep.spec.name,
                format!("{} does not exist or is not executable", path.display()),
            ));
        }
        dep.state = ResolutionState::Validated;

        let output = ToolCommand::new(&path)
            .args(dep.spec.version_args.iter().cloned())
            .output()
            .map_err(|e| Error::dependency_missing(&dep.spec.name, e.to_string()))?;
        dep.version = version::check_version(&dep.spec.name, &output.combined(), &req)?;
        dep.state = ResolutionState::Ready;

        tracing::info!(
            "Resolved {} {} at {}",
            dep.spec.name,
            dep.version
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "(unversioned)".into()),
            path.display()
        );
        Ok(())
    }

    fn locate(&self, spec: &DependencySpec) -> Result<(PathBuf, ResolutionState)> {
        if spec.locator_is_path() {
            let path = Path::new(&spec.binary);
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()?.join(path)
            };
            return Ok((path, ResolutionState::Found));
        }

        if spec.force_download {
            tracing::debug!("{}: force_download set, ignoring cache", spec.name);
        } else if let Some(path) = install::find_cached(&self.cache_dir, spec) {
            return Ok((path, ResolutionState::Found));
        }

        // A forced download must not be satisfied by a system copy.
        if !(spec.force_download && spec.url.is_some()) {
            if let Some(path) = self.search(&spec.binary) {
                return Ok((path, ResolutionState::Found));
            }
        }

        let Some(url) = spec.url.as_deref() else {
            return Err(Error::dependency_missing(
                &spec.name,
                format!(
                    "'{}' not found in cache ({}) or on the search path, and no url is configured",
                    spec.binary,
                    self.cache_dir.display()
                ),
            ));
        };

        let bytes = self
            .fetcher
            .fetch(url)
            .map_err(|e| Error::dependency_missing(&spec.name, e.to_string()))?;
        let path = install::install(&self.cache_dir, spec, &bytes)?;
        Ok((path, ResolutionState::Downloaded))
    }

    fn search(&self, binary: &str) -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        let paths = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"));
        which::which_in(binary, paths, cwd).ok()
    }

    /// Resolve every manifest entry applying to `platform`, reporting
    /// failures instead of returning them.
    pub fn check_all(&self, platform: &Platform) -> Vec<ToolInfo> {
        let mut seen = Vec::new();
        self.manifest
            .iter()
            .filter(|spec| spec.platform.matches(platform))
            .filter(|spec| {
                if seen.contains(&spec.name) {
                    false
                } else {
                    seen.push(spec.name.clone());
                    true
                }
            })
            .map(|spec| match self.resolve(&spec.name, platform) {
                Ok(dep) => ToolInfo {
                    name: spec.name.clone(),
                    available: true,
                    state: dep.state,
                    version: dep.version().map(ToString::to_string),
                    path: dep.path().ok().map(Path::to_path_buf),
                    error: None,
                },
                Err(e) => ToolInfo {
                    name: spec.name.clone(),
                    available: false,
                    state: ResolutionState::Unavailable,
                    version: None,
                    path: None,
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }
}
