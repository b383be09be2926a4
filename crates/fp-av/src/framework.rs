//! Binding of the provisioner, capability catalog and stream probe to one
//! tool family.

use std::path::Path;
use std::sync::Arc;

use fp_core::config::ProbeConfig;
use fp_core::{Error, Platform, Result};

use crate::capabilities::CapabilityCatalog;
use crate::probe::{FfprobeProber, MediaInfo};
use crate::tools::{Dependency, DependencyProvisioner};

/// A resolved tool family that jobs run their commands against.
pub trait Framework: Send + Sync {
    /// Family name, e.g. `"ffmpeg"`.
    fn name(&self) -> &str;

    /// A ready dependency by manifest name.
    fn dependency(&self, name: &str) -> Result<&Dependency>;

    /// Every dependency this binding resolved.
    fn dependencies(&self) -> &[Dependency];

    /// Capabilities of the bound build.
    fn catalog(&self) -> Arc<CapabilityCatalog>;

    /// Probe `source` and validate its duration.
    fn probe(&self, source: &Path) -> Result<MediaInfo>;
}

/// The ffmpeg + ffprobe binding.
#[derive(Debug)]
pub struct FfmpegFramework {
    dependencies: Vec<Dependency>,
    catalog: Arc<CapabilityCatalog>,
    prober: FfprobeProber,
    max_duration_secs: f64,
}

impl FfmpegFramework {
    pub const FFMPEG: &'static str = "ffmpeg";
    pub const FFPROBE: &'static str = "ffprobe";

    /// Resolve ffmpeg and ffprobe, then collect the capability catalog.
    ///
    /// # Errors
    ///
    /// Provisioning, version and capability-parse failures abort binding.
    pub fn bind(
        provisioner: &DependencyProvisioner,
        platform: &Platform,
        probe_config: &ProbeConfig,
    ) -> Result<Self> {
        let ffmpeg = provisioner.resolve(Self::FFMPEG, platform)?;
        let ffprobe = provisioner.resolve(Self::FFPROBE, platform)?;
        let catalog = CapabilityCatalog::collect(ffmpeg.path()?)?;
        let prober = FfprobeProber::new(ffprobe.path()?);
        tracing::info!("Bound ffmpeg framework for {platform}");
        Ok(Self {
            dependencies: vec![ffmpeg, ffprobe],
            catalog: Arc::new(catalog),
            prober,
            max_duration_secs: probe_config.max_duration_secs,
        })
    }
}

impl Framework for FfmpegFramework {
    fn name(&self) -> &str {
        Self::FFMPEG
    }

    fn dependency(&self, name: &str) -> Result<&Dependency> {
        self.dependencies
            .iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| Error::dependency_missing(name, "not part of the ffmpeg framework"))
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    fn catalog(&self) -> Arc<CapabilityCatalog> {
        Arc::clone(&self.catalog)
    }

    fn probe(&self, source: &Path) -> Result<MediaInfo> {
        let info = self.prober.probe(source)?;
        let duration = info.validate_duration(self.max_duration_secs)?;
        tracing::info!("{}: reference duration {duration:.3}s", source.display());
        Ok(info)
    }
}
