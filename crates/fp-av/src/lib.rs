//! # fp-av
//!
//! External tool handling for forgepack.
//!
//! - **Provisioning** ([`DependencyProvisioner`]) -- resolve manifest entries
//!   to validated, version-checked executables, downloading and unpacking
//!   them into a cache when needed.
//! - **Command execution** ([`ToolCommand`]) -- blocking builder for running
//!   external processes and capturing their output.
//! - **Capabilities** ([`CapabilityCatalog`]) -- parsed `-codecs` and
//!   `-formats` listings.
//! - **Probing** ([`probe::FfprobeProber`]) -- stream metadata and
//!   preferred-stream selection.
//! - **Framework binding** ([`FfmpegFramework`]) -- all of the above bound to
//!   one resolved ffmpeg/ffprobe pair.

pub mod capabilities;
pub mod command;
pub mod framework;
pub mod probe;
pub mod tools;

// ---- Re-exports for convenience ----

pub use capabilities::{CapabilityCatalog, Codec, CodecLibrary, Container};
pub use command::{ToolCommand, ToolOutput};
pub use framework::{FfmpegFramework, Framework};
pub use probe::{MediaInfo, MediaStream, PreferredStreams};
pub use tools::fetch::{FetchError, Fetcher, HttpFetcher};
pub use tools::{Dependency, DependencyProvisioner, ResolutionState, ToolInfo};
