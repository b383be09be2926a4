//! Source probing: ffprobe invocation, stream model and preferred-stream
//! selection.

pub mod expr;
mod ffprobe;
mod types;

pub use ffprobe::{parse_probe_output, FfprobeProber};
pub use types::{AspectRatio, MediaInfo, MediaStream, PreferredStreams, ScanType};
