//! Built-in plugins.
//!
//! Each plugin reads typed options from its `[plugins.<name>]` table and
//! emits ffmpeg commands writing into the job's output directory.

mod audio;
mod hls;
mod metadata;
mod subtitles;
mod thumbnail;

pub use audio::{AudioOptions, AudioPlugin};
pub use hls::{HlsOptions, HlsPlugin};
pub use metadata::MetadataPlugin;
pub use subtitles::SubtitlesPlugin;
pub use thumbnail::{Resize, ThumbnailOptions, ThumbnailPlugin};

use std::path::Path;

use fp_av::FfmpegFramework;
use fp_core::{Error, Result};

use crate::command::{ArgSet, Command};
use crate::plugin::{JobContext, PluginRegistry};

/// Register every built-in plugin with `registry`.
pub fn register_builtins(registry: &mut PluginRegistry) {
    let builtins: [(&str, crate::plugin::PluginConstructor); 5] = [
        (AudioPlugin::NAME, AudioPlugin::construct),
        (ThumbnailPlugin::NAME, ThumbnailPlugin::construct),
        (SubtitlesPlugin::NAME, SubtitlesPlugin::construct),
        (MetadataPlugin::NAME, MetadataPlugin::construct),
        (HlsPlugin::NAME, HlsPlugin::construct),
    ];
    for (name, constructor) in builtins {
        if let Err(e) = registry.register(name, constructor) {
            tracing::warn!("{e}");
        }
    }
}

/// A command run by the framework's ffmpeg.
fn ffmpeg(name: impl Into<String>) -> Command {
    Command::new(name, FfmpegFramework::FFMPEG)
}

/// Leading ffmpeg arguments: quiet banner, overwrite outputs, read `input`.
fn input_args(input: &Path) -> ArgSet {
    ArgSet::new()
        .positional("-hide_banner")
        .flag("y")
        .opt("i", input)
}

/// Encoder library for `codec` in the bound ffmpeg build: the first listed
/// encoder, else the codec itself when it encodes under its own name.
fn encoder_for(ctx: &JobContext<'_>, codec: &str) -> Result<String> {
    let catalog = ctx.catalog();
    catalog
        .encoders_for(codec)
        .first()
        .map(|e| e.to_string())
        .or_else(|| catalog.supports_encoding(codec).then(|| codec.to_string()))
        .ok_or_else(|| Error::Config(format!("ffmpeg build has no encoder for codec '{codec}'")))
}
