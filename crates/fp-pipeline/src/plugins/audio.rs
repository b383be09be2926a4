//! Extract the preferred audio stream into a standalone file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use fp_core::Result;
use serde::Deserialize;

use super::{encoder_for, ffmpeg, input_args};
use crate::command::Command;
use crate::plugin::{parse_options, JobContext, Plugin};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioOptions {
    /// Target codec name as listed by `ffmpeg -codecs`.
    pub codec: String,
    pub bitrate: String,
    /// Output file extension.
    pub extension: String,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            codec: "aac".to_string(),
            bitrate: "192k".to_string(),
            extension: "m4a".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AudioPlugin {
    options: AudioOptions,
}

impl AudioPlugin {
    pub const NAME: &'static str = "audio";
    pub const COMMAND: &'static str = "audio.extract";
    pub const ASSET: &'static str = "audio";

    pub fn new(options: AudioOptions) -> Self {
        Self { options }
    }

    pub(crate) fn construct(table: &toml::Table) -> Result<Box<dyn Plugin>> {
        Ok(Box::new(Self::new(parse_options(Self::NAME, table)?)))
    }

    fn output(&self, ctx: &JobContext<'_>) -> PathBuf {
        ctx.output_path(format!("audio.{}", self.options.extension))
    }
}

impl Plugin for AudioPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn assets(&self, ctx: &JobContext<'_>) -> BTreeMap<String, PathBuf> {
        let mut assets = BTreeMap::new();
        if ctx.media.preferred().audio.is_some() {
            assets.insert(Self::ASSET.to_string(), self.output(ctx));
        }
        assets
    }

    fn commands(&self, ctx: &JobContext<'_>) -> Result<Vec<Command>> {
        let Some(stream) = ctx.media.preferred().audio else {
            tracing::info!("{}: no audio stream, nothing to extract", ctx.source.display());
            return Ok(Vec::new());
        };

        let encoder = encoder_for(ctx, &self.options.codec)?;
        let output = self.output(ctx);
        let args = input_args(ctx.source)
            .opt("map", format!("0:{stream}"))
            .flag("vn")
            .opt("c:a", encoder)
            .opt("b:a", self.options.bitrate.as_str())
            .trailing(output.to_string_lossy());

        Ok(vec![ffmpeg(Self::COMMAND)
            .with_args(args)
            .output(output)
            .priority(5)])
    }
}
