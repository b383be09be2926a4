//! Poster frame plus a small thumbnail derived from it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use fp_core::{Error, Result};
use serde::Deserialize;

use super::{ffmpeg, input_args};
use crate::command::Command;
use crate::plugin::{parse_options, JobContext, Plugin};

/// How to scale an extracted frame.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Resize {
    /// Fixed output size; a zero side keeps the aspect ratio.
    Dimensions { width: u32, height: u32 },
    /// Scale both sides by `ratio`.
    Ratio { ratio: f64 },
}

impl Resize {
    /// The ffmpeg `scale` filter for this resize.
    pub fn filter(&self) -> Result<String> {
        match *self {
            Self::Dimensions { width: 0, height: 0 } => Err(Error::Config(
                "thumbnail dimensions cannot both be zero".into(),
            )),
            Self::Dimensions { width, height } => {
                let side = |v: u32| if v == 0 { "-2".to_string() } else { v.to_string() };
                Ok(format!("scale={}:{}", side(width), side(height)))
            }
            Self::Ratio { ratio } if ratio > 0.0 && ratio.is_finite() => Ok(format!(
                "scale=trunc(iw*{ratio}/2)*2:trunc(ih*{ratio}/2)*2"
            )),
            Self::Ratio { ratio } => Err(Error::Config(format!(
                "thumbnail ratio must be positive, got {ratio}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThumbnailOptions {
    /// Seek position in seconds; defaults to 10% into the source.
    pub position: Option<f64>,
    /// Poster scaling; `None` keeps the source size.
    pub poster: Option<Resize>,
    pub thumbnail: Resize,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            position: None,
            poster: None,
            thumbnail: Resize::Dimensions {
                width: 320,
                height: 0,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ThumbnailPlugin {
    options: ThumbnailOptions,
}

impl ThumbnailPlugin {
    pub const NAME: &'static str = "thumbnail";
    pub const POSTER_COMMAND: &'static str = "thumbnail.poster";
    pub const SMALL_COMMAND: &'static str = "thumbnail.small";

    pub fn new(options: ThumbnailOptions) -> Self {
        Self { options }
    }

    pub(crate) fn construct(table: &toml::Table) -> Result<Box<dyn Plugin>> {
        let plugin = Self::new(parse_options(Self::NAME, table)?);
        plugin.options.thumbnail.filter()?;
        if let Some(poster) = &plugin.options.poster {
            poster.filter()?;
        }
        Ok(Box::new(plugin))
    }

    fn position(&self, ctx: &JobContext<'_>) -> f64 {
        self.options
            .position
            .unwrap_or_else(|| ctx.media.reference_duration().unwrap_or(0.0) * 0.1)
    }
}

impl Plugin for ThumbnailPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn assets(&self, ctx: &JobContext<'_>) -> BTreeMap<String, PathBuf> {
        let mut assets = BTreeMap::new();
        if ctx.media.preferred().video.is_some() {
            assets.insert("poster".to_string(), ctx.output_path("poster.jpg"));
            assets.insert("thumbnail".to_string(), ctx.output_path("thumbnail.jpg"));
        }
        assets
    }

    fn commands(&self, ctx: &JobContext<'_>) -> Result<Vec<Command>> {
        let Some(stream) = ctx.media.preferred().video else {
            tracing::info!("{}: no video stream, no thumbnails", ctx.source.display());
            return Ok(Vec::new());
        };

        let poster = ctx.output_path("poster.jpg");
        let small = ctx.output_path("thumbnail.jpg");

        let mut poster_args = input_args(ctx.source)
            .opt("ss", format!("{:.3}", self.position(ctx)))
            .opt("map", format!("0:{stream}"))
            .opt("frames:v", 1u32);
        if let Some(resize) = &self.options.poster {
            poster_args = poster_args.opt("vf", resize.filter()?);
        }
        let poster_args = poster_args.trailing(poster.to_string_lossy());

        let small_args = input_args(&poster)
            .opt("vf", self.options.thumbnail.filter()?)
            .trailing(small.to_string_lossy());

        Ok(vec![
            ffmpeg(Self::POSTER_COMMAND)
                .with_args(poster_args)
                .output(poster)
                .priority(10),
            ffmpeg(Self::SMALL_COMMAND)
                .with_args(small_args)
                .output(small)
                .depends_on(Self::POSTER_COMMAND)
                .priority(10),
        ])
    }
}
