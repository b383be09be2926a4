//! Convert every text stream to a WebVTT side-file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use fp_av::MediaStream;
use fp_core::Result;

use super::{ffmpeg, input_args};
use crate::command::Command;
use crate::plugin::{JobContext, Plugin};

/// Bitmap subtitle codecs; these cannot be converted to text.
const BITMAP_CODECS: &[&str] = &["hdmv_pgs_subtitle", "dvd_subtitle", "dvb_subtitle", "xsub"];

#[derive(Debug, Clone, Copy, Default)]
pub struct SubtitlesPlugin;

impl SubtitlesPlugin {
    pub const NAME: &'static str = "subtitles";

    pub(crate) fn construct(_table: &toml::Table) -> Result<Box<dyn Plugin>> {
        Ok(Box::new(Self))
    }

    /// `(stream id, output path)` for each convertible text stream.
    fn targets(ctx: &JobContext<'_>) -> Vec<(u32, PathBuf)> {
        ctx.media
            .streams()
            .iter()
            .filter_map(|stream| match stream {
                MediaStream::Text {
                    id, codec, language, ..
                } if !BITMAP_CODECS.contains(&codec.as_str()) => Some((
                    *id,
                    ctx.output_path(format!("subtitles/{id}.{language}.vtt")),
                )),
                MediaStream::Text { id, codec, .. } => {
                    tracing::warn!("Skipping bitmap subtitle stream {id} ({codec})");
                    None
                }
                _ => None,
            })
            .collect()
    }
}

impl Plugin for SubtitlesPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn assets(&self, ctx: &JobContext<'_>) -> BTreeMap<String, PathBuf> {
        let targets = Self::targets(ctx);
        let mut assets: BTreeMap<String, PathBuf> = targets
            .iter()
            .map(|(id, path)| (format!("text.{id}"), path.clone()))
            .collect();
        let preferred = ctx.media.preferred().text;
        if let Some((_, path)) = targets.iter().find(|(id, _)| Some(*id) == preferred) {
            assets.insert("default".to_string(), path.clone());
        }
        assets
    }

    fn commands(&self, ctx: &JobContext<'_>) -> Result<Vec<Command>> {
        Ok(Self::targets(ctx)
            .into_iter()
            .map(|(id, output)| {
                let args = input_args(ctx.source)
                    .opt("map", format!("0:{id}"))
                    .opt("c:s", "webvtt")
                    .trailing(output.to_string_lossy());
                ffmpeg(format!("subtitles.{id}"))
                    .with_args(args)
                    .output(output)
                    .priority(1)
            })
            .collect())
    }
}
