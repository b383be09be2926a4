//! HLS renditions, one per configured height not exceeding the source.

use std::collections::BTreeMap;
use std::path::PathBuf;

use fp_av::MediaStream;
use fp_core::Result;
use serde::Deserialize;

use super::{encoder_for, ffmpeg, input_args, AudioPlugin};
use crate::command::Command;
use crate::plugin::{parse_options, JobContext, Plugin};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HlsOptions {
    /// Rendition heights in pixels.
    pub heights: Vec<u32>,
    pub segment_secs: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for HlsOptions {
    fn default() -> Self {
        Self {
            heights: vec![360, 720, 1080],
            segment_secs: 6,
            video_codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HlsPlugin {
    options: HlsOptions,
}

impl HlsPlugin {
    pub const NAME: &'static str = "hls";

    pub fn new(options: HlsOptions) -> Self {
        Self { options }
    }

    pub(crate) fn construct(table: &toml::Table) -> Result<Box<dyn Plugin>> {
        Ok(Box::new(Self::new(parse_options(Self::NAME, table)?)))
    }

    /// Heights to render: every configured height up to the source height,
    /// or the source height alone when all configured ones are larger.
    fn renditions(&self, ctx: &JobContext<'_>) -> Vec<u32> {
        let Some(MediaStream::Video { height, .. }) = ctx.media.preferred_video() else {
            return Vec::new();
        };
        let mut heights: Vec<u32> = self
            .options
            .heights
            .iter()
            .copied()
            .filter(|h| *h > 0 && h <= height)
            .collect();
        heights.sort_unstable();
        heights.dedup();
        if heights.is_empty() && *height > 0 {
            heights.push(*height);
        }
        heights
    }

    fn playlist(ctx: &JobContext<'_>, height: u32) -> PathBuf {
        ctx.output_path(format!("hls/{height}p/index.m3u8"))
    }
}

impl Plugin for HlsPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn assets(&self, ctx: &JobContext<'_>) -> BTreeMap<String, PathBuf> {
        self.renditions(ctx)
            .into_iter()
            .map(|h| (format!("{h}p"), Self::playlist(ctx, h)))
            .collect()
    }

    fn commands(&self, ctx: &JobContext<'_>) -> Result<Vec<Command>> {
        let Some(video) = ctx.media.preferred().video else {
            tracing::info!("{}: no video stream, no HLS renditions", ctx.source.display());
            return Ok(Vec::new());
        };
        let renditions = self.renditions(ctx);
        if renditions.is_empty() {
            return Ok(Vec::new());
        }

        let video_encoder = encoder_for(ctx, &self.options.video_codec)?;
        let extracted_audio = ctx.asset(AudioPlugin::NAME, AudioPlugin::ASSET);
        let audio_encoder = match (&extracted_audio, ctx.media.preferred().audio) {
            (None, Some(_)) => Some(encoder_for(ctx, &self.options.audio_codec)?),
            _ => None,
        };

        let mut commands = Vec::with_capacity(renditions.len());
        for height in renditions {
            let playlist = Self::playlist(ctx, height);
            let segments = ctx.output_path(format!("hls/{height}p/segment_%03d.ts"));

            let mut args = input_args(ctx.source);
            let mut cmd = ffmpeg(format!("hls.{height}p"));
            args = match (&extracted_audio, ctx.media.preferred().audio, &audio_encoder) {
                // Reuse the extracted audio rather than encoding it again.
                (Some(audio), _, _) => {
                    cmd = cmd.depends_on(AudioPlugin::COMMAND);
                    args.opt("i", audio.as_path())
                        .opt("map", format!("0:{video}"))
                        .opt("map", "1:a:0")
                        .opt("c:a", "copy")
                }
                (None, Some(audio), Some(encoder)) => args
                    .opt("map", format!("0:{video}"))
                    .opt("map", format!("0:{audio}"))
                    .opt("c:a", encoder.as_str())
                    .opt("b:a", self.options.audio_bitrate.as_str()),
                _ => args.opt("map", format!("0:{video}")).flag("an"),
            };
            let args = args
                .opt("c:v", video_encoder.as_str())
                .opt("vf", format!("scale=-2:{height}"))
                .opt("f", "hls")
                .opt("hls_time", self.options.segment_secs)
                .opt("hls_playlist_type", "vod")
                .opt("hls_segment_filename", segments.as_path())
                .trailing(playlist.to_string_lossy());

            commands.push(
                cmd.with_args(args)
                    .output(playlist)
                    .output(segments)
                    .priority(-10),
            );
        }
        Ok(commands)
    }
}
