//! Stream probing through `ffprobe`.
//!
//! Shells out to `ffprobe -v quiet -hide_banner -print_format json
//! -show_streams -show_format <source>` and maps the JSON into [`MediaInfo`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use fp_core::{Error, Result, StreamType};
use serde::{Deserialize, Deserializer};

use super::expr;
use super::types::{AspectRatio, MediaInfo, MediaStream, ScanType};
use crate::command::ToolCommand;

/// Runs ffprobe against a source and builds its [`MediaInfo`].
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Probe `source`. Any failure is reported as [`Error::Probe`] naming
    /// the source.
    pub fn probe(&self, source: &Path) -> Result<MediaInfo> {
        let output = ToolCommand::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-hide_banner",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(source.to_string_lossy())
            .execute()
            .map_err(|e| Error::probe(source, e.to_string()))?;
        parse_probe_output(source, &output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: Option<u32>,
    codec_type: Option<String>,
    codec_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    width: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    height: Option<u64>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    display_aspect_ratio: Option<String>,
    pix_fmt: Option<String>,
    color_space: Option<String>,
    field_order: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    bit_rate: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    sample_rate: Option<u64>,
    channel_layout: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    channels: Option<u64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    start_time: Option<f64>,
    #[serde(default)]
    disposition: BTreeMap<String, i64>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

/// ffprobe prints most numbers as strings; accept either form.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Number(serde_json::Number),
    Text(String),
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    Ok(match Option::<Lenient>::deserialize(d)? {
        Some(Lenient::Number(n)) => n.as_f64(),
        Some(Lenient::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u64>, D::Error> {
    Ok(match Option::<Lenient>::deserialize(d)? {
        Some(Lenient::Number(n)) => n.as_u64(),
        Some(Lenient::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Build a [`MediaInfo`] from raw ffprobe JSON.
pub fn parse_probe_output(source: &Path, json: &str) -> Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::probe(source, format!("ffprobe JSON parse error: {e}")))?;
    let format = output.format.unwrap_or_default();

    let mut streams = Vec::with_capacity(output.streams.len());
    for (position, stream) in output.streams.into_iter().enumerate() {
        let id = stream.index.unwrap_or(position as u32);
        let codec_type = stream.codec_type.as_deref().unwrap_or("");
        match StreamType::from_codec_type(codec_type) {
            StreamType::Video => streams.push(video_stream(id, stream)),
            StreamType::Audio => streams.push(audio_stream(id, stream)),
            StreamType::Subtitle => streams.push(text_stream(id, stream)),
            other => {
                tracing::warn!(
                    "{}: skipping stream {id} of type {other}",
                    source.display()
                );
            }
        }
    }

    let info = MediaInfo::new(source, streams, format.duration, format.format_name)?;
    tracing::debug!(
        "Probed {}: {} streams, preferred {:?}",
        source.display(),
        info.streams().len(),
        info.preferred()
    );
    Ok(info)
}

fn codec_name(stream: &FfprobeStream) -> String {
    stream
        .codec_name
        .clone()
        .unwrap_or_else(|| "unknown".to_string())
}

/// Stream duration, falling back to a `DURATION` tag (`HH:MM:SS.fraction`).
fn duration(stream: &FfprobeStream) -> Option<f64> {
    stream.duration.or_else(|| {
        stream
            .tags
            .iter()
            .find(|(k, _)| k.to_ascii_uppercase().starts_with("DURATION"))
            .and_then(|(_, v)| parse_timestamp(v))
    })
}

/// Parse `HH:MM:SS.fraction` (or plain seconds) into seconds.
fn parse_timestamp(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    match parts.as_slice() {
        [secs] => secs.parse().ok(),
        [mins, secs] => Some(mins.parse::<f64>().ok()? * 60.0 + secs.parse::<f64>().ok()?),
        [hours, mins, secs] => Some(
            hours.parse::<f64>().ok()? * 3600.0
                + mins.parse::<f64>().ok()? * 60.0
                + secs.parse::<f64>().ok()?,
        ),
        _ => None,
    }
}

fn to_u32(value: Option<u64>) -> u32 {
    value.and_then(|v| u32::try_from(v).ok()).unwrap_or(0)
}

fn video_stream(id: u32, stream: FfprobeStream) -> MediaStream {
    let frame_rate = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| expr::evaluate(rate));
    MediaStream::Video {
        id,
        codec: codec_name(&stream),
        duration: duration(&stream),
        width: to_u32(stream.width),
        height: to_u32(stream.height),
        frame_rate,
        aspect: stream
            .display_aspect_ratio
            .as_deref()
            .and_then(AspectRatio::parse),
        color_model: stream
            .color_space
            .clone()
            .or_else(|| stream.pix_fmt.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        scan_type: ScanType::from_field_order(stream.field_order.as_deref()),
    }
}

fn audio_stream(id: u32, stream: FfprobeStream) -> MediaStream {
    MediaStream::Audio {
        id,
        codec: codec_name(&stream),
        duration: duration(&stream),
        bit_rate: stream.bit_rate.unwrap_or(0),
        sample_rate: to_u32(stream.sample_rate),
        channel_layout: stream
            .channel_layout
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        channels: to_u32(stream.channels),
    }
}

fn text_stream(id: u32, stream: FfprobeStream) -> MediaStream {
    let dispositions: BTreeSet<String> = stream
        .disposition
        .iter()
        .filter(|(_, v)| **v == 1)
        .map(|(k, _)| k.clone())
        .collect();
    MediaStream::Text {
        id,
        codec: codec_name(&stream),
        duration: duration(&stream),
        language: stream
            .tags
            .get("language")
            .cloned()
            .unwrap_or_else(|| "und".to_string()),
        start_time: stream.start_time.unwrap_or(0.0),
        dispositions,
    }
}
