//! Probed stream metadata and preferred-stream selection.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use fp_core::{Error, Result, StreamType};
use serde::{Deserialize, Serialize};

/// Field scan order of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Progressive,
    Interlaced,
    #[default]
    Unknown,
}

impl ScanType {
    /// Map ffprobe's `field_order` value.
    pub fn from_field_order(field_order: Option<&str>) -> Self {
        match field_order {
            Some("progressive") => Self::Progressive,
            Some("tt" | "bb" | "tb" | "bt") => Self::Interlaced,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progressive => write!(f, "progressive"),
            Self::Interlaced => write!(f, "interlaced"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Display aspect ratio as a `num:den` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub num: u32,
    pub den: u32,
}

impl AspectRatio {
    /// Parse `"16:9"`. Zero components (ffprobe reports `0:1` when unknown)
    /// yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let (num, den) = s.split_once(':')?;
        let num = num.trim().parse().ok()?;
        let den = den.trim().parse().ok()?;
        (num != 0 && den != 0).then_some(Self { num, den })
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.num, self.den)
    }
}

/// One elementary stream of a probed source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaStream {
    Video {
        id: u32,
        codec: String,
        duration: Option<f64>,
        width: u32,
        height: u32,
        frame_rate: Option<f64>,
        aspect: Option<AspectRatio>,
        color_model: String,
        scan_type: ScanType,
    },
    Audio {
        id: u32,
        codec: String,
        duration: Option<f64>,
        bit_rate: u64,
        sample_rate: u32,
        channel_layout: String,
        channels: u32,
    },
    Text {
        id: u32,
        codec: String,
        duration: Option<f64>,
        language: String,
        start_time: f64,
        dispositions: BTreeSet<String>,
    },
}

impl MediaStream {
    pub fn id(&self) -> u32 {
        match self {
            Self::Video { id, .. } | Self::Audio { id, .. } | Self::Text { id, .. } => *id,
        }
    }

    pub fn codec(&self) -> &str {
        match self {
            Self::Video { codec, .. } | Self::Audio { codec, .. } | Self::Text { codec, .. } => {
                codec
            }
        }
    }

    pub fn duration(&self) -> Option<f64> {
        match self {
            Self::Video { duration, .. }
            | Self::Audio { duration, .. }
            | Self::Text { duration, .. } => *duration,
        }
    }

    pub fn stream_type(&self) -> StreamType {
        match self {
            Self::Video { .. } => StreamType::Video,
            Self::Audio { .. } => StreamType::Audio,
            Self::Text { .. } => StreamType::Subtitle,
        }
    }

    fn pixel_area(&self) -> Option<u64> {
        match self {
            Self::Video { width, height, .. } => Some(u64::from(*width) * u64::from(*height)),
            _ => None,
        }
    }

    fn bit_rate(&self) -> Option<u64> {
        match self {
            Self::Audio { bit_rate, .. } => Some(*bit_rate),
            _ => None,
        }
    }

    fn is_default(&self) -> bool {
        matches!(self, Self::Text { dispositions, .. } if dispositions.contains("default"))
    }
}

/// Ids of the automatically selected stream per type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferredStreams {
    pub video: Option<u32>,
    pub audio: Option<u32>,
    pub text: Option<u32>,
}

/// Everything learned about a source at probe time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    source: PathBuf,
    streams: Vec<MediaStream>,
    preferred: PreferredStreams,
    /// Container-level duration, when reported.
    format_duration: Option<f64>,
    #[serde(default)]
    format_name: Option<String>,
}

impl MediaInfo {
    /// Validate stream ids and compute preferred streams.
    ///
    /// # Errors
    ///
    /// [`Error::Probe`] when two streams share an id.
    pub fn new(
        source: impl Into<PathBuf>,
        streams: Vec<MediaStream>,
        format_duration: Option<f64>,
        format_name: Option<String>,
    ) -> Result<Self> {
        let source = source.into();
        let mut seen = BTreeSet::new();
        for stream in &streams {
            if !seen.insert(stream.id()) {
                return Err(Error::probe(
                    &source,
                    format!("duplicate stream id {}", stream.id()),
                ));
            }
        }
        let preferred = PreferredStreams {
            video: first_max_by_key(&streams, MediaStream::pixel_area),
            audio: first_max_by_key(&streams, MediaStream::bit_rate),
            text: streams
                .iter()
                .filter(|s| matches!(s, MediaStream::Text { .. }))
                .find(|s| s.is_default())
                .or_else(|| streams.iter().find(|s| matches!(s, MediaStream::Text { .. })))
                .map(MediaStream::id),
        };
        Ok(Self {
            source,
            streams,
            preferred,
            format_duration,
            format_name,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn streams(&self) -> &[MediaStream] {
        &self.streams
    }

    pub fn stream(&self, id: u32) -> Option<&MediaStream> {
        self.streams.iter().find(|s| s.id() == id)
    }

    pub fn streams_of(&self, stream_type: StreamType) -> impl Iterator<Item = &MediaStream> {
        self.streams
            .iter()
            .filter(move |s| s.stream_type() == stream_type)
    }

    pub fn preferred(&self) -> &PreferredStreams {
        &self.preferred
    }

    pub fn preferred_video(&self) -> Option<&MediaStream> {
        self.preferred.video.and_then(|id| self.stream(id))
    }

    pub fn preferred_audio(&self) -> Option<&MediaStream> {
        self.preferred.audio.and_then(|id| self.stream(id))
    }

    pub fn preferred_text(&self) -> Option<&MediaStream> {
        self.preferred.text.and_then(|id| self.stream(id))
    }

    pub fn format_name(&self) -> Option<&str> {
        self.format_name.as_deref()
    }

    /// Duration used for source validation: the preferred video stream's,
    /// else the preferred audio stream's, else the container's.
    pub fn reference_duration(&self) -> Option<f64> {
        self.preferred_video()
            .and_then(MediaStream::duration)
            .or_else(|| self.preferred_audio().and_then(MediaStream::duration))
            .or(self.format_duration)
    }

    /// Require `0 < reference duration <= max_secs`.
    pub fn validate_duration(&self, max_secs: f64) -> Result<f64> {
        match self.reference_duration() {
            Some(d) if d > 0.0 && d <= max_secs => Ok(d),
            Some(d) => Err(Error::probe(
                &self.source,
                format!("duration {d}s outside (0, {max_secs}]"),
            )),
            None => Err(Error::probe(&self.source, "no duration reported")),
        }
    }

    /// Stream counts keyed by type, for summaries.
    pub fn counts(&self) -> BTreeMap<StreamType, usize> {
        let mut counts = BTreeMap::new();
        for stream in &self.streams {
            *counts.entry(stream.stream_type()).or_insert(0) += 1;
        }
        counts
    }
}

/// Id of the first stream with the largest key; later equal keys lose.
fn first_max_by_key(streams: &[MediaStream], key: fn(&MediaStream) -> Option<u64>) -> Option<u32> {
    let mut best: Option<(u64, u32)> = None;
    for stream in streams {
        if let Some(k) = key(stream) {
            if best.map_or(true, |(b, _)| k > b) {
                best = Some((k, stream.id()));
            }
        }
    }
    best.map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: u32, width: u32, height: u32) -> MediaStream {
        MediaStream::Video {
            id,
            codec: "h264".into(),
            duration: Some(10.0),
            width,
            height,
            frame_rate: Some(25.0),
            aspect: None,
            color_model: "unknown".into(),
            scan_type: ScanType::Unknown,
        }
    }

    fn audio(id: u32, bit_rate: u64) -> MediaStream {
        MediaStream::Audio {
            id,
            codec: "aac".into(),
            duration: Some(10.0),
            bit_rate,
            sample_rate: 48_000,
            channel_layout: "stereo".into(),
            channels: 2,
        }
    }

    fn text(id: u32, default: bool) -> MediaStream {
        MediaStream::Text {
            id,
            codec: "subrip".into(),
            duration: None,
            language: "eng".into(),
            start_time: 0.0,
            dispositions: if default {
                BTreeSet::from(["default".to_string()])
            } else {
                BTreeSet::new()
            },
        }
    }

    #[test]
    fn largest_video_is_preferred() {
        let info = MediaInfo::new(
            "/in.mkv",
            vec![video(0, 640, 480), video(1, 1920, 1080), video(2, 320, 240)],
            None,
            None,
        )
        .unwrap();
        assert_eq!(info.preferred().video, Some(1));
    }

    #[test]
    fn highest_bitrate_audio_is_preferred() {
        let info = MediaInfo::new(
            "/in.mkv",
            vec![audio(0, 96_000), audio(1, 320_000), audio(2, 128_000)],
            None,
            None,
        )
        .unwrap();
        assert_eq!(info.preferred().audio, Some(1));
        assert_eq!(info.preferred().video, None);
    }

    #[test]
    fn ties_go_to_first_encountered() {
        let info = MediaInfo::new(
            "/in.mkv",
            vec![audio(3, 128_000), audio(4, 128_000)],
            None,
            None,
        )
        .unwrap();
        assert_eq!(info.preferred().audio, Some(3));
    }

    #[test]
    fn no_audio_leaves_preference_undefined() {
        let info = MediaInfo::new("/in.mkv", vec![video(0, 640, 480)], None, None).unwrap();
        assert_eq!(info.preferred().audio, None);
        assert!(info.preferred_audio().is_none());
    }

    #[test]
    fn default_text_stream_wins() {
        let info = MediaInfo::new(
            "/in.mkv",
            vec![text(2, false), text(3, true)],
            None,
            None,
        )
        .unwrap();
        assert_eq!(info.preferred().text, Some(3));

        let info = MediaInfo::new("/in.mkv", vec![text(2, false), text(3, false)], None, None)
            .unwrap();
        assert_eq!(info.preferred().text, Some(2));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = MediaInfo::new("/in.mkv", vec![video(0, 1, 1), audio(0, 1)], None, None)
            .unwrap_err();
        assert!(err.to_string().contains("/in.mkv"));
    }

    #[test]
    fn duration_bounds() {
        let info = MediaInfo::new("/in.mkv", vec![], Some(12.5), None).unwrap();
        assert_eq!(info.validate_duration(86_400.0).unwrap(), 12.5);
        assert!(info.validate_duration(10.0).is_err());

        let zero = MediaInfo::new("/zero.mkv", vec![], Some(0.0), None).unwrap();
        let err = zero.validate_duration(86_400.0).unwrap_err();
        assert!(err.to_string().contains("/zero.mkv"));

        let none = MediaInfo::new("/none.mkv", vec![], None, None).unwrap();
        assert!(none.validate_duration(86_400.0).is_err());
    }

    #[test]
    fn reference_duration_prefers_video() {
        let mut v = video(0, 1920, 1080);
        if let MediaStream::Video { duration, .. } = &mut v {
            *duration = Some(30.0);
        }
        let info = MediaInfo::new("/in.mkv", vec![audio(1, 1), v], Some(31.0), None).unwrap();
        assert_eq!(info.reference_duration(), Some(30.0));
    }

    #[test]
    fn aspect_and_scan_parsing() {
        assert_eq!(AspectRatio::parse("16:9"), Some(AspectRatio { num: 16, den: 9 }));
        assert_eq!(AspectRatio::parse("0:1"), None);
        assert_eq!(AspectRatio::parse("wide"), None);
        assert_eq!(ScanType::from_field_order(Some("tt")), ScanType::Interlaced);
        assert_eq!(ScanType::from_field_order(None), ScanType::Unknown);
    }

    #[test]
    fn serde_tagged_by_kind() {
        let json = serde_json::to_value(audio(1, 128_000)).unwrap();
        assert_eq!(json["kind"], "audio");
    }
}
