//! Media-domain and platform enums shared across crates.
//!
//! All enums serialize in snake_case and implement `Display` manually for a
//! consistent string representation in logs and state files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// StreamType
// ---------------------------------------------------------------------------

/// Kind of elementary stream a codec or media stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    Unknown,
}

impl StreamType {
    /// Map ffprobe's `codec_type` field.
    pub fn from_codec_type(codec_type: &str) -> Self {
        match codec_type {
            "video" => Self::Video,
            "audio" => Self::Audio,
            "subtitle" => Self::Subtitle,
            "data" => Self::Data,
            "attachment" => Self::Attachment,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
            Self::Data => write!(f, "data"),
            Self::Attachment => write!(f, "attachment"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Wildcard accepted in manifest platform fields.
pub const ANY_PLATFORM: &str = "any";

/// Target platform of a binary as an (os, arch) pair.
///
/// Values follow `std::env::consts` naming (`linux`, `macos`, `windows`;
/// `x86_64`, `aarch64`). Either half may be `"any"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this process is running on.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// A platform that matches everything.
    pub fn any() -> Self {
        Self::new(ANY_PLATFORM, ANY_PLATFORM)
    }

    /// Whether a manifest entry declared for `self` can serve `target`.
    pub fn matches(&self, target: &Platform) -> bool {
        fn part(declared: &str, wanted: &str) -> bool {
            declared == ANY_PLATFORM || wanted == ANY_PLATFORM || declared == wanted
        }
        part(&self.os, &target.os) && part(&self.arch, &target.arch)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

// ---------------------------------------------------------------------------
// PostProcess
// ---------------------------------------------------------------------------

/// What to do with downloaded bytes before they land in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProcess {
    /// Extract a zip archive and locate the binary inside.
    Unzip,
    /// Extract a (optionally gzip/xz compressed) tarball and locate the binary.
    Untar,
    /// Write the downloaded bytes as the binary itself.
    StoreBinary,
    /// Decode the downloaded bytes as UTF-8 text (e.g. a script) and store it.
    StoreText,
}

impl PostProcess {
    /// Whether this action produces an extracted directory tree.
    pub fn is_archive(self) -> bool {
        matches!(self, Self::Unzip | Self::Untar)
    }
}

impl fmt::Display for PostProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unzip => write!(f, "unzip"),
            Self::Untar => write!(f, "untar"),
            Self::StoreBinary => write!(f, "store_binary"),
            Self::StoreText => write!(f, "store_text"),
        }
    }
}

impl FromStr for PostProcess {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "unzip" => Ok(Self::Unzip),
            "untar" => Ok(Self::Untar),
            "store_binary" => Ok(Self::StoreBinary),
            "store_text" => Ok(Self::StoreText),
            other => Err(format!("unknown post-process action: {other}")),
        }
    }
}
