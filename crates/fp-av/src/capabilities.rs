//! Parsing of `ffmpeg -codecs` and `ffmpeg -formats` listings.
//!
//! Both listings are a legend followed by a line of dashes and then one row
//! per entry. Each row starts with a fixed-width flag field whose width equals
//! the number of dashes in the marker line:
//!
//! ```text
//!  -------
//!  DEV.LS h264   H.264 / AVC (decoders: h264 h264_v4l2m2m ) (encoders: libx264 )
//!  --
//!  DE matroska,webm   Matroska / WebM
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use fp_core::{Error, Result, StreamType};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One implementation of a codec (a decoder and/or encoder library).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecLibrary {
    pub name: String,
    pub encode: bool,
    pub decode: bool,
    /// ffmpeg's `-codecs` listing does not report this; always false there.
    pub experimental: bool,
}

impl CodecLibrary {
    fn new(name: &str, encode: bool, decode: bool) -> Self {
        Self {
            name: name.to_string(),
            encode,
            decode,
            experimental: false,
        }
    }
}

/// A codec as reported by the tool build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codec {
    pub name: String,
    pub description: String,
    pub stream_type: StreamType,
    pub intra_only: bool,
    pub lossy: bool,
    pub lossless: bool,
    /// Unique by name, in first-seen order.
    pub libraries: Vec<CodecLibrary>,
}

impl Codec {
    pub fn can_encode(&self) -> bool {
        self.libraries.iter().any(|l| l.encode)
    }

    pub fn can_decode(&self) -> bool {
        self.libraries.iter().any(|l| l.decode)
    }

    pub fn library(&self, name: &str) -> Option<&CodecLibrary> {
        self.libraries.iter().find(|l| l.name == name)
    }

    /// Add a library, OR-ing flags into an existing entry of the same name.
    fn merge_library(&mut self, library: CodecLibrary) {
        match self.libraries.iter_mut().find(|l| l.name == library.name) {
            Some(existing) => {
                existing.encode |= library.encode;
                existing.decode |= library.decode;
                existing.experimental |= library.experimental;
            }
            None => self.libraries.push(library),
        }
    }
}

/// A container (muxer/demuxer) as reported by the tool build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub description: String,
    /// Comma-separated names from the listing, e.g. `["matroska", "webm"]`.
    pub extensions: Vec<String>,
    pub encode: bool,
    pub decode: bool,
    #[serde(default)]
    pub device: bool,
}

/// Codecs and containers supported by one tool build. Built once, then
/// shared read-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityCatalog {
    codecs: Vec<Codec>,
    containers: Vec<Container>,
}

impl CapabilityCatalog {
    pub fn new(codecs: Vec<Codec>, containers: Vec<Container>) -> Self {
        Self { codecs, containers }
    }

    /// Run the introspection commands of the ffmpeg binary at `ffmpeg`.
    pub fn collect(ffmpeg: &Path) -> Result<Self> {
        let codecs = get_codecs(ffmpeg)?;
        let containers = get_containers(ffmpeg)?;
        tracing::info!(
            "Capability catalog: {} codecs, {} containers",
            codecs.len(),
            containers.len()
        );
        Ok(Self::new(codecs, containers))
    }

    pub fn codecs(&self) -> &[Codec] {
        &self.codecs
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn codec(&self, name: &str) -> Option<&Codec> {
        self.codecs.iter().find(|c| c.name == name)
    }

    /// Names of the libraries able to encode codec `name`.
    pub fn encoders_for(&self, name: &str) -> Vec<&str> {
        self.codec(name)
            .map(|c| {
                c.libraries
                    .iter()
                    .filter(|l| l.encode)
                    .map(|l| l.name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether some codec lists an encoding library named `encoder`.
    pub fn supports_encoding(&self, encoder: &str) -> bool {
        self.codecs
            .iter()
            .flat_map(|c| c.libraries.iter())
            .any(|l| l.name == encoder && l.encode)
    }

    /// Container handling `ext` (leading dot optional), preferring muxers.
    pub fn container_for_extension(&self, ext: &str) -> Option<&Container> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        let mut matching = self
            .containers
            .iter()
            .filter(|c| c.extensions.iter().any(|e| *e == ext));
        let first = matching.clone().next();
        matching.find(|c| c.encode).or(first)
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// Run `ffmpeg -hide_banner -codecs` and parse the listing.
pub fn get_codecs(ffmpeg: &Path) -> Result<Vec<Codec>> {
    let output = ToolCommand::new(ffmpeg)
        .args(["-hide_banner", "-codecs"])
        .execute()?;
    parse_codecs(&output.stdout)
}

/// Run `ffmpeg -hide_banner -formats` and parse the listing.
pub fn get_containers(ffmpeg: &Path) -> Result<Vec<Container>> {
    let output = ToolCommand::new(ffmpeg)
        .args(["-hide_banner", "-formats"])
        .execute()?;
    parse_containers(&output.stdout)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn library_list_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\((decoders|encoders):\s*([^)]*)\)").expect("library list pattern is valid")
    })
}

/// Rows after the dash marker, paired with the flag field width.
fn table_rows<'a>(text: &'a str, what: &str) -> Result<(usize, Vec<&'a str>)> {
    if text.trim().is_empty() {
        return Err(Error::parse("ffmpeg", format!("{what} listing is empty")));
    }
    let mut lines = text.lines();
    let width = lines
        .by_ref()
        .map(str::trim)
        .find(|l| !l.is_empty() && l.chars().all(|c| c == '-'))
        .map(str::len)
        .ok_or_else(|| {
            Error::parse("ffmpeg", format!("{what} listing has no table-start marker"))
        })?;
    let rows = lines.filter(|l| !l.trim().is_empty()).collect();
    Ok((width, rows))
}

/// Split a row into its flag field and the remainder.
///
/// The codec marker is one dash wider than its six flags, so the field may
/// include the separating space; flags are only ever read by offset.
fn split_row(line: &str, width: usize) -> Option<(&str, &str)> {
    let body = line.strip_prefix(' ').unwrap_or(line);
    let flags = body.get(..width)?;
    let rest = body.get(width..)?.trim();
    if rest.is_empty() {
        return None;
    }
    Some((flags, rest))
}

fn flag_at(flags: &str, index: usize, letter: u8) -> bool {
    flags.as_bytes().get(index) == Some(&letter)
}

fn classify(flags: &str) -> StreamType {
    let head = &flags.as_bytes()[..flags.len().min(3)];
    if head.contains(&b'V') {
        StreamType::Video
    } else if head.contains(&b'A') {
        StreamType::Audio
    } else if head.contains(&b'S') {
        StreamType::Subtitle
    } else if head.contains(&b'T') {
        StreamType::Attachment
    } else if flag_at(flags, 2, b'D') {
        // Position 0 is the decode flag, also a 'D'.
        StreamType::Data
    } else {
        StreamType::Unknown
    }
}

/// Parse the text of `ffmpeg -codecs`.
///
/// Rows naming a codec seen before are merged into the earlier entry.
pub fn parse_codecs(text: &str) -> Result<Vec<Codec>> {
    let (width, rows) = table_rows(text, "codec")?;
    let mut codecs: Vec<Codec> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for line in rows {
        let Some((flags, rest)) = split_row(line, width) else {
            tracing::debug!("Skipping malformed codec row: {line:?}");
            continue;
        };
        let (name, description) = match rest.split_once(char::is_whitespace) {
            Some((name, description)) => (name, description.trim()),
            None => (rest, ""),
        };
        if name.is_empty() {
            continue;
        }

        let decode = flag_at(flags, 0, b'D');
        let encode = flag_at(flags, 1, b'E');
        let mut decoders = None;
        let mut encoders = None;
        for caps in library_list_pattern().captures_iter(description) {
            let names: Vec<&str> = caps
                .get(2)
                .map(|m| m.as_str().split_whitespace().collect())
                .unwrap_or_default();
            match caps.get(1).map(|m| m.as_str()) {
                Some("decoders") => decoders = Some(names),
                _ => encoders = Some(names),
            }
        }
        let clean = library_list_pattern()
            .replace_all(description, "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let mut libraries: Vec<CodecLibrary> = Vec::new();
        if decode {
            for lib in decoders.unwrap_or_else(|| vec![name]) {
                libraries.push(CodecLibrary::new(lib, false, true));
            }
        }
        if encode {
            for lib in encoders.unwrap_or_else(|| vec![name]) {
                libraries.push(CodecLibrary::new(lib, true, false));
            }
        }

        let slot = match index.get(name).copied() {
            Some(slot) => slot,
            None => {
                index.insert(name.to_string(), codecs.len());
                codecs.push(Codec {
                    name: name.to_string(),
                    description: clean,
                    stream_type: classify(flags),
                    intra_only: flag_at(flags, 3, b'I'),
                    lossy: flag_at(flags, 4, b'L'),
                    lossless: flag_at(flags, 5, b'S'),
                    libraries: Vec::new(),
                });
                codecs.len() - 1
            }
        };
        for lib in libraries {
            codecs[slot].merge_library(lib);
        }
    }

    tracing::debug!("Parsed {} codecs", codecs.len());
    Ok(codecs)
}

/// Parse the text of `ffmpeg -formats`.
pub fn parse_containers(text: &str) -> Result<Vec<Container>> {
    let (width, rows) = table_rows(text, "format")?;
    let mut containers = Vec::new();

    for line in rows {
        let Some((flags, rest)) = split_row(line, width) else {
            tracing::debug!("Skipping malformed format row: {line:?}");
            continue;
        };
        let (names, description) = match rest.split_once(char::is_whitespace) {
            Some((names, description)) => (names, description.trim()),
            None => (rest, ""),
        };
        let extensions: Vec<String> = names
            .split(',')
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();
        let Some(name) = extensions.first().cloned() else {
            continue;
        };
        containers.push(Container {
            name,
            description: description.to_string(),
            extensions,
            decode: flag_at(flags, 0, b'D'),
            encode: flag_at(flags, 1, b'E'),
            device: flag_at(flags, 2, b'd'),
        });
    }

    tracing::debug!("Parsed {} containers", containers.len());
    Ok(containers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const CODECS: &str = "\
Codecs:
 D..... = Decoding supported
 .E.... = Encoding supported
 ..V... = Video codec
 ..A... = Audio codec
 ..S... = Subtitle codec
 ..D... = Data codec
 ..T... = Attachment codec
 ...I.. = Intra frame-only codec
 ....L. = Lossy compression
 .....S = Lossless compression
 -------
 D.VI.S 012v                 Uncompressed 4:2:2 10-bit
 DEV.LS h264                 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 (decoders: h264 h264_v4l2m2m ) (encoders: libx264 libx264rgb h264_v4l2m2m )
 DEA.L. aac                  AAC (Advanced Audio Coding) (decoders: aac aac_fixed )
 DES... webvtt               WebVTT subtitle
 ..D... klv                  SMPTE 336M Key-Length-Value (KLV) metadata
 D..... bogus_row_without_type
";

    fn codec<'a>(codecs: &'a [Codec], name: &str) -> &'a Codec {
        codecs.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn parses_rows_and_types() {
        let codecs = parse_codecs(CODECS).unwrap();
        assert_eq!(codecs.len(), 6);
        assert_eq!(codec(&codecs, "012v").stream_type, StreamType::Video);
        assert!(codec(&codecs, "012v").intra_only);
        assert!(codec(&codecs, "012v").lossless);
        assert_eq!(codec(&codecs, "aac").stream_type, StreamType::Audio);
        assert_eq!(codec(&codecs, "webvtt").stream_type, StreamType::Subtitle);
        assert_eq!(codec(&codecs, "klv").stream_type, StreamType::Data);
        assert_eq!(
            codec(&codecs, "bogus_row_without_type").stream_type,
            StreamType::Unknown
        );
    }

    #[test]
    fn explicit_library_lists() {
        let codecs = parse_codecs(CODECS).unwrap();
        let h264 = codec(&codecs, "h264");
        assert_eq!(h264.description, "H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10");
        assert_eq!(
            h264.library("h264_v4l2m2m"),
            Some(&CodecLibrary::new("h264_v4l2m2m", true, true))
        );
        assert_eq!(h264.library("libx264"), Some(&CodecLibrary::new("libx264", true, false)));
        assert_eq!(h264.library("h264"), Some(&CodecLibrary::new("h264", false, true)));
        assert!(h264.lossy && h264.lossless);
    }

    #[test]
    fn codec_name_is_sole_library_without_lists() {
        let codecs = parse_codecs(CODECS).unwrap();
        let vtt = codec(&codecs, "webvtt");
        assert_eq!(vtt.libraries, vec![CodecLibrary::new("webvtt", true, true)]);

        // aac has only a decoders list; its encoder defaults to the codec name.
        let aac = codec(&codecs, "aac");
        assert_eq!(aac.library("aac"), Some(&CodecLibrary::new("aac", true, true)));
        assert_eq!(aac.library("aac_fixed"), Some(&CodecLibrary::new("aac_fixed", false, true)));
    }

    #[test]
    fn library_names_unique_after_folding() {
        let text = "\
 -------
 .EV.L. h264    H.264 (encoders: libx264 )
 D.V.L. h264    H.264 (decoders: libx264 )
";
        let codecs = parse_codecs(text).unwrap();
        assert_eq!(codecs.len(), 1);
        assert_eq!(
            codecs[0].libraries,
            vec![CodecLibrary::new("libx264", true, true)]
        );
    }

    #[test]
    fn missing_marker_is_parse_error() {
        assert_matches!(
            parse_codecs("Codecs:\n DEV.LS h264 H.264\n"),
            Err(Error::Parse { .. })
        );
        assert_matches!(parse_codecs(""), Err(Error::Parse { .. }));
        assert_matches!(parse_containers("   \n"), Err(Error::Parse { .. }));
    }

    #[test]
    fn parses_two_flag_formats() {
        let text = "\
File formats:
 D. = Demuxing supported
 .E = Muxing supported
 --
 D  3dostr          3DO STR
  E 3g2             3GP2 (3GPP file format)
 DE matroska,webm   Matroska / WebM
  E mp4             MP4 (MPEG-4 Part 14)
 D  mov,mp4,m4a,3gp,3g2,mj2 QuickTime / MOV
";
        let containers = parse_containers(text).unwrap();
        assert_eq!(containers.len(), 5);
        assert!(containers[0].decode && !containers[0].encode);
        assert!(!containers[1].decode && containers[1].encode);
        assert_eq!(containers[2].extensions, vec!["matroska", "webm"]);
        assert_eq!(containers[2].description, "Matroska / WebM");

        let catalog = CapabilityCatalog::new(Vec::new(), containers);
        assert_eq!(catalog.container_for_extension(".mp4").unwrap().name, "mp4");
        assert_eq!(catalog.container_for_extension("webm").unwrap().name, "matroska");
        assert_eq!(catalog.container_for_extension("m4a").unwrap().name, "mov");
        assert!(catalog.container_for_extension("xyz").is_none());
    }

    #[test]
    fn parses_three_flag_formats_with_devices() {
        let text = "\
 ---
 D   aac             raw ADTS AAC (Advanced Audio Coding)
 DE  hls             Apple HTTP Live Streaming
 D d lavfi           Libavfilter virtual input device
";
        let containers = parse_containers(text).unwrap();
        assert_eq!(containers.len(), 3);
        assert!(containers[1].encode && containers[1].decode);
        assert!(containers[2].device);
        assert!(!containers[0].device);
    }

    #[test]
    fn catalog_queries() {
        let catalog = CapabilityCatalog::new(parse_codecs(CODECS).unwrap(), Vec::new());
        assert_eq!(
            catalog.encoders_for("h264"),
            vec!["h264_v4l2m2m", "libx264", "libx264rgb"]
        );
        assert!(catalog.encoders_for("012v").is_empty());
        assert!(catalog.encoders_for("nope").is_empty());
        assert!(catalog.supports_encoding("libx264"));
        assert!(!catalog.supports_encoding("aac_fixed"));
        assert!(catalog.codec("aac").unwrap().can_encode());
        assert!(!catalog.codec("012v").unwrap().can_encode());
    }
}
