//! Binding the ffmpeg framework against fake ffmpeg/ffprobe scripts.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use fp_av::{FfmpegFramework, Framework, MediaStream};
use fp_core::config::{ProbeConfig, ProvisionerConfig};
use fp_core::{DependencySpec, Error, Platform};

const FAKE_FFMPEG: &str = r#"#!/bin/sh
case "$*" in
  *-version*) echo "ffmpeg version 6.1.1 Copyright (c) 2000-2023 the FFmpeg developers" ;;
  *-codecs*) cat <<'EOF'
Codecs:
 D..... = Decoding supported
 .E.... = Encoding supported
 -------
 DEV.LS h264                 H.264 / AVC (decoders: h264 ) (encoders: libx264 libx264rgb )
 DEA.L. aac                  AAC (Advanced Audio Coding) (decoders: aac aac_fixed )
 DES... webvtt               WebVTT subtitle
EOF
  ;;
  *-formats*) cat <<'EOF'
File formats:
 D. = Demuxing supported
 .E = Muxing supported
 --
 DE matroska,webm   Matroska / WebM
  E mp4             MP4 (MPEG-4 Part 14)
EOF
  ;;
  *) exit 1 ;;
esac
"#;

fn fake_ffprobe(json: &str) -> String {
    format!(
        "#!/bin/sh\ncase \"$*\" in\n  *-version*) echo \"ffprobe version 6.1.1\" ;;\n  *) cat <<'EOF'\n{json}\nEOF\n  ;;\nesac\n"
    )
}

const PROBE_JSON: &str = r#"{
  "streams": [
    {"index": 0, "codec_type": "video", "codec_name": "h264", "duration": "12.5",
     "width": 1920, "height": 1080, "avg_frame_rate": "30000/1001",
     "display_aspect_ratio": "16:9", "field_order": "progressive"},
    {"index": 1, "codec_type": "audio", "codec_name": "aac", "duration": "12.5",
     "bit_rate": "128000", "sample_rate": "48000", "channels": 2,
     "channel_layout": "stereo"}
  ],
  "format": {"format_name": "matroska,webm", "duration": "12.500000"}
}"#;

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn bind(dir: &Path, probe_json: &str) -> fp_core::Result<FfmpegFramework> {
    let ffmpeg = dir.join("ffmpeg");
    let ffprobe = dir.join("ffprobe");
    write_script(&ffmpeg, FAKE_FFMPEG);
    write_script(&ffprobe, &fake_ffprobe(probe_json));

    let spec = |name: &str, path: &PathBuf| DependencySpec {
        binary: path.to_string_lossy().into_owned(),
        ..DependencySpec::from_path_lookup(name, "~6.1")
    };
    let config = ProvisionerConfig {
        cache_dir: dir.join("cache"),
        dependencies: vec![spec("ffmpeg", &ffmpeg), spec("ffprobe", &ffprobe)],
    };
    let provisioner = fp_av::DependencyProvisioner::new(&config);
    FfmpegFramework::bind(&provisioner, &Platform::current(), &ProbeConfig::default())
}

#[test]
fn binds_and_collects_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let framework = bind(dir.path(), PROBE_JSON).unwrap();

    assert_eq!(framework.dependencies().len(), 2);
    assert!(framework.dependency("ffprobe").unwrap().is_ready());
    assert!(framework.dependency("mkvmerge").is_err());

    let catalog = framework.catalog();
    assert_eq!(catalog.codecs().len(), 3);
    assert_eq!(catalog.encoders_for("h264"), vec!["libx264", "libx264rgb"]);
    assert_eq!(catalog.container_for_extension("webm").unwrap().name, "matroska");
}

#[test]
fn end_to_end_probe() {
    let dir = tempfile::tempdir().unwrap();
    let framework = bind(dir.path(), PROBE_JSON).unwrap();
    let info = framework.probe(Path::new("/media/clip.mkv")).unwrap();

    assert_eq!(info.streams().len(), 2);
    assert_eq!(info.preferred().video, Some(0));
    assert_eq!(info.preferred().audio, Some(1));
    assert_eq!(info.format_name(), Some("matroska,webm"));
    match info.preferred_video().unwrap() {
        MediaStream::Video {
            frame_rate, aspect, ..
        } => {
            assert!((frame_rate.unwrap() - 29.97).abs() < 0.01);
            assert_eq!(aspect.unwrap().to_string(), "16:9");
        }
        other => panic!("expected video, got {other:?}"),
    }
    assert_eq!(info.validate_duration(86_400.0).unwrap(), 12.5);
}

#[test]
fn overlong_source_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let json = r#"{"streams": [{"codec_type": "audio", "duration": "90000", "bit_rate": "1"}]}"#;
    let framework = bind(dir.path(), json).unwrap();
    let err = framework.probe(Path::new("/media/long.flac")).unwrap_err();
    assert!(matches!(err, Error::Probe { .. }));
    assert!(err.to_string().contains("/media/long.flac"));
}

#[test]
fn version_mismatch_aborts_binding() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = dir.path().join("ffmpeg");
    write_script(&ffmpeg, "#!/bin/sh\necho 'ffmpeg version 4.4.2'\n");
    let config = ProvisionerConfig {
        cache_dir: dir.path().join("cache"),
        dependencies: vec![DependencySpec {
            binary: ffmpeg.to_string_lossy().into_owned(),
            ..DependencySpec::from_path_lookup("ffmpeg", "~6.1")
        }],
    };
    let provisioner = fp_av::DependencyProvisioner::new(&config);
    let err = FfmpegFramework::bind(&provisioner, &Platform::current(), &ProbeConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::VersionMismatch { .. }));
    assert!(err.is_fatal_at_construction());
}
