//! Benchmarks for tool output parsing
//!
//! ffprobe JSON to `MediaInfo` (including preferred-stream selection) and the
//! `ffmpeg -codecs` listing to a codec catalog.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fp_av::capabilities::parse_codecs;
use fp_av::probe::parse_probe_output;
use std::path::Path;

const FFPROBE_SIMPLE: &str = r#"{
    "format": {"format_name": "matroska,webm", "duration": "7200.000000"},
    "streams": [
        {"index": 0, "codec_type": "video", "codec_name": "hevc", "width": 3840,
         "height": 2160, "r_frame_rate": "24000/1001", "duration": "7200.0"},
        {"index": 1, "codec_type": "audio", "codec_name": "truehd", "channels": 8,
         "sample_rate": "48000", "bit_rate": "4000000",
         "tags": {"language": "eng"}}
    ]
}"#;

const FFPROBE_COMPLEX: &str = r#"{
    "format": {"format_name": "matroska,webm", "duration": "9000.000000"},
    "streams": [
        {"index": 0, "codec_type": "video", "codec_name": "hevc", "width": 3840,
         "height": 2160, "avg_frame_rate": "24000/1001", "field_order": "progressive",
         "display_aspect_ratio": "16:9", "color_space": "bt2020nc"},
        {"index": 1, "codec_type": "video", "codec_name": "mjpeg", "width": 640,
         "height": 360, "disposition": {"attached_pic": 1}},
        {"index": 2, "codec_type": "audio", "codec_name": "truehd", "channels": 8,
         "bit_rate": "4500000", "sample_rate": "48000", "channel_layout": "7.1"},
        {"index": 3, "codec_type": "audio", "codec_name": "ac3", "channels": 6,
         "bit_rate": "640000", "sample_rate": "48000", "channel_layout": "5.1(side)"},
        {"index": 4, "codec_type": "audio", "codec_name": "aac", "channels": 2,
         "bit_rate": "192000", "sample_rate": "48000", "tags": {"language": "fra"}},
        {"index": 5, "codec_type": "subtitle", "codec_name": "subrip",
         "tags": {"language": "eng"}},
        {"index": 6, "codec_type": "subtitle", "codec_name": "hdmv_pgs_subtitle",
         "tags": {"language": "eng"}, "disposition": {"default": 1, "forced": 1}},
        {"index": 7, "codec_type": "subtitle", "codec_name": "ass",
         "tags": {"language": "jpn", "DURATION": "02:30:00.000000000"}},
        {"index": 8, "codec_type": "attachment", "codec_name": "ttf"}
    ]
}"#;

const CODECS: &str = "Codecs:
 D..... = Decoding supported
 .E.... = Encoding supported
 ..V... = Video codec
 ..A... = Audio codec
 ..S... = Subtitle codec
 -------
 DEV.LS h264                 H.264 / AVC (decoders: h264 h264_v4l2m2m ) (encoders: libx264 libx264rgb h264_vaapi )
 DEV.L. hevc                 H.265 / HEVC (decoders: hevc hevc_v4l2m2m ) (encoders: libx265 hevc_vaapi )
 DEV.L. vp9                  Google VP9 (decoders: vp9 libvpx-vp9 ) (encoders: libvpx-vp9 vp9_vaapi )
 DEVIL. mjpeg                Motion JPEG (encoders: mjpeg mjpeg_vaapi )
 DEA.L. aac                  AAC (Advanced Audio Coding) (decoders: aac aac_fixed ) (encoders: aac )
 DEA.L. ac3                  ATSC A/52A (AC-3) (decoders: ac3 ac3_fixed ) (encoders: ac3 ac3_fixed )
 D.A.L. truehd               TrueHD
 DEA.LS flac                 FLAC (Free Lossless Audio Codec)
 DES... subrip               SubRip subtitle (decoders: srt subrip ) (encoders: srt subrip )
 DES... webvtt               WebVTT subtitle
 DES... ass                  ASS (Advanced SSA) subtitle (decoders: ssa ass ) (encoders: ssa ass )
 D.S... hdmv_pgs_subtitle    HDMV Presentation Graphic Stream subtitles (decoders: pgssub )
";

fn bench_probe_output(c: &mut Criterion) {
    let mut group = c.benchmark_group("probe_output");
    let source = Path::new("/movies/movie.mkv");

    for (name, json) in [("simple", FFPROBE_SIMPLE), ("complex", FFPROBE_COMPLEX)] {
        group.throughput(Throughput::Bytes(json.len() as u64));
        group.bench_with_input(BenchmarkId::new("to_mediainfo", name), &json, |b, json| {
            b.iter(|| parse_probe_output(black_box(source), black_box(json)).unwrap());
        });
    }

    group.finish();
}

fn bench_media_helpers(c: &mut Criterion) {
    let mut group = c.benchmark_group("media_helpers");
    let info = parse_probe_output(Path::new("/movies/movie.mkv"), FFPROBE_COMPLEX).unwrap();

    group.bench_function("reference_duration", |b| {
        b.iter(|| black_box(&info).reference_duration());
    });

    group.bench_function("counts", |b| {
        b.iter(|| black_box(&info).counts());
    });

    group.finish();
}

fn bench_codec_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_listing");
    group.throughput(Throughput::Bytes(CODECS.len() as u64));

    group.bench_function("parse_codecs", |b| {
        b.iter(|| parse_codecs(black_box(CODECS)).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_probe_output,
    bench_media_helpers,
    bench_codec_listing
);
criterion_main!(benches);
