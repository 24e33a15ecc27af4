//! FFmpeg-backed pipeline tests.
//!
//! These need a real media file at `tests/fixtures/sample_video.mp4` (any
//! short clip with a video and an audio stream) and are skipped without it.

mod common;

use std::path::Path;

use avqueue::{
    FfmpegLogLevel, Io, IoOptions, PipelineState, TimeBase, ffmpeg_log_level,
    set_ffmpeg_log_level,
};

use common::{PATIENCE, wait_for_seek, wait_until};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn fixture() -> Option<&'static str> {
    Path::new(SAMPLE_VIDEO).exists().then_some(SAMPLE_VIDEO)
}

#[test]
fn probes_real_file() {
    let Some(path) = fixture() else {
        return;
    };
    let io = Io::open(path, IoOptions::default()).expect("Failed to open fixture");

    let info = io.info();
    assert_eq!(info.source, path);
    let video = info.video.as_ref().expect("fixture has video");
    assert!(video.width > 0 && video.height > 0);
    assert!(video.frame_rate.as_f64() > 0.0);
    assert!(info.duration() > 0);
}

#[test]
fn decodes_rgba_frames_in_order() {
    let Some(path) = fixture() else {
        return;
    };
    let io = Io::open(path, IoOptions::default().with_watermark(8))
        .expect("Failed to open fixture");
    let (width, height) = {
        let video = io.info().video.as_ref().expect("fixture has video");
        (video.width, video.height)
    };

    let mut previous = i64::MIN;
    for _ in 0..20 {
        assert!(wait_until(PATIENCE, || {
            io.queue().video_len() > 0 || io.state() == PipelineState::Drained
        }));
        let Some(frame) = io.queue().pop_video() else {
            break;
        };
        assert_eq!(frame.data.len(), (width * height * 4) as usize);
        assert!(frame.timestamp >= previous);
        previous = frame.timestamp;
    }
}

#[test]
fn seek_lands_at_or_after_target() {
    let Some(path) = fixture() else {
        return;
    };
    let millis = TimeBase::per_second(1000).expect("valid time base");
    let io = Io::open(path, IoOptions::default().with_time_base(millis))
        .expect("Failed to open fixture");
    let target = io.info().duration() / 2;

    io.seek(target);
    wait_for_seek(&io);
    assert!(wait_until(PATIENCE, || io.queue().video_len() > 0));
    let frame = io.queue().pop_video().expect("frame after seek");
    assert!(frame.timestamp >= target, "{} < {target}", frame.timestamp);
}

#[test]
fn log_level_round_trips() {
    set_ffmpeg_log_level(FfmpegLogLevel::Error);
    assert_eq!(ffmpeg_log_level(), Some(FfmpegLogLevel::Error));
}
