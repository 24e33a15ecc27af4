//! IoOptions builder tests.

use std::time::Duration;

use avqueue::configuration::{
    DEFAULT_DIAGNOSTICS_CAPACITY, DEFAULT_WAIT_TIMEOUT, DEFAULT_WATERMARK,
};
use avqueue::{IoOptions, TimeBase};

#[test]
fn config_defaults() {
    let options = IoOptions::new();
    assert_eq!(options.time_base(), TimeBase::MICROSECONDS);
    assert_eq!(options.video_watermark(), DEFAULT_WATERMARK);
    assert_eq!(options.audio_watermark(), DEFAULT_WATERMARK);
    assert_eq!(options.wait_timeout(), DEFAULT_WAIT_TIMEOUT);
    assert_eq!(options.diagnostics_capacity(), DEFAULT_DIAGNOSTICS_CAPACITY);

    let debug = format!("{:?}", IoOptions::default());
    assert!(debug.contains("IoOptions"));
    assert!(debug.contains("video_watermark: 100"));
    assert!(debug.contains("1/1000000"));
    assert!(debug.contains("diagnostics_capacity: 64"));
}

#[test]
fn config_with_watermarks() {
    let options = IoOptions::new()
        .with_video_watermark(8)
        .with_audio_watermark(32);
    assert_eq!(options.video_watermark(), 8);
    assert_eq!(options.audio_watermark(), 32);

    let both = options.with_watermark(4);
    let debug = format!("{both:?}");
    assert!(debug.contains("video_watermark: 4"));
    assert!(debug.contains("audio_watermark: 4"));
}

#[test]
fn config_clamps_to_one() {
    let options = IoOptions::new()
        .with_watermark(0)
        .with_diagnostics_capacity(0);
    assert_eq!(options.video_watermark(), 1);
    assert_eq!(options.audio_watermark(), 1);
    assert_eq!(options.diagnostics_capacity(), 1);
}

#[test]
fn config_with_time_base_and_timeout() {
    let frames = TimeBase::per_second(25).expect("valid time base");
    let options = IoOptions::new()
        .with_time_base(frames)
        .with_wait_timeout(Duration::from_millis(50));
    assert_eq!(options.time_base(), frames);
    assert_eq!(options.wait_timeout(), Duration::from_millis(50));
    assert!(format!("{options:?}").contains("1/25"));
}
