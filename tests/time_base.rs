//! Time base construction and timestamp rescaling tests.

use avqueue::{NO_TIMESTAMP, TimeBase};
use ffmpeg_next::Rational;

#[test]
fn rejects_non_positive_parts() {
    assert!(TimeBase::new(0, 24).is_none());
    assert!(TimeBase::new(1, 0).is_none());
    assert!(TimeBase::new(-1, 24).is_none());
    assert!(TimeBase::per_second(0).is_none());
    assert_eq!(TimeBase::per_second(24), TimeBase::new(1, 24));
}

#[test]
fn default_is_microseconds() {
    assert_eq!(TimeBase::default(), TimeBase::MICROSECONDS);
    assert_eq!(TimeBase::MICROSECONDS.denominator(), 1_000_000);
    assert_eq!(TimeBase::MICROSECONDS.to_string(), "1/1000000");
}

#[test]
fn rescale_frames_to_microseconds() {
    let frames = TimeBase::per_second(24).expect("valid time base");
    assert_eq!(TimeBase::rescale(24, frames, TimeBase::MICROSECONDS), 1_000_000);
    assert_eq!(TimeBase::rescale(1, frames, TimeBase::MICROSECONDS), 41_667);
    assert_eq!(TimeBase::rescale(1_000_000, TimeBase::MICROSECONDS, frames), 24);
}

#[test]
fn rescale_rounds_to_nearest() {
    let ninety_khz = TimeBase::per_second(90_000).expect("valid time base");
    let frames = TimeBase::per_second(24).expect("valid time base");
    // 3750 ticks at 90 kHz is exactly one frame at 24 fps.
    assert_eq!(TimeBase::rescale(3750, ninety_khz, frames), 1);
    assert_eq!(TimeBase::rescale(3749, ninety_khz, frames), 1);
    assert_eq!(TimeBase::rescale(1800, ninety_khz, frames), 0);
}

#[test]
fn rescale_passes_missing_timestamps_through() {
    let frames = TimeBase::per_second(24).expect("valid time base");
    assert_eq!(
        TimeBase::rescale(NO_TIMESTAMP, frames, TimeBase::MICROSECONDS),
        NO_TIMESTAMP
    );
}

#[test]
fn seconds_round_trip() {
    let millis = TimeBase::per_second(1000).expect("valid time base");
    assert_eq!(millis.from_seconds(1.25), 1250);
    assert!((millis.to_seconds(1250) - 1.25).abs() < f64::EPSILON);

    let ntsc = TimeBase::new(1001, 30_000).expect("valid time base");
    assert_eq!(ntsc.from_seconds(1.001), 30);
}

#[test]
fn converts_from_ffmpeg_rationals() {
    let time_base = TimeBase::try_from(Rational::new(1, 90_000)).expect("positive rational");
    assert_eq!(time_base, TimeBase::new(1, 90_000).expect("valid time base"));
    assert!(TimeBase::try_from(Rational::new(0, 1)).is_err());

    let rational: Rational = time_base.into();
    assert_eq!(rational.denominator(), 90_000);
}
