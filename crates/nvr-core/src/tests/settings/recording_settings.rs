use crate::{RecorderError, RecordingSettings};

use std::time::Duration;

/// WHAT: Defaults match the documented recording profile
/// WHY: A fresh install must record sensibly without editing configuration
#[test]
fn given_defaults_when_inspecting_then_documented_values() {
    // Given/When
    let settings = RecordingSettings::default();

    // Then
    assert_eq!(settings.segment_duration(), Duration::from_secs(300));
    assert_eq!(settings.total_duration_secs, 3600);
    assert_eq!(settings.retention_days, 7);
    assert_eq!(settings.max_retries, 3);
    assert_eq!(settings.retry_delay(), Duration::from_secs(5));
    assert_eq!(settings.target_fps, 15);
    assert_eq!(settings.resolution_hint, "720p");
    assert!(settings.validate().is_ok());
}

/// WHAT: A zero frame rate is rejected
/// WHY: The encoder cannot produce a container at 0 fps
#[test]
fn given_zero_target_fps_when_validating_then_config_error() {
    // Given
    let settings = RecordingSettings {
        target_fps: 0,
        ..RecordingSettings::default()
    };

    // When/Then
    assert!(matches!(
        settings.validate(),
        Err(RecorderError::Config { .. })
    ));
}
