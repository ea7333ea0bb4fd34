// Property-based tests for layered configuration

use common::config::Settings;
use common::features::FeatureKind;
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

/// *For any* feature intervals written to `default.toml`, loading the
/// settings reflects them and unspecified values keep their defaults.
#[test]
fn property_feature_intervals_loaded_from_file() {
    proptest!(ProptestConfig::with_cases(32), |(
        motion in 1u64..10_000u64,
        bluetooth in 1u64..10_000u64,
        log_level in prop::sample::select(vec!["trace", "debug", "info", "warn", "error"])
    )| {
        let dir = TempDir::new().unwrap();
        let contents = format!(
            "[features.motion]\nnamespace = \"motion\"\ninterval_ms = {}\n\n\
             [features.bluetooth]\nnamespace = \"bluetooth\"\ninterval_ms = {}\n\n\
             [observability]\nlog_level = \"{}\"\n",
            motion, bluetooth, log_level
        );
        fs::write(dir.path().join("default.toml"), contents).unwrap();

        let settings = Settings::load_from_path(dir.path()).unwrap();

        prop_assert_eq!(settings.features.get(FeatureKind::Motion).interval_ms, motion);
        prop_assert_eq!(settings.features.get(FeatureKind::Bluetooth).interval_ms, bluetooth);
        prop_assert_eq!(settings.observability.log_level.as_str(), log_level);
        prop_assert_eq!(
            settings.features.get(FeatureKind::ArSession).interval_ms,
            Settings::default().features.ar_session.interval_ms
        );
        prop_assert!(settings.validate().is_ok());
    });
}

/// *For any* settings where an enabled feature has a zero interval,
/// validation fails.
#[test]
fn property_zero_interval_fails_validation() {
    proptest!(|(index in 0usize..4)| {
        let mut settings = Settings::default();
        match FeatureKind::ALL[index] {
            FeatureKind::Motion => settings.features.motion.interval_ms = 0,
            FeatureKind::Bluetooth => settings.features.bluetooth.interval_ms = 0,
            FeatureKind::ArSession => settings.features.ar_session.interval_ms = 0,
            FeatureKind::AudioSession => settings.features.audio_session.interval_ms = 0,
        }
        prop_assert!(settings.validate().is_err());
    });
}
