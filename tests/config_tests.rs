use std::io::Write;

use edgeguard::application::scheduler::SaturationAction;
use edgeguard::domain::edge::EdgeType;
use edgeguard::error::{ConfigError, Error};
use edgeguard::infrastructure::config::Config;

fn write_temp_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("edgeguard-config-test-")
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn full_config_loads_from_file() {
    let file = write_temp_config(
        r#"
[logging]
level = "warn"

[scheduler]
workers = 8
queue_max_size = 250
saturation_action = "downgrade_priority"
debounce_window_ms = 500

[scheduler.breaker]
failure_threshold = 20
window_secs = 120

[edges]
cleanup_interval_secs = 60

[edges.rules.player_prop]
max_age_hours = 2.0

[calibration]
min_samples = 50

[settlement]
poll_interval_secs = 30
mismatch_confidence = 0.85

[telemetry]
interval_secs = 15

[endpoints]
valuation_url = "http://engine.internal:9000"
results_url = "https://stats.internal/mlb/"
request_timeout_ms = 1500
"#,
    );

    let config = Config::load(file.path()).expect("valid config");
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.scheduler.workers, 8);
    assert_eq!(config.scheduler.queue_max_size, 250);
    assert_eq!(
        config.scheduler.saturation_action,
        SaturationAction::DowngradePriority
    );
    assert_eq!(config.scheduler.breaker.failure_threshold, 20);
    assert_eq!(config.edges.cleanup_interval_secs, 60);
    assert!((config.edges.rule_for(EdgeType::PlayerProp).max_age_hours - 2.0).abs() < 1e-9);
    assert_eq!(config.calibration.min_samples, 50);
    assert_eq!(config.settlement.poll_interval_secs, 30);
    assert_eq!(config.telemetry.interval_secs, 15);
    assert_eq!(
        config.endpoints.results().unwrap().as_str(),
        "https://stats.internal/mlb/"
    );
    assert_eq!(config.endpoints.request_timeout().as_millis(), 1500);
}

#[test]
fn config_rejects_out_of_range_mismatch_confidence() {
    let file = write_temp_config("[settlement]\nmismatch_confidence = 1.5\n");
    match Config::load(file.path()) {
        Err(Error::Config(ConfigError::InvalidValue {
            field: "settlement.mismatch_confidence",
            ..
        })) => {}
        Err(err) => panic!("Expected invalid mismatch confidence, got {err}"),
        Ok(_) => panic!("Expected config error"),
    }
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = Config::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(Error::Config(ConfigError::ReadFile(_)))));
}

#[test]
fn unknown_saturation_action_is_a_parse_error() {
    let result = Config::parse_toml("[scheduler]\nsaturation_action = \"drop_all\"\n");
    assert!(matches!(result, Err(Error::Config(ConfigError::Parse(_)))));
}
