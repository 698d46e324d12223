//! Integration tests for stampede-config

use stampede_config::*;
use std::io::Write;
use std::time::Duration;
use temp_env::{with_vars, with_vars_unset};

const OVERRIDES: [&str; 3] = ["STAMPEDE_HTTP_TIMEOUT", "STAMPEDE_LOG_FORMAT", "STAMPEDE_SCHEDULE_ID"];

#[test]
fn test_default_preset_validation() {
    let config = Preset::default().config();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_empty_config_has_no_phases() {
    let config = StampedeConfig::default();
    assert!(config.validate_all().is_err());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("STAMPEDE_QUEUE_URL", Some("http://queue.test:9000")),
        ("STAMPEDE_CONCERT_ID", Some("concert-7")),
        ("STAMPEDE_HTTP_TIMEOUT", Some("5")),
        ("STAMPEDE_LOG_LEVEL", Some("debug")),
        ("STAMPEDE_SEED", Some("1234")),
    ];

    with_vars(vars, || {
        let loader = ConfigLoader::new();
        let config = loader.from_env().unwrap();

        assert_eq!(config.target.queue_url, "http://queue.test:9000");
        assert_eq!(config.target.concert_id, "concert-7");
        assert_eq!(config.http.timeout, Duration::from_secs(5));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.scenario.seed, Some(1234));
    });
}

#[test]
fn test_invalid_env_value_is_reported() {
    with_vars(vec![("STAMPEDE_SCHEDULE_ID", Some("abc"))], || {
        let result = ConfigLoader::new().from_env();
        assert!(matches!(result, Err(ConfigError::EnvError(_))));
    });
}

#[test]
fn test_custom_prefix() {
    with_vars(vec![("LOADGEN_LOG_FORMAT", Some("json"))], || {
        let config = ConfigLoader::with_prefix("LOADGEN").from_env().unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    });
}

#[test]
fn test_yaml_config_serialization() {
    let config = Preset::EndToEnd.config();
    let yaml = serde_yaml::to_string(&config).unwrap();

    let parsed: StampedeConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed.validate_all().is_ok());
    assert_eq!(parsed.phases, config.phases);
    assert_eq!(parsed.thresholds, config.thresholds);
}

#[test]
fn test_comprehensive_config() {
    let yaml = r#"
target:
  queue_url: "http://localhost:8081"
  concert_id: "1"

http:
  timeout: 30s
  user_agent: "Test Agent"

logging:
  level: warn
  format: json

scenario:
  mode: circulation
  polling:
    max_polls: 3
    interval: 1s
  usage:
    min: 7s
    max: 7s
  admission_window: 250ms

phases:
  - name: warmup
    rate: 10
    duration: 2s
    pre_allocated_vus: 5
    max_vus: 20
  - name: peak
    rate: 50
    duration: 4s
    pre_allocated_vus: 10
    max_vus: 100
    start_time: 2s
  - name: cooldown
    rate: 0
    duration: 2s
    pre_allocated_vus: 1
    max_vus: 1
    start_time: 6s

thresholds:
  "http_req_duration{step:enter}": ["p(95)<200"]
  queue_removal_success: ["rate>0.99"]
"#;

    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let config = with_vars_unset(OVERRIDES, || ConfigLoader::new().from_file(file.path()).unwrap());
    assert_eq!(config.http.timeout, Duration::from_secs(30));
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.scenario.polling.max_polls, 3);
    assert_eq!(config.scenario.admission_window, Duration::from_millis(250));
    assert_eq!(config.phases.len(), 3);
    assert_eq!(config.phases[2].rate, 0);
    assert_eq!(config.thresholds.len(), 2);
}

#[test]
fn test_phase_ordering_is_enforced() {
    let yaml = r#"
phases:
  - name: late
    rate: 1
    duration: 1s
    max_vus: 1
    start_time: 5s
  - name: early
    rate: 1
    duration: 1s
    max_vus: 1
"#;
    let config: StampedeConfig = serde_yaml::from_str(yaml).unwrap();
    let err = config.validate_all().unwrap_err();
    assert!(err.to_string().contains("phases"));
}

#[test]
fn test_json_config_file() {
    let config = Preset::Smoke.config();
    let json = serde_json::to_string(&config).unwrap();

    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let loaded = with_vars_unset(OVERRIDES, || {
        ConfigLoader::new().load(Some(file.path()), None).unwrap()
    });
    assert_eq!(loaded.phases, config.phases);
}

#[test]
fn test_end_to_end_requires_core_url() {
    let mut config = Preset::EndToEnd.config();
    config.target.core_url = "ftp://core".to_string();
    assert!(config.validate_all().is_err());
}
