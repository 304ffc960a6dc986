use std::time::Duration;

use pretty_assertions::assert_eq;
use progress_core::JobId;
use progress_engine::{ConfigError, MonitorConfig};

#[test]
fn empty_ron_yields_defaults() {
    let config = MonitorConfig::from_ron_str("()").unwrap();
    assert_eq!(config, MonitorConfig::default());
    assert_eq!(config.poll_interval, Duration::from_secs(2));
    assert_eq!(config.upload_timeout, Duration::from_secs(30));
    assert_eq!(config.upload.max_bytes, 500 * 1024 * 1024);
    assert_eq!(config.reconcile.max_consecutive_failures, Some(10));
}

#[test]
fn partial_ron_overrides_only_named_fields() {
    let text = r#"(
        api_base_url: "https://media.example.org/backend/",
        poll_interval: (secs: 5, nanos: 0),
        max_monitoring_duration: None,
        reconcile: (max_consecutive_failures: Some(3)),
    )"#;
    let config = MonitorConfig::from_ron_str(text).unwrap();
    assert_eq!(config.api_base_url, "https://media.example.org/backend/");
    assert_eq!(config.poll_interval, Duration::from_secs(5));
    assert_eq!(config.max_monitoring_duration, None);
    assert_eq!(config.reconcile.max_consecutive_failures, Some(3));
    assert_eq!(config.reconcile.freshness_window, Duration::from_secs(5));
    assert_eq!(config.connect_timeout, MonitorConfig::default().connect_timeout);
}

#[test]
fn config_survives_a_ron_round_trip() {
    let mut config = MonitorConfig::default();
    config.push_base_url = Some("ws://push.example.org/".to_string());
    config.upload.max_bytes = 1024;
    let text = config.to_ron_string().unwrap();
    assert_eq!(MonitorConfig::from_ron_str(&text).unwrap(), config);
}

#[test]
fn load_reads_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.ron");
    std::fs::write(&path, r#"(poll_interval: (secs: 1, nanos: 0))"#).unwrap();
    let config = MonitorConfig::load(&path).unwrap();
    assert_eq!(config.poll_interval, Duration::from_secs(1));

    let err = MonitorConfig::load(dir.path().join("missing.ron")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn malformed_ron_is_a_parse_error() {
    let err = MonitorConfig::from_ron_str("(poll_interval: \"soon\")").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn endpoints_keep_the_base_path_and_derive_the_push_scheme() {
    let config = MonitorConfig {
        api_base_url: "https://media.example.org/backend".to_string(),
        ..MonitorConfig::default()
    };
    let endpoints = config.endpoints().unwrap();
    let job = JobId::new("17");
    assert_eq!(
        endpoints.upload_url().as_str(),
        "https://media.example.org/backend/api/upload/video/"
    );
    assert_eq!(
        endpoints.status_url(&job).as_str(),
        "https://media.example.org/backend/api/progress/17/"
    );
    assert_eq!(
        endpoints.push_url(&job).as_str(),
        "wss://media.example.org/backend/ws/progress/17/"
    );
}

#[test]
fn explicit_push_base_wins() {
    let config = MonitorConfig {
        api_base_url: "http://127.0.0.1:8000/".to_string(),
        push_base_url: Some("ws://127.0.0.1:9000/".to_string()),
        ..MonitorConfig::default()
    };
    let endpoints = config.endpoints().unwrap();
    assert_eq!(
        endpoints.push_url(&JobId::new("a")).as_str(),
        "ws://127.0.0.1:9000/ws/progress/a/"
    );
    assert_eq!(
        endpoints.status_url(&JobId::new("a")).as_str(),
        "http://127.0.0.1:8000/api/progress/a/"
    );
}

#[test]
fn unusable_base_urls_are_rejected() {
    let config = MonitorConfig {
        api_base_url: "not a url".to_string(),
        ..MonitorConfig::default()
    };
    assert!(matches!(
        config.endpoints(),
        Err(ConfigError::InvalidUrl { .. })
    ));

    let config = MonitorConfig {
        api_base_url: "ftp://files.example.org/".to_string(),
        ..MonitorConfig::default()
    };
    assert!(matches!(
        config.endpoints(),
        Err(ConfigError::InvalidUrl { .. })
    ));
}
