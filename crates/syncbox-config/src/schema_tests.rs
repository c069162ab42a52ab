use super::*;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.queue.max_attempts, 5);
    assert_eq!(config.delivery.endpoint, "/api/features");
    assert!(config.connectivity.probe_url.is_none());
    assert!(config.notify.webhook_url.is_none());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_queue_config_default_path() {
    let queue = QueueConfig::default();
    assert!(queue.db_path.ends_with("syncbox/queue.db"));
}

#[test]
fn test_delivery_url_joins_slashes() {
    let delivery = DeliveryConfig {
        base_url: "https://api.example.com/".to_string(),
        endpoint: "/api/features".to_string(),
        timeout_secs: 10,
    };
    assert_eq!(delivery.url(), "https://api.example.com/api/features");
    assert_eq!(delivery.timeout(), Duration::from_secs(10));
}

#[test]
fn test_delivery_url_without_slashes() {
    let delivery = DeliveryConfig {
        base_url: "https://api.example.com".to_string(),
        endpoint: "features".to_string(),
        ..Default::default()
    };
    assert_eq!(delivery.url(), "https://api.example.com/features");
}

#[test]
fn test_connectivity_durations() {
    let connectivity = ConnectivityConfig::default();
    assert_eq!(connectivity.probe_interval(), Duration::from_secs(15));
    assert_eq!(connectivity.probe_timeout(), Duration::from_secs(5));
}

#[test]
fn test_notify_defaults_and_empty_webhook() {
    let mut notify = NotifyConfig::default();
    assert_eq!(notify.timeout(), Duration::from_secs(10));
    assert!(notify.webhook().is_none());

    notify.webhook_url = Some(String::new());
    assert!(notify.webhook().is_none());

    notify.webhook_url = Some("https://hooks.example.com/x".to_string());
    assert_eq!(notify.webhook(), Some("https://hooks.example.com/x"));
}

#[test]
fn test_config_serialization_skips_unset_options() {
    let config = Config::default();
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("max_attempts"));
    assert!(!json.contains("probe_url"));
    assert!(!json.contains("webhook_url"));
}
