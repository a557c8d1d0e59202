use super::*;

fn default_config() -> Config {
    serde_json::from_str("{}").unwrap()
}

#[test]
fn test_default_config_is_valid() {
    assert!(default_config().validate().is_ok());
}

#[test]
fn test_dispatch_defaults() {
    let config = default_config();
    assert_eq!(config.dispatch.cooldown_secs, 3);
    assert_eq!(config.dispatch.min_delay_secs, 1);
    assert_eq!(config.dispatch.max_delay_secs, 60);
    assert_eq!(config.dispatch.default_delay_secs, 2);
    assert_eq!(config.dispatch.max_deliveries_per_batch, 5000);
}

#[test]
fn test_camel_case_keys_deserialize() {
    let config: Config = serde_json::from_str(
        r#"{
            "addressBook": {"dbPath": "/tmp/book.db"},
            "content": {"baseUrl": "https://cms.example.org", "apiKey": "secret", "newsPath": "articles"},
            "dispatch": {"maxDeliveriesPerBatch": 10},
            "whatsapp": {"enabled": true, "sessionDir": "/tmp/wa"}
        }"#,
    )
    .unwrap();
    assert_eq!(config.address_book.db_path.as_deref(), Some("/tmp/book.db"));
    assert_eq!(config.content.news_path, "articles");
    assert_eq!(config.content.persons_path, "persons");
    assert_eq!(config.dispatch.max_deliveries_per_batch, 10);
    assert!(config.whatsapp.enabled);
}

#[test]
fn test_min_delay_above_max_rejected() {
    let mut config = default_config();
    config.dispatch.min_delay_secs = 30;
    config.dispatch.max_delay_secs = 10;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("minDelaySecs"));
}

#[test]
fn test_default_delay_outside_bounds_rejected() {
    let mut config = default_config();
    config.dispatch.default_delay_secs = 61;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("defaultDelaySecs"));
}

#[test]
fn test_max_delay_cannot_exceed_hard_limit() {
    let mut config = default_config();
    config.dispatch.max_delay_secs = 600;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("maxDelaySecs"));

    config.dispatch.default_delay_secs = 90;
    assert!(config.validate().is_err());

    config.dispatch.max_delay_secs = MAX_DELAY_SECS;
    config.dispatch.default_delay_secs = MAX_DELAY_SECS;
    assert!(config.validate().is_ok());
}

#[test]
fn test_zero_min_delay_rejected() {
    let mut config = default_config();
    config.dispatch.min_delay_secs = 0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("minDelaySecs"));
}

#[test]
fn test_zero_max_deliveries_rejected() {
    let mut config = default_config();
    config.dispatch.max_deliveries_per_batch = 0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("maxDeliveriesPerBatch"));
}

#[test]
fn test_invalid_base_url_rejected() {
    let mut config = default_config();
    config.content.base_url = "not a url".to_string();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("baseUrl"));

    config.content.base_url = "ftp://cms.example.org".to_string();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("baseUrl"));
}

#[test]
fn test_zero_timeout_rejected() {
    let mut config = default_config();
    config.content.timeout_secs = 0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("timeoutSecs"));
}

#[test]
fn test_content_debug_redacts_api_key() {
    let mut config = ContentConfig::default();
    config.api_key = Some("super-secret-token".to_string());
    let debug = format!("{:?}", config);
    assert!(!debug.contains("super-secret-token"));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn test_resolve_db_path_explicit() {
    let config = AddressBookConfig {
        db_path: Some("/var/lib/bulletin/book.db".to_string()),
    };
    assert_eq!(
        config.resolve_db_path().unwrap(),
        PathBuf::from("/var/lib/bulletin/book.db")
    );
}
