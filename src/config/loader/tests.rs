use super::*;

#[test]
fn test_load_config_missing_file_returns_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.dispatch.cooldown_secs, 3);
    assert_eq!(config.operator.name, "admin");
}

#[test]
fn test_load_config_minimal_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"operator": {"name": "desk"}, "dispatch": {"cooldownSecs": 10}}"#,
    )
    .unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.operator.name, "desk");
    assert_eq!(config.dispatch.cooldown_secs, 10);
    assert_eq!(config.dispatch.max_delay_secs, 60);
}

#[test]
fn test_load_config_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"dispatch": {"minDelaySecs": 0}}"#).unwrap();

    let err = load_config(Some(&path)).unwrap_err();
    assert!(format!("{:#}", err).contains("minDelaySecs"));
}

#[test]
fn test_load_config_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(load_config(Some(&path)).is_err());
}

#[test]
fn test_save_then_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.content.base_url = "https://content.example.org/api".to_string();
    config.dispatch.default_delay_secs = 5;
    save_config(&config, Some(&path)).unwrap();

    let loaded = load_config(Some(&path)).unwrap();
    assert_eq!(loaded.dispatch.default_delay_secs, 5);
    // env overrides may replace the URL when set in the test environment
    if std::env::var("BULLETIN_CONTENT_BASE_URL").is_err() {
        assert_eq!(loaded.content.base_url, "https://content.example.org/api");
    }
}

#[cfg(unix)]
#[test]
fn test_save_config_restricts_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    save_config(&Config::default(), Some(&path)).unwrap();
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
