use std::collections::HashMap;

use super::*;

#[test]
fn base_url_gains_scheme_and_trailing_slash() {
    assert_eq!(
        normalize_base_url("api.example.com/v1").expect("normalize"),
        "http://api.example.com/v1/"
    );
    assert_eq!(
        normalize_base_url(" https://fields.example.org ").expect("normalize"),
        "https://fields.example.org/"
    );
    assert_eq!(
        normalize_base_url("http://127.0.0.1:8000/").expect("normalize"),
        "http://127.0.0.1:8000/"
    );
}

#[test]
fn empty_base_url_falls_back_to_default() {
    assert_eq!(
        normalize_base_url("   ").expect("normalize"),
        ClientSettings::default().api_base_url
    );
}

#[test]
fn unparsable_base_url_is_rejected() {
    assert!(normalize_base_url("http://exa mple.com").is_err());
    assert!(normalize_base_url("http://[::1").is_err());
}

#[test]
fn overrides_replace_only_present_keys() {
    let values = HashMap::from([
        ("auth_scheme", "Token"),
        ("request_timeout_secs", "5"),
    ]);
    let mut settings = ClientSettings::default();
    apply_overrides(&mut settings, |key| values.get(key).map(|v| v.to_string()))
        .expect("overrides");

    assert_eq!(settings.auth_scheme, "Token");
    assert_eq!(settings.request_timeout_secs, 5);
    assert_eq!(settings.api_base_url, ClientSettings::default().api_base_url);
    assert_eq!(settings.event_capacity, 256);
}

#[test]
fn malformed_numbers_fail_loudly() {
    let mut settings = ClientSettings::default();
    let err = apply_overrides(&mut settings, |key| {
        (key == "event_capacity").then(|| "lots".to_string())
    })
    .expect_err("not a number");
    assert!(err.to_string().contains("event_capacity"));
}

#[test]
fn settings_file_is_layered_over_defaults() {
    let path = std::env::temp_dir().join(format!("fieldctl-settings-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "api_base_url = \"http://files.example:9000\"\nrequest_timeout_secs = \"7\"\n",
    )
    .expect("write settings");

    let settings = load_settings_from(&path);
    let _ = std::fs::remove_file(&path);
    let settings = settings.expect("load");

    if std::env::var("FIELD_API_URL").is_err() && std::env::var("APP__API_BASE_URL").is_err() {
        assert_eq!(settings.api_base_url, "http://files.example:9000/");
    }
    if std::env::var("APP__REQUEST_TIMEOUT_SECS").is_err() {
        assert_eq!(settings.request_timeout_secs, 7);
    }
}

#[test]
fn missing_settings_file_yields_defaults() {
    let path = std::env::temp_dir().join("fieldctl-settings-that-does-not-exist.toml");
    let settings = load_settings_from(&path).expect("load");
    if std::env::var("APP__AUTH_SCHEME").is_err() {
        assert_eq!(settings.auth_scheme, "Bearer");
    }
}

#[test]
fn malformed_settings_file_is_an_error() {
    let path = std::env::temp_dir().join(format!("fieldctl-broken-{}.toml", std::process::id()));
    std::fs::write(&path, "api_base_url = [").expect("write settings");
    let result = load_settings_from(&path);
    let _ = std::fs::remove_file(&path);
    assert!(result.is_err());
}
