use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub auth_scheme: String,
    pub request_timeout_secs: u64,
    pub event_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/".into(),
            auth_scheme: "Bearer".into(),
            request_timeout_secs: 30,
            event_capacity: 256,
        }
    }
}

pub fn load_settings() -> anyhow::Result<ClientSettings> {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE))
}

/// Defaults, then the flat `key = "value"` table at `path` if it exists, then
/// environment overrides.
pub fn load_settings_from(path: &Path) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        let file_cfg = toml::from_str::<HashMap<String, String>>(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
        apply_overrides(&mut settings, |key| file_cfg.get(key).cloned())?;
    }

    apply_overrides(&mut settings, |key| {
        std::env::var(format!("APP__{}", key.to_ascii_uppercase())).ok()
    })?;
    if let Ok(v) = std::env::var("FIELD_API_URL") {
        settings.api_base_url = v;
    }

    settings.api_base_url = normalize_base_url(&settings.api_base_url)?;
    Ok(settings)
}

fn apply_overrides(
    settings: &mut ClientSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("api_base_url") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("auth_scheme") {
        settings.auth_scheme = v;
    }
    if let Some(v) = lookup("request_timeout_secs") {
        settings.request_timeout_secs = v
            .parse()
            .with_context(|| format!("invalid request_timeout_secs '{v}'"))?;
    }
    if let Some(v) = lookup("event_capacity") {
        settings.event_capacity = v
            .parse()
            .with_context(|| format!("invalid event_capacity '{v}'"))?;
    }
    Ok(())
}

/// Ensures the base URL parses and ends with `/` so relative endpoint paths
/// join under it instead of replacing its last segment.
pub fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(ClientSettings::default().api_base_url);
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let mut url =
        Url::parse(&with_scheme).with_context(|| format!("invalid api base url '{raw}'"))?;
    if url.cannot_be_a_base() {
        bail!("api base url '{raw}' cannot carry endpoint paths");
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
