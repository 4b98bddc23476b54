use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use reqwest::Client;
use url::Url;

pub const SETTINGS_FILE: &str = "boards.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub access_token: Option<String>,
    /// Unset means the transport default applies.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            access_token: None,
            request_timeout: None,
        }
    }
}

impl ClientSettings {
    pub fn base_url(&self) -> anyhow::Result<Url> {
        normalize_server_url(&self.server_url)
    }

    pub fn http_client(&self) -> anyhow::Result<Client> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().context("failed to build http client")
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file, then environment variables.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut settings, &raw);
    }

    if let Some(v) = env("BOARDS_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = env("BOARDS_ACCESS_TOKEN") {
        settings.access_token = Some(v).filter(|token| !token.trim().is_empty());
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout = Some(Duration::from_secs(parsed));
        }
    }

    settings
}

fn apply_file(settings: &mut ClientSettings, raw: &str) {
    let Ok(table) = toml::from_str::<toml::Table>(raw) else {
        tracing::warn!("config: ignoring unparsable {SETTINGS_FILE}");
        return;
    };

    if let Some(v) = table.get("server_url").and_then(toml::Value::as_str) {
        settings.server_url = v.to_string();
    }
    if let Some(v) = table.get("access_token").and_then(toml::Value::as_str) {
        settings.access_token = Some(v.to_string()).filter(|token| !token.trim().is_empty());
    }
    if let Some(v) = table
        .get("request_timeout_seconds")
        .and_then(toml::Value::as_integer)
    {
        if let Ok(secs) = u64::try_from(v) {
            settings.request_timeout = Some(Duration::from_secs(secs));
        }
    }
}

/// Validates a server url and gives it the trailing slash relative endpoint
/// paths are joined onto.
pub fn normalize_server_url(raw: &str) -> anyhow::Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("server url must not be empty");
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let with_slash = if with_scheme.ends_with('/') {
        with_scheme
    } else {
        format!("{with_scheme}/")
    };

    let url = Url::parse(&with_slash).with_context(|| format!("invalid server url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("server url must use http or https, got '{}'", url.scheme());
    }
    if url.cannot_be_a_base() {
        bail!("server url '{raw}' cannot be used as a base url");
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
