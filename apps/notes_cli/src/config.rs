use std::{fs, io, path::Path, time::Duration};

use anyhow::Context;
use client_core::ControllerOptions;
use serde::Deserialize;
use shared::domain::ListVariant;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub variant: ListVariant,
    pub request_timeout_secs: Option<u64>,
    pub discard_stale_responses: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            variant: ListVariant::Advanced,
            request_timeout_secs: None,
            discard_stale_responses: false,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            variant: self.variant,
            discard_stale_responses: self.discard_stale_responses,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    api_base_url: Option<String>,
    variant: Option<ListVariant>,
    request_timeout_secs: Option<u64>,
    discard_stale_responses: Option<bool>,
}

/// Defaults, then the TOML file at `path` if present, then environment overrides.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings.api_base_url = normalize_api_base_url(&settings.api_base_url);
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.variant {
        settings.variant = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = Some(v);
    }
    if let Some(v) = file_cfg.discard_stale_responses {
        settings.discard_stale_responses = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("NOTES_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    for key in ["NOTES_VARIANT", "APP__VARIANT"] {
        if let Some(v) = lookup(key) {
            match v.parse() {
                Ok(variant) => settings.variant = variant,
                Err(err) => tracing::warn!("config: ignoring {key}: {err}"),
            }
        }
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_secs = Some(parsed);
        }
    }

    if let Some(v) = lookup("APP__DISCARD_STALE_RESPONSES") {
        if let Ok(parsed) = v.trim().parse::<bool>() {
            settings.discard_stale_responses = parsed;
        }
    }
}

/// Accepts bare hosts and URLs that already point at the `/notes/` collection.
pub fn normalize_api_base_url(raw: &str) -> String {
    let raw = raw.trim();

    if raw.is_empty() {
        return DEFAULT_API_BASE_URL.to_string();
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let trimmed = with_scheme.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/notes").unwrap_or(trimmed);
    trimmed.trim_end_matches('/').to_string()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
