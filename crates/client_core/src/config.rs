use std::{fs, io, path::Path};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "feedback.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub command_queue_capacity: usize,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/api/v1".into(),
            api_key: None,
            request_timeout_secs: 30,
            command_queue_capacity: 64,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{path}': {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid base url '{value}': expected an http:// or https:// url")]
    InvalidBaseUrl { value: String },
    #[error("invalid value '{value}' for {key}")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    base_url: Option<String>,
    api_key: Option<String>,
    request_timeout_secs: Option<u64>,
    command_queue_capacity: Option<usize>,
}

/// Defaults, then the TOML file at `path` (if present), then environment.
pub fn load_settings(path: &Path) -> Result<FeedbackSettings, SettingsError> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

pub fn load_settings_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<FeedbackSettings, SettingsError> {
    let mut settings = FeedbackSettings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw, path)?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    }

    apply_env(&mut settings, lookup)?;
    validate_base_url(&settings.base_url)?;
    Ok(settings)
}

fn apply_file(
    settings: &mut FeedbackSettings,
    raw: &str,
    path: &Path,
) -> Result<(), SettingsError> {
    let file_cfg: FileSettings = toml::from_str(raw).map_err(|source| SettingsError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    if let Some(v) = file_cfg.base_url {
        settings.base_url = v;
    }
    if let Some(v) = file_cfg.api_key {
        settings.api_key = Some(v);
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.command_queue_capacity {
        settings.command_queue_capacity = v;
    }
    Ok(())
}

/// Each setting accepts a plain name and an `APP__` alias; the alias wins.
fn apply_env(
    settings: &mut FeedbackSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), SettingsError> {
    let pick = |plain: &str, alias: &str| lookup(alias).or_else(|| lookup(plain));

    if let Some(v) = pick("FEEDBACK_BASE_URL", "APP__FEEDBACK_BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = pick("FEEDBACK_API_KEY", "APP__FEEDBACK_API_KEY") {
        settings.api_key = Some(v);
    }
    if let Some(v) = pick("FEEDBACK_TIMEOUT_SECS", "APP__FEEDBACK_TIMEOUT_SECS") {
        settings.request_timeout_secs =
            v.trim()
                .parse()
                .map_err(|_| SettingsError::InvalidNumber {
                    key: "FEEDBACK_TIMEOUT_SECS",
                    value: v.clone(),
                })?;
    }
    Ok(())
}

fn validate_base_url(value: &str) -> Result<(), SettingsError> {
    match Url::parse(value.trim()) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        _ => Err(SettingsError::InvalidBaseUrl {
            value: value.to_string(),
        }),
    }
}
