//! `set` / `unset` configuration keys

use std::error::Error;
use std::fmt;

use crate::core::catalog::ModelCatalog;
use crate::core::config::Config;

pub const SETTING_KEYS: &[&str] = &[
    "selected-model",
    "base-url",
    "referer",
    "title",
    "request-timeout",
];

#[derive(Debug, PartialEq, Eq)]
pub enum SettingError {
    UnknownKey(String),
    MissingValue(&'static str),
    InvalidValue { key: &'static str, reason: String },
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(
                f,
                "Unknown config key: {key} (expected one of: {})",
                SETTING_KEYS.join(", ")
            ),
            SettingError::MissingValue(key) => write!(f, "A value is required for {key}"),
            SettingError::InvalidValue { key, reason } => write!(f, "Invalid {key}: {reason}"),
        }
    }
}

impl Error for SettingError {}

/// Apply `key = value` to `config` and describe the change.
pub fn apply_setting(
    config: &mut Config,
    catalog: &ModelCatalog,
    key: &str,
    value: &str,
) -> Result<String, SettingError> {
    let value = value.trim();
    let require = |key: &'static str| {
        if value.is_empty() {
            Err(SettingError::MissingValue(key))
        } else {
            Ok(value.to_string())
        }
    };

    match key {
        "selected-model" => {
            let value = require("selected-model")?;
            let model = catalog
                .resolve_choice(&value)
                .ok_or_else(|| SettingError::InvalidValue {
                    key: "selected-model",
                    reason: format!("{value} is not in the model catalog (see `palaver models`)"),
                })?;
            config.selected_model = Some(model.id.clone());
            Ok(format!("Set selected-model to: {}", model.id))
        }
        "base-url" => {
            let value = require("base-url")?;
            if !(value.starts_with("https://") || value.starts_with("http://")) {
                return Err(SettingError::InvalidValue {
                    key: "base-url",
                    reason: "must start with http:// or https://".to_string(),
                });
            }
            let normalized = value.trim_end_matches('/').to_string();
            config.base_url = Some(normalized.clone());
            Ok(format!("Set base-url to: {normalized}"))
        }
        "referer" => {
            config.referer = Some(require("referer")?);
            Ok(format!("Set referer to: {value}"))
        }
        "title" => {
            config.title = Some(require("title")?);
            Ok(format!("Set title to: {value}"))
        }
        "request-timeout" => {
            let secs = require("request-timeout")?
                .trim_end_matches('s')
                .parse::<u64>()
                .map_err(|err| SettingError::InvalidValue {
                    key: "request-timeout",
                    reason: err.to_string(),
                })?;
            config.request_timeout_secs = Some(secs);
            Ok(format!("Set request-timeout to: {secs}s"))
        }
        other => Err(SettingError::UnknownKey(other.to_string())),
    }
}

pub fn unset_setting(config: &mut Config, key: &str) -> Result<String, SettingError> {
    match key {
        "selected-model" => config.selected_model = None,
        "base-url" => config.base_url = None,
        "referer" => config.referer = None,
        "title" => config.title = None,
        "request-timeout" => config.request_timeout_secs = None,
        other => return Err(SettingError::UnknownKey(other.to_string())),
    }
    Ok(format!("Unset {key}"))
}
