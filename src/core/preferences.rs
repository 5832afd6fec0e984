//! Durable key-value preferences
//!
//! The session remembers exactly one thing across restarts: the id of the
//! model the user last selected. Stores are synchronous; writes go straight
//! to durable storage.

use crate::core::config::io::ConfigError;
use crate::core::config::orchestrator::ConfigOrchestrator;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::{Mutex, PoisonError};

pub const SELECTED_MODEL_KEY: &str = "selected-model";

#[derive(Debug)]
pub enum PreferenceError {
    /// The store has no slot for this key.
    UnknownKey(String),
    /// The backing config file could not be written.
    Config(ConfigError),
}

impl fmt::Display for PreferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferenceError::UnknownKey(key) => write!(f, "Unknown preference key: {key}"),
            PreferenceError::Config(err) => write!(f, "Failed to save preference: {err}"),
        }
    }
}

impl Error for PreferenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PreferenceError::UnknownKey(_) => None,
            PreferenceError::Config(err) => Some(err),
        }
    }
}

impl From<ConfigError> for PreferenceError {
    fn from(err: ConfigError) -> Self {
        PreferenceError::Config(err)
    }
}

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError>;
}

/// Preferences kept in the TOML config file.
pub struct ConfigPreferenceStore<'a> {
    orchestrator: &'a ConfigOrchestrator,
}

impl<'a> ConfigPreferenceStore<'a> {
    pub fn new(orchestrator: &'a ConfigOrchestrator) -> Self {
        Self { orchestrator }
    }
}

impl ConfigPreferenceStore<'static> {
    pub fn global() -> Result<Self, ConfigError> {
        Ok(Self::new(ConfigOrchestrator::global()?))
    }
}

impl PreferenceStore for ConfigPreferenceStore<'_> {
    fn get(&self, key: &str) -> Option<String> {
        if key != SELECTED_MODEL_KEY {
            return None;
        }
        match self.orchestrator.load_with_cache() {
            Ok(config) => config.selected_model,
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring unreadable config while loading preferences");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        if key != SELECTED_MODEL_KEY {
            return Err(PreferenceError::UnknownKey(key.to_string()));
        }
        self.orchestrator.mutate(|config| {
            config.selected_model = Some(value.to_string());
            Ok(())
        })
    }
}

/// In-process store for tests and hosts that should not touch disk.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        store
    }

    /// Every successful `set`, in call order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((key.to_string(), value.to_string()));
        Ok(())
    }
}
