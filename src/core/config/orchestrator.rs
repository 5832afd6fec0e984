use crate::core::config::data::Config;
use crate::core::config::io::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

#[derive(Default)]
struct ConfigCacheState {
    config: Option<Config>,
    modified: Option<SystemTime>,
}

/// Serializes access to one config file and caches its parsed contents
/// until the file's modification time changes on disk.
pub struct ConfigOrchestrator {
    path: PathBuf,
    state: Mutex<ConfigCacheState>,
}

static CONFIG_ORCHESTRATOR: LazyLock<Option<ConfigOrchestrator>> =
    LazyLock::new(|| Config::get_config_path().ok().map(ConfigOrchestrator::new));

impl ConfigOrchestrator {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(ConfigCacheState::default()),
        }
    }

    /// The orchestrator for the platform config file.
    pub fn global() -> Result<&'static ConfigOrchestrator, ConfigError> {
        CONFIG_ORCHESTRATOR.as_ref().ok_or(ConfigError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_with_cache(&self) -> Result<Config, ConfigError> {
        let mut state = self.lock_state();
        self.refresh(&mut state)
    }

    /// Apply `mutator` to a fresh snapshot and write the result back while
    /// holding the lock, so concurrent mutations in this process serialize.
    /// Nothing is written when the mutator fails.
    pub fn mutate<F, T, E>(&self, mutator: F) -> Result<T, E>
    where
        F: FnOnce(&mut Config) -> Result<T, E>,
        E: From<ConfigError>,
    {
        let mut state = self.lock_state();
        let mut working = self.refresh(&mut state)?;
        let result = mutator(&mut working)?;
        self.persist_locked(&mut state, working)?;
        Ok(result)
    }

    fn refresh(&self, state: &mut ConfigCacheState) -> Result<Config, ConfigError> {
        let disk_modified = Self::modified_time(&self.path);
        if state.config.is_none() || state.modified != disk_modified {
            let config = Config::load_from_path(&self.path)?;
            state.modified = disk_modified;
            state.config = Some(config);
        }
        Ok(state.config.clone().unwrap_or_default())
    }

    fn persist_locked(
        &self,
        state: &mut ConfigCacheState,
        config: Config,
    ) -> Result<(), ConfigError> {
        config.save_to_path(&self.path)?;
        state.modified = Self::modified_time(&self.path);
        state.config = Some(config);
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, ConfigCacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn modified_time(path: &Path) -> Option<SystemTime> {
        fs::metadata(path).ok()?.modified().ok()
    }
}

impl Config {
    pub fn load() -> Result<Config, ConfigError> {
        ConfigOrchestrator::global()?.load_with_cache()
    }

    pub fn mutate<F, T, E>(mutator: F) -> Result<T, E>
    where
        F: FnOnce(&mut Config) -> Result<T, E>,
        E: From<ConfigError>,
    {
        ConfigOrchestrator::global()?.mutate(mutator)
    }
}
