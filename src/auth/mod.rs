//! API key storage and resolution
//!
//! The key lives in the system keyring under the `palaver` service. When the
//! keyring has nothing (or is temporarily unavailable) the
//! `OPENROUTER_API_KEY` environment variable is used instead.

use keyring::Entry;
use std::error::Error;
use std::fmt;
use std::io::{self, BufRead, Write};
use tracing::warn;

const KEYRING_SERVICE: &str = "palaver";
const KEYRING_USER: &str = "openrouter";
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

const QUICK_FIXES: &[&str] = &[
    "palaver auth                          # Store a key in the system keyring",
    "export OPENROUTER_API_KEY=sk-or-...   # Use an environment variable",
];

#[derive(Debug)]
pub enum CredentialError {
    /// Neither the keyring nor the environment holds a key.
    Missing,
    /// The keyring refused the operation.
    Keyring(keyring::Error),
    /// Reading the key from the terminal failed.
    Input(io::Error),
    EmptyKey,
}

impl CredentialError {
    pub fn quick_fixes(&self) -> &'static [&'static str] {
        match self {
            CredentialError::Missing | CredentialError::Keyring(_) => QUICK_FIXES,
            _ => &[],
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CredentialError::Missing => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Missing => write!(
                f,
                "No API key configured and {API_KEY_ENV} environment variable not set"
            ),
            CredentialError::Keyring(err) => write!(f, "Keyring access failed: {err}"),
            CredentialError::Input(err) => write!(f, "Failed to read API key: {err}"),
            CredentialError::EmptyKey => write!(f, "API key must not be empty"),
        }
    }
}

impl Error for CredentialError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CredentialError::Keyring(err) => Some(err),
            CredentialError::Input(err) => Some(err),
            _ => None,
        }
    }
}

fn is_recoverable(err: &keyring::Error) -> bool {
    matches!(
        err,
        keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_)
    )
}

pub trait CredentialSource {
    fn stored_api_key(&self) -> Result<Option<String>, CredentialError>;
}

pub struct KeyringCredentials {
    service: &'static str,
    user: &'static str,
}

impl Default for KeyringCredentials {
    fn default() -> Self {
        Self {
            service: KEYRING_SERVICE,
            user: KEYRING_USER,
        }
    }
}

impl KeyringCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self) -> Result<Entry, CredentialError> {
        Entry::new(self.service, self.user).map_err(CredentialError::Keyring)
    }

    pub fn store_api_key(&self, api_key: &str) -> Result<(), CredentialError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(CredentialError::EmptyKey);
        }
        self.entry()?
            .set_password(api_key)
            .map_err(CredentialError::Keyring)
    }

    /// Returns false when there was nothing to remove.
    pub fn remove_api_key(&self) -> Result<bool, CredentialError> {
        match self.entry()?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(CredentialError::Keyring(err)),
        }
    }
}

impl CredentialSource for KeyringCredentials {
    fn stored_api_key(&self) -> Result<Option<String>, CredentialError> {
        match self.entry()?.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(CredentialError::Keyring(err)),
        }
    }
}

/// Keyring first, then the environment. A keyring outage falls through to
/// the environment; any other keyring failure is reported.
pub fn resolve_api_key<S, F>(source: &S, env_lookup: F) -> Result<String, CredentialError>
where
    S: CredentialSource,
    F: Fn(&str) -> Option<String>,
{
    match source.stored_api_key() {
        Ok(Some(key)) if !key.trim().is_empty() => return Ok(key),
        Ok(_) => {}
        Err(CredentialError::Keyring(err)) if is_recoverable(&err) => {
            warn!(error = %err, "Keyring unavailable; falling back to environment");
        }
        Err(err) => return Err(err),
    }

    env_lookup(API_KEY_ENV)
        .filter(|key| !key.trim().is_empty())
        .ok_or(CredentialError::Missing)
}

pub fn resolve_api_key_from_env_and_keyring() -> Result<String, CredentialError> {
    resolve_api_key(&KeyringCredentials::new(), |name| std::env::var(name).ok())
}

pub fn interactive_auth() -> Result<(), CredentialError> {
    print!("Enter your OpenRouter API key: ");
    io::stdout().flush().map_err(CredentialError::Input)?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(CredentialError::Input)?;

    KeyringCredentials::new().store_api_key(&line)?;
    println!("✅ API key stored in the system keyring");
    Ok(())
}

pub fn interactive_deauth() -> Result<(), CredentialError> {
    if KeyringCredentials::new().remove_api_key()? {
        println!("✅ API key removed from the system keyring");
    } else {
        println!("No stored API key to remove");
    }
    Ok(())
}
