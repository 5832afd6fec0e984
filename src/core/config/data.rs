use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_REFERER: &str = "https://github.com/palaver-chat/palaver";
pub const DEFAULT_TITLE: &str = "palaver";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Model id remembered from the last selection
    pub selected_model: Option<String>,
    /// Completions API base URL (defaults to OpenRouter)
    pub base_url: Option<String>,
    /// Value sent as the `HTTP-Referer` header
    pub referer: Option<String>,
    /// Value sent as the `X-Title` header
    pub title: Option<String>,
    /// Whole-request timeout for completion calls; unset means no timeout
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn referer(&self) -> &str {
        self.referer.as_deref().unwrap_or(DEFAULT_REFERER)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn print_all(&self) {
        println!("Current configuration:");
        let show = |key: &str, value: Option<&str>| match value {
            Some(value) => println!("  {key}: {value}"),
            None => println!("  {key}: (unset)"),
        };
        show("selected-model", self.selected_model.as_deref());
        show("base-url", self.base_url.as_deref());
        show("referer", self.referer.as_deref());
        show("title", self.title.as_deref());
        match self.request_timeout_secs {
            Some(secs) => println!("  request-timeout: {secs}s"),
            None => println!("  request-timeout: (unset)"),
        }
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
