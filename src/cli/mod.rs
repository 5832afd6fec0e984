//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod model_list;
pub mod say;
pub mod settings;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::auth::{interactive_auth, interactive_deauth, resolve_api_key_from_env_and_keyring};
use crate::cli::chat::ChatHost;
use crate::cli::model_list::list_models;
use crate::cli::say::run_say;
use crate::cli::settings::{apply_setting, unset_setting};
use crate::core::catalog::ModelCatalog;
use crate::core::config::Config;
use crate::core::preferences::ConfigPreferenceStore;
use crate::core::provider::{CompletionProvider, HttpCompletionProvider, ProviderSettings};
use crate::utils::logging::LoggingState;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_FILTER_ENV: &str = "PALAVER_LOG";

#[derive(Parser)]
#[command(name = "palaver")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("VERGEN_GIT_DESCRIBE"), ")"))]
#[command(about = "Chat with a curated set of hosted language models")]
#[command(
    long_about = "Palaver is a line-oriented terminal chat client. Pick a model from the \
built-in catalog, then talk to it; your last choice is remembered between runs.\n\n\
Authentication:\n\
  Use 'palaver auth' to store an OpenRouter API key in your system keyring.\n\n\
Environment Variables:\n\
  OPENROUTER_API_KEY   API key used when the keyring holds none\n\
  PALAVER_LOG          Diagnostic log filter (e.g. 'palaver=debug')\n\n\
Chat commands:\n\
  /models           List the available models\n\
  /model <n|id>     Switch model for the next message\n\
  /back             Return to the model picker\n\
  /log <filename>   Enable logging to specified file\n\
  /log              Toggle logging pause/resume\n\
  /quit             Exit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use for chat, or list available models if no model specified
    #[arg(short = 'm', long, global = true, value_name = "MODEL", num_args = 0..=1, default_missing_value = "")]
    pub model: Option<String>,

    /// Enable logging to specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print diagnostic logs to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store an API key in the system keyring
    Auth,
    /// Remove the stored API key
    Deauth,
    /// Start the chat interface (default)
    Chat,
    /// List the available models
    Models,
    /// Send a single prompt and print the reply
    Say {
        /// Prompt text
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Option<Vec<String>>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "palaver=debug" } else { "warn" })
    });
    // A subscriber may already be installed when running under a test harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Resolve credentials and build the HTTP provider, exiting with a hint when
/// no key is configured.
pub(crate) fn connect_provider(
    config: &Config,
) -> Result<Arc<dyn CompletionProvider>, Box<dyn Error>> {
    let api_key = match resolve_api_key_from_env_and_keyring() {
        Ok(key) => key,
        Err(err) => {
            eprintln!("❌ {err}");
            let fixes = err.quick_fixes();
            if !fixes.is_empty() {
                eprintln!();
                eprintln!("💡 Quick fixes:");
                for fix in fixes {
                    eprintln!("  • {fix}");
                }
            }
            std::process::exit(err.exit_code());
        }
    };
    let provider = HttpCompletionProvider::new(ProviderSettings::from_config(config, api_key))?;
    Ok(Arc::new(provider))
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    // A bare -m lists models instead of starting a chat.
    if args.model.as_deref() == Some("") {
        return list_models();
    }

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Auth => {
            if let Err(e) = interactive_auth() {
                eprintln!("❌ Authentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Deauth => {
            if let Err(e) = interactive_deauth() {
                eprintln!("❌ Deauthentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Models => list_models(),
        Commands::Say { prompt } => run_say(prompt, args.model).await,
        Commands::Set { key, value } => {
            let (Some(key), Some(value)) = (key, value.filter(|v| !v.is_empty())) else {
                Config::load()?.print_all();
                return Ok(());
            };
            let value = value.join(" ");
            let catalog = ModelCatalog::builtin();
            let result: Result<String, Box<dyn Error>> = Config::mutate(|config| {
                apply_setting(config, catalog, &key, &value).map_err(Into::into)
            });
            match result {
                Ok(status) => println!("✅ {status}"),
                Err(e) => {
                    eprintln!("❌ {e}");
                    std::process::exit(1);
                }
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let result: Result<String, Box<dyn Error>> =
                Config::mutate(|config| unset_setting(config, &key).map_err(Into::into));
            match result {
                Ok(status) => println!("✅ {status}"),
                Err(e) => {
                    eprintln!("❌ {e}");
                    std::process::exit(1);
                }
            }
            Ok(())
        }
        Commands::Chat => run_chat(args.model, args.log).await,
    }
}

async fn run_chat(model: Option<String>, log: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let catalog = ModelCatalog::builtin();
    let preselected = match model {
        Some(choice) => match catalog.resolve_choice(&choice) {
            Some(descriptor) => Some(descriptor.id.clone()),
            None => {
                eprintln!("❌ Unknown model: {choice}");
                eprintln!("Run `palaver models` to see the catalog.");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let config = Config::load()?;
    let provider = connect_provider(&config)?;
    let preferences = ConfigPreferenceStore::global()?;
    let logging = LoggingState::new(log)?;

    let mut host =
        ChatHost::with_stdin(catalog, provider, &preferences, std::io::stdout(), logging);
    host.run(preselected).await
}
