//! One-shot "say" command

use std::error::Error;
use std::io::{self, Write};

use crate::cli::connect_provider;
use crate::core::catalog::ModelCatalog;
use crate::core::config::Config;
use crate::core::preferences::{ConfigPreferenceStore, MemoryPreferenceStore, PreferenceStore};
use crate::core::session::{ConversationSession, SessionError, SkipReason, SubmitOutcome};

pub async fn run_say(prompt: Vec<String>, model: Option<String>) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: palaver say <prompt>");
        std::process::exit(1);
    }

    let config = Config::load()?;
    let catalog = ModelCatalog::builtin();
    let provider = connect_provider(&config)?;

    // An explicit -m applies to this prompt only and is not remembered.
    let ephemeral;
    let remembered;
    let mut session = match model {
        Some(model) => {
            let Some(descriptor) = catalog.resolve_choice(&model) else {
                eprintln!("❌ {}", SessionError::UnknownModel(model));
                eprintln!("Run `palaver models` to see the catalog.");
                std::process::exit(1);
            };
            ephemeral = MemoryPreferenceStore::new();
            let store: &dyn PreferenceStore = &ephemeral;
            ConversationSession::start(catalog, provider, store, &descriptor.id)?
        }
        None => {
            remembered = ConfigPreferenceStore::global()?;
            ConversationSession::resume(catalog, provider, &remembered)
        }
    };

    match session.submit(&prompt).await {
        SubmitOutcome::Replied(message) => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", message.content())?;
            stdout.flush()?;
            Ok(())
        }
        SubmitOutcome::Recovered(message) => {
            eprintln!("{}", message.content());
            std::process::exit(1);
        }
        SubmitOutcome::Skipped(SkipReason::EmptyInput | SkipReason::Busy) => {
            eprintln!("Usage: palaver say <prompt>");
            std::process::exit(1);
        }
    }
}
