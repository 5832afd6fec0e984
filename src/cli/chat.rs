//! Line-oriented chat host
//!
//! Shows the model picker, then runs one conversation session per pick on a
//! single event loop that multiplexes terminal input with exchange results.
//! `/back` discards the session and its history and returns to the picker.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::core::catalog::ModelCatalog;
use crate::core::exchange::ExchangeService;
use crate::core::message::Message;
use crate::core::preferences::{PreferenceStore, SELECTED_MODEL_KEY};
use crate::core::provider::CompletionProvider;
use crate::core::session::{ConversationSession, SessionError, SkipReason, SubmitOutcome};
use crate::utils::logging::LoggingState;

const HELP_TEXT: &str = "\
Commands:
  /models           List the available models
  /model <n|id>     Switch model for the next message
  /back             Leave this conversation and pick another model
  /log [file]       Start a transcript, or pause/resume the current one
  /help             Show this help
  /quit             Exit";

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ChatCommand<'a> {
    Help,
    Models,
    Model(&'a str),
    Back,
    Log(Option<&'a str>),
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ChatInput<'a> {
    Command(ChatCommand<'a>),
    Text(&'a str),
}

/// Lines starting with a known `/command` are commands; everything else,
/// including unknown slash words, is sent as a message.
pub(crate) fn parse_input(line: &str) -> ChatInput<'_> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return ChatInput::Text(line);
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let command = match name {
        "help" => ChatCommand::Help,
        "models" => ChatCommand::Models,
        "model" => ChatCommand::Model(arg),
        "back" => ChatCommand::Back,
        "log" => ChatCommand::Log((!arg.is_empty()).then_some(arg)),
        "quit" | "exit" => ChatCommand::Quit,
        _ => return ChatInput::Text(line),
    };
    ChatInput::Command(command)
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SessionExit {
    Back,
    Quit,
}

pub(crate) struct ChatHost<'a, R, W> {
    pub catalog: &'a ModelCatalog,
    pub provider: Arc<dyn CompletionProvider>,
    pub preferences: &'a dyn PreferenceStore,
    pub lines: Lines<R>,
    pub out: W,
    pub logging: LoggingState,
}

impl<'a, R, W> ChatHost<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    /// Alternate between the picker and chat sessions until the user quits
    /// or input ends.
    pub async fn run(&mut self, mut preselected: Option<String>) -> Result<(), Box<dyn Error>> {
        loop {
            let model_id = match preselected.take() {
                Some(id) => id,
                None => match self.pick_model().await? {
                    Some(id) => id,
                    None => return Ok(()),
                },
            };

            let session = match ConversationSession::start(
                self.catalog,
                Arc::clone(&self.provider),
                self.preferences,
                &model_id,
            ) {
                Ok(session) => session,
                Err(err @ SessionError::UnknownModel(_)) => {
                    writeln!(self.out, "❌ {err}")?;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if self.converse(session).await? == SessionExit::Quit {
                return Ok(());
            }
        }
    }

    fn remembered_model(&self) -> &'a str {
        let catalog = self.catalog;
        self.preferences
            .get(SELECTED_MODEL_KEY)
            .and_then(|id| catalog.find(&id))
            .map(|model| model.id.as_str())
            .unwrap_or_else(|| catalog.default_id())
    }

    fn print_models(&mut self, current: &str) -> std::io::Result<()> {
        for (index, model) in self.catalog.list().iter().enumerate() {
            let marker = if model.id == current { "*" } else { " " };
            writeln!(
                self.out,
                "{marker} {}. {} ({}) · {}",
                index + 1,
                model.display_name,
                model.vendor,
                model.description
            )?;
        }
        Ok(())
    }

    async fn pick_model(&mut self) -> Result<Option<String>, Box<dyn Error>> {
        let remembered = self.remembered_model();
        writeln!(self.out, "Choose your AI companion:")?;
        self.print_models(remembered)?;

        loop {
            write!(
                self.out,
                "Select a model [1-{}, Enter for {}]: ",
                self.catalog.list().len(),
                remembered
            )?;
            self.out.flush()?;

            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            let choice = line.trim();
            if choice.is_empty() {
                return Ok(Some(remembered.to_string()));
            }
            if matches!(choice, "q" | "/quit" | "/exit") {
                return Ok(None);
            }
            match self.catalog.resolve_choice(choice) {
                Some(model) => return Ok(Some(model.id.clone())),
                None => writeln!(self.out, "Unknown choice: {choice}")?,
            }
        }
    }

    fn record(&mut self, message: &Message) {
        if let Err(err) = self.logging.log_message(message) {
            tracing::warn!(error = %err, "Failed to write transcript");
        }
    }

    async fn converse(
        &mut self,
        mut session: ConversationSession<'a>,
    ) -> Result<SessionExit, Box<dyn Error>> {
        let (service, mut events) = ExchangeService::new();
        let mut input_open = true;

        if let Some(model) = session.selected_model() {
            writeln!(
                self.out,
                "💬 Chatting with {} ({}). Type /help for commands.",
                model.display_name, model.id
            )?;
        }

        loop {
            tokio::select! {
                line = self.lines.next_line(), if input_open => {
                    let Some(line) = line? else {
                        input_open = false;
                        if session.is_pending() {
                            continue;
                        }
                        return Ok(SessionExit::Quit);
                    };

                    match parse_input(&line) {
                        ChatInput::Command(command) => {
                            if let Some(exit) = self.handle_command(&mut session, command)? {
                                return Ok(exit);
                            }
                        }
                        ChatInput::Text(text) => match session.begin_exchange(text) {
                            Ok(request) => {
                                if let Some(user_message) = session.history().last().cloned() {
                                    self.record(&user_message);
                                }
                                service.dispatch(session.provider(), request);
                            }
                            Err(SkipReason::Busy) => {
                                writeln!(self.out, "⏳ Waiting for the current reply; message not sent.")?;
                            }
                            Err(SkipReason::EmptyInput) => {}
                        },
                    }
                }
                Some(event) = events.recv() => {
                    let outcome = session.complete_exchange(event.exchange_id, event.outcome);
                    if let Some(SubmitOutcome::Replied(message) | SubmitOutcome::Recovered(message)) = outcome {
                        writeln!(self.out, "{}\n", message.content())?;
                        self.out.flush()?;
                        self.record(&message);
                    }
                    if !input_open && !session.is_pending() {
                        return Ok(SessionExit::Quit);
                    }
                }
            }
        }
    }

    fn handle_command(
        &mut self,
        session: &mut ConversationSession<'a>,
        command: ChatCommand<'_>,
    ) -> Result<Option<SessionExit>, Box<dyn Error>> {
        match command {
            ChatCommand::Help => writeln!(self.out, "{HELP_TEXT}")?,
            ChatCommand::Models => {
                let current = session.selected_model_id().to_string();
                self.print_models(&current)?;
            }
            ChatCommand::Model("") => writeln!(
                self.out,
                "Current model: {}. Usage: /model <number|id>",
                session.selected_model_id()
            )?,
            ChatCommand::Model(choice) => {
                let resolved = self.catalog.resolve_choice(choice).map(|m| m.id.clone());
                let result = match resolved {
                    Some(id) => session.select_model(&id),
                    None => Err(SessionError::UnknownModel(choice.to_string())),
                };
                match result {
                    Ok(()) => writeln!(self.out, "✅ Now using {}", session.selected_model_id())?,
                    Err(err @ SessionError::UnknownModel(_)) => writeln!(self.out, "❌ {err}")?,
                    Err(err) => {
                        tracing::warn!(error = %err, "Model selection not remembered");
                        writeln!(
                            self.out,
                            "⚠️  Now using {}, but the choice could not be saved: {err}",
                            session.selected_model_id()
                        )?;
                    }
                }
            }
            ChatCommand::Back => return Ok(Some(SessionExit::Back)),
            ChatCommand::Log(Some(path)) => {
                match self.logging.set_log_file(PathBuf::from(path)) {
                    Ok(status) => writeln!(self.out, "{status}")?,
                    Err(err) => writeln!(self.out, "❌ Cannot log to {path}: {err}")?,
                }
            }
            ChatCommand::Log(None) => match self.logging.toggle_logging() {
                Ok(status) | Err(status) => writeln!(self.out, "{status}")?,
            },
            ChatCommand::Quit => return Ok(Some(SessionExit::Quit)),
        }
        Ok(None)
    }
}

impl<'a, W: Write> ChatHost<'a, BufReader<tokio::io::Stdin>, W> {
    pub fn with_stdin(
        catalog: &'a ModelCatalog,
        provider: Arc<dyn CompletionProvider>,
        preferences: &'a dyn PreferenceStore,
        out: W,
        logging: LoggingState,
    ) -> Self {
        Self {
            catalog,
            provider,
            preferences,
            lines: BufReader::new(tokio::io::stdin()).lines(),
            out,
            logging,
        }
    }
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
