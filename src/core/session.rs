//! Conversation session state machine
//!
//! A session cycles `Idle -> Pending -> Idle` once per exchange. The user
//! message is appended before the provider is called and the reply (or the
//! fixed apology) only after the call settles, so history is never
//! interleaved. Hosts that keep an event loop running during the call use
//! [`ConversationSession::begin_exchange`] and
//! [`ConversationSession::complete_exchange`]; everyone else awaits
//! [`ConversationSession::submit`].

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest};
use crate::core::catalog::{ModelCatalog, ModelDescriptor};
use crate::core::message::{Message, Role};
use crate::core::preferences::{PreferenceError, PreferenceStore, SELECTED_MODEL_KEY};
use crate::core::provider::{CompletionProvider, ProviderError};

pub const APOLOGY_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Pending { exchange_id: u64 },
}

/// Why a submission was ignored. Never shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyInput,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Skipped(SkipReason),
    /// The provider answered; carries the appended reply.
    Replied(Message),
    /// The provider failed; carries the appended apology.
    Recovered(Message),
}

/// A provider call the host must run and report back through
/// [`ConversationSession::complete_exchange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub exchange_id: u64,
    pub payload: ChatRequest,
}

#[derive(Debug)]
pub enum SessionError {
    UnknownModel(String),
    /// The selection changed in memory but could not be remembered.
    Preference(PreferenceError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::UnknownModel(id) => write!(f, "Unknown model: {id}"),
            SessionError::Preference(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SessionError::UnknownModel(_) => None,
            SessionError::Preference(err) => Some(err),
        }
    }
}

pub struct ConversationSession<'a> {
    catalog: &'a ModelCatalog,
    preferences: &'a dyn PreferenceStore,
    provider: Arc<dyn CompletionProvider>,
    history: Vec<Message>,
    selected_model_id: String,
    state: SessionState,
    next_message_id: u64,
    next_exchange_id: u64,
}

impl<'a> ConversationSession<'a> {
    /// Open a session on the remembered model, or the catalog default when
    /// nothing usable is remembered.
    pub fn resume(
        catalog: &'a ModelCatalog,
        provider: Arc<dyn CompletionProvider>,
        preferences: &'a dyn PreferenceStore,
    ) -> Self {
        let selected = match preferences.get(SELECTED_MODEL_KEY) {
            Some(id) if catalog.contains(&id) => id,
            Some(id) => {
                warn!(model = %id, "Remembered model is no longer offered; using default");
                catalog.default_id().to_string()
            }
            None => catalog.default_id().to_string(),
        };
        Self::with_model(catalog, provider, preferences, selected)
    }

    /// Open a session bound to `model_id` and remember the choice.
    pub fn start(
        catalog: &'a ModelCatalog,
        provider: Arc<dyn CompletionProvider>,
        preferences: &'a dyn PreferenceStore,
        model_id: &str,
    ) -> Result<Self, SessionError> {
        if !catalog.contains(model_id) {
            return Err(SessionError::UnknownModel(model_id.to_string()));
        }
        let mut session =
            Self::with_model(catalog, provider, preferences, model_id.to_string());
        session.persist_selection()?;
        Ok(session)
    }

    fn with_model(
        catalog: &'a ModelCatalog,
        provider: Arc<dyn CompletionProvider>,
        preferences: &'a dyn PreferenceStore,
        selected_model_id: String,
    ) -> Self {
        Self {
            catalog,
            preferences,
            provider,
            history: Vec::new(),
            selected_model_id,
            state: SessionState::Idle,
            next_message_id: 1,
            next_exchange_id: 1,
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn selected_model_id(&self) -> &str {
        &self.selected_model_id
    }

    pub fn selected_model(&self) -> Option<&'a ModelDescriptor> {
        self.catalog.find(&self.selected_model_id)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, SessionState::Pending { .. })
    }

    pub fn provider(&self) -> Arc<dyn CompletionProvider> {
        Arc::clone(&self.provider)
    }

    /// Switch models for subsequent exchanges. Allowed while pending; the
    /// in-flight request keeps the model it was sent with.
    pub fn select_model(&mut self, model_id: &str) -> Result<(), SessionError> {
        if !self.catalog.contains(model_id) {
            return Err(SessionError::UnknownModel(model_id.to_string()));
        }
        self.selected_model_id = model_id.to_string();
        self.persist_selection()
    }

    fn persist_selection(&mut self) -> Result<(), SessionError> {
        self.preferences
            .set(SELECTED_MODEL_KEY, &self.selected_model_id)
            .map_err(SessionError::Preference)
    }

    fn push_message(&mut self, role: Role, content: impl Into<String>) -> &Message {
        let message = Message::new(self.next_message_id, role, content);
        self.next_message_id += 1;
        self.history.push(message);
        &self.history[self.history.len() - 1]
    }

    /// Append the user message, enter `Pending`, and build the request for
    /// the provider. Rejects blank input and concurrent submissions without
    /// touching state.
    pub fn begin_exchange(&mut self, text: &str) -> Result<ExchangeRequest, SkipReason> {
        if text.trim().is_empty() {
            return Err(SkipReason::EmptyInput);
        }
        if self.is_pending() {
            return Err(SkipReason::Busy);
        }

        self.push_message(Role::User, text);
        let exchange_id = self.next_exchange_id;
        self.next_exchange_id += 1;
        self.state = SessionState::Pending { exchange_id };

        let payload = ChatRequest {
            model: self.selected_model_id.clone(),
            messages: self.history.iter().map(Message::to_api_message).collect(),
        };
        debug!(
            exchange_id,
            model = %payload.model,
            messages = payload.messages.len(),
            "Exchange started"
        );

        Ok(ExchangeRequest {
            exchange_id,
            payload,
        })
    }

    /// Append the reply (or the apology on failure) and return to `Idle`.
    /// Results for any exchange other than the one in flight are dropped.
    pub fn complete_exchange(
        &mut self,
        exchange_id: u64,
        result: Result<ChatMessage, ProviderError>,
    ) -> Option<SubmitOutcome> {
        if self.state != (SessionState::Pending { exchange_id }) {
            debug!(exchange_id, "Ignoring result for an exchange that is not in flight");
            return None;
        }
        self.state = SessionState::Idle;

        let outcome = match result {
            Ok(reply) => {
                let message = self.push_message(Role::Assistant, reply.content).clone();
                debug!(exchange_id, reply_id = message.id(), "Exchange completed");
                SubmitOutcome::Replied(message)
            }
            Err(err) => {
                warn!(
                    exchange_id,
                    model = %self.selected_model_id,
                    error = %err,
                    "Completion request failed"
                );
                SubmitOutcome::Recovered(self.push_message(Role::Assistant, APOLOGY_MESSAGE).clone())
            }
        };
        Some(outcome)
    }

    /// Run one full exchange against the session's provider.
    pub async fn submit(&mut self, text: &str) -> SubmitOutcome {
        let request = match self.begin_exchange(text) {
            Ok(request) => request,
            Err(reason) => return SubmitOutcome::Skipped(reason),
        };

        let provider = self.provider();
        let mut guard = PendingGuard {
            session: self,
            exchange_id: request.exchange_id,
        };
        let result = provider.complete(&request.payload).await;
        guard
            .session
            .complete_exchange(guard.exchange_id, result)
            .unwrap_or(SubmitOutcome::Skipped(SkipReason::Busy))
    }
}

/// Settles the exchange with the apology if `submit` is dropped while the
/// provider call is still outstanding.
struct PendingGuard<'s, 'a> {
    session: &'s mut ConversationSession<'a>,
    exchange_id: u64,
}

impl Drop for PendingGuard<'_, '_> {
    fn drop(&mut self) {
        if self.session.state == (SessionState::Pending { exchange_id: self.exchange_id }) {
            self.session.complete_exchange(
                self.exchange_id,
                Err(ProviderError::Interrupted(
                    "exchange dropped before the provider answered".to_string(),
                )),
            );
        }
    }
}
