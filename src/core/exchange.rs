use std::sync::Arc;
use tokio::sync::mpsc;

use crate::api::ChatMessage;
use crate::core::provider::{CompletionProvider, ProviderError};
use crate::core::session::ExchangeRequest;

/// The settled result of one dispatched provider call.
#[derive(Debug)]
pub struct ExchangeEvent {
    pub exchange_id: u64,
    pub outcome: Result<ChatMessage, ProviderError>,
}

/// Runs provider calls off the host's event loop and reports each result on
/// a channel, so the loop can keep reading input while a call is in flight.
#[derive(Clone)]
pub struct ExchangeService {
    tx: mpsc::UnboundedSender<ExchangeEvent>,
}

impl ExchangeService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExchangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Spawn the call. Exactly one event is sent per dispatch, even when the
    /// provider task panics.
    pub fn dispatch(&self, provider: Arc<dyn CompletionProvider>, request: ExchangeRequest) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let ExchangeRequest {
                exchange_id,
                payload,
            } = request;
            let call = tokio::spawn(async move { provider.complete(&payload).await });
            let outcome = match call.await {
                Ok(result) => result,
                Err(err) => Err(ProviderError::Interrupted(err.to_string())),
            };
            let _ = tx.send(ExchangeEvent {
                exchange_id,
                outcome,
            });
        });
    }
}
