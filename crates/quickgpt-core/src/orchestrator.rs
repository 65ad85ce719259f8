//! Runs one completion request at a time off the interaction thread.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinHandle;

use crate::ai::CompletionClient;
use crate::error::{Error, Result};
use crate::state::ChatTurn;

/// Most recent turns sent with each request; the persona is extra
pub const UPSTREAM_WINDOW: usize = 20;

pub const PERSONA: &str = "You are a concise, helpful assistant. Your name is QuickGPT. \
Avoid typing long paragraphs in one go. Quick, concise sentences are best.";

/// Stateless across calls; the controller makes sure only one handle is
/// outstanding.
#[derive(Clone)]
pub struct RequestOrchestrator {
    client: Arc<dyn CompletionClient>,
}

impl RequestOrchestrator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub fn start(&self, turns: &[ChatTurn], model: &str) -> RequestHandle {
        let messages = upstream_messages(turns);
        let client = self.client.clone();
        let model = model.to_string();
        let (tx, rx) = oneshot::channel();

        tracing::debug!(model = %model, turns = messages.len(), "starting completion request");
        let task = tokio::spawn(async move {
            let result = client.complete(&model, &messages).await;
            let _ = tx.send(result);
        });

        RequestHandle { rx, task }
    }
}

/// Persona first, then the trailing window of the conversation
pub fn upstream_messages(turns: &[ChatTurn]) -> Vec<ChatTurn> {
    let start = turns.len().saturating_sub(UPSTREAM_WINDOW);
    std::iter::once(ChatTurn::system(PERSONA))
        .chain(turns[start..].iter().cloned())
        .collect()
}

/// The single in-flight request. Dropping it releases the background task.
pub struct RequestHandle {
    rx: oneshot::Receiver<Result<String>>,
    task: JoinHandle<()>,
}

impl RequestHandle {
    /// Non-blocking check, called from the interaction loop
    pub fn try_finish(&mut self) -> Option<Result<String>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(lost_task())),
        }
    }

    pub async fn finish(&mut self) -> Result<String> {
        (&mut self.rx).await.unwrap_or_else(|_| Err(lost_task()))
    }
}

impl Drop for RequestHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lost_task() -> Error {
    Error::Network("request ended without a result".to_string())
}
