pub mod openai;

pub use openai::OpenAIClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::state::ChatTurn;

/// A remote text-completion service
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the full message list and return the first reply's text
    async fn complete(&self, model: &str, messages: &[ChatTurn]) -> Result<String>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// Replays queued replies and records every call it receives
    #[derive(Default)]
    pub(crate) struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String>>>,
        pub calls: Mutex<Vec<(String, Vec<ChatTurn>)>>,
        in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        gate: Option<Semaphore>,
    }

    impl ScriptedClient {
        pub fn replying(replies: Vec<Result<String>>) -> Self {
            Self { replies: Mutex::new(replies.into()), ..Self::default() }
        }

        /// Replies are held back until `release` is called
        pub fn gated(replies: Vec<Result<String>>) -> Self {
            Self { gate: Some(Semaphore::new(0)), ..Self::replying(replies) }
        }

        pub fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, model: &str, messages: &[ChatTurn]) -> Result<String> {
            self.calls.lock().unwrap().push((model.to_string(), messages.to_vec()));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let next = self.replies.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok("ok".to_string()))
        }
    }
}
