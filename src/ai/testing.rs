//! Scripted completion service for tests.

use crate::ai::client::CompletionService;
use crate::ai::gateway::GatewayError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays queued replies in order and records every `(prompt, temperature)`.
/// Once the script runs out it answers with `fallback`.
pub struct ScriptedCompletions {
    replies: Mutex<VecDeque<Result<String, GatewayError>>>,
    calls: Mutex<Vec<(String, f32)>>,
    fallback: String,
}

impl ScriptedCompletions {
    pub fn new(replies: Vec<Result<String, GatewayError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
            fallback: r#"{"pulse":"Neutral","confidence":0.5,"suggestion":"Keep listening"}"#
                .to_string(),
        }
    }

    /// Always answers with the same text.
    pub fn always(reply: &str) -> Self {
        let mut scripted = Self::new(Vec::new());
        scripted.fallback = reply.to_string();
        scripted
    }

    pub fn calls(&self) -> Vec<(String, f32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletions {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), temperature));

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
