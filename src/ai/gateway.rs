//! # AI Gateway
//!
//! Turns a flattened transcript into either a pulse reading or a call summary by
//! way of a [`CompletionService`].
//!
//! The completion text is untrusted input. Every way the exchange can go wrong
//! comes back as a [`GatewayError`] variant so callers can tell an unreachable
//! provider from a reply that is not the JSON we asked for.

use crate::ai::client::CompletionService;
use crate::ai::prompts;
use crate::calls::session::{AnalysisResult, CallSummary};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// Network-level failure reaching the provider.
    #[error("completion service unreachable: {0}")]
    Transport(String),

    /// Provider answered with a non-success status.
    #[error("completion service returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("completion service returned no content")]
    EmptyCompletion,

    /// Reply could not be parsed into the expected structure.
    #[error("malformed completion: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// `true` when the provider answered but the content was unusable.
    pub fn is_malformed(&self) -> bool {
        matches!(self, GatewayError::Malformed(_) | GatewayError::EmptyCompletion)
    }
}

#[async_trait]
pub trait AiGateway: Send + Sync {
    async fn analyze(&self, transcript: &str) -> Result<AnalysisResult, GatewayError>;

    async fn summarize(&self, transcript: &str) -> Result<CallSummary, GatewayError>;

    fn model(&self) -> &str;
}

/// Gateway that formats the fixed coaching prompts and parses the replies.
pub struct CoachingGateway {
    completions: Arc<dyn CompletionService>,
    analysis_temperature: f32,
    summary_temperature: f32,
}

impl CoachingGateway {
    pub fn new(
        completions: Arc<dyn CompletionService>,
        analysis_temperature: f32,
        summary_temperature: f32,
    ) -> Self {
        Self {
            completions,
            analysis_temperature,
            summary_temperature,
        }
    }
}

#[async_trait]
impl AiGateway for CoachingGateway {
    async fn analyze(&self, transcript: &str) -> Result<AnalysisResult, GatewayError> {
        let prompt = prompts::analysis_prompt(transcript);
        let reply = self
            .completions
            .complete(&prompt, self.analysis_temperature)
            .await?;
        parse_analysis(&reply)
    }

    async fn summarize(&self, transcript: &str) -> Result<CallSummary, GatewayError> {
        let prompt = prompts::summary_prompt(transcript);
        self.completions
            .complete(&prompt, self.summary_temperature)
            .await
    }

    fn model(&self) -> &str {
        self.completions.model()
    }
}

/// Parse a completion as a JSON object carrying `pulse`, `confidence` and
/// `suggestion`. Surrounding whitespace is ignored, extra fields are ignored,
/// a quoted numeric `confidence` is accepted, a missing field or any non-JSON
/// text is an error.
pub fn parse_analysis(reply: &str) -> Result<AnalysisResult, GatewayError> {
    serde_json::from_str(reply.trim()).map_err(|e| GatewayError::Malformed(e.to_string()))
}
