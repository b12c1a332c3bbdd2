//! Fixed prompt templates sent to the completion service.
//!
//! The transcript is embedded verbatim; nothing is escaped or truncated.

/// Real-time pulse and suggestion prompt. The model is asked to answer with a
/// JSON object holding `pulse`, `confidence` and `suggestion`.
pub fn analysis_prompt(transcript: &str) -> String {
    format!(
        r#"
You are an AI sales coach.

Based on the conversation below, classify:
1. Emotional state (Comfortable, Neutral, Stressed)
2. Give ONE short silent coaching suggestion

Conversation:
{transcript}

Return JSON:
{{
  "pulse": "",
  "confidence": 0.0,
  "suggestion": ""
}}
"#
    )
}

/// End-of-call summary prompt. The answer is free text.
pub fn summary_prompt(transcript: &str) -> String {
    format!(
        r#"
Summarize this sales call for internal review.
Highlight:
- Outcome
- Objections
- Improvement areas

Conversation:
{transcript}
"#
    )
}
