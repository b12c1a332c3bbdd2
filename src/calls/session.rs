//! # Call Session Records
//!
//! Data types for one coached call and the process-wide records produced when
//! calls end. A session moves through two states only:
//!
//! 1. **Active**: created by start-call, receives transcript fragments and analyses
//! 2. **Ended**: terminal, set once by end-call and never reverted
//!
//! Nothing here enforces the state machine on ingestion or analysis: a session
//! that has ended still accepts fragments and can still be analyzed.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Lifecycle status of a call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Active,
    Ended,
}

/// One pulse reading produced by the AI gateway.
///
/// `pulse` is expected to be one of Comfortable, Neutral or Stressed, but only the
/// prompt asks for that; whatever label the model returns is kept as-is. The same
/// goes for `confidence`, which has no enforced range. Models sometimes quote the
/// number (`"0.8"`); that is read as the number it spells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub pulse: String,
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub confidence: f64,
    pub suggestion: String,
}

fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Confidence {
        Number(f64),
        Text(String),
    }

    match Confidence::deserialize(deserializer)? {
        Confidence::Number(value) => Ok(value),
        Confidence::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("confidence {:?} is not a number", text))),
    }
}

/// Free-text end-of-call summary.
pub type CallSummary = String;

/// A follow-up recorded when a call ends with the "rescheduled" disposition.
///
/// Date and time are the caller's strings, stored unvalidated and unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduledCall {
    pub call_id: String,
    pub date: Option<String>,
    pub time: Option<String>,
}

/// Server-side record of a single call.
#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: String,
    pub started_at: DateTime<Utc>,
    /// Transcript fragments in arrival order; never reordered or deduplicated.
    pub transcripts: Vec<String>,
    /// Append-only history of pulse readings.
    pub analysis_history: Vec<AnalysisResult>,
    pub status: CallStatus,
    pub ended_at: Option<DateTime<Utc>>,
    pub disposition: Option<String>,
    pub notes: Option<String>,
}

impl CallSession {
    /// Fresh active session with no fragments and no analyses.
    pub fn new(call_id: String) -> Self {
        Self {
            call_id,
            started_at: Utc::now(),
            transcripts: Vec::new(),
            analysis_history: Vec::new(),
            status: CallStatus::Active,
            ended_at: None,
            disposition: None,
            notes: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CallStatus::Active
    }

    /// Move to `Ended`. Returns `true` only for the first transition; later calls
    /// leave status, end time and disposition untouched.
    pub fn end(&mut self, disposition: String, notes: Option<String>) -> bool {
        if !self.is_active() {
            return false;
        }

        self.status = CallStatus::Ended;
        self.ended_at = Some(Utc::now());
        self.disposition = Some(disposition);
        self.notes = notes;
        true
    }

    /// Serializable view used by the inspection endpoint.
    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            call_id: self.call_id.clone(),
            status: self.status,
            started_at: self.started_at,
            ended_at: self.ended_at,
            disposition: self.disposition.clone(),
            notes: self.notes.clone(),
            fragment_count: self.transcripts.len(),
            transcript: super::transcript::flatten(self),
            analysis_history: self.analysis_history.clone(),
        }
    }
}

/// Read-only view of a session returned by `GET /calls/{call_id}`.
#[derive(Debug, Clone, Serialize)]
pub struct CallSnapshot {
    pub call_id: String,
    pub status: CallStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub disposition: Option<String>,
    pub notes: Option<String>,
    pub fragment_count: usize,
    pub transcript: String,
    pub analysis_history: Vec<AnalysisResult>,
}
