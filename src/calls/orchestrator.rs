//! # Call Orchestrator
//!
//! Sequences the call lifecycle over the session store, the AI gateway and the
//! call ledger:
//!
//! ```text
//! start ──► ingest* ──► analyze* ──► end
//!   │          ▲           ▲          │
//!   └──────────┴───────────┴──────────┘  (ingest and analyze keep working after end)
//! ```
//!
//! Only `end` changes state. Ingest and analyze are accepted for ended calls too;
//! late fragments are kept the same as any other fragment.

use crate::ai::gateway::{AiGateway, GatewayError};
use crate::calls::ledger::CallLedger;
use crate::calls::session::{AnalysisResult, CallSnapshot, CallSummary, RescheduledCall};
use crate::calls::store::{SessionStore, StoreError};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

/// Disposition that files a follow-up in the rescheduled list.
pub const RESCHEDULED_DISPOSITION: &str = "rescheduled";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error("invalid call id: {0}")]
    InvalidCallId(String),

    #[error("call id {0} already exists")]
    DuplicateCallId(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<StoreError> for CallError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CallError::InvalidCallId(id),
            StoreError::AlreadyExists(id) => CallError::DuplicateCallId(id),
        }
    }
}

/// End-of-call request as posted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct EndCall {
    pub call_id: String,
    pub disposition: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reschedule_date: Option<String>,
    #[serde(default)]
    pub reschedule_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndOutcome {
    pub summary: CallSummary,
    /// `false` when the call had already been ended before this request.
    pub newly_ended: bool,
    pub rescheduled: Option<RescheduledCall>,
}

#[derive(Clone)]
pub struct CallOrchestrator {
    store: Arc<dyn SessionStore>,
    gateway: Arc<dyn AiGateway>,
    ledger: Arc<CallLedger>,
}

impl CallOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        gateway: Arc<dyn AiGateway>,
        ledger: Arc<CallLedger>,
    ) -> Self {
        Self {
            store,
            gateway,
            ledger,
        }
    }

    pub fn ledger(&self) -> &CallLedger {
        &self.ledger
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    pub fn model(&self) -> &str {
        self.gateway.model()
    }

    /// Open a session. `requested_id` lets the caller pick the identifier.
    pub fn start(&self, requested_id: Option<String>) -> Result<String, CallError> {
        let call_id = self.store.create(requested_id)?;
        info!(call_id = %call_id, "Call started");
        Ok(call_id)
    }

    /// Append one transcript fragment, returning the session's fragment count.
    pub fn ingest(&self, call_id: &str, text: String) -> Result<usize, CallError> {
        let chars = text.chars().count();
        let fragments = self.store.append_fragment(call_id, text).map_err(|e| {
            error!(call_id = %call_id, "Transcript received for invalid call id");
            CallError::from(e)
        })?;

        info!(call_id = %call_id, chars, fragments, "Transcript received");
        Ok(fragments)
    }

    /// Analyze the transcript as it stands and append the result to the history.
    ///
    /// Fragments that arrive while the AI call is in flight are not part of this
    /// analysis. A failed analysis leaves the history untouched.
    pub async fn analyze(&self, call_id: &str) -> Result<AnalysisResult, CallError> {
        let transcript = self.store.transcript(call_id).map_err(|e| {
            error!(call_id = %call_id, "Analyze requested for invalid call id");
            CallError::from(e)
        })?;
        info!(call_id = %call_id, transcript_len = transcript.len(), "Analyzing call");

        let analysis = self.gateway.analyze(&transcript).await.map_err(|e| {
            error!(call_id = %call_id, error = %e, "Analysis failed");
            CallError::from(e)
        })?;

        self.store.record_analysis(call_id, analysis.clone())?;
        info!(
            call_id = %call_id,
            pulse = %analysis.pulse,
            confidence = analysis.confidence,
            "Pulse recorded"
        );
        Ok(analysis)
    }

    /// Summarize and close the call.
    ///
    /// Exactly one summary is appended per successful request, and one
    /// rescheduled entry when the disposition is [`RESCHEDULED_DISPOSITION`]. If
    /// summarization fails nothing is recorded and the call stays as it was.
    pub async fn end(&self, request: EndCall) -> Result<EndOutcome, CallError> {
        let EndCall {
            call_id,
            disposition,
            notes,
            reschedule_date,
            reschedule_time,
        } = request;

        let transcript = self.store.transcript(&call_id).map_err(|e| {
            error!(call_id = %call_id, "End call for invalid call id");
            CallError::from(e)
        })?;
        info!(call_id = %call_id, disposition = %disposition, "Ending call");

        let summary = self.gateway.summarize(&transcript).await.map_err(|e| {
            error!(call_id = %call_id, error = %e, "Summary failed");
            CallError::from(e)
        })?;
        self.ledger.push_summary(summary.clone());

        let rescheduled = if disposition == RESCHEDULED_DISPOSITION {
            let entry = RescheduledCall {
                call_id: call_id.clone(),
                date: reschedule_date,
                time: reschedule_time,
            };
            info!(
                call_id = %call_id,
                date = ?entry.date,
                time = ?entry.time,
                "Call rescheduled"
            );
            self.ledger.push_rescheduled(entry.clone());
            Some(entry)
        } else {
            None
        };

        let newly_ended = self.store.mark_ended(&call_id, disposition, notes)?;
        info!(call_id = %call_id, newly_ended, "Call ended");

        Ok(EndOutcome {
            summary,
            newly_ended,
            rescheduled,
        })
    }

    pub fn snapshot(&self, call_id: &str) -> Result<CallSnapshot, CallError> {
        Ok(self.store.get(call_id)?.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::gateway::CoachingGateway;
    use crate::ai::testing::ScriptedCompletions;
    use crate::calls::session::CallStatus;
    use crate::calls::store::InMemorySessionStore;

    fn orchestrator_with(completions: ScriptedCompletions) -> (CallOrchestrator, Arc<ScriptedCompletions>) {
        let completions = Arc::new(completions);
        let gateway = Arc::new(CoachingGateway::new(completions.clone(), 0.4, 0.3));
        let orchestrator = CallOrchestrator::new(
            Arc::new(InMemorySessionStore::new()),
            gateway,
            Arc::new(CallLedger::new()),
        );
        (orchestrator, completions)
    }

    fn end_request(call_id: &str, disposition: &str) -> EndCall {
        EndCall {
            call_id: call_id.to_string(),
            disposition: disposition.to_string(),
            notes: None,
            reschedule_date: None,
            reschedule_time: None,
        }
    }

    #[tokio::test]
    async fn test_completed_call_scenario() {
        let (orchestrator, completions) =
            orchestrator_with(ScriptedCompletions::always("Outcome: demo booked."));

        let call_id = orchestrator.start(None).unwrap();
        orchestrator.ingest(&call_id, "Hello".to_string()).unwrap();
        orchestrator.ingest(&call_id, "there".to_string()).unwrap();
        assert_eq!(orchestrator.store().transcript(&call_id).unwrap(), "Hello there");

        let outcome = orchestrator.end(end_request(&call_id, "completed")).await.unwrap();

        assert_eq!(outcome.summary, "Outcome: demo booked.");
        assert!(outcome.newly_ended);
        assert!(outcome.rescheduled.is_none());
        assert_eq!(orchestrator.ledger().summary_count(), 1);
        assert!(orchestrator.ledger().rescheduled_calls().is_empty());
        assert!(completions.calls()[0].0.contains("Conversation:\nHello there"));
    }

    #[tokio::test]
    async fn test_rescheduled_call_records_entry_unmodified() {
        let (orchestrator, _) = orchestrator_with(ScriptedCompletions::always("summary"));
        let call_id = orchestrator.start(None).unwrap();

        let mut request = end_request(&call_id, "rescheduled");
        request.reschedule_date = Some("2024-05-01".to_string());
        request.reschedule_time = Some("14:00".to_string());
        orchestrator.end(request).await.unwrap();

        let rescheduled = orchestrator.ledger().rescheduled_calls();
        assert_eq!(rescheduled.len(), 1);
        assert_eq!(
            rescheduled.last().unwrap(),
            &RescheduledCall {
                call_id: call_id.clone(),
                date: Some("2024-05-01".to_string()),
                time: Some("14:00".to_string()),
            }
        );
        assert_eq!(orchestrator.ledger().summary_count(), 1);
    }

    #[tokio::test]
    async fn test_disposition_match_is_exact() {
        let (orchestrator, _) = orchestrator_with(ScriptedCompletions::always("summary"));
        let call_id = orchestrator.start(None).unwrap();

        orchestrator.end(end_request(&call_id, "Rescheduled")).await.unwrap();
        assert!(orchestrator.ledger().rescheduled_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_call_id_rejected_everywhere() {
        let (orchestrator, completions) = orchestrator_with(ScriptedCompletions::new(vec![]));
        let invalid = CallError::InvalidCallId("ghost".to_string());

        assert_eq!(orchestrator.ingest("ghost", "hi".to_string()).unwrap_err(), invalid);
        assert_eq!(orchestrator.analyze("ghost").await.unwrap_err(), invalid);
        assert_eq!(
            orchestrator.end(end_request("ghost", "completed")).await.unwrap_err(),
            invalid
        );
        assert_eq!(orchestrator.snapshot("ghost").unwrap_err(), invalid);

        assert!(completions.calls().is_empty());
        assert_eq!(orchestrator.ledger().summary_count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_after_end_still_succeeds() {
        let (orchestrator, _) = orchestrator_with(ScriptedCompletions::new(vec![
            Ok("summary".to_string()),
            Ok(r#"{"pulse":"Comfortable","confidence":0.8,"suggestion":"Close"}"#.to_string()),
        ]));
        let call_id = orchestrator.start(None).unwrap();
        orchestrator.end(end_request(&call_id, "completed")).await.unwrap();

        let snapshot = orchestrator.snapshot(&call_id).unwrap();
        assert_eq!(snapshot.status, CallStatus::Ended);

        let analysis = orchestrator.analyze(&call_id).await.unwrap();
        assert_eq!(analysis.pulse, "Comfortable");
        assert_eq!(orchestrator.snapshot(&call_id).unwrap().analysis_history.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_after_end_is_kept() {
        let (orchestrator, _) = orchestrator_with(ScriptedCompletions::always("summary"));
        let call_id = orchestrator.start(None).unwrap();
        orchestrator.ingest(&call_id, "before".to_string()).unwrap();
        orchestrator.end(end_request(&call_id, "completed")).await.unwrap();

        assert_eq!(orchestrator.ingest(&call_id, "after".to_string()).unwrap(), 2);
        assert_eq!(orchestrator.snapshot(&call_id).unwrap().transcript, "before after");
    }

    #[tokio::test]
    async fn test_analysis_history_appends_in_order() {
        let (orchestrator, _) = orchestrator_with(ScriptedCompletions::new(vec![
            Ok(r#"{"pulse":"Neutral","confidence":0.5,"suggestion":"a"}"#.to_string()),
            Ok(r#"{"pulse":"Stressed","confidence":0.7,"suggestion":"b"}"#.to_string()),
        ]));
        let call_id = orchestrator.start(None).unwrap();

        orchestrator.analyze(&call_id).await.unwrap();
        orchestrator.analyze(&call_id).await.unwrap();

        let history = orchestrator.snapshot(&call_id).unwrap().analysis_history;
        let pulses: Vec<_> = history.iter().map(|a| a.pulse.as_str()).collect();
        assert_eq!(pulses, vec!["Neutral", "Stressed"]);
    }

    #[tokio::test]
    async fn test_malformed_analysis_is_reported_and_not_recorded() {
        let (orchestrator, _) = orchestrator_with(ScriptedCompletions::always("not json"));
        let call_id = orchestrator.start(None).unwrap();

        let err = orchestrator.analyze(&call_id).await.unwrap_err();
        assert!(matches!(err, CallError::Gateway(GatewayError::Malformed(_))));
        assert!(orchestrator.snapshot(&call_id).unwrap().analysis_history.is_empty());
    }

    #[tokio::test]
    async fn test_failed_summary_leaves_call_active() {
        let (orchestrator, _) = orchestrator_with(ScriptedCompletions::new(vec![Err(
            GatewayError::Upstream {
                status: 401,
                body: "invalid api key".to_string(),
            },
        )]));
        let call_id = orchestrator.start(None).unwrap();

        let err = orchestrator.end(end_request(&call_id, "rescheduled")).await.unwrap_err();
        assert!(matches!(err, CallError::Gateway(GatewayError::Upstream { status: 401, .. })));
        assert_eq!(orchestrator.snapshot(&call_id).unwrap().status, CallStatus::Active);
        assert_eq!(orchestrator.ledger().summary_count(), 0);
        assert!(orchestrator.ledger().rescheduled_calls().is_empty());
    }

    #[tokio::test]
    async fn test_second_end_appends_summary_but_keeps_first_transition() {
        let (orchestrator, _) = orchestrator_with(ScriptedCompletions::always("summary"));
        let call_id = orchestrator.start(None).unwrap();

        let first = orchestrator.end(end_request(&call_id, "completed")).await.unwrap();
        let second = orchestrator.end(end_request(&call_id, "not_interested")).await.unwrap();

        assert!(first.newly_ended);
        assert!(!second.newly_ended);
        assert_eq!(orchestrator.ledger().summary_count(), 2);
        assert_eq!(
            orchestrator.snapshot(&call_id).unwrap().disposition.as_deref(),
            Some("completed")
        );
    }

    #[test]
    fn test_start_with_duplicate_id() {
        let (orchestrator, _) = orchestrator_with(ScriptedCompletions::new(vec![]));
        orchestrator.start(Some("call-42".to_string())).unwrap();

        assert_eq!(
            orchestrator.start(Some("call-42".to_string())).unwrap_err(),
            CallError::DuplicateCallId("call-42".to_string())
        );
    }
}
