//! Process-wide lists filled in as calls end: summaries and rescheduled follow-ups.
//! Both are append-only.

use super::session::{CallSummary, RescheduledCall};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct CallLedger {
    summaries: RwLock<Vec<CallSummary>>,
    rescheduled: RwLock<Vec<RescheduledCall>>,
}

impl CallLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_summary(&self, summary: CallSummary) {
        self.summaries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(summary);
    }

    pub fn push_rescheduled(&self, entry: RescheduledCall) {
        self.rescheduled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// The last `count` summaries, oldest first.
    pub fn recent_summaries(&self, count: usize) -> Vec<CallSummary> {
        let summaries = self.summaries.read().unwrap_or_else(PoisonError::into_inner);
        let start = summaries.len().saturating_sub(count);
        summaries[start..].to_vec()
    }

    pub fn summary_count(&self) -> usize {
        self.summaries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn rescheduled_calls(&self) -> Vec<RescheduledCall> {
        self.rescheduled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
