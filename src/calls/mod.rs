//! # Call Lifecycle Module
//!
//! ## Components:
//! - **session**: call session record and the values produced while it runs
//! - **transcript**: fragment append and flatten
//! - **store**: session store seam and its in-memory implementation
//! - **ledger**: summaries and rescheduled follow-ups across all calls
//! - **orchestrator**: the start / ingest / analyze / end sequence

pub mod ledger;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod transcript;

pub use ledger::CallLedger;
pub use orchestrator::{CallError, CallOrchestrator, EndCall};
pub use session::AnalysisResult;
pub use store::{InMemorySessionStore, SessionStore};
