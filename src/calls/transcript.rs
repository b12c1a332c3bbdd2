//! Transcript aggregation for a call session.

use super::session::CallSession;

/// Append a fragment to the end of the session's transcript.
///
/// No validation, length limit or deduplication is applied; empty fragments are
/// kept too.
pub fn append(session: &mut CallSession, fragment: String) {
    session.transcripts.push(fragment);
}

/// Join all fragments in insertion order with a single space.
pub fn flatten(session: &CallSession) -> String {
    session.transcripts.join(" ")
}
