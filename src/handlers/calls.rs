//! # Call Lifecycle REST Handlers
//!
//! ## Available Endpoints:
//! - `POST /start-call` - Open a call session
//! - `POST /transcript` - Append one transcript fragment
//! - `GET /analyze/{call_id}` - Pulse reading and coaching suggestion
//! - `POST /end-call` - Summarize and close the call
//! - `GET /calls/{call_id}` - Inspect a session

use crate::calls::EndCall;
use crate::error::AppResult;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub struct StartCallRequest {
    /// Caller-chosen identifier; a UUID is generated when absent or blank.
    #[serde(default)]
    pub call_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartCallResponse {
    pub call_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptChunk {
    pub call_id: String,
    pub text: String,
}

/// `POST /start-call`
///
/// The body is optional; a missing or unparsable body starts a call with a
/// generated identifier.
pub async fn start_call(
    state: web::Data<AppState>,
    body: Option<web::Json<StartCallRequest>>,
) -> AppResult<HttpResponse> {
    let requested_id = body
        .and_then(|b| b.into_inner().call_id)
        .filter(|id| !id.trim().is_empty());

    let call_id = state.calls.start(requested_id)?;
    Ok(HttpResponse::Ok().json(StartCallResponse { call_id }))
}

/// `POST /transcript`
pub async fn receive_transcript(
    state: web::Data<AppState>,
    chunk: web::Json<TranscriptChunk>,
) -> AppResult<HttpResponse> {
    let TranscriptChunk { call_id, text } = chunk.into_inner();
    state.calls.ingest(&call_id, text)?;
    Ok(HttpResponse::Ok().json(json!({ "status": "received" })))
}

/// `GET /analyze/{call_id}`
///
/// Response: `{"pulse": "Neutral", "confidence": 0.7, "suggestion": "..."}`
pub async fn analyze(
    state: web::Data<AppState>,
    call_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let analysis = state.calls.analyze(&call_id).await?;
    Ok(HttpResponse::Ok().json(analysis))
}

/// `POST /end-call`
///
/// Body: `{"call_id", "disposition", "notes"?, "reschedule_date"?, "reschedule_time"?}`
pub async fn end_call(
    state: web::Data<AppState>,
    request: web::Json<EndCall>,
) -> AppResult<HttpResponse> {
    let outcome = state.calls.end(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "summary": outcome.summary })))
}

/// `GET /calls/{call_id}`
pub async fn get_call(
    state: web::Data<AppState>,
    call_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let snapshot = state.calls.snapshot(&call_id)?;
    Ok(HttpResponse::Ok().json(snapshot))
}
