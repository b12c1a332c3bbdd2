//! # WebSocket Transcript Streaming Handler
//!
//! Live captioning clients stream transcript fragments over one WebSocket per call
//! instead of posting each fragment to `/transcript`.
//! Clients connect to `/ws/calls/{call_id}` after `POST /start-call`.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: refused with `{"error": "Invalid call ID"}` if the call is unknown
//! 2. **Greeting**: server sends `session_status` with status `connected`
//! 3. **Fragments**: client sends `{"type": "transcript", "text": "..."}`, server acks
//! 4. **Pulse**: client sends `{"type": "analyze"}`, server answers `analysis` or `error`
//! 5. **Heartbeat**: protocol pings every 30 s, connection closed after 60 s of silence
//!
//! Closing the socket does not end the call; that still goes through `POST /end-call`.

use crate::calls::{AnalysisResult, CallError, CallOrchestrator};
use crate::error::AppError;
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Messages sent by the client.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One transcript fragment
    Transcript { text: String },

    /// Request a pulse reading on the transcript so far
    Analyze,

    /// Application-level latency probe
    Ping { timestamp: u64 },
}

/// Messages sent by the server.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SessionStatus {
        call_id: String,
        status: String,
        message: Option<String>,
    },

    /// Fragment stored; `fragments` is the session's fragment count
    Ack { call_id: String, fragments: usize },

    Analysis {
        call_id: String,
        #[serde(flatten)]
        result: AnalysisResult,
    },

    Error {
        code: String,
        message: String,
        call_id: Option<String>,
    },

    Pong { timestamp: u64 },
}

impl ServerMessage {
    fn from_call_error(call_id: &str, err: CallError) -> Self {
        let err = AppError::from(err);
        ServerMessage::Error {
            code: err.kind().to_string(),
            message: err.to_string(),
            call_id: Some(call_id.to_string()),
        }
    }
}

/// Outbound message delivered to the actor from spawned tasks.
#[derive(Message)]
#[rtype(result = "()")]
struct Outbound(ServerMessage);

/// WebSocket actor bound to a single call.
pub struct TranscriptWebSocket {
    call_id: String,
    calls: CallOrchestrator,
    last_heartbeat: Instant,
}

impl TranscriptWebSocket {
    pub fn new(call_id: String, calls: CallOrchestrator) -> Self {
        Self {
            call_id,
            calls,
            last_heartbeat: Instant::now(),
        }
    }

    fn send(&self, ctx: &mut ws::WebsocketContext<Self>, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(json) => ctx.text(json),
            Err(e) => warn!(call_id = %self.call_id, error = %e, "Failed to encode WebSocket message"),
        }
    }

    fn send_error(&self, ctx: &mut ws::WebsocketContext<Self>, code: &str, message: String) {
        self.send(
            ctx,
            &ServerMessage::Error {
                code: code.to_string(),
                message,
                call_id: Some(self.call_id.clone()),
            },
        );
    }

    fn handle_client_message(&mut self, message: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match message {
            ClientMessage::Transcript { text } => {
                let reply = match self.calls.ingest(&self.call_id, text) {
                    Ok(fragments) => ServerMessage::Ack {
                        call_id: self.call_id.clone(),
                        fragments,
                    },
                    Err(err) => ServerMessage::from_call_error(&self.call_id, err),
                };
                self.send(ctx, &reply);
            }
            ClientMessage::Analyze => {
                let calls = self.calls.clone();
                let call_id = self.call_id.clone();
                let addr = ctx.address();

                // The AI round-trip can take seconds; keep the actor free to ingest.
                tokio::spawn(async move {
                    let reply = match calls.analyze(&call_id).await {
                        Ok(result) => ServerMessage::Analysis {
                            call_id: call_id.clone(),
                            result,
                        },
                        Err(err) => ServerMessage::from_call_error(&call_id, err),
                    };
                    addr.do_send(Outbound(reply));
                });
            }
            ClientMessage::Ping { timestamp } => {
                self.send(ctx, &ServerMessage::Pong { timestamp });
            }
        }
    }
}

impl Actor for TranscriptWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(call_id = %self.call_id, "Transcript stream connected");

        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(call_id = %act.call_id, "WebSocket heartbeat timeout, closing connection");
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });

        self.send(
            ctx,
            &ServerMessage::SessionStatus {
                call_id: self.call_id.clone(),
                status: "connected".to_string(),
                message: Some("Streaming transcript fragments".to_string()),
            },
        );
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(call_id = %self.call_id, "Transcript stream disconnected");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for TranscriptWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => self.handle_client_message(message, ctx),
                    Err(err) => self.send_error(ctx, "invalid_json", format!("Invalid JSON: {}", err)),
                }
            }
            Ok(ws::Message::Binary(_)) => {
                self.send_error(
                    ctx,
                    "unsupported_binary",
                    "Binary frames are not supported; send JSON text messages".to_string(),
                );
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                debug!(call_id = %self.call_id, ?reason, "WebSocket closed by client");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(call_id = %self.call_id, "Received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                warn!(call_id = %self.call_id, error = %err, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

impl Handler<Outbound> for TranscriptWebSocket {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        self.send(ctx, &msg.0);
    }
}

/// `GET /ws/calls/{call_id}`: upgrade to a transcript stream for a known call.
pub async fn transcript_websocket(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    call_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let call_id = call_id.into_inner();
    state.calls.snapshot(&call_id)?;

    debug!(call_id = %call_id, peer = ?req.connection_info().peer_addr(), "WebSocket upgrade requested");

    let actor = TranscriptWebSocket::new(call_id, state.calls.clone());
    ws::start(actor, &req, stream).map_err(|e| AppError::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::gateway::GatewayError;
    use crate::ai::testing::ScriptedCompletions;
    use crate::routes;
    use crate::state::testing::state_with;
    use actix_web::error::PayloadError;
    use actix_web::web::Bytes;
    use actix_web::{http::StatusCode, test as actix_test, App};
    use futures_util::{stream, Stream, StreamExt};
    use serde_json::{json, Value};
    use std::sync::Arc;

    /// Masked client frame (zero mask key, so the payload goes out as-is).
    fn client_frame(opcode: u8, payload: &[u8]) -> Bytes {
        assert!(payload.len() < 126);
        let mut frame = vec![0x80 | opcode, 0x80 | payload.len() as u8, 0, 0, 0, 0];
        frame.extend_from_slice(payload);
        Bytes::from(frame)
    }

    fn client_text(message: Value) -> Bytes {
        client_frame(0x1, message.to_string().as_bytes())
    }

    /// Drain complete server text frames from `buf` as JSON values.
    fn take_text_frames(buf: &mut Vec<u8>) -> Vec<Value> {
        let mut messages = Vec::new();
        while buf.len() >= 2 {
            let opcode = buf[0] & 0x0f;
            let (len, header) = match buf[1] & 0x7f {
                126 if buf.len() >= 4 => (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4),
                126 => break,
                127 => panic!("unexpectedly large frame"),
                n => (n as usize, 2),
            };
            if buf.len() < header + len {
                break;
            }
            let frame: Vec<u8> = buf.drain(..header + len).skip(header).collect();
            if opcode == 0x1 {
                messages.push(serde_json::from_slice(&frame).unwrap());
            }
        }
        messages
    }

    /// Run the actor over `frames` (the connection stays open afterwards) and
    /// collect the first `count` JSON messages it sends back.
    async fn exchange(actor: TranscriptWebSocket, frames: Vec<Bytes>, count: usize) -> Vec<Value> {
        let input = stream::iter(frames.into_iter().map(Ok::<_, PayloadError>))
            .chain(stream::pending());
        let mut output = Box::pin(ws::WebsocketContext::create(actor, input));

        let mut buf = Vec::new();
        let mut messages = Vec::new();
        while messages.len() < count {
            let chunk = tokio::time::timeout(Duration::from_secs(5), next_chunk(&mut output))
                .await
                .expect("timed out waiting for a server frame");
            buf.extend_from_slice(&chunk);
            messages.extend(take_text_frames(&mut buf));
        }
        messages
    }

    async fn next_chunk<S>(output: &mut std::pin::Pin<Box<S>>) -> Bytes
    where
        S: Stream<Item = Result<Bytes, actix_web::Error>>,
    {
        output.next().await.unwrap().unwrap()
    }

    #[test]
    fn test_client_message_parsing() {
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"transcript","text":"Hello"}"#).unwrap(),
            ClientMessage::Transcript {
                text: "Hello".to_string()
            }
        );
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"analyze"}"#).unwrap(),
            ClientMessage::Analyze
        );
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
    }

    #[test]
    fn test_analysis_message_is_flat() {
        let message = ServerMessage::Analysis {
            call_id: "call-1".to_string(),
            result: AnalysisResult {
                pulse: "Neutral".to_string(),
                confidence: 0.5,
                suggestion: "Pause".to_string(),
            },
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "analysis",
                "call_id": "call-1",
                "pulse": "Neutral",
                "confidence": 0.5,
                "suggestion": "Pause"
            })
        );
    }

    #[test]
    fn test_error_message_from_call_error() {
        let message = ServerMessage::from_call_error(
            "call-1",
            CallError::Gateway(GatewayError::Malformed("eof".to_string())),
        );

        match message {
            ServerMessage::Error { code, call_id, .. } => {
                assert_eq!(code, "upstream_malformed_response");
                assert_eq!(call_id.as_deref(), Some("call-1"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[actix_web::test]
    async fn test_stream_acks_fragments_and_answers_ping() {
        let state = state_with(Arc::new(ScriptedCompletions::new(vec![])));
        let call_id = state.calls.start(None).unwrap();
        let actor = TranscriptWebSocket::new(call_id.clone(), state.calls.clone());

        let messages = exchange(
            actor,
            vec![
                client_text(json!({ "type": "transcript", "text": "Hello" })),
                client_text(json!({ "type": "transcript", "text": "there" })),
                client_text(json!({ "type": "ping", "timestamp": 42 })),
            ],
            4,
        )
        .await;

        assert_eq!(messages[0]["type"], "session_status");
        assert_eq!(messages[0]["status"], "connected");
        assert_eq!(
            messages[1],
            json!({ "type": "ack", "call_id": call_id, "fragments": 1 })
        );
        assert_eq!(messages[2]["fragments"], 2);
        assert_eq!(messages[3], json!({ "type": "pong", "timestamp": 42 }));
        assert_eq!(state.calls.snapshot(&call_id).unwrap().transcript, "Hello there");
    }

    #[actix_web::test]
    async fn test_stream_analyze_records_pulse() {
        let completions = Arc::new(ScriptedCompletions::new(vec![Ok(
            r#"{"pulse":"Stressed","confidence":0.9,"suggestion":"Slow down"}"#.to_string(),
        )]));
        let state = state_with(completions.clone());
        let call_id = state.calls.start(None).unwrap();
        let actor = TranscriptWebSocket::new(call_id.clone(), state.calls.clone());

        let messages = exchange(
            actor,
            vec![
                client_text(json!({ "type": "transcript", "text": "Too expensive" })),
                client_text(json!({ "type": "analyze" })),
            ],
            3,
        )
        .await;

        assert_eq!(messages[1]["type"], "ack");
        assert_eq!(
            messages[2],
            json!({
                "type": "analysis",
                "call_id": call_id,
                "pulse": "Stressed",
                "confidence": 0.9,
                "suggestion": "Slow down"
            })
        );
        assert!(completions.calls()[0].0.contains("Conversation:\nToo expensive"));
        assert_eq!(state.calls.snapshot(&call_id).unwrap().analysis_history.len(), 1);
    }

    #[actix_web::test]
    async fn test_stream_rejects_binary_and_bad_json() {
        let state = state_with(Arc::new(ScriptedCompletions::new(vec![])));
        let call_id = state.calls.start(None).unwrap();
        let actor = TranscriptWebSocket::new(call_id.clone(), state.calls.clone());

        let messages = exchange(
            actor,
            vec![
                client_frame(0x2, &[0x01, 0x02, 0x03]),
                client_text(json!({ "type": "dance" })),
            ],
            3,
        )
        .await;

        assert_eq!(messages[1]["type"], "error");
        assert_eq!(messages[1]["code"], "unsupported_binary");
        assert_eq!(messages[2]["code"], "invalid_json");
        assert_eq!(messages[2]["call_id"], call_id);
        assert_eq!(state.calls.snapshot(&call_id).unwrap().fragment_count, 0);
    }

    #[actix_web::test]
    async fn test_unknown_call_is_refused_before_upgrade() {
        let state = state_with(Arc::new(ScriptedCompletions::new(vec![])));
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes::configure),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/ws/calls/ghost").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Invalid call ID" }));
    }

    #[actix_web::test]
    async fn test_known_call_without_upgrade_headers_is_bad_request() {
        let state = state_with(Arc::new(ScriptedCompletions::new(vec![])));
        let call_id = state.calls.start(None).unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes::configure),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri(&format!("/ws/calls/{}", call_id))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
