//! Route table shared by the server and the handler tests.

use crate::error::AppError;
use crate::{handlers, health, websocket};
use actix_web::web;

/// Register every route plus the JSON extractor error mapping.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    // Call lifecycle
    .route("/start-call", web::post().to(handlers::start_call))
    .route("/transcript", web::post().to(handlers::receive_transcript))
    .route("/analyze/{call_id}", web::get().to(handlers::analyze))
    .route("/end-call", web::post().to(handlers::end_call))
    .route("/calls/{call_id}", web::get().to(handlers::get_call))
    .route("/ws/calls/{call_id}", web::get().to(websocket::transcript_websocket))
    // Dashboard
    .route("/", web::get().to(handlers::root))
    .route("/home", web::get().to(handlers::home))
    .route("/reports", web::get().to(handlers::reports))
    // Operations
    .service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics))
            .route("/config", web::get().to(handlers::get_config))
            .route("/config", web::put().to(handlers::update_config)),
    )
    .route("/health", web::get().to(health::health_check))
    .default_service(web::to(not_found));
}

async fn not_found(req: actix_web::HttpRequest) -> Result<actix_web::HttpResponse, AppError> {
    Err(AppError::NotFound(format!("No route for {} {}", req.method(), req.path())))
}
