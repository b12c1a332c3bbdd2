use crate::config::{AiConfig, AppConfig};
use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// `ai.model` and the temperatures show the stored values; `ai.active` shows what
/// the completion client is running with until the next restart.
fn config_view(config: &AppConfig, active_ai: &AiConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port
        },
        "ai": {
            "base_url": config.ai.base_url,
            "model": config.ai.model,
            "api_key_configured": config.ai.has_api_key(),
            "analysis_temperature": config.ai.analysis_temperature,
            "summary_temperature": config.ai.summary_temperature,
            "active": {
                "model": active_ai.model,
                "analysis_temperature": active_ai.analysis_temperature,
                "summary_temperature": active_ai.summary_temperature
            },
            "restart_required": config.ai.differs_from(active_ai)
        },
        "coaching": {
            "ai_plan": config.coaching.ai_plan,
            "pitch_hint": config.coaching.pitch_hint,
            "report_window": config.coaching.report_window
        }
    })
}

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config_view(&config, &state.active_ai)
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": config_view(&current_config, &state.active_ai)
    })))
}
