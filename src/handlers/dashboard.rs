use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

const WEEKLY_PLACEHOLDER: &str = "Weekly improvement summary placeholder";
const MONTHLY_PLACEHOLDER: &str = "Monthly improvement summary placeholder";

/// `GET /`
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "Backend running" }))
}

/// `GET /home`: coaching plan, rescheduled follow-ups and a pitch hint.
pub async fn home(state: web::Data<AppState>) -> HttpResponse {
    let coaching = state.get_config().coaching;

    HttpResponse::Ok().json(json!({
        "ai_plan": coaching.ai_plan,
        "rescheduled_calls": state.calls.ledger().rescheduled_calls(),
        "pitch_hint": coaching.pitch_hint
    }))
}

/// `GET /reports`: the most recent call summaries, oldest first.
pub async fn reports(state: web::Data<AppState>) -> HttpResponse {
    let window = state.get_config().coaching.report_window;

    HttpResponse::Ok().json(json!({
        "daily": state.calls.ledger().recent_summaries(window),
        "weekly": WEEKLY_PLACEHOLDER,
        "monthly": MONTHLY_PLACEHOLDER
    }))
}
