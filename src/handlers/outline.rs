use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use std::sync::Arc;

use super::{Caller, body, enforce, require_text};
use crate::error::ApiError;
use crate::metrics::{GENERATION_LATENCY, REQUEST_TOTAL};
use crate::models::{OutlineRequest, OutlineResponse};
use crate::outline::OutlineStructure;
use crate::state::AppState;

const OUTLINE_LIMIT: u32 = 5;

// Outlines need a positive balance but cost nothing; the arcs are billed later
pub async fn generate_outline_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<OutlineRequest>, JsonRejection>,
) -> Result<Json<OutlineResponse>, ApiError> {
    REQUEST_TOTAL.with_label_values(&["outline"]).inc();
    let caller = Caller::from_headers(&headers);
    let user_id = caller.require_user()?;

    enforce(
        &state.limiters.generation,
        OUTLINE_LIMIT,
        user_id,
        "Too many outline requests. Please wait a moment.",
    )?;

    let req = body(payload)?;
    require_text("prompt", &req.prompt)?;
    OutlineStructure::check_requested(req.number_of_arcs, req.chapters_per_arc)
        .map_err(ApiError::InvalidRequest)?;

    if state.credits.balance(user_id).credits == 0 {
        return Err(ApiError::InsufficientCredits {
            message: "You need credits to generate a novel outline.",
            credits: 0,
        });
    }

    let _timer = GENERATION_LATENCY.with_label_values(&["outline"]).start_timer();
    let outcome = state.outline_workflow().run(&req).await?;

    Ok(Json(OutlineResponse {
        outline: outcome.text,
    }))
}
