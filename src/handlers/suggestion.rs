use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Caller, body, enforce};
use crate::error::ApiError;
use crate::metrics::{GENERATION_LATENCY, REQUEST_TOTAL};
use crate::models::{SuggestionRequest, SuggestionResponse};
use crate::prompts;
use crate::provider::GenerationRequest;
use crate::state::AppState;

const SUGGESTION_LIMIT: u32 = 30;

pub async fn generate_suggestion_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<SuggestionRequest>, JsonRejection>,
) -> Result<Json<SuggestionResponse>, ApiError> {
    REQUEST_TOTAL.with_label_values(&["suggestion"]).inc();
    let caller = Caller::from_headers(&headers);
    let user_id = caller.require_user()?;

    enforce(
        &state.limiters.api,
        SUGGESTION_LIMIT,
        user_id,
        "Too many suggestion requests. Please wait a moment.",
    )?;

    let req = body(payload)?;
    let prompt = prompts::suggestion_prompt(req.kind, &req.context);
    debug!(kind = ?req.kind, "generating suggestion");

    let request = GenerationRequest::new(prompt)
        .with_temperature(0.9)
        .with_max_output_tokens(100)
        .with_model(state.model.clone());

    let _timer = GENERATION_LATENCY.with_label_values(&["suggestion"]).start_timer();
    let suggestion = state.generator.generate(request).await?.trim().to_string();
    if suggestion.is_empty() {
        warn!(kind = ?req.kind, "empty suggestion from provider");
    }

    Ok(Json(SuggestionResponse { suggestion }))
}
