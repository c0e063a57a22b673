use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use std::sync::Arc;

use super::{Caller, body, enforce, require_text};
use crate::error::ApiError;
use crate::metrics::{GENERATION_LATENCY, REQUEST_TOTAL};
use crate::models::{TitleRequest, TitleResponse};
use crate::prompts;
use crate::provider::GenerationRequest;
use crate::state::AppState;

const TITLE_LIMIT: u32 = 5;

pub async fn generate_title_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<TitleRequest>, JsonRejection>,
) -> Result<Json<TitleResponse>, ApiError> {
    REQUEST_TOTAL.with_label_values(&["title"]).inc();
    let caller = Caller::from_headers(&headers);
    let user_id = caller.require_user()?;

    enforce(
        &state.limiters.api,
        TITLE_LIMIT,
        user_id,
        "Too many title generation requests. Please wait a moment.",
    )?;

    let req = body(payload)?;
    require_text("prompt", &req.prompt)?;

    let request = GenerationRequest::new(prompts::title_prompt(&req))
        .with_temperature(0.9)
        .with_max_output_tokens(50)
        .with_model(state.title_model.clone());

    let _timer = GENERATION_LATENCY.with_label_values(&["title"]).start_timer();
    let raw = state.generator.generate(request).await?;

    Ok(Json(TitleResponse {
        title: prompts::clean_title(&raw),
    }))
}
