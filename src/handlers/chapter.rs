use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::Response,
};
use std::sync::Arc;
use tracing::{info, warn};

use super::{Caller, body, enforce, open_text_stream, require_text, text_stream_response};
use crate::error::ApiError;
use crate::metrics::{GENERATION_LATENCY, REQUEST_TOTAL};
use crate::models::ChapterRequest;
use crate::prompts;
use crate::provider::GenerationRequest;
use crate::state::AppState;

const CHAPTER_LIMIT: u32 = 20;
const CHAPTER_MAX_OUTPUT_TOKENS: u32 = 5000;

pub async fn generate_chapter_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ChapterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    REQUEST_TOTAL.with_label_values(&["chapter"]).inc();
    let caller = Caller::from_headers(&headers);

    enforce(
        &state.limiters.generation,
        CHAPTER_LIMIT,
        caller.client_key(),
        "Too many chapter generation requests. Please wait a moment.",
    )?;

    let req = body(payload)?;
    require_text("chapterTitle", &req.chapter_title)?;
    require_text("outline", &req.outline)?;

    // one credit per arc, charged on its first chapter
    let charged = match (req.is_first_chapter_of_arc, caller.user_id.as_deref()) {
        (true, Some(user_id)) => {
            state.credits.try_deduct(user_id).map_err(|_| ApiError::InsufficientCredits {
                message: "You've run out of credits. Each arc costs 1 credit.",
                credits: 0,
            })?;
            info!(user_id, chapter = req.chapter_number, "charged credit for arc");
            Some(user_id)
        }
        _ => None,
    };

    let request = GenerationRequest::new(prompts::chapter_user_prompt(&req))
        .with_system(prompts::chapter_system_prompt(&req))
        .with_temperature(0.8)
        .with_max_output_tokens(CHAPTER_MAX_OUTPUT_TOKENS)
        .with_model(state.model.clone());

    let timer = GENERATION_LATENCY.with_label_values(&["chapter"]).start_timer();
    let opened = open_text_stream(state.generator.as_ref(), request).await;
    timer.observe_duration();

    match opened {
        Ok((first, rest)) => Ok(text_stream_response("chapter", first, rest)),
        Err(err) => {
            if let Some(user_id) = charged {
                warn!(user_id, "refunding arc credit after failed generation");
                state.credits.refund(user_id);
            }
            Err(err.into())
        }
    }
}
