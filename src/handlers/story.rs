use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue},
    response::Response,
};
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    Caller, SESSION_HEADER, body, enforce, open_text_stream, require_text, text_stream_response,
};
use crate::error::ApiError;
use crate::metrics::{GENERATION_LATENCY, REQUEST_TOTAL};
use crate::models::StoryRequest;
use crate::prompts;
use crate::provider::GenerationRequest;
use crate::session::anonymous_session;
use crate::state::AppState;

const STORY_LIMIT: u32 = 10;

// How the request is paid for
enum Payer {
    User(String),
    Anonymous(String),
}

pub async fn generate_story_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<StoryRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    REQUEST_TOTAL.with_label_values(&["story"]).inc();
    let caller = Caller::from_headers(&headers);

    enforce(
        &state.limiters.generation,
        STORY_LIMIT,
        caller.rate_key(),
        "Too many generation requests. Please wait a moment and try again.",
    )?;

    let req = body(payload)?;
    require_text("prompt", &req.prompt)?;

    let payer = match caller.user_id.as_deref() {
        Some(user_id) => {
            state.credits.try_deduct(user_id).map_err(|_| ApiError::InsufficientCredits {
                message: "You've run out of credits. Please purchase more to continue generating stories.",
                credits: 0,
            })?;
            Payer::User(user_id.to_string())
        }
        None => {
            let session = caller
                .session_id
                .clone()
                .unwrap_or_else(|| anonymous_session(caller.client_key()));
            if !state.credits.track_anonymous(&session) {
                return Err(ApiError::FreeLimitReached);
            }
            Payer::Anonymous(session)
        }
    };

    let request = GenerationRequest::new(req.prompt.clone())
        .with_system(prompts::story_system_prompt(&req))
        .with_temperature(0.8)
        .with_max_output_tokens(prompts::story_max_output_tokens(req.story_type))
        .with_model(state.model.clone());

    // latency is measured to the first fragment
    let timer = GENERATION_LATENCY.with_label_values(&["story"]).start_timer();
    let opened = open_text_stream(state.generator.as_ref(), request).await;
    timer.observe_duration();

    let (first, rest) = match opened {
        Ok(opened) => opened,
        Err(err) => {
            if let Payer::User(user_id) = &payer {
                warn!(user_id = %user_id, "refunding credit after failed generation");
                state.credits.refund(user_id);
            }
            return Err(err.into());
        }
    };
    info!(story_type = ?req.story_type, "streaming story");

    let mut response = text_stream_response("story", first, rest);
    if let Payer::Anonymous(session) = payer {
        if let Ok(value) = HeaderValue::from_str(&session) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    Ok(response)
}
