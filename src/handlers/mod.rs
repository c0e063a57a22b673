mod chapter;
mod credits;
mod health;
mod metrics;
mod outline;
mod story;
mod suggestion;
mod title;

pub use chapter::generate_chapter_handler;
pub use credits::{credits_handler, transactions_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use outline::generate_outline_handler;
pub use story::generate_story_handler;
pub use suggestion::generate_suggestion_handler;
pub use title::generate_title_handler;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::rejection::JsonRejection,
    http::{HeaderMap, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::warn;

use crate::error::{ApiError, GenerationError};
use crate::metrics::RATE_LIMITED_TOTAL;
use crate::provider::{GenerationRequest, TextGenerator, TextStream};
use crate::rate_limit::RateLimiter;

pub const USER_HEADER: &str = "x-user-id";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const SESSION_HEADER: &str = "x-session-id";
pub const ANONYMOUS_KEY: &str = "anonymous";

// Who is calling, as told by the upstream auth proxy and load balancer
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub user_id: Option<String>,
    pub forwarded_for: Option<String>,
    pub session_id: Option<String>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            user_id: header(headers, USER_HEADER),
            forwarded_for: header(headers, FORWARDED_FOR_HEADER),
            session_id: header(headers, SESSION_HEADER),
        }
    }

    // user id, else client address, else the shared anonymous bucket
    pub fn rate_key(&self) -> &str {
        self.user_id
            .as_deref()
            .or(self.forwarded_for.as_deref())
            .unwrap_or(ANONYMOUS_KEY)
    }

    pub fn client_key(&self) -> &str {
        self.forwarded_for.as_deref().unwrap_or(ANONYMOUS_KEY)
    }

    pub fn require_user(&self) -> Result<&str, ApiError> {
        self.user_id.as_deref().ok_or(ApiError::Unauthorized)
    }
}

pub(crate) fn enforce(
    limiter: &RateLimiter,
    limit: u32,
    key: &str,
    message: &'static str,
) -> Result<(), ApiError> {
    if limiter.check(limit, key) {
        return Ok(());
    }
    RATE_LIMITED_TOTAL.with_label_values(&[limiter.name()]).inc();
    Err(ApiError::RateLimited(message))
}

// Turn axum's JSON rejection into our 400 body
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

// Waits for the first fragment so a failing provider is still reported as an error
pub(crate) async fn open_text_stream(
    generator: &dyn TextGenerator,
    request: GenerationRequest,
) -> Result<(String, TextStream), GenerationError> {
    let mut fragments = generator.generate_stream(request).await?;
    match fragments.next().await {
        Some(Ok(first)) => Ok((first, fragments)),
        Some(Err(err)) => Err(err),
        None => Err(GenerationError::InvalidResponse(
            "stream ended before any text".to_string(),
        )),
    }
}

pub(crate) fn text_stream_response(
    route: &'static str,
    first: String,
    rest: TextStream,
) -> Response {
    let chunks = stream::once(async move { Ok(first) })
        .chain(rest)
        .inspect_err(move |err| warn!(route, error = %err, "text stream failed mid-response"))
        .map_ok(Bytes::from);
    (
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(chunks),
    )
        .into_response()
}
