use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure of the upstream text-generation call. Never retried here.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request to generation provider failed: {0}")]
    Transport(String),

    #[error("generation provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Transport(format!("timed out: {err}"))
        } else if err.is_decode() {
            GenerationError::InvalidResponse(err.to_string())
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CreditError {
    #[error("no credits left for user {0}")]
    Insufficient(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} must be a valid http(s) URL, got {value}")]
    InvalidUrl { name: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

// Errors returned by the HTTP handlers, rendered as { error, message }
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    RateLimited(&'static str),

    #[error("{message}")]
    InsufficientCredits { message: &'static str, credits: u32 },

    #[error("You've used your free story! Sign up to get 3 more free stories.")]
    FreeLimitReached,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::FreeLimitReached => StatusCode::FORBIDDEN,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::RateLimited(_) => "rate_limit_exceeded",
            ApiError::InsufficientCredits { .. } => "insufficient_credits",
            ApiError::FreeLimitReached => "free_limit_reached",
            ApiError::Unauthorized => "unauthorized",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Generation(_) => "generation_failed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::InsufficientCredits { credits, .. } => json!({
                "error": self.code(),
                "message": self.to_string(),
                "credits": credits,
            }),
            ApiError::FreeLimitReached => json!({
                "error": self.code(),
                "message": self.to_string(),
                "requiresAuth": true,
            }),
            ApiError::Generation(err) => {
                error!(error = %err, "generation failed");
                json!({ "error": self.code(), "message": err.to_string() })
            }
            _ => json!({ "error": self.code(), "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
