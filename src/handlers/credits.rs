use axum::{Json, extract::State, http::HeaderMap};
use std::sync::Arc;

use super::Caller;
use crate::error::ApiError;
use crate::models::{CreditsResponse, TransactionsResponse};
use crate::state::AppState;

pub async fn credits_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<CreditsResponse> {
    let caller = Caller::from_headers(&headers);
    let Some(user_id) = caller.user_id.as_deref() else {
        return Json(CreditsResponse {
            credits: 0,
            total_generated: None,
            is_anonymous: true,
        });
    };

    let credits = state.credits.balance(user_id);
    Json(CreditsResponse {
        credits: credits.credits,
        total_generated: Some(credits.total_generated),
        is_anonymous: false,
    })
}

// Ledger history, oldest first
pub async fn transactions_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let caller = Caller::from_headers(&headers);
    let user_id = caller.require_user()?;
    // opens the account on first sight so the signup bonus shows up
    state.credits.balance(user_id);
    Ok(Json(TransactionsResponse {
        transactions: state.credits.transactions(user_id),
    }))
}
