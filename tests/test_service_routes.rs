mod common;

use axum::http::StatusCode;

use common::*;
use storyforge_gateway::credits::SIGNUP_BONUS;

#[tokio::test]
async fn health_reports_healthy() {
    let router = router(state(ScriptedGenerator::new(vec![])));
    let res = send(&router, get("/health", &[])).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["status"], "healthy");
}

#[tokio::test]
async fn credits_for_anonymous_and_signed_in_callers() {
    let state = state(ScriptedGenerator::new(vec![]));
    let router = router(state.clone());

    let res = send(&router, get("/api/credits", &[])).await;
    let body = json_body(res).await;
    assert_eq!(body["credits"], 0);
    assert_eq!(body["isAnonymous"], true);

    state.credits.try_deduct("reader").unwrap();
    let res = send(&router, get("/api/credits", &[("x-user-id", "reader")])).await;
    let body = json_body(res).await;
    assert_eq!(body["credits"], SIGNUP_BONUS - 1);
    assert_eq!(body["totalGenerated"], 1);
    assert_eq!(body["isAnonymous"], false);
}

#[tokio::test]
async fn transaction_history_lists_signup_and_usage() {
    let state = state(ScriptedGenerator::new(vec![]));
    let router = router(state.clone());

    let res = send(&router, get("/api/credits/transactions", &[])).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    state.credits.try_deduct("reader").unwrap();
    state.credits.refund("reader");
    let res = send(
        &router,
        get("/api/credits/transactions", &[("x-user-id", "reader")]),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    let kinds: Vec<_> = body["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, ["signup", "usage", "refund"]);
    assert_eq!(body["transactions"][0]["amount"], SIGNUP_BONUS);
    assert!(body["transactions"][1]["createdAt"].is_string());
}

#[tokio::test]
async fn metrics_are_exposed_in_text_format() {
    let router = router(state(ScriptedGenerator::new(vec![])));
    // touch a counter so the family is present
    storyforge_gateway::metrics::OUTLINE_RETRIES.inc_by(0.0);

    let res = send(&router, get("/metrics", &[])).await;
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("storyforge_outline_retries_total"));
}
