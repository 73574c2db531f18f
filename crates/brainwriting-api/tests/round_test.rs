//! Integration tests for round play: loading views, editing ideas, flipping
//! cards, and submitting.

mod common;

use axum::http::StatusCode;

/// Create a started two-participant session and return its code.
async fn started_session(app: &axum::Router) -> String {
    let (status, json) = common::post_json(
        app.clone(),
        "/api/v1/sessions",
        &serde_json::json!({ "hostName": "Hana", "topic": "quiet commutes" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let code = json["code"].as_str().unwrap().to_owned();

    for name in ["Alice", "Bob"] {
        common::post_json(
            app.clone(),
            &format!("/api/v1/sessions/{code}/join"),
            &serde_json::json!({ "name": name }),
        )
        .await;
    }
    common::post_json(
        app.clone(),
        &format!("/api/v1/sessions/{code}/start"),
        &serde_json::json!({ "name": "Hana" }),
    )
    .await;
    code
}

#[tokio::test]
async fn test_round_view_for_a_participant() {
    let app = common::build_test_app();
    let code = started_session(&app).await;

    let (status, json) = common::get_json(
        app,
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isHost"], false);
    assert_eq!(json["round"], 1);
    // Starting claimed round 1 at the fixed clock instant, so a view loaded
    // at that same instant sees the full budget.
    assert_eq!(json["timeLeft"], 100);
    assert_eq!(json["finished"], false);

    // Round 1 chains are one editable sheet.
    let chain = json["chain"].as_array().unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0]["participant"], "Alice");
    assert_eq!(chain[0]["editable"], true);
}

#[tokio::test]
async fn test_round_view_for_the_host_has_no_chain() {
    let app = common::build_test_app();
    let code = started_session(&app).await;

    let (status, json) = common::get_json(
        app,
        &format!("/api/v1/sessions/{code}/participants/Hana/rounds/1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isHost"], true);
    assert!(json["chain"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_round_view_for_a_stranger_returns_409() {
    let app = common::build_test_app();
    let code = started_session(&app).await;

    let (status, json) = common::get_json(
        app,
        &format!("/api/v1/sessions/{code}/participants/Mallory/rounds/1"),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "not_a_participant");
}

#[tokio::test]
async fn test_round_view_for_unknown_session_returns_404() {
    let app = common::build_test_app();

    let (status, json) = common::get_json(
        app,
        "/api/v1/sessions/NOSUCH/participants/Alice/rounds/1",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "session_not_found");
}

#[tokio::test]
async fn test_edit_idea_reflects_in_the_returned_view() {
    let app = common::build_test_app();
    let code = started_session(&app).await;

    common::get_json(
        app.clone(),
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1"),
    )
    .await;

    let (status, json) = common::put_json(
        app.clone(),
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1/ideas/0"),
        &serde_json::json!({ "text": "silent tram" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["chain"][0]["ideas"][0], "silent tram");

    // Out-of-range slot.
    let (status, json) = common::put_json(
        app,
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1/ideas/9"),
        &serde_json::json!({ "text": "nope" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_finish_normalizes_blanks_and_is_idempotent() {
    let app = common::build_test_app();
    let code = started_session(&app).await;

    common::get_json(
        app.clone(),
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1"),
    )
    .await;
    common::put_json(
        app.clone(),
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1/ideas/0"),
        &serde_json::json!({ "text": "silent tram" }),
    )
    .await;

    let (status, json) = common::post_empty(
        app.clone(),
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1/finish"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "submitted");
    assert_eq!(json["view"]["finished"], true);
    assert_eq!(json["view"]["chain"][0]["ideas"][0], "silent tram");
    assert_eq!(json["view"]["chain"][0]["ideas"][1], "(No idea)");

    // Editing after finish is rejected.
    let (status, _) = common::put_json(
        app.clone(),
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1/ideas/0"),
        &serde_json::json!({ "text": "too late" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = common::post_empty(
        app,
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1/finish"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "alreadySubmitted");
}

#[tokio::test]
async fn test_card_flip_toggles_between_faces() {
    let app = common::build_test_app();
    let code = started_session(&app).await;

    common::get_json(
        app.clone(),
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1"),
    )
    .await;
    common::put_json(
        app.clone(),
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1/ideas/0"),
        &serde_json::json!({ "text": "kelp lantern" }),
    )
    .await;

    // The participant's own card starts face up.
    let (status, json) = common::post_empty(
        app.clone(),
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1/cards/0/0/reveal"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["revealed"], false);

    let (status, json) = common::post_empty(
        app,
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1/cards/0/0/reveal"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["revealed"], true);
}

#[tokio::test]
async fn test_leaving_a_round_drops_the_view() {
    let app = common::build_test_app();
    let code = started_session(&app).await;

    common::get_json(
        app.clone(),
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1"),
    )
    .await;

    let (status, json) = common::delete_json(
        app.clone(),
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "left");

    // Flipping a card without a loaded view is rejected.
    let (status, json) = common::post_empty(
        app,
        &format!("/api/v1/sessions/{code}/participants/Alice/rounds/1/cards/0/0/reveal"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}
