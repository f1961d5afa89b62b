mod helpers;

use helpers::{read_json, spawn_app};
use serde_json::json;

use docent::store::verification::INTEGRATION_TEST_TOKEN;

#[tokio::test]
async fn signup_verify_session_check_round_trip() {
    let app = spawn_app().await;

    let response = app
        .post_json(
            "/api/v1/auth/signup",
            &json!({ "email": "Learner@Example.com", "consent_data_storage": true }),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = read_json(response).await;
    assert_eq!(body["status"], "verification_sent");

    let response = app
        .post_json(
            "/api/v1/auth/verify",
            &json!({ "token": INTEGRATION_TEST_TOKEN }),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = read_json(response).await;
    let token = body["session_token"].as_str().unwrap().to_owned();
    assert_eq!(body["user_profile"]["email"], "learner@example.com");
    assert_eq!(body["user_profile"]["tier"], "lightweight");

    let response = app.get("/api/v1/auth/session-check", Some(&token)).await;
    assert_eq!(response.status(), 200);
    let body = read_json(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["user"]["email"], "learner@example.com");
}

#[tokio::test]
async fn signup_requires_consent() {
    let app = spawn_app().await;

    let response = app
        .post_json(
            "/api/v1/auth/signup",
            &json!({ "email": "a@b.co", "consent_data_storage": false }),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = read_json(response).await;
    assert_eq!(body["error"], "CONSENT_REQUIRED");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn signup_rejects_malformed_email() {
    let app = spawn_app().await;

    let response = app
        .post_json(
            "/api/v1/auth/signup",
            &json!({ "email": "not-an-email", "consent_data_storage": true }),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = read_json(response).await;
    assert_eq!(body["error"], "INVALID_REQUEST");
}

#[tokio::test]
async fn signup_does_not_leak_registration() {
    let app = spawn_app().await;
    app.signed_in_user("repeat@example.com").await;

    // Signing up again with the same address looks identical to a fresh one.
    let response = app
        .post_json(
            "/api/v1/auth/signup",
            &json!({ "email": "repeat@example.com", "consent_data_storage": true }),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = read_json(response).await;
    assert_eq!(body["status"], "verification_sent");
}

#[tokio::test]
async fn verify_token_is_single_use() {
    let app = spawn_app().await;
    app.signed_in_user("once@example.com").await;

    let response = app
        .post_json(
            "/api/v1/auth/verify",
            &json!({ "token": INTEGRATION_TEST_TOKEN }),
            None,
        )
        .await;
    assert_eq!(response.status(), 410);
    let body = read_json(response).await;
    assert_eq!(body["error"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn verify_rejects_expired_token() {
    let app = spawn_app().await;

    let response = app
        .post_json(
            "/api/v1/auth/signup",
            &json!({ "email": "slow@example.com", "consent_data_storage": true }),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    // Past the verification TTL the token no longer converts.
    app.clock.advance_secs(601);

    let response = app
        .post_json(
            "/api/v1/auth/verify",
            &json!({ "token": INTEGRATION_TEST_TOKEN }),
            None,
        )
        .await;
    assert_eq!(response.status(), 410);
    let body = read_json(response).await;
    assert_eq!(body["error"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn verify_rejects_garbage_token() {
    let app = spawn_app().await;

    let response = app
        .post_json("/api/v1/auth/verify", &json!({ "token": "" }), None)
        .await;
    assert_eq!(response.status(), 401);
    let body = read_json(response).await;
    assert_eq!(body["error"], "VERIFICATION_FAILED");

    let response = app
        .post_json(
            "/api/v1/auth/verify",
            &json!({ "token": "never-issued" }),
            None,
        )
        .await;
    assert_eq!(response.status(), 410);
}

#[tokio::test]
async fn concurrent_verifies_have_exactly_one_winner() {
    let app = spawn_app().await;

    let response = app
        .post_json(
            "/api/v1/auth/signup",
            &json!({ "email": "race@example.com", "consent_data_storage": true }),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    use docent::clock::Clock;

    let pool = app.state.db_pool.clone();
    let now = app.clock.now();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            docent::store::verification::consume_verification_token(
                &pool,
                INTEGRATION_TEST_TOKEN,
                now,
            )
            .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn anon_session_mints_uuids() {
    let app = spawn_app().await;

    let response = app.post_json("/api/v1/anon-session", &json!({}), None).await;
    assert_eq!(response.status(), 200);
    let body = read_json(response).await;

    let session_id = uuid::Uuid::parse_str(body["session_id"].as_str().unwrap()).unwrap();
    let anon_id = uuid::Uuid::parse_str(body["anon_id"].as_str().unwrap()).unwrap();
    assert_eq!(session_id.get_version_num(), 4);
    assert_eq!(anon_id.get_version_num(), 4);
    assert_ne!(session_id, anon_id);
}
