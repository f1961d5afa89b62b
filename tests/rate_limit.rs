mod helpers;

use helpers::{read_json, spawn_app};
use serde_json::json;

use docent::store::rate::{RateDecision, check_and_bump};

fn save_body(text: &str) -> serde_json::Value {
    json!({ "messages": [{ "role": "user", "content": text }] })
}

/// Test-mode policy for `save` is 2 requests per 10 seconds.
#[tokio::test]
async fn save_denial_and_recovery() {
    let app = spawn_app().await;
    let token = app.signed_in_user("saver@example.com").await;

    for expected_id in ["1", "2"] {
        let response = app
            .post_json("/api/v1/chat/save", &save_body("hi"), Some(&token))
            .await;
        assert_eq!(response.status(), 200);
        let body = read_json(response).await;
        assert_eq!(body["chat_id"], expected_id);
        assert!(body["saved_at"].is_string());
    }

    // Third call inside the window is denied with the public 429 contract.
    let response = app
        .post_json("/api/v1/chat/save", &save_body("hi"), Some(&token))
        .await;
    assert_eq!(response.status(), 429);
    let body = read_json(response).await;
    assert_eq!(body["detail"]["error"], "rate_limited");
    let retry_after = body["detail"]["retry_after"].as_u64().unwrap();
    assert!((1..=10).contains(&retry_after), "retry_after={retry_after}");

    // After the window has passed the counter resets.
    app.clock.advance_secs(retry_after as i64 + 1);
    let response = app
        .post_json("/api/v1/chat/save", &save_body("hi"), Some(&token))
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(read_json(response).await["chat_id"], "3");
}

#[tokio::test]
async fn denial_does_not_extend_the_window() {
    let app = spawn_app().await;
    let token = app.signed_in_user("insistent@example.com").await;

    for _ in 0..2 {
        let response = app
            .post_json("/api/v1/chat/save", &save_body("x"), Some(&token))
            .await;
        assert_eq!(response.status(), 200);
    }

    // Hammering during denial must not push the reset further out.
    for _ in 0..5 {
        let response = app
            .post_json("/api/v1/chat/save", &save_body("x"), Some(&token))
            .await;
        assert_eq!(response.status(), 429);
    }

    app.clock.advance_secs(10);
    let response = app
        .post_json("/api/v1/chat/save", &save_body("x"), Some(&token))
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn chat_and_save_counters_are_independent() {
    let app = spawn_app().await;
    let token = app.signed_in_user("mixed@example.com").await;

    // Exhaust the save budget.
    for _ in 0..2 {
        let response = app
            .post_json("/api/v1/chat/save", &save_body("x"), Some(&token))
            .await;
        assert_eq!(response.status(), 200);
    }
    let response = app
        .post_json("/api/v1/chat/save", &save_body("x"), Some(&token))
        .await;
    assert_eq!(response.status(), 429);

    // Chat still goes through on the same bearer.
    let response = app
        .post_json(
            "/api/v1/chat",
            &json!({
                "message": "What is a derivative?",
                "context": {
                    "mode": "chat",
                    "session_id": "550e8400-e29b-41d4-a716-446655440000"
                },
                "tier": "lightweight"
            }),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn exactly_max_requests_are_allowed_in_a_window() {
    let app = spawn_app().await;
    let now = 1_700_000_000;

    for i in 0..5 {
        let decision = check_and_bump(&app.state.db_pool, "subject-a", "chat", 5, 60, now + i)
            .await
            .unwrap();
        assert_eq!(decision, RateDecision::Allowed, "call {i}");
    }

    let decision = check_and_bump(&app.state.db_pool, "subject-a", "chat", 5, 60, now + 5)
        .await
        .unwrap();
    assert_eq!(decision, RateDecision::Denied { retry_after: 55 });

    // A fresh window admits again.
    let decision = check_and_bump(&app.state.db_pool, "subject-a", "chat", 5, 60, now + 60)
        .await
        .unwrap();
    assert_eq!(decision, RateDecision::Allowed);
}

#[tokio::test]
async fn concurrent_checks_never_overadmit() {
    let app = spawn_app().await;
    let now = 1_700_000_000;
    let max = 4u32;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let pool = app.state.db_pool.clone();
        handles.push(tokio::spawn(async move {
            check_and_bump(&pool, "subject-b", "chat", max, 60, now)
                .await
                .unwrap()
        }));
    }

    let mut allowed = 0;
    let mut denied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            RateDecision::Allowed => allowed += 1,
            RateDecision::Denied { retry_after } => {
                denied += 1;
                assert!((1..=60).contains(&retry_after));
            }
        }
    }

    assert_eq!(allowed, max);
    assert_eq!(denied, 16 - max);
}

#[tokio::test]
async fn retry_after_is_clamped_to_at_least_one() {
    let app = spawn_app().await;
    let now = 1_700_000_000;

    let _ = check_and_bump(&app.state.db_pool, "subject-c", "save", 1, 10, now)
        .await
        .unwrap();

    // At the last second of the window the denial still says "wait 1".
    let decision = check_and_bump(&app.state.db_pool, "subject-c", "save", 1, 10, now + 9)
        .await
        .unwrap();
    assert_eq!(decision, RateDecision::Denied { retry_after: 1 });
}

#[tokio::test]
async fn subjects_are_isolated() {
    let app = spawn_app().await;
    let now = 1_700_000_000;

    let _ = check_and_bump(&app.state.db_pool, "alice", "chat", 1, 60, now)
        .await
        .unwrap();
    let decision = check_and_bump(&app.state.db_pool, "alice", "chat", 1, 60, now + 1)
        .await
        .unwrap();
    assert!(matches!(decision, RateDecision::Denied { .. }));

    // A different subject has its own counter.
    let decision = check_and_bump(&app.state.db_pool, "bob", "chat", 1, 60, now + 1)
        .await
        .unwrap();
    assert_eq!(decision, RateDecision::Allowed);
}

#[tokio::test]
async fn denials_are_counted_in_metrics() {
    let app = spawn_app().await;
    let token = app.signed_in_user("counted@example.com").await;

    for _ in 0..3 {
        let _ = app
            .post_json("/api/v1/chat/save", &save_body("x"), Some(&token))
            .await;
    }

    let snapshot = app.state.metrics.snapshot();
    assert_eq!(snapshot.rate_limited_count, 1);
}
