mod helpers;

use chrono::{TimeZone, Utc};
use serde_json::json;

use docent::store::{self, StoreError, chats, events, models::NewEvent, users, verification};

#[tokio::test]
async fn duplicate_emails_surface_as_already_exists() {
    let app = helpers::spawn_app().await;
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();

    let user = users::create_user(&app.state.db_pool, "dup@example.com", true, now)
        .await
        .unwrap();
    assert!(!user.verified);

    let err = users::create_user(&app.state.db_pool, "DUP@example.com", true, now)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));
}

#[tokio::test]
async fn create_user_demands_consent() {
    let app = helpers::spawn_app().await;
    let now = Utc::now();

    let err = users::create_user(&app.state.db_pool, "shy@example.com", false, now)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ConsentRequired));
}

#[tokio::test]
async fn replacing_a_verification_token_invalidates_the_old_one() {
    let app = helpers::spawn_app().await;
    let now = Utc::now();
    let expires = now + chrono::Duration::minutes(10);

    verification::put_verification_token(&app.state.db_pool, "swap@example.com", "first", expires)
        .await
        .unwrap();
    verification::put_verification_token(&app.state.db_pool, "swap@example.com", "second", expires)
        .await
        .unwrap();

    let err = verification::consume_verification_token(&app.state.db_pool, "first", now)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));

    let email = verification::consume_verification_token(&app.state.db_pool, "second", now)
        .await
        .unwrap();
    assert_eq!(email, "swap@example.com");
}

#[tokio::test]
async fn chat_ids_are_monotonic() {
    let app = helpers::spawn_app().await;
    let now = Utc::now();
    let user = users::create_user(&app.state.db_pool, "writer@example.com", true, now)
        .await
        .unwrap();

    let messages = json!([{ "role": "user", "content": "hi" }]);
    let first = chats::save_chat(&app.state.db_pool, user.id, None, &messages, now)
        .await
        .unwrap();
    let second = chats::save_chat(&app.state.db_pool, user.id, Some("t"), &messages, now)
        .await
        .unwrap();
    assert_eq!(second, first + 1);
    assert_eq!(
        chats::count_chats(&app.state.db_pool, user.id).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn events_append_with_and_without_identity() {
    let app = helpers::spawn_app().await;
    let now = Utc::now();

    for (user_id, session_token) in [(None, None), (Some(7), Some("tok".to_owned()))] {
        events::append_event(
            &app.state.db_pool,
            &NewEvent {
                id: docent::clock::generate_uuid(),
                user_id,
                session_token,
                event_type: "widget_open".to_owned(),
                payload: Some(json!({ "page": "/" })),
                created_at: now,
            },
        )
        .await
        .unwrap();
    }
}

/// State survives a process restart: a session issued before the store is
/// reopened still authenticates afterwards, and rate counters persist.
#[tokio::test]
async fn sessions_and_counters_survive_reopen() {
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
    let db_path = std::env::temp_dir().join(format!("docent-test-{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite:{}", db_path.display());

    let token = {
        let pool = store::init(&url, 1).await.unwrap();
        let user = users::create_user(&pool, "durable@example.com", true, now)
            .await
            .unwrap();
        let session = store::sessions::create_session(&pool, user.id, 86400, now)
            .await
            .unwrap();
        let decision = store::rate::check_and_bump(&pool, &session.id, "save", 2, 600, now.timestamp())
            .await
            .unwrap();
        assert_eq!(decision, store::rate::RateDecision::Allowed);
        pool.close().await;
        session.id
    };

    // Reopen: the "restarted" process sees the same session and counter.
    let pool = store::init(&url, 1).await.unwrap();
    let (session, user) = store::sessions::lookup_session(&pool, &token, now)
        .await
        .unwrap();
    assert_eq!(user.email, "durable@example.com");
    assert_eq!(session.user_id, user.id);

    let decision = store::rate::check_and_bump(&pool, &token, "save", 2, 600, now.timestamp() + 1)
        .await
        .unwrap();
    assert_eq!(decision, store::rate::RateDecision::Allowed);
    let decision = store::rate::check_and_bump(&pool, &token, "save", 2, 600, now.timestamp() + 2)
        .await
        .unwrap();
    assert!(matches!(
        decision,
        store::rate::RateDecision::Denied { .. }
    ));

    pool.close().await;
    let _ = std::fs::remove_file(&db_path);
    let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
    let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
}
