use chrono::{TimeZone, Utc};
use sea_orm::{DatabaseBackend, MockDatabase};
use serde_json::json;

use crate::common::{TestApp, bearer, level_row, routes, rows_affected, send};

#[tokio::test]
async fn raw_content_counts_a_download() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![level_row(1, 1, "")]])
        .append_exec_results([rows_affected(1)])
        .into_connection();
    let app = TestApp::spawn(db).await;

    let res = send(app.get(&routes::raw(1))).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.text, "LevelName Arena\r\nScript arena\r\n");
}

#[tokio::test]
async fn raw_levelgen_is_prefixed_and_not_counted() {
    // No exec result is queued: a download increment would fail the request.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![level_row(1, 1, "spawn()")]])
        .into_connection();
    let app = TestApp::spawn(db).await;

    let res = send(app.get(&routes::raw_kind(1, "levelgen"))).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.text, "-- arena.levelgen\r\nspawn()");
}

#[tokio::test]
async fn raw_unknown_kind_is_rejected() {
    let app = TestApp::spawn(MockDatabase::new(DatabaseBackend::Postgres).into_connection()).await;

    let res = send(app.get(&routes::raw_kind(1, "zip"))).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn raw_missing_level_is_not_found() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<std::collections::BTreeMap<&str, sea_orm::Value>>::new()])
        .into_connection();
    let app = TestApp::spawn(db).await;

    let res = send(app.get(&routes::raw(42))).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn anonymous_view_has_no_personal_fields() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![level_row(1, 1, "")]])
        .into_connection();
    let app = TestApp::spawn(db).await;

    let res = send(app.get(&routes::level(1))).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["level"]["name"], "Arena");
    assert_eq!(res.body["user_rating"], json!(null));
    assert_eq!(res.body["is_owner"], false);
}

#[tokio::test]
async fn invalid_token_is_rejected_on_public_view() {
    let app = TestApp::spawn(MockDatabase::new(DatabaseBackend::Postgres).into_connection()).await;

    let res = send(
        app.get(&routes::level(1))
            .header("Authorization", "Bearer garbage"),
    )
    .await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn rating_requires_a_token() {
    let app = TestApp::spawn(MockDatabase::new(DatabaseBackend::Postgres).into_connection()).await;

    let res = send(app.post(&routes::rate(1, "up"))).await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_MISSING");
}

#[tokio::test]
async fn rating_rejects_unknown_directive() {
    let app = TestApp::spawn(MockDatabase::new(DatabaseBackend::Postgres).into_connection()).await;

    let res = send(
        app.post(&routes::rate(1, "sideways"))
            .header("Authorization", bearer(2, "bob", false)),
    )
    .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn non_owner_cannot_edit() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![level_row(1, 1, "")]])
        .into_connection();
    let app = TestApp::spawn(db).await;

    let res = send(
        app.patch(&routes::level(1))
            .header("Authorization", bearer(2, "bob", false))
            .json(&json!({ "name": "Mine now" })),
    )
    .await;
    assert_eq!(res.status, 403);
    assert_eq!(res.body["code"], "PERMISSION_DENIED");
}

#[tokio::test]
async fn create_validates_name_before_touching_storage() {
    let app = TestApp::spawn(MockDatabase::new(DatabaseBackend::Postgres).into_connection()).await;

    let res = send(
        app.post(routes::LEVELS)
            .header("Authorization", bearer(2, "bob", false))
            .json(&json!({ "name": "  ", "content": "LevelName x" })),
    )
    .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn owner_can_edit() {
    let mut edited = level_row(1, 1, "");
    edited.insert("name", "Arena II".into());
    edited.insert(
        "last_updated",
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap().into(),
    );
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![level_row(1, 1, "")]])
        .append_query_results([vec![edited]])
        .into_connection();
    let app = TestApp::spawn(db).await;

    let res = send(
        app.patch(&routes::level(1))
            .header("Authorization", bearer(1, "alice", false))
            .json(&json!({ "name": "Arena II" })),
    )
    .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["name"], "Arena II");
    assert_eq!(res.body["owner_id"], 1);
    assert_eq!(res.body["last_updated"], "2024-06-01T12:00:00Z");
}

#[tokio::test]
async fn admin_can_edit_any_level() {
    let mut edited = level_row(1, 1, "");
    edited.insert("description", "curated".into());
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![level_row(1, 1, "")]])
        .append_query_results([vec![edited]])
        .into_connection();
    let app = TestApp::spawn(db).await;

    let res = send(
        app.patch(&routes::level(1))
            .header("Authorization", bearer(9, "root", true))
            .json(&json!({ "description": "curated" })),
    )
    .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["description"], "curated");
    assert_eq!(res.body["owner_id"], 1);
    assert_eq!(res.body["last_updated"], "2024-01-01T00:00:00Z");
}

#[tokio::test]
async fn owner_can_delete() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![level_row(1, 1, "")]])
        .append_exec_results([rows_affected(1)])
        .into_connection();
    let app = TestApp::spawn(db).await;

    let res = send(
        app.delete(&routes::level(1))
            .header("Authorization", bearer(1, "alice", false)),
    )
    .await;
    assert_eq!(res.status, 204);
    assert!(res.text.is_empty());
}

#[tokio::test]
async fn admin_can_delete_any_level() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![level_row(1, 1, "")]])
        .append_exec_results([rows_affected(1)])
        .into_connection();
    let app = TestApp::spawn(db).await;

    let res = send(
        app.delete(&routes::level(1))
            .header("Authorization", bearer(9, "root", true)),
    )
    .await;
    assert_eq!(res.status, 204);
}

#[tokio::test]
async fn non_owner_cannot_delete() {
    // No exec result is queued: a delete statement would fail the request.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![level_row(1, 1, "")]])
        .into_connection();
    let app = TestApp::spawn(db).await;

    let res = send(
        app.delete(&routes::level(1))
            .header("Authorization", bearer(2, "bob", false)),
    )
    .await;
    assert_eq!(res.status, 403);
    assert_eq!(res.body["code"], "PERMISSION_DENIED");
}
