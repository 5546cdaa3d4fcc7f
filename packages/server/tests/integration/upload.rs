use reqwest::multipart::{Form, Part};
use sea_orm::{DatabaseBackend, MockDatabase};
use serde_json::json;

use crate::common::{TestApp, bearer, build_zip, routes, send};

fn archive_form(data: Vec<u8>) -> Form {
    Form::new().part("file", Part::bytes(data).file_name("levels.zip"))
}

#[tokio::test]
async fn mass_upload_rejects_unreadable_archive() {
    let app = TestApp::spawn(MockDatabase::new(DatabaseBackend::Postgres).into_connection()).await;

    let res = send(
        app.post(routes::MASS_UPLOAD)
            .header("Authorization", bearer(2, "bob", false))
            .multipart(archive_form(b"definitely not a zip".to_vec())),
    )
    .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn mass_upload_reports_entries_without_storing_bad_ones() {
    // Nothing here reaches the database: one entry lacks a name, the other
    // sits in a platform metadata folder.
    let zip = build_zip(&[
        ("pack/broken.level", "Script nothing\r\n"),
        ("__MACOSX/pack/._broken.level", "junk"),
        ("pack/readme.txt", "hello"),
    ]);
    let app = TestApp::spawn(MockDatabase::new(DatabaseBackend::Postgres).into_connection()).await;

    let res = send(
        app.post(routes::MASS_UPLOAD)
            .header("Authorization", bearer(2, "bob", false))
            .multipart(archive_form(zip)),
    )
    .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["stored"], 0);
    assert_eq!(res.body["failed"], 1);

    let reports = res.body["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["path"], "pack/broken.level");
    assert_eq!(reports[0]["level_id"], json!(null));
    assert_eq!(reports[1]["path"], "__MACOSX/pack/._broken.level");
    assert_eq!(
        reports[1]["warnings"],
        json!([catalog::ingest::METADATA_WARNING])
    );
}

#[tokio::test]
async fn mass_upload_requires_file_field() {
    let app = TestApp::spawn(MockDatabase::new(DatabaseBackend::Postgres).into_connection()).await;

    let res = send(
        app.post(routes::MASS_UPLOAD)
            .header("Authorization", bearer(2, "bob", false))
            .multipart(Form::new().text("note", "no archive")),
    )
    .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn single_upload_needs_a_level_name() {
    let app = TestApp::spawn(MockDatabase::new(DatabaseBackend::Postgres).into_connection()).await;

    let res = send(
        app.post(routes::UPLOAD)
            .header("Authorization", bearer(2, "bob", false))
            .json(&json!({ "content": "LevelDatabaseId 4\r\n" })),
    )
    .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}
