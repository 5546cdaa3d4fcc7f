use std::collections::BTreeMap;
use std::net::SocketAddr;

use catalog::IngestConfig;
use chrono::{TimeZone, Utc};
use reqwest::{Client, RequestBuilder};
use sea_orm::{DatabaseConnection, MockExecResult, Value};
use serde_json::Value as Json;

use server::config::{AppConfig, AuthConfig, CorsConfig, DatabaseConfig, ServerConfig};
use server::state::AppState;
use server::utils::jwt;

pub const JWT_SECRET: &str = "test-secret-for-integration-tests";

pub mod routes {
    pub const LEVELS: &str = "/api/v1/levels";
    pub const UPLOAD: &str = "/api/v1/levels/upload";
    pub const MASS_UPLOAD: &str = "/api/v1/levels/mass-upload";

    pub fn level(id: i32) -> String {
        format!("/api/v1/levels/{id}")
    }

    pub fn rate(id: i32, value: &str) -> String {
        format!("/api/v1/levels/{id}/rate/{value}")
    }

    pub fn raw(id: i32) -> String {
        format!("/api/v1/levels/{id}/raw")
    }

    pub fn raw_kind(id: i32, kind: &str) -> String {
        format!("/api/v1/levels/{id}/raw/{kind}")
    }
}

/// A running test server backed by a mock database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Json,
}

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors: CorsConfig {
                allow_origins: vec![],
                max_age: 3600,
            },
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
        },
        auth: AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
        },
        upload: IngestConfig::default(),
    }
}

impl TestApp {
    pub async fn spawn(db: DatabaseConnection) -> Self {
        let app = server::build_router(AppState {
            db,
            config: test_config(),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server error");
        });

        Self {
            addr,
            client: Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.client.patch(self.url(path))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }
}

pub async fn send(req: RequestBuilder) -> TestResponse {
    let resp = req.send().await.expect("request failed");
    let status = resp.status().as_u16();
    let text = resp.text().await.expect("response body");
    let body = serde_json::from_str(&text).unwrap_or(Json::Null);
    TestResponse { status, text, body }
}

pub fn bearer(user_id: i32, name: &str, admin: bool) -> String {
    let token = jwt::sign(JWT_SECRET, user_id, name, admin).expect("sign token");
    format!("Bearer {token}")
}

/// A `level` table row as the mock database returns it.
pub fn level_row(id: i32, owner_id: i32, levelgen: &str) -> BTreeMap<&'static str, Value> {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let filename = if levelgen.is_empty() { "" } else { "arena.levelgen" };
    BTreeMap::from([
        ("id", id.into()),
        ("name", "Arena".into()),
        ("description", "".into()),
        ("content", "LevelName Arena\r\nScript arena\r\n".into()),
        ("levelgen", levelgen.into()),
        ("levelgen_filename", filename.into()),
        ("author", "alice".into()),
        ("owner_id", Some(owner_id).into()),
        ("rating", 0i64.into()),
        ("downloads", 0i64.into()),
        ("created_at", at.into()),
        ("last_updated", at.into()),
    ])
}

pub fn rows_affected(n: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected: n,
    }
}

/// Build a ZIP archive in memory with given file entries.
pub fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
    use std::io::Write;
    let cursor = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(cursor);
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).expect("zip start_file");
        writer.write_all(content.as_bytes()).expect("zip write_all");
    }
    writer.finish().expect("zip finish").into_inner()
}
